/*!
  An Intcode virtual machine.

  A program is a comma-separated list of integers loaded into sparse, zero-initialized memory.
  The machine fetches the word at its instruction pointer, decodes an opcode and per-parameter
  addressing modes (position, immediate, relative), and dispatches through an opcode table.
  Input and output go through caller-supplied ports, which lets machines be wired into
  pipelines and feedback loops that exchange values over channels.

  ```
  use intcode::{Machine, Program, Values};

  let program = Program::parse("3,0,4,0,99").unwrap();
  let mut output = Vec::new();
  Machine::new(&program).run(&mut Values::new(vec![7]), &mut output).unwrap();
  assert_eq!(output, vec![7]);
  ```
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

pub mod address;
pub mod bytecode;
pub mod error;
pub mod machine;
pub mod memory;
pub mod network;
pub mod opcodes;
pub mod ports;
pub mod program;

/// The machine word: every memory cell, parameter, and port value.
pub type Value = i64;

pub use address::Address;
pub use error::{Fault, NetworkError, PortError, ProgramError, TableError};
pub use machine::{Machine, Status};
pub use memory::Memory;
pub use network::{Network, NetworkConfig, Topology};
pub use opcodes::{Context, Flow, OpcodeTable, Operands, Procedure, WriteSet};
pub use ports::{input_fn, output_fn, ChannelInput, Console, Input, NoInput, Output, Seeded, Sink, Values};
pub use program::Program;
