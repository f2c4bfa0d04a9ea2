//! The execution engine: one machine, its memory, and the fetch-decode-execute loop.

#[cfg(feature = "trace_computation")]
use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use prettytable::{format as TableFormat, Table};
use tracing::{debug, trace, warn};

use crate::address::Address;
use crate::bytecode::{decode_instruction, Instruction, Mode};
use crate::error::Fault;
use crate::memory::Memory;
use crate::opcodes::{Context, Flow, OpcodeTable, Operands, Procedure};
use crate::ports::{Input, NoInput, Output, Sink};
use crate::program::Program;
use crate::Value;

/// Number of executed instructions kept for display when tracing computations.
#[cfg(feature = "trace_computation")]
const HISTORY_LENGTH: usize = 16;

/// Cells shown before and after the instruction pointer by the state display.
const WINDOW_BEFORE: usize = 4;
const WINDOW_AFTER: usize = 8;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Status {
  Running,
  Halted,
  Faulted(Fault),
}

impl Display for Status {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Status::Running        => write!(f, "Running"),
      Status::Halted         => write!(f, "Halted"),
      Status::Faulted(fault) => write!(f, "Faulted: {}", fault),
    }
  }
}

pub struct Machine {
  // Memory Store
  memory        : Memory,

  // Registers //
  ip            : Address, // Instruction pointer
  relative_base : Value,   // Base for relative mode parameters; may dip below zero

  status        : Status,
  steps         : u64,
  table         : Arc<OpcodeTable>,

  // For tracing computations :
  #[cfg(feature = "trace_computation")] history : VecDeque<(Address, Instruction)>,
}

impl Machine {

  // region Construction

  /// A machine with a private copy of `program` as its memory, using the standard table.
  pub fn new(program: &Program) -> Machine {
    Machine::with_table(program, OpcodeTable::shared())
  }

  /// A machine using a caller-supplied opcode table.
  pub fn with_table(program: &Program, table: Arc<OpcodeTable>) -> Machine {
    Machine {
      memory        : Memory::from(program),
      ip            : Address::ZERO,
      relative_base : 0,
      status        : Status::Running,
      steps         : 0,
      table,
      #[cfg(feature = "trace_computation")] history : VecDeque::with_capacity(HISTORY_LENGTH),
    }
  }

  /// A machine whose memory is patched at the given addresses before it runs.
  pub fn with_overrides<T>(program: &Program, overrides: T) -> Machine
    where T: IntoIterator<Item = (Address, Value)>
  {
    let mut machine = Machine::new(program);
    for (address, value) in overrides {
      machine.memory.set(address, value);
    }
    machine
  }

  /// Patches the noun and verb at addresses 1 and 2.
  pub fn with_noun_verb(program: &Program, noun: Value, verb: Value) -> Machine {
    Machine::with_overrides(program, vec![(Address(1), noun), (Address(2), verb)])
  }

  // endregion

  // region Accessors

  pub fn ip(&self) -> Address {
    self.ip
  }

  pub fn relative_base(&self) -> Value {
    self.relative_base
  }

  pub fn status(&self) -> &Status {
    &self.status
  }

  /// Number of instructions executed so far.
  pub fn steps(&self) -> u64 {
    self.steps
  }

  pub fn memory(&self) -> &Memory {
    &self.memory
  }

  pub fn read(&self, address: Address) -> Value {
    self.memory.get(address)
  }

  // endregion

  // region Execution

  /**
    Runs until the machine halts and returns the value at address 0. A fault stops the machine
    and is returned instead; the machine stays faulted and later calls return the same fault.
  */
  pub fn run(&mut self, input: &mut dyn Input, output: &mut dyn Output) -> Result<Value, Fault> {
    loop {
      if let Status::Halted = self.step(input, output)? {
        debug!(steps = self.steps, "machine halted");
        return Ok(self.memory.get(Address::ZERO));
      }
    }
  }

  /// Runs a program that performs no I/O. Reading input faults; output is discarded.
  pub fn run_without_io(&mut self) -> Result<Value, Fault> {
    self.run(&mut NoInput, &mut Sink)
  }

  /// Executes a single instruction and returns the resulting status.
  pub fn step(&mut self, input: &mut dyn Input, output: &mut dyn Output) -> Result<Status, Fault> {
    match &self.status {
      Status::Running        => {}
      Status::Halted         => return Ok(Status::Halted),
      Status::Faulted(fault) => return Err(fault.clone()),
    }

    match self.execute(input, output) {
      Ok(status) => {
        self.status = status.clone();
        Ok(status)
      }
      Err(fault) => {
        warn!(%fault, steps = self.steps, "machine faulted");
        self.status = Status::Faulted(fault.clone());
        Err(fault)
      }
    }
  }

  fn execute(&mut self, input: &mut dyn Input, output: &mut dyn Output) -> Result<Status, Fault> {
    let ip = self.ip;
    let word = self.memory.get(ip);
    let unknown = Fault::UnknownOpcode { ip, word };

    let instruction = decode_instruction(word).ok_or_else(|| unknown.clone())?;
    let procedure: Procedure = *self.table.get(instruction.opcode).ok_or(unknown)?;

    trace!(%ip, %instruction, "execute");
    #[cfg(feature = "trace_computation")]
    self.record(ip, instruction);

    let operands = self.resolve_operands(ip, &instruction, &procedure)?;

    let flow = {
      let mut ctx = Context {
        ip,
        memory        : &mut self.memory,
        relative_base : &mut self.relative_base,
        input,
        output,
      };
      (procedure.effect)(&mut ctx, &operands)?
    };
    self.steps += 1;

    match flow {
      Flow::Advance => {
        self.ip = ip + (procedure.arity + 1);
        Ok(Status::Running)
      }
      Flow::Jump(target) => {
        self.ip = Address::try_from(target)
          .map_err(|address| Fault::NegativeAddress { ip, address })?;
        Ok(Status::Running)
      }
      Flow::Halt => Ok(Status::Halted)
    }
  }

  fn resolve_operands(
      &self,
      ip          : Address,
      instruction : &Instruction,
      procedure   : &Procedure
    ) -> Result<Operands, Fault>
  {
    let mut operands = Operands::new(ip, procedure.arity);

    for parameter in 0..procedure.arity {
      let literal = self.memory.get(ip + (parameter + 1));
      let mode = instruction
        .mode(parameter)
        .map_err(|digit| Fault::InvalidMode { ip, parameter, digit })?;

      match procedure.writes.contains(parameter) {
        true => {
          if mode == Mode::Immediate {
            return Err(Fault::ImmediateWriteTarget { ip, parameter });
          }
          operands.set_target(parameter, self.effective_address(ip, mode, literal)?);
        }
        false => {
          let value = match mode {
            Mode::Immediate => literal,
            _ => self.memory.get(self.effective_address(ip, mode, literal)?)
          };
          operands.set_value(parameter, value);
        }
      }
    }

    Ok(operands)
  }

  /// The address a position or relative parameter refers to.
  fn effective_address(&self, ip: Address, mode: Mode, literal: Value) -> Result<Address, Fault> {
    let target = match mode {
      Mode::Relative => {
        let base = self.relative_base;
        base
          .checked_add(literal)
          .ok_or(Fault::AddressOverflow { ip, base, offset: literal })?
      }
      _ => literal
    };
    Address::try_from(target).map_err(|address| Fault::NegativeAddress { ip, address })
  }

  #[cfg(feature = "trace_computation")]
  fn record(&mut self, ip: Address, instruction: Instruction) {
    if self.history.len() == HISTORY_LENGTH {
      self.history.pop_front();
    }
    self.history.push_back((ip, instruction));
    trace!("\n{}", self);
  }

  // endregion

  // region Display methods

  fn make_state_table(&self) -> Table {
    let mut table = Table::new();
    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.add_row(row![r->"IP =", self.ip]);
    table.add_row(row![r->"RB =", self.relative_base]);
    table.add_row(row![r->"Steps =", self.steps]);
    table.add_row(row![r->"Status =", self.status]);
    table
  }

  fn make_memory_table(&self) -> Table {
    let mut table = Table::new();
    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Address", ubl->"Contents"]);

    let start = Address(self.ip.idx().saturating_sub(WINDOW_BEFORE));
    let len = self.ip.idx() - start.idx() + WINDOW_AFTER;
    for (address, value) in self.memory.window(start, len) {
      match address == self.ip {
        true  => table.add_row(row![r->format!("* --> mem{} =", address), value]),
        false => table.add_row(row![r->format!("mem{} =", address), value]),
      };
    }
    table
  }

  #[cfg(feature = "trace_computation")]
  fn make_history_table(&self) -> Table {
    let mut table = Table::new();
    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Address", ubl->"Instruction"]);
    for (address, instruction) in self.history.iter() {
      table.add_row(row![r->address, instruction]);
    }
    table
  }

  // endregion
}

lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

impl Display for Machine {

  // We print the instruction history if `trace_computation` is on.
  #[cfg(feature = "trace_computation")]
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let state_table   = self.make_state_table();
    let memory_table  = self.make_memory_table();
    let history_table = self.make_history_table();

    let mut combined_table = table!([state_table, memory_table, history_table]);
    combined_table.set_titles(row![ub->"Machine", ub->"Memory", ub->"History"]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    write!(f, "{}", combined_table)
  }

  #[cfg(not(feature = "trace_computation"))]
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let state_table  = self.make_state_table();
    let memory_table = self.make_memory_table();

    let mut combined_table = table!([state_table, memory_table]);
    combined_table.set_titles(row![ub->"Machine", ub->"Memory"]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    write!(f, "{}", combined_table)
  }
}
