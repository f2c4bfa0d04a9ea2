//! Error types: program ingestion, opcode table construction, machine faults, port failures,
//! and network failures.

use std::time::Duration;

use thiserror::Error;

use crate::address::Address;
use crate::Value;

/// Program text that could not be ingested.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProgramError {
  #[error("program text is empty")]
  Empty,

  #[error("expected a signed integer at byte {offset}, found `{found}`")]
  Syntax { offset: usize, found: String },
}

/// A procedure that cannot be placed in an opcode table.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TableError {
  #[error("opcode {0} does not fit in two decimal digits")]
  OpcodeOutOfRange(u8),

  #[error("procedure {name} declares {arity} parameters; at most {max} can carry a mode")]
  ArityTooLarge { name: &'static str, arity: usize, max: usize },
}

/// Failure of an input or output port.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PortError {
  #[error("no input port is connected")]
  Unconnected,

  #[error("input exhausted after {0} values")]
  Exhausted(usize),

  #[error("channel closed")]
  Closed,

  #[error("no input arrived within {0:?}")]
  TimedOut(Duration),

  #[error("i/o error: {0}")]
  Io(String),
}

/**
  A fatal condition raised by a running machine. Every variant records the address of the
  instruction that raised it. A faulted machine never executes another instruction.
*/
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Fault {
  #[error("unknown opcode in word {word} at {ip}")]
  UnknownOpcode { ip: Address, word: Value },

  #[error("invalid mode digit {digit} for parameter {parameter} at {ip}")]
  InvalidMode { ip: Address, parameter: usize, digit: u8 },

  #[error("immediate mode on write target parameter {parameter} at {ip}")]
  ImmediateWriteTarget { ip: Address, parameter: usize },

  #[error("negative address {address} used at {ip}")]
  NegativeAddress { ip: Address, address: Value },

  #[error("relative offset {offset} from base {base} overflows at {ip}")]
  AddressOverflow { ip: Address, base: Value, offset: Value },

  #[error("parameter {parameter} at {ip} is not a declared write target")]
  UndeclaredWriteTarget { ip: Address, parameter: usize },

  #[error("port failure at {ip}: {source}")]
  Port { ip: Address, source: PortError },
}

impl Fault {
  pub fn ip(&self) -> Address {
    match self {
      | Fault::UnknownOpcode { ip, .. }
      | Fault::InvalidMode { ip, .. }
      | Fault::ImmediateWriteTarget { ip, .. }
      | Fault::NegativeAddress { ip, .. }
      | Fault::AddressOverflow { ip, .. }
      | Fault::UndeclaredWriteTarget { ip, .. }
      | Fault::Port { ip, .. } => *ip
    }
  }

  /// True for faults caused by the program text rather than by its environment.
  pub fn is_invalid_program(&self) -> bool {
    !matches!(self, Fault::Port { .. })
  }

  /// True if the fault only reflects a peer that went away.
  pub fn is_disconnect(&self) -> bool {
    matches!(self, Fault::Port { source: PortError::Closed, .. })
  }
}

/// Failure of a machine network as a whole.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetworkError {
  #[error("a network needs at least one machine")]
  Empty,

  #[error("machine {index} faulted: {fault}")]
  Machine { index: usize, fault: Fault },

  #[error("machine {index} panicked")]
  Panicked { index: usize },

  #[error("could not start machine {index}: {message}")]
  Spawn { index: usize, message: String },

  #[error("the network halted without producing output")]
  NoOutput,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fault_messages() {
    let fault = Fault::UnknownOpcode { ip: Address(4), word: 42 };
    assert_eq!(fault.to_string(), "unknown opcode in word 42 at [4]");

    let fault = Fault::Port { ip: Address(0), source: PortError::Exhausted(2) };
    assert_eq!(fault.to_string(), "port failure at [0]: input exhausted after 2 values");
  }

  #[test]
  fn classification() {
    let closed = Fault::Port { ip: Address(2), source: PortError::Closed };
    assert!(closed.is_disconnect());
    assert!(!closed.is_invalid_program());
    assert_eq!(closed.ip(), Address(2));

    let write = Fault::ImmediateWriteTarget { ip: Address(0), parameter: 2 };
    assert!(write.is_invalid_program());
    assert!(!write.is_disconnect());

    let overflow = Fault::AddressOverflow { ip: Address(2), base: i64::MIN + 5, offset: -10 };
    assert!(overflow.is_invalid_program());
    assert_eq!(overflow.ip(), Address(2));
  }
}
