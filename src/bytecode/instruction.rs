use std::fmt::{Display, Formatter};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};

use super::MAX_PARAMETERS;
use crate::Value;

/**
  Operations of the standard instruction set. The discriminant of each variant is its opcode,
  so conversion to and from the encoded opcode is a plain numeric conversion.
*/
#[derive(
  StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq,         PartialEq, Debug,           Hash
)]
#[strum(serialize_all = "kebab-case")]
#[repr(u8)]
pub enum Operation {
  Add                = 1,  // add( a, b, -> c )
  Multiply           = 2,  // multiply( a, b, -> c )
  Input              = 3,  // input( -> a )
  Output             = 4,  // output( a )
  JumpIfTrue         = 5,  // jump-if-true( a, b )
  JumpIfFalse        = 6,  // jump-if-false( a, b )
  LessThan           = 7,  // less-than( a, b, -> c )
  Equals             = 8,  // equals( a, b, -> c )
  AdjustRelativeBase = 9,  // adjust-relative-base( a )
  Halt               = 99, // halt
}

impl Operation {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  pub fn arity(&self) -> usize {
    match self {
      | Operation::Add
      | Operation::Multiply
      | Operation::LessThan
      | Operation::Equals => 3,

      | Operation::JumpIfTrue
      | Operation::JumpIfFalse => 2,

      | Operation::Input
      | Operation::Output
      | Operation::AdjustRelativeBase => 1,

      Operation::Halt => 0
    }
  }

  /// Index of the parameter the operation writes to, if any.
  pub fn write_target(&self) -> Option<usize> {
    match self {
      | Operation::Add
      | Operation::Multiply
      | Operation::LessThan
      | Operation::Equals => Some(2),

      Operation::Input => Some(0),

      _ => None
    }
  }
}

/// Parameter addressing modes.
#[derive(
  StrumDisplay, IntoStaticStr, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq,               PartialEq,     Debug, Hash
)]
#[repr(u8)]
pub enum Mode {
  /// The parameter is the address of the operand.
  Position  = 0,
  /// The parameter is the operand.
  Immediate = 1,
  /// The parameter plus the relative base is the address of the operand.
  Relative  = 2,
}

impl Mode {
  /// The single letter used when displaying instructions.
  pub fn letter(&self) -> char {
    match self {
      Mode::Position  => 'P',
      Mode::Immediate => 'I',
      Mode::Relative  => 'R',
    }
  }
}

/// A decoded instruction word: the opcode and the raw mode digit of each parameter position.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Instruction {
  pub word   : Value,
  pub opcode : u8,
  pub modes  : [u8; MAX_PARAMETERS],
}

impl Instruction {
  /// The mode of parameter `index`, or the offending digit if it names no mode.
  pub fn mode(&self, index: usize) -> Result<Mode, u8> {
    let digit = self.modes[index];
    Mode::try_from(digit).map_err(|_| digit)
  }

  /// The standard operation this opcode names, if any.
  pub fn operation(&self) -> Option<Operation> {
    Operation::try_from(self.opcode).ok()
  }
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let modes: String =
      self.modes
          .iter()
          .map(|&digit| {
            match Mode::try_from(digit) {
              Ok(mode) => mode.letter(),
              Err(_)   => '?'
            }
          })
          .collect();

    match self.operation() {
      Some(operation) => write!(f, "{}({})", operation, modes),
      None            => write!(f, "op{:02}({})", self.opcode, modes)
    }
  }
}
