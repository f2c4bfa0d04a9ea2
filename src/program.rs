/*!
  Program ingestion. An Intcode program is written as a comma-separated list of decimal
  integers, optionally signed. The value at index `i` of the list is the initial content of
  address `i`.

  A `Program` is immutable and cheap to clone. Every machine instantiated from it receives its
  own private copy of the image.
*/

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use nom::{
  character::complete::{char as one_char, i64 as signed, multispace0},
  combinator::all_consuming,
  multi::separated_list1,
  sequence::delimited,
  IResult,
};

use crate::address::Address;
use crate::error::ProgramError;
use crate::Value;

/// How much of the offending input is quoted in a syntax error.
const ERROR_CONTEXT: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
  code: Arc<[Value]>,
}

impl Program {

  /// Parses program text such as `"1,9,10,3,2,3,11,0,99,30,40,50"`. Surrounding whitespace,
  /// including a trailing newline, is ignored.
  pub fn parse(text: &str) -> Result<Program, ProgramError> {
    if text.trim().is_empty() {
      return Err(ProgramError::Empty);
    }

    match program_p(text) {
      Ok((_rest, values)) => Ok(Program::from(values)),
      Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
        Err(ProgramError::Syntax {
          offset : text.len() - e.input.len(),
          found  : e.input.chars().take(ERROR_CONTEXT).collect(),
        })
      }
      Err(nom::Err::Incomplete(_)) => {
        Err(ProgramError::Syntax { offset: text.len(), found: String::new() })
      }
    }
  }

  pub fn len(&self) -> usize {
    self.code.len()
  }

  pub fn is_empty(&self) -> bool {
    self.code.is_empty()
  }

  pub fn get(&self, address: Address) -> Option<Value> {
    self.code.get(address.idx()).copied()
  }

  pub fn as_slice(&self) -> &[Value] {
    &self.code
  }
}

fn literal_p(input: &str) -> IResult<&str, Value> {
  delimited(multispace0, signed, multispace0)(input)
}

fn program_p(input: &str) -> IResult<&str, Vec<Value>> {
  all_consuming(separated_list1(one_char(','), literal_p))(input)
}

impl FromStr for Program {
  type Err = ProgramError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Program::parse(s)
  }
}

impl From<Vec<Value>> for Program {
  fn from(values: Vec<Value>) -> Self {
    Program { code: values.into() }
  }
}

impl From<&[Value]> for Program {
  fn from(values: &[Value]) -> Self {
    Program { code: values.into() }
  }
}

impl Display for Program {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{}",
      self.code
          .iter()
          .map(Value::to_string)
          .collect::<Vec<String>>()
          .join(",")
    )
  }
}
