/*!
  Encoding and decoding of instruction words.
*/

use super::{Instruction, Mode};
use crate::Value;

/// Number of mode digits an instruction word carries.
pub const MAX_PARAMETERS: usize = 3;

/**
  Splits an instruction word into opcode and mode digits. Digits above the ten-thousands place
  are ignored. Negative words carry no opcode and yield `None`.
*/
pub fn decode_instruction(word: Value) -> Option<Instruction> {
  if word < 0 {
    return None;
  }

  let opcode = (word % 100) as u8;
  let mut modes = [0u8; MAX_PARAMETERS];
  let mut rest = word / 100;
  for mode in modes.iter_mut() {
    *mode = (rest % 10) as u8;
    rest /= 10;
  }

  Some(Instruction { word, opcode, modes })
}

/**
  Builds an instruction word from an opcode and the modes of its leading parameters. Parameters
  beyond `modes` are in position mode. It is the caller's responsibility to keep `opcode` below
  100 and to pass at most `MAX_PARAMETERS` modes.
*/
pub fn encode_instruction(opcode: u8, modes: &[Mode]) -> Value {
  modes
    .iter()
    .take(MAX_PARAMETERS)
    .enumerate()
    .fold(opcode as Value, |word, (i, mode)| {
      word + (Into::<u8>::into(*mode) as Value) * 10i64.pow(i as u32 + 2)
    })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn short_words_default_to_position() {
    let instruction = decode_instruction(99).unwrap();
    assert_eq!(instruction.opcode, 99);
    assert_eq!(instruction.modes, [0, 0, 0]);
  }

  #[test]
  fn mode_digits_in_operand_order() {
    let instruction = decode_instruction(1002).unwrap();
    assert_eq!(instruction.opcode, 2);
    assert_eq!(instruction.mode(0), Ok(Mode::Position));
    assert_eq!(instruction.mode(1), Ok(Mode::Immediate));
    assert_eq!(instruction.mode(2), Ok(Mode::Position));

    let instruction = decode_instruction(21101).unwrap();
    assert_eq!(instruction.opcode, 1);
    assert_eq!(instruction.modes, [1, 1, 2]);
  }

  #[test]
  fn ignores_digits_past_third_mode() {
    let instruction = decode_instruction(321_204).unwrap();
    assert_eq!(instruction.opcode, 4);
    assert_eq!(instruction.modes, [2, 1, 2]);
  }

  #[test]
  fn negative_words_have_no_opcode() {
    assert_eq!(decode_instruction(-1), None);
    assert_eq!(decode_instruction(-1101), None);
  }

  #[test]
  fn encodes_modes() {
    assert_eq!(encode_instruction(2, &[Mode::Position, Mode::Immediate]), 1002);
    assert_eq!(encode_instruction(1, &[Mode::Immediate, Mode::Immediate, Mode::Relative]), 21101);
    assert_eq!(encode_instruction(99, &[]), 99);
    assert_eq!(
      decode_instruction(encode_instruction(9, &[Mode::Relative])).map(|i| i.modes),
      Some([2, 0, 0])
    );
  }
}
