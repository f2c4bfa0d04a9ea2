/*!

  An Intcode instruction is a single signed word followed by its parameters. The word packs the
  opcode and the addressing modes of up to three parameters as decimal digits:

  ```text
  ten-thousands  thousands    hundreds     tens  ones
  mode of 3rd    mode of 2nd  mode of 1st  opcode
  ```

  Missing leading digits read as zero, i.e. position mode. Parameters themselves are plain
  words following the instruction word, so an instruction occupies `arity + 1` cells.

  The opcode only identifies an entry of the opcode table. Which parameters the operation reads
  and which it writes is a property of the table entry, not of the encoding, so mode digits are
  only meaningful once the table has been consulted. `Instruction` therefore keeps the raw mode
  digits and validates them on demand.

*/

mod binary;
mod instruction;

pub use binary::{decode_instruction, encode_instruction, MAX_PARAMETERS};
pub use instruction::{Instruction, Mode, Operation};
