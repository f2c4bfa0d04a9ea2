/*!
  The memory store of a machine. Memory is conceptually an unbounded array of signed 64 bit
  values indexed by non-negative addresses, every cell of which initially holds zero.

  Programs touch a contiguous region starting at address zero plus, occasionally, a handful of
  cells far above it. The store therefore keeps a dense vector that grows on demand up to
  `DENSE_LIMIT` and a sorted map for anything above. Reads never allocate. Writes create the
  cell if it is absent, so the store only ever grows during a run.
*/

use std::collections::BTreeMap;

use crate::address::{Address, AddressNumberType};
use crate::program::Program;
use crate::Value;

/// Addresses below this limit live in the dense vector.
pub const DENSE_LIMIT: AddressNumberType = 1 << 20;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Memory {
  dense  : Vec<Value>,
  sparse : BTreeMap<AddressNumberType, Value>,
}

impl Memory {

  pub fn new() -> Memory {
    Memory::default()
  }

  /// The value stored at `address`, or zero if the cell was never written.
  pub fn get(&self, address: Address) -> Value {
    let idx = address.idx();
    if idx < self.dense.len() {
      return self.dense[idx];
    }
    match idx < DENSE_LIMIT {
      true  => 0,
      false => self.sparse.get(&idx).copied().unwrap_or(0)
    }
  }

  /**
    Sets the value at the given address, dynamically growing the dense vector if the address
    is larger than its max index but still below `DENSE_LIMIT`.
  */
  pub fn set(&mut self, address: Address, value: Value) {
    let idx = address.idx();
    if idx < self.dense.len() {
      self.dense[idx] = value;
    } else if idx < DENSE_LIMIT {
      self.dense.resize(idx + 1, 0);
      self.dense[idx] = value;
    } else {
      self.sparse.insert(idx, value);
    }
  }

  /// One past the highest address that has a backing cell.
  pub fn extent(&self) -> AddressNumberType {
    match self.sparse.keys().next_back() {
      Some(&highest) => highest + 1,
      None           => self.dense.len()
    }
  }

  /// Iterates over `len` consecutive cells starting at `start`, including unwritten ones.
  pub fn window(&self, start: Address, len: usize) -> impl Iterator<Item = (Address, Value)> + '_ {
    (0..len).map(move |offset| {
      let address = start + offset;
      (address, self.get(address))
    })
  }
}

impl From<&Program> for Memory {
  /// A private copy of the program image, with address 0 holding the first value.
  fn from(program: &Program) -> Memory {
    Memory {
      dense  : program.as_slice().to_vec(),
      sparse : BTreeMap::new(),
    }
  }
}
