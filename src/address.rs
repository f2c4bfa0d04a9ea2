//! A non-negative index into machine memory, with some convenience functions.

use std::fmt::{Display, Formatter};
use std::ops::Add;

use crate::Value;

// `AddressNumberType` is `usize`, as it is naturally an index into a memory store.
pub type AddressNumberType = usize;

/// An address in machine memory. Addresses are never negative; signed values coming out of
/// memory are converted with `Address::try_from`, which refuses negative values.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
pub struct Address(pub AddressNumberType);

impl Address {
  pub const ZERO: Address = Address(0);

  /// Converts the address to an index into a memory vector.
  pub fn idx(&self) -> AddressNumberType {
    self.0
  }

  /// The address as a signed machine value.
  pub fn value(&self) -> Value {
    self.0 as Value
  }
}

impl TryFrom<Value> for Address {
  type Error = Value;

  /// Fails with the offending value if it is negative.
  fn try_from(value: Value) -> Result<Self, Self::Error> {
    match value < 0 {
      true  => Err(value),
      false => Ok(Address(value as AddressNumberType))
    }
  }
}

impl From<AddressNumberType> for Address {
  fn from(idx: AddressNumberType) -> Self {
    Address(idx)
  }
}

impl Display for Address {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "[{}]", self.0)
  }
}

// Increment an address
impl Add<AddressNumberType> for Address {
  type Output = Address;
  fn add(self, rhs: AddressNumberType) -> Address {
    Address(self.0 + rhs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn negative_values_are_refused() {
    assert_eq!(Address::try_from(-1i64), Err(-1));
    assert_eq!(Address::try_from(i64::MIN), Err(i64::MIN));
  }

  #[test]
  fn non_negative_values_convert() {
    assert_eq!(Address::try_from(0i64), Ok(Address::ZERO));
    assert_eq!(Address::try_from(4096i64).map(|a| a.idx()), Ok(4096));
  }

  #[test]
  fn offset_and_display() {
    let address = Address(10) + 3;
    assert_eq!(address, Address(13));
    assert_eq!(address.to_string(), "[13]");
    assert_eq!(address.value(), 13);
  }
}
