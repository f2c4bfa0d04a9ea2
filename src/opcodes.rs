/*!
  The opcode table maps each opcode to a `Procedure`: its name, its arity, which of its
  parameters are write targets, and the effect that executes it.

  A table is an ordinary immutable value. Machines share the standard table through an `Arc`
  unless they are given one of their own, so any number of machines can run concurrently
  without touching process-wide mutable state. Extending the instruction set means building a
  new table with `OpcodeTable::insert` and handing it to `Machine::with_table`.
*/

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use strum::IntoEnumIterator;

use crate::address::Address;
use crate::bytecode::{Operation, MAX_PARAMETERS};
use crate::error::{Fault, PortError, TableError};
use crate::memory::Memory;
use crate::ports::{Input, Output};
use crate::Value;

/// Number of distinct opcodes a two digit field can express.
pub const OPCODE_COUNT: usize = 100;

/// What the engine does with the instruction pointer after an effect ran.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flow {
  /// Move past the instruction and its parameters.
  Advance,
  /// Continue at the given address. Negative targets fault.
  Jump(Value),
  /// Stop the machine.
  Halt,
}

/// The set of parameter indices an operation writes to.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct WriteSet(u8);

impl WriteSet {
  pub const NONE: WriteSet = WriteSet(0);

  pub const fn single(index: usize) -> WriteSet {
    WriteSet(1 << index)
  }

  pub const fn with(self, index: usize) -> WriteSet {
    WriteSet(self.0 | (1 << index))
  }

  pub const fn contains(self, index: usize) -> bool {
    self.0 & (1 << index) != 0
  }
}

/**
  Resolved parameters of the instruction being executed. Read parameters hold their value.
  Write targets additionally hold the address they resolved to, which the engine has already
  checked to be non-negative. Only parameters the procedure declared in its `WriteSet` have an
  address; asking for any other one is a fault.
*/
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Operands {
  ip      : Address,
  values  : [Value; MAX_PARAMETERS],
  targets : [Option<Address>; MAX_PARAMETERS],
  len     : usize,
}

impl Operands {
  /// Operands of the instruction at `ip` taking `len` parameters.
  pub fn new(ip: Address, len: usize) -> Operands {
    Operands { ip, values: [0; MAX_PARAMETERS], targets: [None; MAX_PARAMETERS], len }
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub(crate) fn set_value(&mut self, index: usize, value: Value) {
    self.values[index] = value;
  }

  pub(crate) fn set_target(&mut self, index: usize, address: Address) {
    self.values[index]  = address.value();
    self.targets[index] = Some(address);
  }

  /// The value of read parameter `index`. For a write target this is its address.
  pub fn value(&self, index: usize) -> Value {
    self.values[index]
  }

  /// The address of write target `index`.
  pub fn address(&self, index: usize) -> Result<Address, Fault> {
    self.targets
        .get(index)
        .copied()
        .flatten()
        .ok_or(Fault::UndeclaredWriteTarget { ip: self.ip, parameter: index })
  }
}

/// The part of the machine an effect may touch.
pub struct Context<'a> {
  pub(crate) ip            : Address,
  pub(crate) memory        : &'a mut Memory,
  pub(crate) relative_base : &'a mut Value,
  pub(crate) input         : &'a mut dyn Input,
  pub(crate) output        : &'a mut dyn Output,
}

impl<'a> Context<'a> {
  /// Address of the instruction being executed.
  pub fn ip(&self) -> Address {
    self.ip
  }

  pub fn memory(&self) -> &Memory {
    self.memory
  }

  pub fn memory_mut(&mut self) -> &mut Memory {
    self.memory
  }

  pub fn relative_base(&self) -> Value {
    *self.relative_base
  }

  pub fn set_relative_base(&mut self, value: Value) {
    *self.relative_base = value;
  }

  /// Asks the input port for a value. Port failures become faults at this instruction.
  pub fn read_input(&mut self) -> Result<Value, Fault> {
    let ip = self.ip;
    self.input.next_input().map_err(|source| port_fault(ip, source))
  }

  pub fn write_output(&mut self, value: Value) -> Result<(), Fault> {
    let ip = self.ip;
    self.output.emit_output(value).map_err(|source| port_fault(ip, source))
  }
}

fn port_fault(ip: Address, source: PortError) -> Fault {
  Fault::Port { ip, source }
}

pub type Effect = fn(&mut Context<'_>, &Operands) -> Result<Flow, Fault>;

/// An operation descriptor.
#[derive(Clone, Copy)]
pub struct Procedure {
  pub name   : &'static str,
  pub arity  : usize,
  pub writes : WriteSet,
  pub effect : Effect,
}

impl Debug for Procedure {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Procedure")
     .field("name", &self.name)
     .field("arity", &self.arity)
     .field("writes", &self.writes)
     .finish()
  }
}

impl From<Operation> for Procedure {
  fn from(operation: Operation) -> Procedure {
    let writes = match operation.write_target() {
      Some(index) => WriteSet::single(index),
      None        => WriteSet::NONE
    };
    let effect: Effect = match operation {
      Operation::Add                => add,
      Operation::Multiply           => multiply,
      Operation::Input              => input,
      Operation::Output             => output,
      Operation::JumpIfTrue         => jump_if_true,
      Operation::JumpIfFalse        => jump_if_false,
      Operation::LessThan           => less_than,
      Operation::Equals             => equals,
      Operation::AdjustRelativeBase => adjust_relative_base,
      Operation::Halt               => halt,
    };

    Procedure {
      name  : operation.into(),
      arity : operation.arity(),
      writes,
      effect,
    }
  }
}

// region Standard effects

fn add(ctx: &mut Context<'_>, args: &Operands) -> Result<Flow, Fault> {
  ctx.memory.set(args.address(2)?, args.value(0).wrapping_add(args.value(1)));
  Ok(Flow::Advance)
}

fn multiply(ctx: &mut Context<'_>, args: &Operands) -> Result<Flow, Fault> {
  ctx.memory.set(args.address(2)?, args.value(0).wrapping_mul(args.value(1)));
  Ok(Flow::Advance)
}

fn input(ctx: &mut Context<'_>, args: &Operands) -> Result<Flow, Fault> {
  let value = ctx.read_input()?;
  ctx.memory.set(args.address(0)?, value);
  Ok(Flow::Advance)
}

fn output(ctx: &mut Context<'_>, args: &Operands) -> Result<Flow, Fault> {
  ctx.write_output(args.value(0))?;
  Ok(Flow::Advance)
}

fn jump_if_true(_ctx: &mut Context<'_>, args: &Operands) -> Result<Flow, Fault> {
  match args.value(0) != 0 {
    true  => Ok(Flow::Jump(args.value(1))),
    false => Ok(Flow::Advance)
  }
}

fn jump_if_false(_ctx: &mut Context<'_>, args: &Operands) -> Result<Flow, Fault> {
  match args.value(0) == 0 {
    true  => Ok(Flow::Jump(args.value(1))),
    false => Ok(Flow::Advance)
  }
}

fn less_than(ctx: &mut Context<'_>, args: &Operands) -> Result<Flow, Fault> {
  ctx.memory.set(args.address(2)?, (args.value(0) < args.value(1)) as Value);
  Ok(Flow::Advance)
}

fn equals(ctx: &mut Context<'_>, args: &Operands) -> Result<Flow, Fault> {
  ctx.memory.set(args.address(2)?, (args.value(0) == args.value(1)) as Value);
  Ok(Flow::Advance)
}

fn adjust_relative_base(ctx: &mut Context<'_>, args: &Operands) -> Result<Flow, Fault> {
  let (base, offset) = (*ctx.relative_base, args.value(0));
  let adjusted = base
    .checked_add(offset)
    .ok_or(Fault::AddressOverflow { ip: ctx.ip, base, offset })?;
  *ctx.relative_base = adjusted;
  Ok(Flow::Advance)
}

fn halt(_ctx: &mut Context<'_>, _args: &Operands) -> Result<Flow, Fault> {
  Ok(Flow::Halt)
}

// endregion

/// Dispatch table indexed by opcode.
#[derive(Clone, Debug)]
pub struct OpcodeTable {
  procedures: [Option<Procedure>; OPCODE_COUNT],
}

lazy_static! {
  static ref STANDARD_TABLE: Arc<OpcodeTable> = Arc::new(OpcodeTable::standard());
}

impl OpcodeTable {

  pub fn empty() -> OpcodeTable {
    OpcodeTable { procedures: [None; OPCODE_COUNT] }
  }

  /// A table holding exactly the operations of `Operation`.
  pub fn standard() -> OpcodeTable {
    let mut table = OpcodeTable::empty();
    for operation in Operation::iter() {
      table.procedures[operation.code() as usize] = Some(Procedure::from(operation));
    }
    table
  }

  /// The standard table, built once and shared by every machine that is not given its own.
  pub fn shared() -> Arc<OpcodeTable> {
    Arc::clone(&STANDARD_TABLE)
  }

  pub fn get(&self, opcode: u8) -> Option<&Procedure> {
    self.procedures.get(opcode as usize).and_then(Option::as_ref)
  }

  /// Adds or replaces the procedure for `opcode`, returning the one it replaced.
  pub fn insert(&mut self, opcode: u8, procedure: Procedure) -> Result<Option<Procedure>, TableError> {
    if opcode as usize >= OPCODE_COUNT {
      return Err(TableError::OpcodeOutOfRange(opcode));
    }
    if procedure.arity > MAX_PARAMETERS {
      return Err(TableError::ArityTooLarge {
        name  : procedure.name,
        arity : procedure.arity,
        max   : MAX_PARAMETERS,
      });
    }
    Ok(self.procedures[opcode as usize].replace(procedure))
  }

  /// Builder-style `insert`.
  pub fn with(mut self, opcode: u8, procedure: Procedure) -> Result<OpcodeTable, TableError> {
    self.insert(opcode, procedure)?;
    Ok(self)
  }

  pub fn len(&self) -> usize {
    self.procedures.iter().filter(|p| p.is_some()).count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl Default for OpcodeTable {
  fn default() -> Self {
    OpcodeTable::standard()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ports::{NoInput, Values};

  fn run_effect(procedure: &Procedure, memory: &mut Memory, operands: &Operands) -> Result<Flow, Fault> {
    let mut relative_base = 0;
    let mut input = Values::new(vec![17]);
    let mut output: Vec<Value> = Vec::new();
    let mut ctx = Context {
      ip            : Address(0),
      memory,
      relative_base : &mut relative_base,
      input         : &mut input,
      output        : &mut output,
    };
    (procedure.effect)(&mut ctx, operands)
  }

  #[test]
  fn standard_table_matches_instruction_set() {
    let table = OpcodeTable::standard();
    assert_eq!(table.len(), 10);

    let expected = [
      (1u8, 3usize, Some(2usize)),
      (2, 3, Some(2)),
      (3, 1, Some(0)),
      (4, 1, None),
      (5, 2, None),
      (6, 2, None),
      (7, 3, Some(2)),
      (8, 3, Some(2)),
      (9, 1, None),
      (99, 0, None),
    ];
    for (opcode, arity, target) in expected.iter() {
      let procedure = table.get(*opcode).unwrap();
      assert_eq!(procedure.arity, *arity, "{}", procedure.name);
      for index in 0..MAX_PARAMETERS {
        assert_eq!(procedure.writes.contains(index), Some(index) == *target, "{}", procedure.name);
      }
    }
    assert!(table.get(0).is_none());
    assert!(table.get(10).is_none());
    assert!(table.get(200).is_none());
  }

  #[test]
  fn shared_table_is_one_instance() {
    assert!(Arc::ptr_eq(&OpcodeTable::shared(), &OpcodeTable::shared()));
  }

  #[test]
  fn write_set_membership() {
    let writes = WriteSet::single(0).with(2);
    assert!(writes.contains(0));
    assert!(!writes.contains(1));
    assert!(writes.contains(2));
    assert!(!WriteSet::NONE.contains(0));
  }

  #[test]
  fn rejects_unencodable_procedures() {
    let mut table = OpcodeTable::empty();
    let halt = Procedure::from(Operation::Halt);
    assert_eq!(table.insert(100, halt).unwrap_err(), TableError::OpcodeOutOfRange(100));

    let wide = Procedure { name: "wide", arity: 4, writes: WriteSet::NONE, effect: halt.effect };
    assert!(matches!(table.insert(10, wide), Err(TableError::ArityTooLarge { arity: 4, .. })));
    assert!(table.is_empty());
  }

  #[test]
  fn insert_replaces_existing_entry() {
    let mut table = OpcodeTable::standard();
    let replaced = table.insert(1, Procedure::from(Operation::Multiply)).unwrap();
    assert_eq!(replaced.map(|p| p.name), Some("add"));
    assert_eq!(table.get(1).map(|p| p.name), Some("multiply"));
  }

  #[test]
  fn comparison_effects_store_flags() {
    let mut memory = Memory::new();
    let mut operands = Operands::new(Address(0), 3);
    operands.set_value(0, 3);
    operands.set_value(1, 5);
    operands.set_target(2, Address(9));

    let less = Procedure::from(Operation::LessThan);
    assert_eq!(run_effect(&less, &mut memory, &operands), Ok(Flow::Advance));
    assert_eq!(memory.get(Address(9)), 1);

    let equals = Procedure::from(Operation::Equals);
    run_effect(&equals, &mut memory, &operands).unwrap();
    assert_eq!(memory.get(Address(9)), 0);
  }

  #[test]
  fn jumps_report_target() {
    let mut memory = Memory::new();
    let mut operands = Operands::new(Address(0), 2);
    operands.set_value(0, 0);
    operands.set_value(1, 12);

    let if_true = Procedure::from(Operation::JumpIfTrue);
    let if_false = Procedure::from(Operation::JumpIfFalse);
    assert_eq!(run_effect(&if_true, &mut memory, &operands), Ok(Flow::Advance));
    assert_eq!(run_effect(&if_false, &mut memory, &operands), Ok(Flow::Jump(12)));
  }

  #[test]
  fn input_effect_surfaces_port_failure() {
    let mut memory = Memory::new();
    let mut relative_base = 0;
    let mut no_input = NoInput;
    let mut output: Vec<Value> = Vec::new();
    let mut ctx = Context {
      ip            : Address(6),
      memory        : &mut memory,
      relative_base : &mut relative_base,
      input         : &mut no_input,
      output        : &mut output,
    };
    let procedure = Procedure::from(Operation::Input);
    assert_eq!(
      (procedure.effect)(&mut ctx, &Operands::new(Address(6), 1)),
      Err(Fault::Port { ip: Address(6), source: PortError::Unconnected })
    );
  }

  #[test]
  fn multiplication_wraps() {
    let mut memory = Memory::new();
    let mut operands = Operands::new(Address(0), 3);
    operands.set_value(0, i64::MAX);
    operands.set_value(1, 2);
    operands.set_target(2, Address(0));
    run_effect(&Procedure::from(Operation::Multiply), &mut memory, &operands).unwrap();
    assert_eq!(memory.get(Address(0)), -2);
  }

  #[test]
  fn only_declared_targets_have_addresses() {
    let mut operands = Operands::new(Address(3), 2);
    operands.set_value(0, -4);
    operands.set_target(1, Address(7));
    assert_eq!(operands.address(1), Ok(Address(7)));
    assert_eq!(operands.value(1), 7);
    assert_eq!(
      operands.address(0),
      Err(Fault::UndeclaredWriteTarget { ip: Address(3), parameter: 0 })
    );
  }

  #[test]
  fn relative_base_adjustment_refuses_overflow() {
    let mut memory = Memory::new();
    let mut relative_base = i64::MIN + 1;
    let mut input = NoInput;
    let mut output: Vec<Value> = Vec::new();
    let mut ctx = Context {
      ip            : Address(2),
      memory        : &mut memory,
      relative_base : &mut relative_base,
      input         : &mut input,
      output        : &mut output,
    };
    let mut operands = Operands::new(Address(2), 1);
    operands.set_value(0, -5);
    let adjust = Procedure::from(Operation::AdjustRelativeBase);
    assert_eq!(
      (adjust.effect)(&mut ctx, &operands),
      Err(Fault::AddressOverflow { ip: Address(2), base: i64::MIN + 1, offset: -5 })
    );
    assert_eq!(relative_base, i64::MIN + 1);
  }
}
