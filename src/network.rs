/*!
  Networks of machines. Every machine of a network is instantiated from the same program and
  runs on its own thread. Machine `i` writes to machine `i + 1` over a bounded channel, so a
  reader blocks until its producer has emitted something and a writer blocks while the link is
  full. No memory is shared between machines.

  The first value each machine reads is its phase setting. The first machine additionally reads
  the initial signal.

  * In a pipeline, the last machine writes to the tap, and the first machine has no upstream
    producer beyond its seed values.
  * In a feedback loop, the last machine writes both to the tap and back to the first machine.

  Sending never faults. Once a consumer has stopped, whatever its producer still emits toward it
  is dropped, so a machine that over-produces for a peer that has already halted finishes
  normally. Reading does fault: a machine waiting on a link whose producer has stopped gets
  `PortError::Closed`.

  Once every machine has stopped, the last value placed on the tap is the network's result. A
  fault in any machine fails the whole network. Its consumers observe the closed link and stop
  as well, so a faulted network never hangs.
*/

use std::sync::mpsc::{channel, sync_channel, Sender, SyncSender};
use std::thread;
use std::time::Duration;

use tracing::{debug, debug_span, info};

use crate::address::Address;
use crate::error::{Fault, NetworkError, PortError};
use crate::machine::Machine;
use crate::ports::{ChannelInput, Output, Seeded};
use crate::program::Program;
use crate::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Topology {
  Pipeline,
  Feedback,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NetworkConfig {
  /// Values a link buffers before its writer blocks. Zero makes every send a rendezvous. A
  /// feedback loop of a single machine ignores this, as it would only block on itself.
  pub capacity      : usize,
  /// How long a machine waits on its input link before faulting. `None` waits forever. Sends
  /// are not covered: a writer waits on a full link for as long as its consumer runs.
  pub input_timeout : Option<Duration>,
}

impl Default for NetworkConfig {
  fn default() -> Self {
    NetworkConfig { capacity: 1, input_timeout: None }
  }
}

/// The writing end of the link between a machine and its consumer.
enum Link {
  Bounded(SyncSender<Value>),
  Unbounded(Sender<Value>),
}

impl Output for Link {
  fn emit_output(&mut self, value: Value) -> Result<(), PortError> {
    let sent = match self {
      Link::Bounded(sender)   => sender.send(value).is_ok(),
      Link::Unbounded(sender) => sender.send(value).is_ok(),
    };
    if !sent {
      debug!(value, "consumer stopped, value dropped");
    }
    Ok(())
  }
}

/// The output of the last machine in a feedback loop.
struct Tap {
  tap      : Sender<Value>,
  loopback : Link,
}

impl Output for Tap {
  fn emit_output(&mut self, value: Value) -> Result<(), PortError> {
    self.tap.send(value).map_err(|_| PortError::Closed)?;
    self.loopback.emit_output(value)
  }
}

#[derive(Clone, Debug)]
pub struct Network {
  program   : Program,
  phases    : Vec<Value>,
  topology  : Topology,
  overrides : Vec<(Address, Value)>,
  config    : NetworkConfig,
}

impl Network {

  pub fn new(program: Program, phases: Vec<Value>, topology: Topology) -> Network {
    Network {
      program,
      phases,
      topology,
      overrides : Vec::new(),
      config    : NetworkConfig::default(),
    }
  }

  /// One machine per phase setting, each feeding the next.
  pub fn pipeline(program: Program, phases: Vec<Value>) -> Network {
    Network::new(program, phases, Topology::Pipeline)
  }

  /// One machine per phase setting, the last feeding back into the first.
  pub fn feedback(program: Program, phases: Vec<Value>) -> Network {
    Network::new(program, phases, Topology::Feedback)
  }

  /// Patches `address` in every machine before it starts.
  pub fn with_override(mut self, address: Address, value: Value) -> Network {
    self.overrides.push((address, value));
    self
  }

  pub fn with_config(mut self, config: NetworkConfig) -> Network {
    self.config = config;
    self
  }

  pub fn len(&self) -> usize {
    self.phases.len()
  }

  pub fn is_empty(&self) -> bool {
    self.phases.is_empty()
  }

  pub fn topology(&self) -> Topology {
    self.topology
  }

  /// Runs every machine to completion and returns the last value placed on the tap.
  pub fn run(&self, initial: Value) -> Result<Value, NetworkError> {
    if self.phases.is_empty() {
      return Err(NetworkError::Empty);
    }
    let count = self.phases.len();
    info!(machines = count, topology = ?self.topology, "starting network");

    // A lone machine in a loop is its own consumer and must never wait for room on its link.
    let self_loop = count == 1 && self.topology == Topology::Feedback;

    let (tap_tx, tap_rx) = channel::<Value>();
    let mut senders   = Vec::with_capacity(count);
    let mut receivers = Vec::with_capacity(count);
    for _ in 0..count {
      let (link, rx) = match self_loop {
        true => {
          let (tx, rx) = channel::<Value>();
          (Link::Unbounded(tx), rx)
        }
        false => {
          let (tx, rx) = sync_channel::<Value>(self.config.capacity);
          (Link::Bounded(tx), rx)
        }
      };
      senders.push(Some(link));
      receivers.push(rx);
    }

    // Machine `i` reads link `i` and writes link `i + 1`; the last machine's downstream is
    // link 0 in a loop and nothing in a pipeline.
    let mut ports: Vec<(Seeded<ChannelInput>, Box<dyn Output + Send>)> = Vec::with_capacity(count);
    for (index, receiver) in receivers.into_iter().enumerate() {
      let mut seed = vec![self.phases[index]];
      if index == 0 {
        seed.push(initial);
      }
      let input = Seeded::new(seed, ChannelInput::new(receiver, self.config.input_timeout));

      let downstream = senders[(index + 1) % count].take();
      let output: Box<dyn Output + Send> = match (index + 1 == count, downstream) {
        (false, Some(link)) => Box::new(link),
        (true, Some(loopback)) if self.topology == Topology::Feedback => {
          Box::new(Tap { tap: tap_tx.clone(), loopback })
        }
        _ => Box::new(tap_tx.clone()),
      };
      ports.push((input, output));
    }
    drop(senders);
    drop(tap_tx);

    let results = thread::scope(|scope| {
      let mut handles = Vec::with_capacity(count);
      for (index, (mut input, mut output)) in ports.into_iter().enumerate() {
        let mut machine = Machine::with_overrides(&self.program, self.overrides.iter().copied());
        let handle = thread::Builder::new()
          .name(format!("intcode-{}", index))
          .spawn_scoped(scope, move || {
            let _span = debug_span!("machine", index).entered();
            machine.run(&mut input, &mut *output)
          })
          .map_err(|e| NetworkError::Spawn { index, message: e.to_string() })?;
        handles.push(handle);
      }

      handles
        .into_iter()
        .enumerate()
        .map(|(index, handle)| handle.join().map_err(|_| NetworkError::Panicked { index }))
        .collect::<Result<Vec<Result<Value, Fault>>, NetworkError>>()
    })?;

    if let Some((index, fault)) = root_fault(results) {
      return Err(NetworkError::Machine { index, fault });
    }

    let result = tap_rx.try_iter().last().ok_or(NetworkError::NoOutput)?;
    debug!(result, "network finished");
    Ok(result)
  }
}

/// The fault that brought the network down. Faults caused by the program come first. A timeout
/// or a closed link is usually fallout from such a fault elsewhere, and a closed link ranks last.
fn root_fault(results: Vec<Result<Value, Fault>>) -> Option<(usize, Fault)> {
  let faults: Vec<(usize, Fault)> =
    results
      .into_iter()
      .enumerate()
      .filter_map(|(index, result)| result.err().map(|fault| (index, fault)))
      .collect();

  let root = faults
    .iter()
    .position(|(_, fault)| fault.is_invalid_program())
    .or_else(|| faults.iter().position(|(_, fault)| !fault.is_disconnect()))
    .unwrap_or(0);
  faults.into_iter().nth(root)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn program(text: &str) -> Program {
    Program::parse(text).unwrap()
  }

  const FEEDBACK_LOOP: &str =
    "3,26,1001,26,-4,26,3,27,1002,27,2,27,1,27,26,27,4,27,1001,28,-1,28,1005,28,6,99,0,0,5";

  #[test]
  fn pipeline_signal() {
    let network = Network::pipeline(
      program("3,15,3,16,1002,16,10,16,1,16,15,15,4,15,99,0,0"),
      vec![4, 3, 2, 1, 0],
    );
    assert_eq!(network.run(0), Ok(43210));
  }

  #[test]
  fn pipeline_signal_with_arithmetic() {
    let network = Network::pipeline(
      program("3,23,3,24,1002,24,10,24,1002,23,-1,23,101,5,23,23,1,24,23,23,4,23,99,0,0"),
      vec![0, 1, 2, 3, 4],
    );
    assert_eq!(network.run(0), Ok(54321));
  }

  #[test]
  fn feedback_loop_signal() {
    let network = Network::feedback(program(FEEDBACK_LOOP), vec![9, 8, 7, 6, 5]);
    assert_eq!(network.len(), 5);
    assert_eq!(network.run(0), Ok(139629729));
  }

  #[test]
  fn feedback_loop_with_branches() {
    let network = Network::feedback(
      program(
        "3,52,1001,52,-5,52,3,53,1,52,56,54,1007,54,5,55,1005,55,26,1001,54,\
         -5,54,1105,1,12,1,53,54,53,1008,54,0,55,1001,55,1,55,2,53,55,53,4,\
         53,1001,56,-1,56,1005,56,6,99,0,0,0,0,10"
      ),
      vec![9, 7, 8, 5, 6],
    );
    assert_eq!(network.run(0), Ok(18216));
  }

  #[test]
  fn feedback_loop_is_reproducible() {
    let network = Network::feedback(program(FEEDBACK_LOOP), vec![9, 8, 7, 6, 5]);
    let first = network.run(0);
    for _ in 0..5 {
      assert_eq!(network.run(0), first);
    }
  }

  #[test]
  fn rendezvous_links() {
    let config = NetworkConfig { capacity: 0, input_timeout: None };
    let network = Network::feedback(program(FEEDBACK_LOOP), vec![9, 8, 7, 6, 5]).with_config(config);
    assert_eq!(network.run(0), Ok(139629729));
  }

  #[test]
  fn sends_to_a_halted_consumer_are_dropped() {
    // Every machine writes its signal twice but each consumer reads it once and halts.
    let network = Network::pipeline(program("3,0,3,0,4,0,4,0,99"), vec![0, 0, 0]);
    for _ in 0..200 {
      assert_eq!(network.run(7), Ok(7));
    }
  }

  #[test]
  fn single_machine_loop_never_blocks_on_itself() {
    let config = NetworkConfig { capacity: 0, input_timeout: Some(Duration::from_millis(100)) };
    let network = Network::feedback(program("3,0,3,0,4,0,3,0,99"), vec![5]).with_config(config);
    assert_eq!(network.run(0), Ok(0));

    // Three values outstanding on a link sized for one.
    let config = NetworkConfig { capacity: 1, input_timeout: Some(Duration::from_millis(100)) };
    let network = Network::feedback(program("3,0,3,0,4,0,4,0,4,0,99"), vec![5]).with_config(config);
    assert_eq!(network.run(2), Ok(2));
  }

  #[test]
  fn overrides_apply_to_every_machine() {
    // Each machine adds mem[11] to its input signal and ignores its phase.
    let network = Network::pipeline(program("3,12,3,13,1,13,11,13,4,13,99,0"), vec![0, 0, 0])
      .with_override(Address(11), 5);
    assert_eq!(network.run(1), Ok(16));
  }

  #[test]
  fn empty_network_is_an_error() {
    let network = Network::pipeline(program("99"), vec![]);
    assert!(network.is_empty());
    assert_eq!(network.run(0), Err(NetworkError::Empty));
  }

  #[test]
  fn silent_network_has_no_output() {
    let network = Network::pipeline(program("3,0,3,0,99"), vec![0, 1]);
    // The second machine reads its phase and then waits for a signal that never comes.
    assert!(matches!(
      network.run(0),
      Err(NetworkError::Machine { index: 1, fault: Fault::Port { source: PortError::Closed, .. } })
    ));

    let network = Network::pipeline(program("99"), vec![0, 1]);
    assert_eq!(network.run(0), Err(NetworkError::NoOutput));
  }

  #[test]
  fn fault_in_one_machine_fails_network() {
    let network = Network::pipeline(program("3,0,3,1,4,1,77"), vec![0, 0, 0]);
    assert!(matches!(
      network.run(3),
      Err(NetworkError::Machine { index: 0, fault: Fault::UnknownOpcode { word: 77, .. } })
    ));
  }

  #[test]
  fn starved_input_times_out() {
    let config = NetworkConfig { capacity: 1, input_timeout: Some(Duration::from_millis(50)) };
    // A single machine loop that reads one value more than it ever writes.
    let network = Network::feedback(program("3,0,3,0,3,0,99"), vec![0]).with_config(config);
    assert!(matches!(
      network.run(0),
      Err(NetworkError::Machine { index: 0, fault: Fault::Port { source: PortError::TimedOut(_), .. } })
    ));
  }

  #[test]
  fn root_fault_prefers_non_disconnect() {
    let closed = Fault::Port { ip: Address(0), source: PortError::Closed };
    let unknown = Fault::UnknownOpcode { ip: Address(4), word: 5 };
    let results = vec![Ok(1), Err(closed.clone()), Err(unknown.clone())];
    assert_eq!(root_fault(results), Some((2, unknown)));

    let results = vec![Err(closed.clone()), Ok(1)];
    assert_eq!(root_fault(results), Some((0, closed)));

    assert_eq!(root_fault(vec![Ok(1), Ok(2)]), None);
  }

  #[test]
  fn root_fault_prefers_program_faults_over_timeouts() {
    let timed_out = Fault::Port { ip: Address(0), source: PortError::TimedOut(Duration::from_millis(5)) };
    let closed = Fault::Port { ip: Address(2), source: PortError::Closed };
    let unknown = Fault::UnknownOpcode { ip: Address(6), word: 77 };
    let results = vec![Ok(1), Err(timed_out.clone()), Err(unknown.clone()), Err(closed.clone())];
    assert_eq!(root_fault(results), Some((2, unknown)));

    let results = vec![Err(closed), Err(timed_out.clone())];
    assert_eq!(root_fault(results), Some((1, timed_out)));
  }
}
