/*!
  Input and output ports. A machine does no I/O of its own: the `input` instruction asks an
  `Input` for the next value and the `output` instruction hands its operand to an `Output`.
  The machine treats both opaquely. Whether a port answers from a fixed list, blocks on a
  channel, or prompts on a terminal is up to the port.
*/

use std::collections::VecDeque;
use std::io::{self, BufRead, Stdin, StdinLock, Stdout, Write};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, SyncSender};
use std::time::Duration;

use crate::error::PortError;
use crate::Value;

/// Supplies values to `input` instructions. Called once per executed `input`, and may block.
pub trait Input {
  fn next_input(&mut self) -> Result<Value, PortError>;
}

/// Receives the operand of every executed `output` instruction, in program order.
pub trait Output {
  fn emit_output(&mut self, value: Value) -> Result<(), PortError>;
}

impl<I: Input + ?Sized> Input for &mut I {
  fn next_input(&mut self) -> Result<Value, PortError> {
    (**self).next_input()
  }
}

impl<O: Output + ?Sized> Output for &mut O {
  fn emit_output(&mut self, value: Value) -> Result<(), PortError> {
    (**self).emit_output(value)
  }
}

impl<I: Input + ?Sized> Input for Box<I> {
  fn next_input(&mut self) -> Result<Value, PortError> {
    (**self).next_input()
  }
}

impl<O: Output + ?Sized> Output for Box<O> {
  fn emit_output(&mut self, value: Value) -> Result<(), PortError> {
    (**self).emit_output(value)
  }
}

// region Fixed ports

/// An input that is not wired to anything. Programs that never read can run with it.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoInput;

impl Input for NoInput {
  fn next_input(&mut self) -> Result<Value, PortError> {
    Err(PortError::Unconnected)
  }
}

/// An output that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sink;

impl Output for Sink {
  fn emit_output(&mut self, _value: Value) -> Result<(), PortError> {
    Ok(())
  }
}

/// A cursor over a fixed list of values.
#[derive(Clone, Debug, Default)]
pub struct Values {
  values   : VecDeque<Value>,
  consumed : usize,
}

impl Values {
  pub fn new<T: IntoIterator<Item = Value>>(values: T) -> Values {
    Values { values: values.into_iter().collect(), consumed: 0 }
  }

  pub fn remaining(&self) -> usize {
    self.values.len()
  }
}

impl From<Vec<Value>> for Values {
  fn from(values: Vec<Value>) -> Self {
    Values::new(values)
  }
}

impl Input for Values {
  fn next_input(&mut self) -> Result<Value, PortError> {
    let value = self.values.pop_front().ok_or(PortError::Exhausted(self.consumed))?;
    self.consumed += 1;
    Ok(value)
  }
}

/// Collects outputs in order.
impl Output for Vec<Value> {
  fn emit_output(&mut self, value: Value) -> Result<(), PortError> {
    self.push(value);
    Ok(())
  }
}

/**
  Answers with a fixed prefix first and then defers to another input. Networks use this to feed
  each machine its phase setting before anything arrives on its channel.
*/
#[derive(Debug)]
pub struct Seeded<I> {
  prefix : VecDeque<Value>,
  rest   : I,
}

impl<I: Input> Seeded<I> {
  pub fn new<T: IntoIterator<Item = Value>>(prefix: T, rest: I) -> Seeded<I> {
    Seeded { prefix: prefix.into_iter().collect(), rest }
  }
}

impl<I: Input> Input for Seeded<I> {
  fn next_input(&mut self) -> Result<Value, PortError> {
    match self.prefix.pop_front() {
      Some(value) => Ok(value),
      None        => self.rest.next_input()
    }
  }
}

// endregion

// region Closure ports

/// Wraps a closure as an `Input`. See `input_fn`.
pub struct InputFn<F>(F);

/// Wraps a closure as an `Output`. See `output_fn`.
pub struct OutputFn<F>(F);

/// An input whose values are computed on demand, e.g. from the state of a puzzle board.
pub fn input_fn<F: FnMut() -> Value>(f: F) -> InputFn<F> {
  InputFn(f)
}

/// An output that hands each value to a closure.
pub fn output_fn<F: FnMut(Value)>(f: F) -> OutputFn<F> {
  OutputFn(f)
}

impl<F: FnMut() -> Value> Input for InputFn<F> {
  fn next_input(&mut self) -> Result<Value, PortError> {
    Ok((self.0)())
  }
}

impl<F: FnMut(Value)> Output for OutputFn<F> {
  fn emit_output(&mut self, value: Value) -> Result<(), PortError> {
    (self.0)(value);
    Ok(())
  }
}

// endregion

// region Channel ports

/// Blocks until a value arrives. Fails once every sender is gone.
impl Input for Receiver<Value> {
  fn next_input(&mut self) -> Result<Value, PortError> {
    self.recv().map_err(|_| PortError::Closed)
  }
}

impl Output for Sender<Value> {
  fn emit_output(&mut self, value: Value) -> Result<(), PortError> {
    self.send(value).map_err(|_| PortError::Closed)
  }
}

/// Blocks while the channel is full. Fails once the receiver is gone.
impl Output for SyncSender<Value> {
  fn emit_output(&mut self, value: Value) -> Result<(), PortError> {
    self.send(value).map_err(|_| PortError::Closed)
  }
}

/// A channel receiver that optionally gives up after waiting `timeout` for a value.
#[derive(Debug)]
pub struct ChannelInput {
  receiver : Receiver<Value>,
  timeout  : Option<Duration>,
}

impl ChannelInput {
  pub fn new(receiver: Receiver<Value>, timeout: Option<Duration>) -> ChannelInput {
    ChannelInput { receiver, timeout }
  }
}

impl Input for ChannelInput {
  fn next_input(&mut self) -> Result<Value, PortError> {
    match self.timeout {
      None => self.receiver.next_input(),
      Some(timeout) => {
        self.receiver.recv_timeout(timeout).map_err(|e| {
          match e {
            RecvTimeoutError::Timeout      => PortError::TimedOut(timeout),
            RecvTimeoutError::Disconnected => PortError::Closed
          }
        })
      }
    }
  }
}

// endregion

// region Console

/**
  An interactive terminal port. Input prompts with `> ` and keeps asking until a line parses as
  an integer, answering `Rejected` or `Accepted`. Output prints each value on its own line.
*/
pub struct Console<R, W> {
  reader : R,
  writer : W,
}

impl<R: BufRead, W: Write> Console<R, W> {
  pub fn new(reader: R, writer: W) -> Console<R, W> {
    Console { reader, writer }
  }

  pub fn into_inner(self) -> (R, W) {
    (self.reader, self.writer)
  }
}

impl Console<StdinLock<'static>, Stdout> {
  pub fn stdio() -> Self {
    let stdin: Stdin = io::stdin();
    Console::new(stdin.lock(), io::stdout())
  }
}

fn io_error(e: io::Error) -> PortError {
  PortError::Io(e.to_string())
}

impl<R: BufRead, W: Write> Input for Console<R, W> {
  fn next_input(&mut self) -> Result<Value, PortError> {
    let mut line = String::new();
    loop {
      write!(self.writer, "> ").map_err(io_error)?;
      self.writer.flush().map_err(io_error)?;

      line.clear();
      let parsed = match self.reader.read_line(&mut line) {
        Ok(0) => return Err(PortError::Closed),
        Ok(_) => line.trim().parse::<Value>().ok(),
        // A line that is not UTF-8 has still been consumed; treat it like any other bad line.
        Err(e) if e.kind() == io::ErrorKind::InvalidData => None,
        Err(e) => return Err(io_error(e)),
      };

      match parsed {
        Some(value) => {
          writeln!(self.writer, "Accepted").map_err(io_error)?;
          return Ok(value);
        }
        None => {
          writeln!(self.writer, "Rejected").map_err(io_error)?;
        }
      }
    }
  }
}

impl<R, W: Write> Output for Console<R, W> {
  fn emit_output(&mut self, value: Value) -> Result<(), PortError> {
    writeln!(self.writer, "{}", value).map_err(io_error)
  }
}

// endregion
