//! Byte-oriented input for the incremental JSON parser
//!
//! HTTP bodies of unknown size are consumed one byte at a time through the
//! [`ByteSource`] trait, so the parser never holds more than one record in
//! memory. Waiting for bytes is cooperative: when nothing is available the
//! caller sleeps for a short poll interval and retries, giving up after an
//! idle timeout.

pub mod reader;

use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError};

pub use reader::{ObjectReader, ReadOutcome};

/// Default maximum idle time between two bytes
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default sleep between availability checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Errors that end reading from a byte source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// No byte arrived within the idle timeout
    #[error("no data received for {0:?}")]
    Timeout(Duration),

    /// The source has no more bytes
    #[error("stream closed")]
    Closed,
}

/// Timing policy for waiting on a byte source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Longest allowed gap between two bytes
    pub idle_timeout: Duration,
    /// How long to sleep when no byte is available
    pub poll_interval: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Pacing {
    /// Creates a pacing policy with the given idle timeout and poll interval
    pub fn new(idle_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            idle_timeout,
            poll_interval,
        }
    }
}

/// A byte stream that can be polled without blocking
pub trait ByteSource {
    /// Number of bytes that can be read right now without waiting
    fn available(&mut self) -> usize;

    /// Reads one byte if one is available
    fn read_byte(&mut self) -> Option<u8>;

    /// Whether the source has ended and every byte has been consumed
    fn is_exhausted(&mut self) -> bool;

    /// Returns the next byte, waiting cooperatively up to the idle timeout.
    fn next_byte(&mut self, pacing: &Pacing) -> Result<u8, StreamError> {
        let started = Instant::now();
        loop {
            if self.available() > 0 {
                if let Some(byte) = self.read_byte() {
                    return Ok(byte);
                }
            }
            if self.is_exhausted() {
                return Err(StreamError::Closed);
            }
            if started.elapsed() > pacing.idle_timeout {
                return Err(StreamError::Timeout(pacing.idle_timeout));
            }
            thread::sleep(pacing.poll_interval);
        }
    }

    /// Waits until at least one byte is available or `limit` elapses.
    ///
    /// Returns `true` when data is ready.
    fn wait_for_data(&mut self, limit: Duration, pacing: &Pacing) -> bool {
        let start = Instant::now();
        while self.available() == 0 {
            if self.is_exhausted() || start.elapsed() > limit {
                return false;
            }
            thread::sleep(pacing.poll_interval);
        }
        true
    }

    /// Consumes bytes up to and including `literal`.
    fn find(&mut self, literal: &[u8], pacing: &Pacing) -> Result<(), StreamError> {
        self.find_any(&[literal], pacing).map(|_| ())
    }

    /// Consumes bytes until one of `literals` has been read in full.
    ///
    /// Returns the index of the literal that matched first. The scan is
    /// forward-only: bytes before the match are discarded.
    fn find_any(&mut self, literals: &[&[u8]], pacing: &Pacing) -> Result<usize, StreamError> {
        let window_len = literals.iter().map(|l| l.len()).max().unwrap_or(0);
        if window_len == 0 {
            return Ok(0);
        }
        let mut window: Vec<u8> = Vec::with_capacity(window_len);
        loop {
            let byte = self.next_byte(pacing)?;
            if window.len() == window_len {
                window.remove(0);
            }
            window.push(byte);
            if let Some(idx) = literals
                .iter()
                .position(|l| !l.is_empty() && window.ends_with(l))
            {
                return Ok(idx);
            }
        }
    }
}

/// In-memory byte source over an owned buffer
#[derive(Debug, Clone)]
pub struct SliceSource {
    data: Vec<u8>,
    pos: usize,
}

impl SliceSource {
    /// Creates a source that yields the bytes of `data` and then ends
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }

    /// Number of bytes consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl ByteSource for SliceSource {
    fn available(&mut self) -> usize {
        self.data.len() - self.pos
    }

    fn read_byte(&mut self) -> Option<u8> {
        let byte = self.data.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    fn is_exhausted(&mut self) -> bool {
        self.pos >= self.data.len()
    }
}

/// Byte source fed with body chunks over a bounded channel
///
/// The sending side is a task pumping an HTTP response body; the channel
/// capacity bounds how much of the body can be buffered at once.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Vec<u8>>,
    chunk: Vec<u8>,
    pos: usize,
    closed: bool,
}

impl ChannelSource {
    /// Wraps the receiving end of a chunk channel
    pub fn new(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
            closed: false,
        }
    }

    fn refill(&mut self) {
        while self.pos >= self.chunk.len() && !self.closed {
            match self.rx.try_recv() {
                Ok(next) => {
                    self.chunk = next;
                    self.pos = 0;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.closed = true,
            }
        }
    }
}

impl ByteSource for ChannelSource {
    fn available(&mut self) -> usize {
        self.refill();
        self.chunk.len() - self.pos
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.refill();
        let byte = self.chunk.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    fn is_exhausted(&mut self) -> bool {
        self.refill();
        self.closed && self.pos >= self.chunk.len()
    }
}
