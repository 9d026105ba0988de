//! Extracts one `{...}` JSON object at a time from a byte source
//!
//! The reader sits inside a JSON array whose opening `[` has already been
//! consumed. Each call skips separators up to the next `{`, then captures
//! bytes until the brace depth returns to zero. Braces inside string
//! literals (including escaped quotes) do not count towards the depth.

use super::{ByteSource, Pacing, StreamError};

/// Result of a single [`ObjectReader::read_next_object`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete object occupies the first `len` bytes of the buffer
    Object(usize),
    /// The enclosing array closed before another object started
    EndOfArray,
    /// The object did not fit in the buffer and was consumed and discarded
    Overflow {
        /// Full size of the discarded object in bytes
        size: usize,
    },
}

/// Brace/string state machine for one object
#[derive(Debug, Default)]
struct Scanner {
    depth: u32,
    in_string: bool,
    escaped: bool,
}

impl Scanner {
    /// Feeds one captured byte. Returns `true` once the object is closed.
    fn feed(&mut self, c: u8) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == b'\\' {
                self.escaped = true;
            } else if c == b'"' {
                self.in_string = false;
            }
            return false;
        }

        match c {
            b'"' => self.in_string = true,
            b'{' => self.depth += 1,
            b'}' => {
                self.depth = self.depth.saturating_sub(1);
                return self.depth == 0;
            }
            _ => {}
        }
        false
    }
}

/// Reads consecutive objects out of a JSON array
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectReader {
    pacing: Pacing,
}

impl ObjectReader {
    /// Creates a reader that waits on its source according to `pacing`
    pub fn new(pacing: Pacing) -> Self {
        Self { pacing }
    }

    /// Timing policy used while waiting for bytes
    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    /// Reads the next object from `src` into `buf`.
    ///
    /// Before the object starts every byte except `{` is skipped, and a `]`
    /// ends the sequence with [`ReadOutcome::EndOfArray`]. If the object is
    /// larger than `buf` it is still read to its closing brace so the next
    /// call starts cleanly, and [`ReadOutcome::Overflow`] is returned.
    ///
    /// # Errors
    /// [`StreamError::Timeout`] when the source goes idle for longer than the
    /// idle timeout, [`StreamError::Closed`] when it ends mid-object.
    pub fn read_next_object<S>(&self, src: &mut S, buf: &mut [u8]) -> Result<ReadOutcome, StreamError>
    where
        S: ByteSource + ?Sized,
    {
        loop {
            match src.next_byte(&self.pacing)? {
                b'{' => break,
                b']' => return Ok(ReadOutcome::EndOfArray),
                _ => continue,
            }
        }

        let mut scanner = Scanner::default();
        let mut size = 0usize;
        let mut c = b'{';
        loop {
            if size < buf.len() {
                buf[size] = c;
            }
            size += 1;

            if scanner.feed(c) {
                return Ok(if size <= buf.len() {
                    ReadOutcome::Object(size)
                } else {
                    ReadOutcome::Overflow { size }
                });
            }
            c = src.next_byte(&self.pacing)?;
        }
    }
}
