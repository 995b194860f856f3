//! Fixed-capacity stream buffer with incremental line extraction
//!
//! One `StreamBuffer` sits behind every client socket and every job pipe.
//! Bytes land in the unused tail via [`StreamBuffer::fill`], complete lines
//! are handed out by [`StreamBuffer::next_message`], and the owner calls
//! [`StreamBuffer::compact`] after each drain pass to reclaim space.
//!
//! Invariant: `consumed <= filled <= capacity`.

use std::io::{self, ErrorKind, Read};

/// Line terminator convention of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// Bare `\n`, used for job output
    Unix,
    /// `\r\n`, used for client protocol lines
    Network,
}

impl Delimiter {
    #[must_use]
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Delimiter::Unix => b"\n",
            Delimiter::Network => b"\r\n",
        }
    }
}

/// Outcome of a single [`StreamBuffer::fill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// This many bytes were appended; zero when the source had nothing ready
    Read(usize),
    /// The source reported end of stream
    Closed,
    /// No room left; nothing was read
    Saturated,
}

#[derive(Debug)]
pub struct StreamBuffer {
    data: Box<[u8]>,
    filled: usize,
    consumed: usize,
}

impl StreamBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity].into_boxed_slice(),
            filled: 0,
            consumed: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn filled(&self) -> usize {
        self.filled
    }

    #[must_use]
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Bytes received but not yet handed out as a message
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.data[self.consumed..self.filled]
    }

    #[must_use]
    pub fn is_saturated(&self) -> bool {
        self.filled == self.data.len()
    }

    /// Read whatever `source` has ready into the unused tail.
    ///
    /// Must only be called once the source is known to be readable; a
    /// non-blocking source that turns out to be empty yields `Fill::Read(0)`.
    pub fn fill<R: Read + ?Sized>(&mut self, source: &mut R) -> io::Result<Fill> {
        if self.is_saturated() {
            return Ok(Fill::Saturated);
        }
        match source.read(&mut self.data[self.filled..]) {
            Ok(0) => Ok(Fill::Closed),
            Ok(n) => {
                self.filled += n;
                Ok(Fill::Read(n))
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Ok(Fill::Read(0))
            }
            Err(e) => Err(e),
        }
    }

    /// Hand out the next complete message, delimiter excluded.
    pub fn next_message(&mut self, delimiter: Delimiter) -> Option<&[u8]> {
        let needle = delimiter.as_bytes();
        let start = self.consumed;
        let offset = self.data[start..self.filled]
            .windows(needle.len())
            .position(|window| window == needle)?;
        let end = start + offset;
        self.consumed = end + needle.len();
        Some(&self.data[start..end])
    }

    /// Move the unconsumed tail to the front of the buffer.
    pub fn compact(&mut self) {
        if self.consumed == 0 {
            return;
        }
        self.data.copy_within(self.consumed..self.filled, 0);
        self.filled -= self.consumed;
        self.consumed = 0;
    }

    /// Take the unterminated tail, leaving the buffer empty.
    pub fn remainder(&mut self) -> Option<Vec<u8>> {
        let tail = self.pending().to_vec();
        self.clear();
        (!tail.is_empty()).then_some(tail)
    }

    pub fn clear(&mut self) {
        self.filled = 0;
        self.consumed = 0;
    }
}
