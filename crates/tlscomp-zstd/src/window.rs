//! Sliding history window for match reconstruction.
//!
//! The window keeps the most recent `capacity` bytes produced by the frame
//! (plus any dictionary content primed before the first block). Storage is
//! a plain `Vec` that is compacted once it holds twice the capacity.

use crate::frame::MIN_WINDOW_SIZE;
use tlscomp_core::{Error, Result};

#[derive(Debug, Clone)]
pub struct Window {
    buffer: Vec<u8>,
    capacity: usize,
}

impl Window {
    /// Window for a frame declaring `window_size` bytes of history.
    pub fn new(window_size: usize) -> Self {
        let capacity = window_size.max(MIN_WINDOW_SIZE);
        Self {
            buffer: Vec::with_capacity(capacity.min(1 << 20)),
            capacity,
        }
    }

    /// Window whose history starts with `content`.
    ///
    /// The dictionary stays addressable for the whole frame, so the
    /// capacity grows by its length.
    pub fn with_dictionary(window_size: usize, content: &[u8]) -> Self {
        let mut window = Self::new(window_size);
        window.capacity += content.len();
        window.prime(content);
        window
    }

    /// Seed history without producing output.
    pub fn prime(&mut self, content: &[u8]) {
        self.buffer.extend_from_slice(content);
        self.compact();
    }

    /// Append produced bytes to the history.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        self.compact();
    }

    /// Bytes currently addressable by a match.
    pub fn history_len(&self) -> usize {
        self.buffer.len().min(self.capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy `length` bytes starting `offset` bytes back, appending them to
    /// both the history and `out`.
    ///
    /// Overlapping copies (`offset < length`) repeat the pattern, as LZ77
    /// requires.
    pub fn copy_match(&mut self, offset: usize, length: usize, out: &mut Vec<u8>) -> Result<()> {
        let history = self.history_len();
        if offset == 0 || offset > history {
            return Err(Error::OffsetOutOfRange {
                match_offset: offset,
                history,
                offset: 0,
            });
        }

        let start = self.buffer.len() - offset;
        out.reserve(length);
        if offset >= length {
            self.buffer.extend_from_within(start..start + length);
        } else {
            self.buffer.reserve(length);
            for i in 0..length {
                let byte = self.buffer[start + i];
                self.buffer.push(byte);
            }
        }
        out.extend_from_slice(&self.buffer[self.buffer.len() - length..]);
        self.compact();
        Ok(())
    }

    fn compact(&mut self) {
        if self.buffer.len() > 2 * self.capacity {
            let excess = self.buffer.len() - self.capacity;
            self.buffer.drain(..excess);
        }
    }
}
