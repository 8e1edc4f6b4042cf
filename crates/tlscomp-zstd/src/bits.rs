//! Bit-level cursors.
//!
//! Zstd uses two bit orders:
//!
//! - **Forward** (LSB-first from the start of the buffer) for FSE table
//!   headers. See [`ForwardBitReader`].
//! - **Backward** for every entropy-coded payload (Huffman streams, FSE
//!   weights, sequences). The writer appends bits LSB-first and closes the
//!   stream with a single `1` end marker; the reader starts just below that
//!   marker in the last byte and walks toward the start of the buffer. See
//!   [`BackwardBitReader`] and [`BitWriter`].

use tlscomp_core::{Error, Result};

/// Maximum number of bits a single read or write may request.
pub const MAX_BITS_PER_OP: u32 = 56;

/// Index of the highest set bit. `v` must be non-zero.
#[inline]
pub fn highest_bit(v: u32) -> u32 {
    debug_assert!(v != 0);
    31 - v.leading_zeros()
}

#[inline]
fn low_mask(n: u32) -> u64 {
    debug_assert!(n <= MAX_BITS_PER_OP);
    (1u64 << n) - 1
}

/// Load up to 8 bytes little-endian, zero-filling past the end.
#[inline]
fn load_le(bytes: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    let n = bytes.len().min(8);
    word[..n].copy_from_slice(&bytes[..n]);
    u64::from_le_bytes(word)
}

// =============================================================================
// Forward reader
// =============================================================================

/// LSB-first reader used for FSE normalized-count headers.
///
/// Peeks past the end return zero bits; [`ForwardBitReader::consume`] is
/// the only operation that fails on overrun.
#[derive(Debug, Clone)]
pub struct ForwardBitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> ForwardBitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Peek `n` bits without consuming them.
    pub fn peek(&self, n: u32) -> u64 {
        if n == 0 {
            return 0;
        }
        let byte = self.bit_pos / 8;
        if byte >= self.data.len() {
            return 0;
        }
        let shift = (self.bit_pos % 8) as u32;
        (load_le(&self.data[byte..]) >> shift) & low_mask(n)
    }

    /// Advance by `n` bits.
    pub fn consume(&mut self, n: u32) -> Result<()> {
        let next = self.bit_pos + n as usize;
        if next > self.data.len() * 8 {
            return Err(Error::unexpected_end(self.data.len()));
        }
        self.bit_pos = next;
        Ok(())
    }

    pub fn read(&mut self, n: u32) -> Result<u64> {
        let value = self.peek(n);
        self.consume(n)?;
        Ok(value)
    }

    /// Bytes touched so far, counting a partially consumed byte.
    pub fn bytes_consumed(&self) -> usize {
        (self.bit_pos + 7) / 8
    }

    /// Byte offset of the cursor, used for error reporting.
    pub fn byte_position(&self) -> usize {
        self.bit_pos / 8
    }
}

// =============================================================================
// Backward reader
// =============================================================================

/// Reader for backward bitstreams.
///
/// Invariant: the stream is consumed from the end of the buffer toward the
/// start, `n` bits at a time, with the most significant bit of each read
/// taken from the highest remaining position. Reads past the start yield
/// zero bits and drive [`BackwardBitReader::remaining`] negative, which
/// callers use to detect overflow.
#[derive(Debug, Clone)]
pub struct BackwardBitReader<'a> {
    data: &'a [u8],
    remaining: isize,
}

impl<'a> BackwardBitReader<'a> {
    /// Position the reader just below the end marker in the last byte.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let Some(&last) = data.last() else {
            return Err(Error::corrupted("empty bitstream", 0));
        };
        if last == 0 {
            return Err(Error::corrupted(
                "bitstream missing end marker",
                data.len() - 1,
            ));
        }
        let marker = highest_bit(last as u32) as isize;
        Ok(Self {
            data,
            remaining: (data.len() as isize - 1) * 8 + marker,
        })
    }

    /// Bits left before the start of the buffer. Negative after overrun.
    #[inline]
    pub fn remaining(&self) -> isize {
        self.remaining
    }

    /// True once every bit has been consumed exactly.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }

    /// True if more bits were consumed than the stream holds.
    #[inline]
    pub fn is_overflowed(&self) -> bool {
        self.remaining < 0
    }

    /// Peek the next `n` bits (`n <= 56`).
    pub fn peek(&self, n: u32) -> u64 {
        if n == 0 || self.remaining <= 0 {
            return 0;
        }
        let end = self.remaining;
        let start = end - n as isize;
        if start >= 0 {
            let start = start as usize;
            let word = load_le(&self.data[start / 8..]);
            (word >> (start % 8)) & low_mask(n)
        } else {
            let available = load_le(self.data) & low_mask(end as u32);
            available << (-start) as u32
        }
    }

    #[inline]
    pub fn consume(&mut self, n: u32) {
        self.remaining -= n as isize;
    }

    /// Read `n` bits (`n <= 56`).
    #[inline]
    pub fn read(&mut self, n: u32) -> u64 {
        let value = self.peek(n);
        self.consume(n);
        value
    }
}

// =============================================================================
// Writer
// =============================================================================

/// LSB-first bit accumulator.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    buf: Vec<u8>,
    acc: u64,
    acc_bits: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buf: Vec::with_capacity(bytes),
            ..Self::default()
        }
    }

    /// Append the low `n` bits of `value` (`n <= 56`).
    #[inline]
    pub fn write(&mut self, value: u64, n: u32) {
        if n == 0 {
            return;
        }
        self.acc |= (value & low_mask(n)) << self.acc_bits;
        self.acc_bits += n;
        while self.acc_bits >= 8 {
            self.buf.push(self.acc as u8);
            self.acc >>= 8;
            self.acc_bits -= 8;
        }
    }

    /// Total bits written.
    pub fn bit_len(&self) -> usize {
        self.buf.len() * 8 + self.acc_bits as usize
    }

    /// Pad with zeros to a byte boundary.
    pub fn finish(mut self) -> Vec<u8> {
        if self.acc_bits > 0 {
            self.buf.push(self.acc as u8);
        }
        self.buf
    }

    /// Close a backward stream: append the end marker, then pad.
    pub fn finish_with_end_mark(mut self) -> Vec<u8> {
        self.write(1, 1);
        self.finish()
    }
}
