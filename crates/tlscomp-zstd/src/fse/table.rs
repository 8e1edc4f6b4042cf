//! FSE tables.
//!
//! A table is fully described by its accuracy log and normalized counts:
//! every count is either `-1` (a "less than one" probability that still
//! occupies one state) or a non-negative share, and the shares sum to
//! `1 << accuracy_log`. Both the decoding table here and the encoding
//! table in `encoder.rs` are derived from the same symbol spread.
//!
//! ## Header format (RFC 8878 Section 4.1.1)
//!
//! - 4 bits: `accuracy_log - 5`
//! - Variable-width counts, each sized by the probability mass still
//!   unassigned, with 2-bit repeat fields after every zero count.

use crate::bits::{highest_bit, BitWriter, ForwardBitReader};
use tlscomp_core::{Error, Result};

/// Smallest accuracy log a table header may declare.
pub const FSE_MIN_ACCURACY_LOG: u8 = 5;

/// Largest accuracy log any zstd table may use.
pub const FSE_MAX_ACCURACY_LOG: u8 = 9;

/// One decoding state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FseTableEntry {
    /// Symbol emitted by this state.
    pub symbol: u8,
    /// Bits to read for the next state.
    pub num_bits: u8,
    /// Added to the read bits to form the next state.
    pub baseline: u16,
}

/// Normalized distribution plus its decoding table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FseTable {
    accuracy_log: u8,
    counts: Vec<i16>,
    entries: Vec<FseTableEntry>,
}

impl FseTable {
    /// Build from a normalized distribution.
    pub fn from_normalized(counts: &[i16], accuracy_log: u8) -> Result<Self> {
        if accuracy_log > FSE_MAX_ACCURACY_LOG {
            return Err(Error::fse(
                format!("accuracy log {accuracy_log} exceeds {FSE_MAX_ACCURACY_LOG}"),
                0,
            ));
        }
        if counts.is_empty() || counts.len() > 256 {
            return Err(Error::fse(
                format!("{} symbols in distribution", counts.len()),
                0,
            ));
        }
        let mut total = 0i32;
        for &c in counts {
            if c < -1 {
                return Err(Error::fse(format!("invalid normalized count {c}"), 0));
            }
            total += if c == -1 { 1 } else { c as i32 };
        }
        if total != 1 << accuracy_log {
            return Err(Error::fse(
                format!("counts sum to {total}, expected {}", 1 << accuracy_log),
                0,
            ));
        }
        Self::build(counts.to_vec(), accuracy_log)
    }

    /// Single-symbol table (RLE mode). Reads no bits per state.
    pub fn rle(symbol: u8) -> Self {
        let mut counts = vec![0i16; symbol as usize + 1];
        counts[symbol as usize] = 1;
        Self {
            accuracy_log: 0,
            counts,
            entries: vec![FseTableEntry {
                symbol,
                num_bits: 0,
                baseline: 0,
            }],
        }
    }

    fn build(counts: Vec<i16>, accuracy_log: u8) -> Result<Self> {
        let size = 1usize << accuracy_log;
        let spread = spread_symbols(&counts, accuracy_log)?;

        let mut next_state: Vec<u32> = counts
            .iter()
            .map(|&c| if c == -1 { 1 } else { c.max(0) as u32 })
            .collect();

        let entries = spread
            .iter()
            .map(|&symbol| {
                let next = next_state[symbol as usize];
                next_state[symbol as usize] += 1;
                let num_bits = accuracy_log as u32 - highest_bit(next);
                FseTableEntry {
                    symbol,
                    num_bits: num_bits as u8,
                    baseline: ((next << num_bits) - size as u32) as u16,
                }
            })
            .collect();

        Ok(Self {
            accuracy_log,
            counts,
            entries,
        })
    }

    /// Parse a normalized-count header.
    ///
    /// Returns the table and the number of header bytes consumed. Error
    /// offsets are relative to `data`.
    pub fn parse(data: &[u8], max_log: u8, max_symbol: u8) -> Result<(Self, usize)> {
        let mut reader = ForwardBitReader::new(data);
        let accuracy_log = reader.read(4)? as u8 + FSE_MIN_ACCURACY_LOG;
        if accuracy_log > max_log {
            return Err(Error::fse(
                format!("accuracy log {accuracy_log} exceeds {max_log}"),
                0,
            ));
        }

        let symbol_limit = max_symbol as usize + 1;
        let mut remaining: i32 = 1 << accuracy_log;
        let mut counts: Vec<i16> = Vec::with_capacity(symbol_limit);

        while remaining > 0 {
            if counts.len() >= symbol_limit {
                return Err(Error::fse(
                    format!("distribution exceeds {symbol_limit} symbols"),
                    reader.byte_position(),
                ));
            }

            let bits = highest_bit((remaining + 1) as u32) + 1;
            let lower_mask = (1u32 << (bits - 1)) - 1;
            let threshold = (1u32 << bits) - 1 - (remaining as u32 + 1);

            let mut value = reader.peek(bits) as u32;
            if value & lower_mask < threshold {
                reader.consume(bits - 1)?;
                value &= lower_mask;
            } else {
                reader.consume(bits)?;
                if value > lower_mask {
                    value -= threshold;
                }
            }

            let proba = value as i32 - 1;
            remaining -= proba.abs();
            counts.push(proba as i16);

            if proba == 0 {
                loop {
                    let repeat = reader.read(2)?;
                    for _ in 0..repeat {
                        if counts.len() >= symbol_limit {
                            return Err(Error::fse(
                                "zero run past last symbol",
                                reader.byte_position(),
                            ));
                        }
                        counts.push(0);
                    }
                    if repeat != 3 {
                        break;
                    }
                }
            }
        }

        if remaining != 0 {
            return Err(Error::fse(
                "normalized counts overshoot the table size",
                reader.byte_position(),
            ));
        }

        let consumed = reader.bytes_consumed();
        let table = Self::build(counts, accuracy_log).map_err(|e| e.at_offset(consumed))?;
        Ok((table, consumed))
    }

    /// Serialize the distribution as a normalized-count header.
    pub fn write_header(&self) -> Vec<u8> {
        let mut writer = BitWriter::new();
        write_normalized_counts(&self.counts, self.accuracy_log, &mut writer);
        writer.finish()
    }

    #[inline]
    pub fn accuracy_log(&self) -> u8 {
        self.accuracy_log
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Normalized counts, trimmed after the last present symbol.
    pub fn counts(&self) -> &[i16] {
        &self.counts
    }

    /// True if `symbol` has a non-zero probability.
    pub fn covers(&self, symbol: usize) -> bool {
        self.counts.get(symbol).is_some_and(|&c| c != 0)
    }

    #[inline]
    pub fn entry(&self, state: usize) -> FseTableEntry {
        self.entries[state]
    }
}

/// Assign every state to a symbol.
///
/// `-1` symbols take the highest states, the rest are scattered with the
/// fixed step `(size >> 1) + (size >> 3) + 3`.
pub fn spread_symbols(counts: &[i16], accuracy_log: u8) -> Result<Vec<u8>> {
    let size = 1usize << accuracy_log;
    let mask = size - 1;
    let mut table = vec![0u8; size];

    let mut high = size as isize - 1;
    for (symbol, &c) in counts.iter().enumerate() {
        if c == -1 {
            if high < 0 {
                return Err(Error::fse("too many low-probability symbols", 0));
            }
            table[high as usize] = symbol as u8;
            high -= 1;
        }
    }

    let step = (size >> 1) + (size >> 3) + 3;
    let mut pos = 0usize;
    for (symbol, &c) in counts.iter().enumerate() {
        for _ in 0..c.max(0) {
            table[pos] = symbol as u8;
            loop {
                pos = (pos + step) & mask;
                if pos as isize <= high {
                    break;
                }
            }
        }
    }

    if pos != 0 {
        return Err(Error::fse("symbol spread did not cover the table", 0));
    }
    Ok(table)
}

/// Accuracy log for a histogram of `total` samples whose largest symbol
/// is `max_symbol`.
pub fn optimal_accuracy_log(total: usize, max_symbol: usize, max_log: u8) -> u8 {
    let total = total.max(2) as u32;
    let max_bits_src = highest_bit(total - 1).saturating_sub(2);
    let min_bits_src = highest_bit(total) + 1;
    let min_bits_symbols = highest_bit(max_symbol.max(1) as u32) + 2;
    let min_bits = min_bits_src.min(min_bits_symbols);

    let mut log = max_log as u32;
    if max_bits_src < log {
        log = max_bits_src;
    }
    if min_bits > log {
        log = min_bits;
    }
    log.clamp(FSE_MIN_ACCURACY_LOG as u32, max_log as u32) as u8
}

/// Scale a histogram so it sums to `1 << accuracy_log`.
///
/// Present symbols keep a non-zero count (`-1` when their share rounds to
/// zero). The shortfall goes to the largest rounding remainders; an excess
/// is taken from the largest counts. Returns `None` if the histogram is
/// empty or cannot fit the table.
pub fn normalize_counts(histogram: &[u32], accuracy_log: u8) -> Option<Vec<i16>> {
    let total: u64 = histogram.iter().map(|&h| h as u64).sum();
    if total == 0 {
        return None;
    }
    let scale = 1u64 << accuracy_log;
    let mut counts = vec![0i16; histogram.len()];
    let mut remainders: Vec<(u64, usize)> = Vec::new();
    let mut assigned = 0i64;

    for (symbol, &h) in histogram.iter().enumerate() {
        if h == 0 {
            continue;
        }
        let scaled = h as u64 * scale;
        let share = scaled / total;
        if share == 0 {
            counts[symbol] = -1;
            assigned += 1;
        } else {
            counts[symbol] = share as i16;
            assigned += share as i64;
            remainders.push((scaled % total, symbol));
        }
    }

    let mut diff = scale as i64 - assigned;
    if diff > 0 {
        if remainders.is_empty() {
            return None;
        }
        remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        for &(_, symbol) in remainders.iter().cycle() {
            if diff == 0 {
                break;
            }
            counts[symbol] += 1;
            diff -= 1;
        }
    }
    while diff < 0 {
        let (symbol, _) = counts
            .iter()
            .enumerate()
            .filter(|(_, &c)| c > 1)
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))?;
        counts[symbol] -= 1;
        diff += 1;
    }

    let last = counts.iter().rposition(|&c| c != 0)?;
    counts.truncate(last + 1);
    Some(counts)
}

/// Write a normalized-count header, LSB-first.
pub fn write_normalized_counts(counts: &[i16], accuracy_log: u8, writer: &mut BitWriter) {
    let size = 1i32 << accuracy_log;
    writer.write((accuracy_log - FSE_MIN_ACCURACY_LOG) as u64, 4);

    let mut remaining = size + 1;
    let mut threshold = size;
    let mut nb_bits = accuracy_log as u32 + 1;
    let mut symbol = 0usize;
    let mut previous_is_zero = false;

    while symbol < counts.len() && remaining > 1 {
        if previous_is_zero {
            let mut start = symbol;
            while symbol < counts.len() && counts[symbol] == 0 {
                symbol += 1;
            }
            if symbol == counts.len() {
                break;
            }
            while symbol >= start + 24 {
                start += 24;
                writer.write(0xFFFF, 16);
            }
            while symbol >= start + 3 {
                start += 3;
                writer.write(3, 2);
            }
            writer.write((symbol - start) as u64, 2);
        }

        let mut count = counts[symbol] as i32;
        symbol += 1;
        let max = (2 * threshold - 1) - remaining;
        remaining -= count.abs();
        count += 1;
        if count >= threshold {
            count += max;
        }
        writer.write(count as u64, nb_bits - (count < max) as u32);
        previous_is_zero = count == 1;
        while remaining < threshold {
            nb_bits -= 1;
            threshold >>= 1;
        }
    }
}
