//! Huffman decoding table.
//!
//! Zstd describes a literal code only by per-symbol weights. A symbol of
//! weight `w > 0` gets a code of length `max_bits + 1 - w`; weight 0 means
//! absent. The canonical assignment places the longest codes (weight 1)
//! at the lowest table indices, ascending symbol order within a weight.

use super::{HUFFMAN_MAX_BITS, HUFFMAN_MAX_SYMBOLS};
use crate::bits::highest_bit;
use tlscomp_core::{Error, Result};

/// Entry in the flat lookup table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HuffmanTableEntry {
    pub symbol: u8,
    /// Code length of `symbol`.
    pub num_bits: u8,
}

/// Flat `2^max_bits` lookup table indexed by the next `max_bits` stream bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    max_bits: u8,
    weights: Vec<u8>,
    entries: Vec<HuffmanTableEntry>,
}

/// Per-weight symbol counts and the resulting maximum code length.
pub(crate) struct WeightStats {
    pub rank_count: [u32; HUFFMAN_MAX_BITS as usize + 2],
    pub max_bits: u8,
}

/// Validate a complete weight list (Kraft sum exactly `2^max_bits`).
pub(crate) fn weight_stats(weights: &[u8]) -> Result<WeightStats> {
    if weights.len() > HUFFMAN_MAX_SYMBOLS {
        return Err(Error::huffman(
            format!("{} weights exceed 256 symbols", weights.len()),
            0,
        ));
    }
    let mut rank_count = [0u32; HUFFMAN_MAX_BITS as usize + 2];
    let mut total = 0u32;
    for &w in weights {
        if w > HUFFMAN_MAX_BITS {
            return Err(Error::huffman(format!("weight {w} exceeds maximum"), 0));
        }
        if w > 0 {
            rank_count[w as usize] += 1;
            total += 1 << (w - 1);
        }
    }
    if total == 0 {
        return Err(Error::huffman("no symbols present", 0));
    }
    let max_bits = highest_bit(total);
    if total != 1 << max_bits {
        return Err(Error::huffman(
            format!("Kraft sum {total} is not a power of two"),
            0,
        ));
    }
    if max_bits > HUFFMAN_MAX_BITS as u32 {
        return Err(Error::huffman(
            format!("code length {max_bits} exceeds {HUFFMAN_MAX_BITS}"),
            0,
        ));
    }
    if rank_count[1] < 2 || rank_count[1] % 2 != 0 {
        return Err(Error::huffman(
            "longest codes must come in pairs",
            0,
        ));
    }
    Ok(WeightStats {
        rank_count,
        max_bits: max_bits as u8,
    })
}

/// First table index of each weight's block of entries.
pub(crate) fn rank_starts(stats: &WeightStats) -> [u32; HUFFMAN_MAX_BITS as usize + 2] {
    let mut starts = [0u32; HUFFMAN_MAX_BITS as usize + 2];
    let mut next = 0u32;
    for w in 1..starts.len() {
        starts[w] = next;
        next += stats.rank_count[w] << (w - 1);
    }
    starts
}

/// Append the implied weight of the last symbol.
///
/// The transmitted weights omit the final symbol; its weight is whatever
/// brings the Kraft sum up to the next power of two.
pub fn complete_weights(partial: &[u8]) -> Result<Vec<u8>> {
    if partial.len() + 1 > HUFFMAN_MAX_SYMBOLS {
        return Err(Error::huffman(
            format!("{} weights exceed 255", partial.len()),
            0,
        ));
    }
    let mut total = 0u32;
    for &w in partial {
        if w > HUFFMAN_MAX_BITS {
            return Err(Error::huffman(format!("weight {w} exceeds maximum"), 0));
        }
        if w > 0 {
            total += 1 << (w - 1);
        }
    }
    if total == 0 {
        return Err(Error::huffman("all transmitted weights are zero", 0));
    }
    let max_bits = highest_bit(total) + 1;
    if max_bits > HUFFMAN_MAX_BITS as u32 {
        return Err(Error::huffman(
            format!("code length {max_bits} exceeds {HUFFMAN_MAX_BITS}"),
            0,
        ));
    }
    let rest = (1u32 << max_bits) - total;
    if !rest.is_power_of_two() {
        return Err(Error::huffman(
            "implied last weight does not complete the code",
            0,
        ));
    }
    let mut weights = partial.to_vec();
    weights.push(highest_bit(rest) as u8 + 1);
    Ok(weights)
}

impl HuffmanTable {
    /// Build from a complete weight list (one weight per symbol).
    pub fn from_weights(weights: &[u8]) -> Result<Self> {
        let stats = weight_stats(weights)?;
        let max_bits = stats.max_bits;
        let mut starts = rank_starts(&stats);
        let mut entries = vec![HuffmanTableEntry::default(); 1 << max_bits];

        for (symbol, &w) in weights.iter().enumerate() {
            if w == 0 {
                continue;
            }
            let span = 1usize << (w - 1);
            let start = starts[w as usize] as usize;
            let entry = HuffmanTableEntry {
                symbol: symbol as u8,
                num_bits: max_bits + 1 - w,
            };
            entries[start..start + span].fill(entry);
            starts[w as usize] += span as u32;
        }

        Ok(Self {
            max_bits,
            weights: weights.to_vec(),
            entries,
        })
    }

    #[inline]
    pub fn max_bits(&self) -> u8 {
        self.max_bits
    }

    /// Complete weight list, one per symbol up to the last present one.
    pub fn weights(&self) -> &[u8] {
        &self.weights
    }

    #[inline]
    pub fn lookup(&self, index: usize) -> HuffmanTableEntry {
        self.entries[index]
    }

    /// Number of table entries (`2^max_bits`).
    pub fn size(&self) -> usize {
        self.entries.len()
    }
}
