//! Huffman encoding for literals.
//!
//! ## Weight System
//!
//! - Weight `w > 0` means `code_length = max_bits + 1 - w`
//! - Weight `0` means the symbol is not present
//! - The last present symbol's weight is never transmitted
//!
//! Codes are built with a heap-driven Huffman merge, then limited to
//! [`HUFFMAN_MAX_BITS`] by lengthening short codes and repaying the Kraft
//! budget. Code values are derived from the weights through the same
//! canonical layout the decoder uses, so [`HuffmanEncoder::from_weights`]
//! is the single source of truth for both fresh and reused tables.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::table::{rank_starts, weight_stats, HuffmanTable};
use super::{HUFFMAN_MAX_BITS, HUFFMAN_MAX_SYMBOLS, HUFFMAN_MAX_WEIGHT, HUFFMAN_WEIGHT_MAX_LOG};
use crate::bits::BitWriter;
use crate::fse::{normalize_counts, optimal_accuracy_log, FseEncodeTable, FseEncoder, FseTable};
use tlscomp_core::Result;

/// Direct weight headers can describe at most this many weights.
const MAX_DIRECT_WEIGHTS: usize = 128;

/// Header byte values below this are compressed-stream sizes.
const MAX_COMPRESSED_HEADER: usize = 127;

/// Code of one symbol, stored LSB-aligned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HuffmanCode {
    pub code: u16,
    pub num_bits: u8,
}

/// Canonical Huffman encoder for literal bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanEncoder {
    codes: Vec<HuffmanCode>,
    weights: Vec<u8>,
    max_bits: u8,
}

impl HuffmanEncoder {
    /// Build an encoder from a byte histogram.
    ///
    /// Returns `None` when fewer than two distinct symbols are present;
    /// such literals are better sent as RLE.
    pub fn build(histogram: &[u32; 256]) -> Option<Self> {
        let present: Vec<usize> = (0..HUFFMAN_MAX_SYMBOLS)
            .filter(|&s| histogram[s] > 0)
            .collect();
        if present.len() < 2 {
            return None;
        }

        let freqs: Vec<u64> = present.iter().map(|&s| histogram[s] as u64).collect();
        let mut lengths = huffman_code_lengths(&freqs);
        limit_code_lengths(&mut lengths, &freqs, HUFFMAN_MAX_BITS as u32);

        let last = *present.last()?;
        let transmitted = &lengths[..lengths.len() - 1];
        if last > MAX_DIRECT_WEIGHTS
            && present.len() == last + 1
            && transmitted.windows(2).all(|w| w[0] == w[1])
        {
            // Every transmitted weight would be identical, which neither the
            // direct form (too many weights) nor FSE (one symbol) can carry.
            let l = lengths[0];
            lengths[0] = l + 1;
            lengths[1] = l + 1;
            lengths[2] = l - 1;
        }

        let max_bits = *lengths.iter().max()? as u8;
        let mut weights = vec![0u8; last + 1];
        for (&symbol, &len) in present.iter().zip(&lengths) {
            weights[symbol] = max_bits + 1 - len as u8;
        }
        Self::from_weights(&weights).ok()
    }

    /// Build an encoder from a complete weight list.
    pub fn from_weights(weights: &[u8]) -> Result<Self> {
        let stats = weight_stats(weights)?;
        let max_bits = stats.max_bits;
        let mut starts = rank_starts(&stats);
        let mut codes = vec![HuffmanCode::default(); HUFFMAN_MAX_SYMBOLS];

        for (symbol, &w) in weights.iter().enumerate() {
            if w == 0 {
                continue;
            }
            codes[symbol] = HuffmanCode {
                code: (starts[w as usize] >> (w - 1)) as u16,
                num_bits: max_bits + 1 - w,
            };
            starts[w as usize] += 1 << (w - 1);
        }

        Ok(Self {
            codes,
            weights: weights.to_vec(),
            max_bits,
        })
    }

    /// Encoder matching a decoding table, for treeless literals.
    pub fn from_table(table: &HuffmanTable) -> Result<Self> {
        Self::from_weights(table.weights())
    }

    #[inline]
    pub fn max_bits(&self) -> u8 {
        self.max_bits
    }

    pub fn weights(&self) -> &[u8] {
        &self.weights
    }

    #[inline]
    pub fn code(&self, symbol: u8) -> HuffmanCode {
        self.codes[symbol as usize]
    }

    /// True if every symbol present in `histogram` has a code.
    pub fn covers(&self, histogram: &[u32; 256]) -> bool {
        histogram
            .iter()
            .zip(&self.codes)
            .all(|(&count, code)| count == 0 || code.num_bits > 0)
    }

    /// Total payload bits for `histogram`, ignoring stream padding.
    pub fn encoded_bits(&self, histogram: &[u32; 256]) -> usize {
        histogram
            .iter()
            .zip(&self.codes)
            .map(|(&count, code)| count as usize * code.num_bits as usize)
            .sum()
    }

    /// Serialize the tree description, picking the smaller of the direct
    /// and FSE-compressed forms. `None` if neither can represent it.
    pub fn write_header(&self) -> Option<Vec<u8>> {
        let transmitted = &self.weights[..self.weights.len() - 1];
        let direct = write_direct_weights(transmitted);
        let compressed = write_compressed_weights(transmitted);
        match (direct, compressed) {
            (Some(d), Some(c)) => Some(if c.len() < d.len() { c } else { d }),
            (d, c) => d.or(c),
        }
    }

    /// Encode one stream. Symbols are written last-to-first so the
    /// backward reader yields them in order.
    pub fn encode_stream(&self, literals: &[u8]) -> Vec<u8> {
        let mut writer = BitWriter::with_capacity(literals.len() * self.max_bits as usize / 8 + 8);
        for &byte in literals.iter().rev() {
            let code = self.codes[byte as usize];
            writer.write(code.code as u64, code.num_bits as u32);
        }
        writer.finish_with_end_mark()
    }

    /// Encode the four-stream layout with its jump table.
    ///
    /// `None` if a stream outgrows the 16-bit jump table entries.
    pub fn encode_four_streams(&self, literals: &[u8]) -> Option<Vec<u8>> {
        let segment = (literals.len() + 3) / 4;
        let streams: Vec<Vec<u8>> = (0..4)
            .map(|i| {
                let start = (i * segment).min(literals.len());
                let end = if i == 3 {
                    literals.len()
                } else {
                    ((i + 1) * segment).min(literals.len())
                };
                self.encode_stream(&literals[start..end])
            })
            .collect();

        let mut out = Vec::with_capacity(6 + streams.iter().map(Vec::len).sum::<usize>());
        for stream in &streams[..3] {
            let size = u16::try_from(stream.len()).ok()?;
            out.extend_from_slice(&size.to_le_bytes());
        }
        for stream in &streams {
            out.extend_from_slice(stream);
        }
        Some(out)
    }
}

/// Optimal code lengths for `freqs` (all nonzero, at least two).
fn huffman_code_lengths(freqs: &[u64]) -> Vec<u32> {
    let n = freqs.len();
    let mut parent = vec![0usize; 2 * n - 1];
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> =
        freqs.iter().enumerate().map(|(i, &f)| Reverse((f, i))).collect();

    let mut next = n;
    while heap.len() > 1 {
        let (Some(Reverse((fa, a))), Some(Reverse((fb, b)))) = (heap.pop(), heap.pop()) else {
            break;
        };
        parent[a] = next;
        parent[b] = next;
        heap.push(Reverse((fa + fb, next)));
        next += 1;
    }

    // Parents always have higher ids, so one reverse sweep sets depths.
    let root = next - 1;
    let mut depth = vec![0u32; 2 * n - 1];
    for id in (0..root).rev() {
        depth[id] = depth[parent[id]] + 1;
    }
    depth.truncate(n);
    depth
}

/// Clamp lengths to `limit` while keeping the code complete.
fn limit_code_lengths(lengths: &mut [u32], freqs: &[u64], limit: u32) {
    let target = 1u64 << limit;
    for len in lengths.iter_mut() {
        *len = (*len).min(limit);
    }
    let mut kraft: u64 = lengths.iter().map(|&l| 1u64 << (limit - l)).sum();

    // Overfull: lengthen the longest codes still below the limit, cheapest first.
    while kraft > target {
        let Some(i) = (0..lengths.len())
            .filter(|&i| lengths[i] < limit)
            .max_by_key(|&i| (lengths[i], Reverse(freqs[i])))
        else {
            break;
        };
        kraft -= 1 << (limit - lengths[i] - 1);
        lengths[i] += 1;
    }

    // Slack: shorten the longest code whose gain still fits.
    while kraft < target {
        let slack = target - kraft;
        let Some(i) = (0..lengths.len())
            .filter(|&i| lengths[i] > 1 && (1u64 << (limit - lengths[i])) <= slack)
            .max_by_key(|&i| (lengths[i], freqs[i]))
        else {
            break;
        };
        kraft += 1 << (limit - lengths[i]);
        lengths[i] -= 1;
    }
}

fn write_direct_weights(weights: &[u8]) -> Option<Vec<u8>> {
    if weights.is_empty() || weights.len() > MAX_DIRECT_WEIGHTS {
        return None;
    }
    let mut out = Vec::with_capacity(1 + (weights.len() + 1) / 2);
    out.push((weights.len() + 127) as u8);
    for pair in weights.chunks(2) {
        let low = pair.get(1).copied().unwrap_or(0);
        out.push((pair[0] << 4) | low);
    }
    Some(out)
}

/// FSE-compress the transmitted weights with two interleaved states.
fn write_compressed_weights(weights: &[u8]) -> Option<Vec<u8>> {
    let n = weights.len();
    let mut histogram = [0u32; HUFFMAN_MAX_WEIGHT as usize + 1];
    for &w in weights {
        histogram[w as usize] += 1;
    }
    if histogram.iter().filter(|&&c| c > 0).count() < 2 {
        return None;
    }
    let max_symbol = histogram.iter().rposition(|&c| c > 0)?;
    let log = optimal_accuracy_log(n, max_symbol, HUFFMAN_WEIGHT_MAX_LOG);
    let counts = normalize_counts(&histogram[..=max_symbol], log)?;
    let table = FseTable::from_normalized(&counts, log).ok()?;
    let encode = FseEncodeTable::new(&table).ok()?;

    // The decoder reads `even` first, so it must end on weights[0].
    let mut writer = BitWriter::new();
    let (mut even, mut odd, mut idx) = if n % 2 == 1 {
        let mut even = FseEncoder::new(&encode, weights[n - 1]);
        let odd = FseEncoder::new(&encode, weights[n - 2]);
        even.encode(&mut writer, weights[n - 3]);
        (even, odd, n - 3)
    } else {
        let odd = FseEncoder::new(&encode, weights[n - 1]);
        let even = FseEncoder::new(&encode, weights[n - 2]);
        (even, odd, n - 2)
    };
    while idx > 0 {
        odd.encode(&mut writer, weights[idx - 1]);
        even.encode(&mut writer, weights[idx - 2]);
        idx -= 2;
    }
    odd.flush(&mut writer);
    even.flush(&mut writer);

    let mut body = table.write_header();
    body.extend_from_slice(&writer.finish_with_end_mark());
    if body.len() > MAX_COMPRESSED_HEADER {
        return None;
    }
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(body.len() as u8);
    out.extend_from_slice(&body);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::huffman::{read_huffman_table, HuffmanDecoder};

    fn histogram_of(data: &[u8]) -> [u32; 256] {
        let mut hist = [0u32; 256];
        for &b in data {
            hist[b as usize] += 1;
        }
        hist
    }

    fn roundtrip(data: &[u8]) {
        let hist = histogram_of(data);
        let encoder = HuffmanEncoder::build(&hist).unwrap();
        let header = encoder.write_header().unwrap();
        let (table, consumed) = read_huffman_table(&header).unwrap();
        assert_eq!(consumed, header.len());
        assert_eq!(table.weights(), encoder.weights());

        let stream = encoder.encode_stream(data);
        let mut out = Vec::new();
        HuffmanDecoder::new(&table)
            .decode_stream(&stream, data.len(), &mut out)
            .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_single_symbol_returns_none() {
        let hist = histogram_of(&[7; 100]);
        assert!(HuffmanEncoder::build(&hist).is_none());
    }

    #[test]
    fn test_two_symbols() {
        roundtrip(b"abababababbbbbbbbbbaaaa");
    }

    #[test]
    fn test_text_roundtrip() {
        roundtrip(b"the quick brown fox jumps over the lazy dog, again and again and again");
    }

    #[test]
    fn test_all_bytes_roundtrip() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 256) as u8).collect();
        roundtrip(&data);
    }

    #[test]
    fn test_skewed_distribution_limited() {
        // Fibonacci-like counts would need very long codes without limiting.
        let mut data = Vec::new();
        let mut count = 1usize;
        let mut prev = 1usize;
        for symbol in 0..20u8 {
            data.extend(std::iter::repeat(symbol).take(count));
            let next = count + prev;
            prev = count;
            count = next;
        }
        let encoder = HuffmanEncoder::build(&histogram_of(&data)).unwrap();
        assert!(encoder.max_bits() <= HUFFMAN_MAX_BITS);
        roundtrip(&data);
    }

    #[test]
    fn test_code_lengths_complete() {
        let freqs = [5u64, 9, 12, 13, 16, 45];
        let lengths = huffman_code_lengths(&freqs);
        let kraft: f64 = lengths.iter().map(|&l| 0.5f64.powi(l as i32)).sum();
        assert!((kraft - 1.0).abs() < 1e-12);
        assert_eq!(lengths[5], 1);
    }

    #[test]
    fn test_limit_keeps_kraft_exact() {
        let freqs: Vec<u64> = (0..40).map(|i| 1u64 << (i % 30)).collect();
        let mut lengths = huffman_code_lengths(&freqs);
        limit_code_lengths(&mut lengths, &freqs, 11);
        assert!(lengths.iter().all(|&l| (1..=11).contains(&l)));
        let kraft: u64 = lengths.iter().map(|&l| 1u64 << (11 - l)).sum();
        assert_eq!(kraft, 1 << 11);
    }

    #[test]
    fn test_uniform_full_alphabet_has_header() {
        let data: Vec<u8> = (0..=255u8).cycle().take(256 * 8).collect();
        let encoder = HuffmanEncoder::build(&histogram_of(&data)).unwrap();
        assert!(encoder.write_header().is_some());
        roundtrip(&data);
    }

    #[test]
    fn test_covers_and_cost() {
        let hist = histogram_of(b"aabbbbcc");
        let encoder = HuffmanEncoder::build(&hist).unwrap();
        assert!(encoder.covers(&hist));
        assert!(!encoder.covers(&histogram_of(b"z")));
        // b gets 1 bit, a and c 2 bits: 2*2 + 4*1 + 2*2.
        assert_eq!(encoder.encoded_bits(&hist), 12);
    }

    #[test]
    fn test_four_streams_roundtrip() {
        let data: Vec<u8> = (0..1000u32).map(|i| b"abcdefgh"[(i * i % 8) as usize]).collect();
        let encoder = HuffmanEncoder::build(&histogram_of(&data)).unwrap();
        let (table, _) = read_huffman_table(&encoder.write_header().unwrap()).unwrap();
        let encoded = encoder.encode_four_streams(&data).unwrap();
        let mut out = Vec::new();
        HuffmanDecoder::new(&table)
            .decode_four_streams(&encoded, data.len(), &mut out)
            .unwrap();
        assert_eq!(out, data);
    }
}
