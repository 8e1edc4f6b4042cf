//! Zstd block decoding.
//!
//! ## Block Structure
//!
//! A compressed block contains:
//! 1. Literals Section - raw, RLE or Huffman-coded literal bytes
//! 2. Sequences Section - LZ77 commands (literal length, offset, match length)
//!
//! Executing the sequences interleaves literal runs with window copies.
//! Huffman and FSE tables plus the repeat offsets persist across the blocks
//! of a frame in an [`EntropyState`].
//!
//! ## References
//!
//! - [RFC 8878 Section 3.1.1](https://datatracker.ietf.org/doc/html/rfc8878#section-3.1.1)

mod literals;
mod sequences;

pub use literals::{decode_literals, LiteralsBlockType, LiteralsHeader};
pub use sequences::{
    decode_sequences, literal_length_code, match_length_code, offset_code, RepeatOffsets,
    Sequence, SequenceChannel, SequenceMode, SequencesHeader, LITERAL_LENGTH_BASELINE,
    MATCH_LENGTH_BASELINE, MAX_SEQUENCE_COUNT, MIN_MATCH_LENGTH,
};

use crate::fse::FseTable;
use crate::huffman::HuffmanTable;
use crate::window::Window;
use tlscomp_core::{Error, Result};

/// Decoding tables and offset history carried from block to block.
#[derive(Debug, Clone, Default)]
pub struct EntropyState {
    pub huffman: Option<HuffmanTable>,
    pub literal_lengths: Option<FseTable>,
    pub offsets: Option<FseTable>,
    pub match_lengths: Option<FseTable>,
    pub repeat_offsets: RepeatOffsets,
}

impl EntropyState {
    pub fn table_mut(&mut self, channel: SequenceChannel) -> &mut Option<FseTable> {
        match channel {
            SequenceChannel::LiteralLength => &mut self.literal_lengths,
            SequenceChannel::Offset => &mut self.offsets,
            SequenceChannel::MatchLength => &mut self.match_lengths,
        }
    }
}

/// Copy a raw block into the window and output.
pub fn decode_raw_block(payload: &[u8], window: &mut Window, output: &mut Vec<u8>) {
    window.append(payload);
    output.extend_from_slice(payload);
}

/// Expand an RLE block.
pub fn decode_rle_block(byte: u8, size: usize, window: &mut Window, output: &mut Vec<u8>) {
    let start = output.len();
    output.resize(start + size, byte);
    window.append(&output[start..]);
}

/// Decode a compressed block of at most `block_max` regenerated bytes.
///
/// Error offsets are relative to the start of `payload`.
pub fn decode_compressed_block(
    payload: &[u8],
    block_max: usize,
    state: &mut EntropyState,
    window: &mut Window,
    output: &mut Vec<u8>,
) -> Result<()> {
    let mut literals = Vec::new();
    let consumed = decode_literals(payload, block_max, &mut state.huffman, &mut literals)?;
    let sequences =
        decode_sequences(&payload[consumed..], state).map_err(|e| e.at_offset(consumed))?;

    let regenerated = literals.len() as u64
        + sequences
            .iter()
            .map(|s| s.match_length as u64)
            .sum::<u64>();
    if regenerated > block_max as u64 {
        return Err(Error::BlockSize {
            size: regenerated as usize,
            limit: block_max,
            offset: 0,
        });
    }

    execute_sequences(&literals, &sequences, window, output).map_err(|e| e.at_offset(consumed))
}

/// Interleave literal runs and matches; trailing literals follow the last
/// sequence.
fn execute_sequences(
    literals: &[u8],
    sequences: &[Sequence],
    window: &mut Window,
    output: &mut Vec<u8>,
) -> Result<()> {
    let mut pos = 0;
    for seq in sequences {
        let end = pos + seq.literal_length as usize;
        let run = literals.get(pos..end).ok_or_else(|| {
            Error::corrupted(
                format!(
                    "literal length {} exceeds {} remaining literals",
                    seq.literal_length,
                    literals.len() - pos
                ),
                0,
            )
        })?;
        window.append(run);
        output.extend_from_slice(run);
        pos = end;

        window.copy_match(seq.offset as usize, seq.match_length as usize, output)?;
    }

    let rest = &literals[pos..];
    window.append(rest);
    output.extend_from_slice(rest);
    Ok(())
}
