//! Zstd compression pipeline.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Input Data (after any dictionary content)
//!     │
//!     ▼
//! ┌─────────────────────────────────────┐
//! │  Block Split                        │
//! │  - max_block_size chunks            │
//! │  - uniform chunk → RLE block        │
//! └─────────────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────────────┐
//! │  Match Finding (LZ77)               │
//! │  - repeat offsets tried first      │
//! │  - hash chains, depth by level      │
//! └─────────────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────────────┐
//! │  Entropy Coding                     │
//! │  - Literals: Raw/RLE/Huff/Treeless  │
//! │  - Sequences: per-channel FSE modes │
//! │  - RAW fallback when not smaller    │
//! └─────────────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────────────┐
//! │  Frame Assembly                     │
//! │  - header, blocks, checksum         │
//! └─────────────────────────────────────┘
//! ```
//!
//! Entropy tables and repeat offsets carry over from block to block in an
//! [`EncoderState`] that mirrors what the decoder will hold. A block that
//! falls back to RAW leaves the state untouched, exactly as the decoder
//! never sees its tables.

mod literals;
mod match_finder;
mod sequences;

pub use literals::encode_literals;
pub use match_finder::{search_depth, Match, MatchFinder, ParsedBlock, MAX_MATCH, MIN_MATCH};
pub use sequences::{encode_sequences, ChannelTable};

use std::sync::Arc;

use crate::block::{RepeatOffsets, SequenceChannel};
use crate::bytes::ByteWriter;
use crate::config::ZstdConfig;
use crate::dictionary::ZstdDictionary;
use crate::frame::{block_maximum_size, content_checksum, BlockHeader, BlockType, FrameHeader};
use crate::huffman::HuffmanEncoder;
use tlscomp_core::Result;
use tracing::{debug, trace};

/// Entropy state the decoder will hold after the blocks emitted so far.
#[derive(Debug, Clone, Default)]
pub struct EncoderState {
    /// Last transmitted literals tree.
    pub huffman: Option<HuffmanEncoder>,
    /// Last FSE-described table per channel (LL, OF, ML).
    pub tables: [Option<Arc<ChannelTable>>; 3],
    pub repeat_offsets: RepeatOffsets,
}

impl EncoderState {
    /// State seeded from a dictionary's entropy tables, if it has any.
    pub fn for_dictionary(dictionary: Option<&ZstdDictionary>) -> Result<Self> {
        let Some(tables) = dictionary.and_then(ZstdDictionary::tables) else {
            return Ok(Self::default());
        };
        let mut seeded = [None, None, None];
        for (slot, channel) in seeded.iter_mut().zip(SequenceChannel::ALL) {
            *slot = Some(Arc::new(ChannelTable::new(tables.table(channel).clone())?));
        }
        Ok(Self {
            huffman: Some(HuffmanEncoder::from_table(tables.huffman())?),
            tables: seeded,
            repeat_offsets: tables.repeat_offsets(),
        })
    }
}

/// Encode a parsed block's literals and sequences sections.
pub fn encode_compressed_block(parsed: &ParsedBlock, state: &mut EncoderState) -> Result<Vec<u8>> {
    let literals = encode_literals(&parsed.literals, &mut state.huffman);
    let sequences = encode_sequences(&parsed.sequences, state)?;
    let mut payload = literals;
    payload.extend_from_slice(&sequences);
    Ok(payload)
}

/// Frame-level encoder: owns the history buffer, match finder and state.
struct FrameEncoder {
    /// Dictionary content followed by the input.
    history: Vec<u8>,
    /// Index of the first input byte in `history`.
    base: usize,
    finder: MatchFinder,
    state: EncoderState,
}

impl FrameEncoder {
    fn new(config: &ZstdConfig, input: &[u8], max_offset: usize) -> Result<Self> {
        let dictionary = config.dictionary();
        let prefix = dictionary.map_or(&[][..], ZstdDictionary::content);
        let mut history = Vec::with_capacity(prefix.len() + input.len());
        history.extend_from_slice(prefix);
        history.extend_from_slice(input);

        let mut finder = MatchFinder::new(config.level(), max_offset);
        finder.insert_range(&history, 0, prefix.len());

        Ok(Self {
            history,
            base: prefix.len(),
            finder,
            state: EncoderState::for_dictionary(dictionary)?,
        })
    }

    /// Emit one block covering input bytes `start..end`.
    fn encode_block(&mut self, start: usize, end: usize, last: bool, out: &mut ByteWriter) -> Result<()> {
        let (start, end) = (self.base + start, self.base + end);
        let block = &self.history[start..end];

        if block.len() > 1 && block.iter().all(|&b| b == block[0]) {
            trace!(size = block.len(), "rle block");
            BlockHeader {
                last_block: last,
                block_type: BlockType::Rle,
                block_size: block.len(),
            }
            .write(out);
            out.write_u8(block[0]);
            self.finder.insert_range(&self.history, start, end);
            return Ok(());
        }

        let parsed = self
            .finder
            .parse_block(&self.history, start, end, self.state.repeat_offsets);
        let mut trial = self.state.clone();
        let payload = encode_compressed_block(&parsed, &mut trial)?;
        let block = &self.history[start..end];

        if payload.len() < block.len() {
            trace!(
                size = block.len(),
                compressed = payload.len(),
                sequences = parsed.sequences.len(),
                "compressed block"
            );
            BlockHeader {
                last_block: last,
                block_type: BlockType::Compressed,
                block_size: payload.len(),
            }
            .write(out);
            out.write_bytes(&payload);
            self.state = trial;
        } else {
            trace!(size = block.len(), "raw block");
            BlockHeader {
                last_block: last,
                block_type: BlockType::Raw,
                block_size: block.len(),
            }
            .write(out);
            out.write_bytes(block);
        }
        Ok(())
    }
}

/// Compress `input` into a single frame.
pub fn compress_frame(input: &[u8], config: &ZstdConfig) -> Result<Vec<u8>> {
    config.validate()?;
    let dictionary = config.dictionary();

    // Dictionary frames keep a full window so the dictionary stays in reach.
    let single_segment = config.content_size()
        && dictionary.is_none()
        && input.len() as u64 <= config.window_size();
    let header = FrameHeader {
        window_size: if single_segment {
            input.len() as u64
        } else {
            config.window_size()
        },
        single_segment,
        dictionary_id: dictionary.map_or(0, ZstdDictionary::frame_id),
        content_size: config.content_size().then_some(input.len() as u64),
        has_checksum: config.checksum(),
    };
    let block_size = config
        .max_block_size()
        .min(block_maximum_size(header.window_size))
        .max(1);
    debug!(
        input = input.len(),
        window_size = header.window_size,
        single_segment,
        dictionary_id = header.dictionary_id,
        block_size,
        "compressing frame"
    );

    let mut out = ByteWriter::with_capacity(input.len() / 2 + 32);
    header.write(&mut out);

    let mut encoder = FrameEncoder::new(config, input, header.window_size as usize)?;
    let mut pos = 0;
    loop {
        let end = (pos + block_size).min(input.len());
        let last = end == input.len();
        encoder.encode_block(pos, end, last, &mut out)?;
        pos = end;
        if last {
            break;
        }
    }

    if config.checksum() {
        out.write_u32_le(content_checksum(input));
    }
    Ok(out.into_inner())
}
