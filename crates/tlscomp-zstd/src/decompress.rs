//! Frame decoding pipeline.
//!
//! Decoding is a small state machine over one reader spanning the whole
//! input, so every error offset is already absolute:
//!
//! ```text
//! FrameHeader ──skippable magic──> SkippableFrame ──> FrameHeader
//!      │
//!      └──> Block ──(last block)──> Checksum? ──> FrameDone ──> FrameHeader
//! ```
//!
//! Per-frame state (window, Huffman/FSE tables, repeat offsets) is created
//! at each frame header, seeded from the dictionary when one applies.

use crate::block::{decode_compressed_block, decode_raw_block, decode_rle_block, EntropyState};
use crate::bytes::ByteReader;
use crate::dictionary::ZstdDictionary;
use crate::frame::{
    block_maximum_size, content_checksum, is_skippable_magic, BlockHeader, BlockType,
    FrameHeader, ZSTD_MAGIC,
};
use crate::window::Window;
use tlscomp_core::{Error, Result};
use tracing::{debug, trace};

/// Default cap on the window a frame may declare (128 MiB).
pub const DEFAULT_MAX_WINDOW_SIZE: u64 = 128 << 20;

/// Resource limits applied while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderLimits {
    /// Frames declaring a larger window (or single-segment content size)
    /// are rejected.
    pub max_window_size: u64,
}

impl Default for DecoderLimits {
    fn default() -> Self {
        Self {
            max_window_size: DEFAULT_MAX_WINDOW_SIZE,
        }
    }
}

impl DecoderLimits {
    pub fn with_max_window_size(mut self, max_window_size: u64) -> Self {
        self.max_window_size = max_window_size;
        self
    }
}

/// State carried across the blocks of one frame.
#[derive(Debug)]
struct FrameSession {
    header: FrameHeader,
    /// Output length when the frame started.
    content_start: usize,
    block_max: usize,
    window: Window,
    entropy: EntropyState,
}

#[derive(Debug)]
enum DecodeState {
    FrameHeader,
    SkippableFrame,
    Block(FrameSession),
    Checksum(FrameSession),
    FrameDone(FrameSession),
}

/// Drives the decode state machine over an input buffer.
#[derive(Debug)]
pub struct FrameDecoder<'a> {
    dictionary: Option<&'a ZstdDictionary>,
    limits: DecoderLimits,
}

impl<'a> FrameDecoder<'a> {
    pub fn new(dictionary: Option<&'a ZstdDictionary>, limits: DecoderLimits) -> Self {
        Self { dictionary, limits }
    }

    /// Decode every frame in `input`, appending content to `output`.
    pub fn decode_all(&self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        if input.is_empty() {
            return Err(Error::unexpected_end(0));
        }
        let mut reader = ByteReader::new(input);
        while !reader.is_empty() {
            self.decode_next(&mut reader, output)?;
        }
        Ok(())
    }

    /// Decode the frame at the reader's position.
    ///
    /// A skippable frame is consumed and contributes nothing.
    pub fn decode_next(&self, reader: &mut ByteReader<'_>, output: &mut Vec<u8>) -> Result<()> {
        let mut state = DecodeState::FrameHeader;
        loop {
            state = match state {
                DecodeState::FrameHeader => self.read_frame_header(reader, output.len())?,
                DecodeState::SkippableFrame => {
                    let size = reader.read_u32_le()? as usize;
                    trace!(size, "skipping skippable frame");
                    reader.skip(size)?;
                    return Ok(());
                }
                DecodeState::Block(mut session) => {
                    if self.decode_block(reader, &mut session, output)? {
                        if session.header.has_checksum {
                            DecodeState::Checksum(session)
                        } else {
                            DecodeState::FrameDone(session)
                        }
                    } else {
                        DecodeState::Block(session)
                    }
                }
                DecodeState::Checksum(session) => {
                    let offset = reader.position();
                    let expected = reader.read_u32_le()?;
                    let actual = content_checksum(&output[session.content_start..]);
                    if expected != actual {
                        return Err(Error::ChecksumMismatch {
                            expected,
                            actual,
                            offset,
                        });
                    }
                    DecodeState::FrameDone(session)
                }
                DecodeState::FrameDone(session) => {
                    let produced = (output.len() - session.content_start) as u64;
                    if let Some(expected) = session.header.content_size {
                        if produced != expected {
                            return Err(Error::corrupted(
                                format!("frame ended after {produced} of {expected} declared bytes"),
                                reader.position(),
                            ));
                        }
                    }
                    debug!(produced, "frame decoded");
                    return Ok(());
                }
            };
        }
    }

    fn read_frame_header(&self, reader: &mut ByteReader<'_>, content_start: usize) -> Result<DecodeState> {
        let frame_start = reader.position();
        let magic = reader.read_u32_le()?;
        if is_skippable_magic(magic) {
            return Ok(DecodeState::SkippableFrame);
        }
        if magic != ZSTD_MAGIC {
            return Err(Error::InvalidMagic {
                magic,
                offset: frame_start,
            });
        }

        let header = FrameHeader::parse(reader)?;
        debug!(
            window_size = header.window_size,
            content_size = ?header.content_size,
            dictionary_id = header.dictionary_id,
            checksum = header.has_checksum,
            "frame header"
        );
        if header.window_size > self.limits.max_window_size {
            return Err(Error::frame_header(
                format!(
                    "window of {} bytes exceeds limit of {}",
                    header.window_size, self.limits.max_window_size
                ),
                frame_start,
            ));
        }

        let dictionary = match (header.dictionary_id, self.dictionary) {
            (0, dict) => dict,
            (id, Some(dict)) if dict.id() == id => Some(dict),
            (id, dict) => {
                return Err(Error::DictionaryMismatch {
                    expected: id,
                    provided: dict.map(ZstdDictionary::id),
                    offset: frame_start,
                })
            }
        };

        let window_size = header.window_size as usize;
        let (window, entropy) = match dictionary {
            Some(dict) => (
                Window::with_dictionary(window_size, dict.content()),
                dict.entropy_state(),
            ),
            None => (Window::new(window_size), EntropyState::default()),
        };

        Ok(DecodeState::Block(FrameSession {
            header,
            content_start,
            block_max: block_maximum_size(header.window_size),
            window,
            entropy,
        }))
    }

    /// Decode one block; returns whether it was the last.
    fn decode_block(
        &self,
        reader: &mut ByteReader<'_>,
        session: &mut FrameSession,
        output: &mut Vec<u8>,
    ) -> Result<bool> {
        let block_start = reader.position();
        let header = BlockHeader::parse(reader)?;
        trace!(
            block_type = ?header.block_type,
            size = header.block_size,
            last = header.last_block,
            "block header"
        );

        if header.block_type == BlockType::Reserved {
            return Err(Error::UnknownBlockType {
                block_type: header.block_type.field(),
                offset: block_start,
            });
        }
        if header.block_size > session.block_max {
            return Err(Error::BlockSize {
                size: header.block_size,
                limit: session.block_max,
                offset: block_start,
            });
        }

        let produced = output.len() - session.content_start;
        if let Some(limit) = session.header.content_size {
            let incoming = match header.block_type {
                BlockType::Compressed => 0,
                _ => header.block_size,
            };
            if (produced + incoming) as u64 > limit {
                return Err(Error::BlockSize {
                    size: produced + incoming,
                    limit: limit as usize,
                    offset: block_start,
                });
            }
        }

        let payload_start = reader.position();
        match header.block_type {
            BlockType::Raw => {
                let payload = reader.read_bytes(header.block_size)?;
                decode_raw_block(payload, &mut session.window, output);
            }
            BlockType::Rle => {
                let byte = reader.read_u8()?;
                decode_rle_block(byte, header.block_size, &mut session.window, output);
            }
            BlockType::Compressed => {
                let payload = reader.read_bytes(header.block_size)?;
                decode_compressed_block(
                    payload,
                    session.block_max,
                    &mut session.entropy,
                    &mut session.window,
                    output,
                )
                .map_err(|e| e.at_offset(payload_start))?;

                let produced = output.len() - session.content_start;
                if let Some(limit) = session.header.content_size {
                    if produced as u64 > limit {
                        return Err(Error::BlockSize {
                            size: produced,
                            limit: limit as usize,
                            offset: block_start,
                        });
                    }
                }
            }
            BlockType::Reserved => unreachable!("reserved blocks rejected above"),
        }
        Ok(header.last_block)
    }
}

/// Decode all frames in `input`.
pub fn decompress_frames(
    input: &[u8],
    dictionary: Option<&ZstdDictionary>,
    limits: DecoderLimits,
) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    FrameDecoder::new(dictionary, limits).decode_all(input, &mut output)?;
    Ok(output)
}

/// Decode the first frame of `input`; returns its content and the number
/// of input bytes it occupied.
pub fn decompress_first_frame(
    input: &[u8],
    dictionary: Option<&ZstdDictionary>,
    limits: DecoderLimits,
) -> Result<(Vec<u8>, usize)> {
    let mut output = Vec::new();
    let mut reader = ByteReader::new(input);
    FrameDecoder::new(dictionary, limits).decode_next(&mut reader, &mut output)?;
    Ok((output, reader.position()))
}
