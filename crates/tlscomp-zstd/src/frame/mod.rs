//! Zstandard frame format.
//!
//! ## Frame Structure
//!
//! ```text
//! +-------------------+
//! | Magic_Number      | 4 bytes (0xFD2FB528)
//! +-------------------+
//! | Frame_Header      | 2-14 bytes
//! +-------------------+
//! | Data_Block(s)     | variable
//! +-------------------+
//! | Content_Checksum  | 0-4 bytes (optional)
//! +-------------------+
//! ```
//!
//! Skippable frames use magics `0x184D2A50..=0x184D2A5F`, followed by a
//! 4-byte little-endian payload length and the payload itself.
//!
//! ## References
//!
//! - [RFC 8878 Section 3.1](https://datatracker.ietf.org/doc/html/rfc8878#section-3.1)

mod block;
mod checksum;
mod header;

pub use block::{BlockHeader, BlockType};
pub use checksum::content_checksum;
pub use header::{
    decode_window_descriptor, encode_window_descriptor, FrameDescriptor, FrameHeader,
};

use crate::bytes::{ByteReader, ByteWriter};
use tlscomp_core::{Error, Result};

/// Zstd magic number (little-endian: 0xFD2FB528).
pub const ZSTD_MAGIC: u32 = 0xFD2FB528;

/// Skippable frame magic range: 0x184D2A50 to 0x184D2A5F.
pub const SKIPPABLE_MAGIC_LOW: u32 = 0x184D2A50;
pub const SKIPPABLE_MAGIC_HIGH: u32 = 0x184D2A5F;

/// Upper bound on any block's decoded size and payload (128 KiB).
pub const MAX_BLOCK_SIZE: usize = 128 * 1024;

/// Smallest window a decoder must provide (1 KiB).
pub const MIN_WINDOW_SIZE: usize = 1 << 10;

#[inline]
pub fn is_skippable_magic(magic: u32) -> bool {
    (SKIPPABLE_MAGIC_LOW..=SKIPPABLE_MAGIC_HIGH).contains(&magic)
}

/// Block_Maximum_Size for a frame with this window.
pub fn block_maximum_size(window_size: u64) -> usize {
    window_size.min(MAX_BLOCK_SIZE as u64) as usize
}

/// Build a skippable frame carrying `payload`.
///
/// `nibble` selects one of the sixteen skippable magics (0..=15).
pub fn write_skippable_frame(nibble: u8, payload: &[u8]) -> Result<Vec<u8>> {
    if nibble > 0x0F {
        return Err(Error::config(format!(
            "skippable frame nibble {nibble} out of range 0..=15"
        )));
    }
    let len = u32::try_from(payload.len())
        .map_err(|_| Error::config("skippable frame payload exceeds 4 GiB"))?;
    let mut writer = ByteWriter::with_capacity(8 + payload.len());
    writer.write_u32_le(SKIPPABLE_MAGIC_LOW + nibble as u32);
    writer.write_u32_le(len);
    writer.write_bytes(payload);
    Ok(writer.into_inner())
}

/// What a frame header announces, without decoding any block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameInfo {
    Zstd {
        header: FrameHeader,
        /// Bytes taken by magic and header.
        header_len: usize,
    },
    Skippable {
        /// Low nibble of the magic.
        nibble: u8,
        payload_len: u32,
    },
}

impl FrameInfo {
    pub fn content_size(&self) -> Option<u64> {
        match self {
            FrameInfo::Zstd { header, .. } => header.content_size,
            FrameInfo::Skippable { .. } => Some(0),
        }
    }

    pub fn dictionary_id(&self) -> u32 {
        match self {
            FrameInfo::Zstd { header, .. } => header.dictionary_id,
            FrameInfo::Skippable { .. } => 0,
        }
    }
}

/// Parse the header of the first frame in `input`.
pub fn read_frame_info(input: &[u8]) -> Result<FrameInfo> {
    let mut reader = ByteReader::new(input);
    let magic = reader.read_u32_le()?;
    if magic == ZSTD_MAGIC {
        let header = FrameHeader::parse(&mut reader)?;
        Ok(FrameInfo::Zstd {
            header,
            header_len: reader.position(),
        })
    } else if is_skippable_magic(magic) {
        Ok(FrameInfo::Skippable {
            nibble: (magic & 0x0F) as u8,
            payload_len: reader.read_u32_le()?,
        })
    } else {
        Err(Error::InvalidMagic { magic, offset: 0 })
    }
}
