//! Literals section.
//!
//! ```text
//! Raw / RLE header (1-3 bytes, little-endian):
//!   bits 0-1  Literals_Block_Type
//!   bits 2-3  Size_Format (x0: 5-bit size, 01: 12-bit, 11: 20-bit)
//!   rest      Regenerated_Size
//!
//! Compressed / Treeless header (3-5 bytes, little-endian):
//!   bits 0-1  Literals_Block_Type
//!   bits 2-3  Size_Format (00: 1 stream, 01/10/11: 4 streams)
//!   N bits    Regenerated_Size
//!   N bits    Compressed_Size   (N = 10, 10, 14, 18)
//! ```

use crate::bytes::ByteWriter;
use crate::huffman::{read_huffman_table, HuffmanDecoder, HuffmanTable};
use tlscomp_core::{Error, Result};
use tracing::trace;

/// Literals block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralsBlockType {
    /// Uncompressed bytes.
    Raw,
    /// One byte repeated.
    Rle,
    /// Huffman-coded with a fresh tree description.
    Compressed,
    /// Huffman-coded with the previous block's tree.
    Treeless,
}

impl LiteralsBlockType {
    pub fn from_field(field: u8) -> Self {
        match field & 0x03 {
            0 => LiteralsBlockType::Raw,
            1 => LiteralsBlockType::Rle,
            2 => LiteralsBlockType::Compressed,
            _ => LiteralsBlockType::Treeless,
        }
    }

    pub fn field(self) -> u8 {
        match self {
            LiteralsBlockType::Raw => 0,
            LiteralsBlockType::Rle => 1,
            LiteralsBlockType::Compressed => 2,
            LiteralsBlockType::Treeless => 3,
        }
    }

    fn is_huffman(self) -> bool {
        matches!(
            self,
            LiteralsBlockType::Compressed | LiteralsBlockType::Treeless
        )
    }
}

/// Parsed literals section header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralsHeader {
    pub block_type: LiteralsBlockType,
    pub regenerated_size: usize,
    /// Payload size after the header (Huffman types only; 0 otherwise).
    pub compressed_size: usize,
    pub four_streams: bool,
}

impl LiteralsHeader {
    pub fn raw(size: usize) -> Self {
        Self {
            block_type: LiteralsBlockType::Raw,
            regenerated_size: size,
            compressed_size: 0,
            four_streams: false,
        }
    }

    pub fn rle(size: usize) -> Self {
        Self {
            block_type: LiteralsBlockType::Rle,
            ..Self::raw(size)
        }
    }

    pub fn huffman(
        block_type: LiteralsBlockType,
        regenerated_size: usize,
        compressed_size: usize,
        four_streams: bool,
    ) -> Self {
        Self {
            block_type,
            regenerated_size,
            compressed_size,
            four_streams,
        }
    }

    /// Parse the header; returns it and its length in bytes.
    pub fn parse(data: &[u8]) -> Result<(Self, usize)> {
        let first = *data.first().ok_or_else(|| Error::unexpected_end(0))?;
        let block_type = LiteralsBlockType::from_field(first);
        let size_format = (first >> 2) & 0x03;

        let header_len = match (block_type.is_huffman(), size_format) {
            (false, 0) | (false, 2) => 1,
            (false, 1) => 2,
            (false, _) => 3,
            (true, 0) | (true, 1) => 3,
            (true, 2) => 4,
            (true, _) => 5,
        };
        let bytes = data
            .get(..header_len)
            .ok_or_else(|| Error::unexpected_end(data.len()))?;
        let raw = bytes
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64);

        let header = if block_type.is_huffman() {
            let bits = match size_format {
                0 | 1 => 10,
                2 => 14,
                _ => 18,
            };
            let mask = (1u64 << bits) - 1;
            Self {
                block_type,
                regenerated_size: ((raw >> 4) & mask) as usize,
                compressed_size: ((raw >> (4 + bits)) & mask) as usize,
                four_streams: size_format != 0,
            }
        } else {
            let regenerated_size = match header_len {
                1 => (raw >> 3) as usize,
                _ => (raw >> 4) as usize,
            };
            Self {
                block_type,
                regenerated_size,
                compressed_size: 0,
                four_streams: false,
            }
        };
        Ok((header, header_len))
    }

    /// Serialize with the smallest size format that fits.
    pub fn write(&self, writer: &mut ByteWriter) {
        let ty = self.block_type.field() as u64;
        if !self.block_type.is_huffman() {
            let size = self.regenerated_size as u64;
            if size < 32 {
                writer.write_u8((ty | (size << 3)) as u8);
            } else if size < 4096 {
                writer.write_uint_le(ty | (1 << 2) | (size << 4), 2);
            } else {
                writer.write_uint_le(ty | (3 << 2) | (size << 4), 3);
            }
            return;
        }

        let largest = self.regenerated_size.max(self.compressed_size);
        let (size_format, bits, len) = if !self.four_streams {
            (0u64, 10, 3)
        } else if largest < 1 << 10 {
            (1, 10, 3)
        } else if largest < 1 << 14 {
            (2, 14, 4)
        } else {
            (3, 18, 5)
        };
        let raw = ty
            | (size_format << 2)
            | ((self.regenerated_size as u64) << 4)
            | ((self.compressed_size as u64) << (4 + bits));
        writer.write_uint_le(raw, len);
    }
}

/// Decode a literals section into `out`, returning the bytes consumed.
///
/// A `Compressed` section replaces `huffman` with its new table; a
/// `Treeless` section decodes with the table already there.
pub fn decode_literals(
    data: &[u8],
    max_size: usize,
    huffman: &mut Option<HuffmanTable>,
    out: &mut Vec<u8>,
) -> Result<usize> {
    let (header, header_len) = LiteralsHeader::parse(data)?;
    trace!(
        block_type = ?header.block_type,
        regenerated = header.regenerated_size,
        compressed = header.compressed_size,
        "literals section"
    );
    if header.regenerated_size > max_size {
        return Err(Error::BlockSize {
            size: header.regenerated_size,
            limit: max_size,
            offset: 0,
        });
    }

    match header.block_type {
        LiteralsBlockType::Raw => {
            let end = header_len + header.regenerated_size;
            let bytes = data
                .get(header_len..end)
                .ok_or_else(|| Error::unexpected_end(data.len()))?;
            out.extend_from_slice(bytes);
            Ok(end)
        }
        LiteralsBlockType::Rle => {
            let byte = *data
                .get(header_len)
                .ok_or_else(|| Error::unexpected_end(data.len()))?;
            out.resize(out.len() + header.regenerated_size, byte);
            Ok(header_len + 1)
        }
        LiteralsBlockType::Compressed | LiteralsBlockType::Treeless => {
            let end = header_len + header.compressed_size;
            let payload = data
                .get(header_len..end)
                .ok_or_else(|| Error::unexpected_end(data.len()))?;

            let tree_len = if header.block_type == LiteralsBlockType::Compressed {
                let (table, consumed) =
                    read_huffman_table(payload).map_err(|e| e.at_offset(header_len))?;
                *huffman = Some(table);
                consumed
            } else {
                0
            };
            let table = huffman.as_ref().ok_or(Error::RepeatModeUnavailable {
                table: "literals",
                offset: 0,
            })?;

            let streams = &payload[tree_len..];
            let decoder = HuffmanDecoder::new(table);
            let base = header_len + tree_len;
            if header.four_streams {
                decoder.decode_four_streams(streams, header.regenerated_size, out)
            } else {
                decoder.decode_stream(streams, header.regenerated_size, out)
            }
            .map_err(|e| e.at_offset(base))?;
            Ok(end)
        }
    }
}
