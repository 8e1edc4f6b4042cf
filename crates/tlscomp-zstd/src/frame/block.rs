//! Block headers.
//!
//! ```text
//! 3 bytes, little-endian:
//!   Bit 0:     Last_Block
//!   Bits 1-2:  Block_Type
//!   Bits 3-23: Block_Size
//! ```

use crate::bytes::{ByteReader, ByteWriter};
use tlscomp_core::Result;

/// Block type field, decided once per header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// Uncompressed bytes; `size` bytes of payload.
    Raw,
    /// One byte repeated `size` times; 1 byte of payload.
    Rle,
    /// Literals and sequences sections; `size` bytes of payload.
    Compressed,
    /// Type 3. Never valid in a frame.
    Reserved,
}

impl BlockType {
    pub fn from_field(field: u8) -> Self {
        match field & 0x03 {
            0 => BlockType::Raw,
            1 => BlockType::Rle,
            2 => BlockType::Compressed,
            _ => BlockType::Reserved,
        }
    }

    pub fn field(self) -> u8 {
        match self {
            BlockType::Raw => 0,
            BlockType::Rle => 1,
            BlockType::Compressed => 2,
            BlockType::Reserved => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub last_block: bool,
    pub block_type: BlockType,
    /// Payload size for Raw/Compressed, regenerated size for RLE.
    pub block_size: usize,
}

impl BlockHeader {
    /// Block header size in bytes.
    pub const SIZE: usize = 3;

    /// Largest value the 21-bit size field can hold.
    pub const MAX_FIELD: usize = (1 << 21) - 1;

    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        let raw = reader.read_u24_le()?;
        Ok(Self {
            last_block: raw & 1 != 0,
            block_type: BlockType::from_field((raw >> 1) as u8),
            block_size: (raw >> 3) as usize,
        })
    }

    /// Number of payload bytes following the header.
    pub fn payload_size(&self) -> usize {
        match self.block_type {
            BlockType::Rle => 1,
            _ => self.block_size,
        }
    }

    pub fn write(&self, writer: &mut ByteWriter) {
        debug_assert!(self.block_size <= Self::MAX_FIELD);
        let raw = (self.last_block as u32)
            | ((self.block_type.field() as u32) << 1)
            | ((self.block_size as u32) << 3);
        writer.write_u24_le(raw);
    }
}
