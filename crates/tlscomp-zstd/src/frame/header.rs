//! Frame header parsing and emission.
//!
//! Every field width is fixed by the descriptor byte, so the whole header
//! size is known before any block is read.

use crate::bytes::{ByteReader, ByteWriter};
use tlscomp_core::{Error, Result};

use super::ZSTD_MAGIC;

/// Frame header descriptor byte.
///
/// ```text
/// Bit 7-6: Frame_Content_Size_flag
/// Bit 5:   Single_Segment_flag
/// Bit 4:   Unused_bit
/// Bit 3:   Reserved_bit (must be 0)
/// Bit 2:   Content_Checksum_flag
/// Bit 1-0: Dictionary_ID_flag
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptor {
    raw: u8,
}

impl FrameDescriptor {
    /// Validate a descriptor byte. `offset` locates it for error reporting.
    pub fn new(byte: u8, offset: usize) -> Result<Self> {
        if byte & 0x08 != 0 {
            return Err(Error::frame_header(
                "reserved descriptor bit is set",
                offset,
            ));
        }
        Ok(Self { raw: byte })
    }

    pub fn raw(&self) -> u8 {
        self.raw
    }

    #[inline]
    pub fn frame_content_size_flag(&self) -> u8 {
        self.raw >> 6
    }

    /// Width of the Frame_Content_Size field.
    pub fn frame_content_size_bytes(&self) -> usize {
        match self.frame_content_size_flag() {
            0 if self.single_segment_flag() => 1,
            0 => 0,
            1 => 2,
            2 => 4,
            _ => 8,
        }
    }

    #[inline]
    pub fn single_segment_flag(&self) -> bool {
        self.raw & 0x20 != 0
    }

    #[inline]
    pub fn content_checksum_flag(&self) -> bool {
        self.raw & 0x04 != 0
    }

    #[inline]
    pub fn dictionary_id_flag(&self) -> u8 {
        self.raw & 0x03
    }

    /// Width of the Dictionary_ID field.
    pub fn dictionary_id_bytes(&self) -> usize {
        match self.dictionary_id_flag() {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => 4,
        }
    }

    /// Total header size after the magic number.
    pub fn header_size(&self) -> usize {
        1 + (!self.single_segment_flag()) as usize
            + self.dictionary_id_bytes()
            + self.frame_content_size_bytes()
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Window size in bytes. Equals the content size for single-segment frames.
    pub window_size: u64,
    pub single_segment: bool,
    /// 0 when the frame does not name a dictionary.
    pub dictionary_id: u32,
    pub content_size: Option<u64>,
    pub has_checksum: bool,
}

impl FrameHeader {
    /// Parse the header that follows the magic number.
    ///
    /// Offsets in errors are relative to the reader's slice.
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        let descriptor_offset = reader.position();
        let descriptor = FrameDescriptor::new(reader.read_u8()?, descriptor_offset)?;

        let mut window_size = 0;
        if !descriptor.single_segment_flag() {
            window_size = decode_window_descriptor(reader.read_u8()?);
        }

        let dictionary_id = reader.read_uint_le(descriptor.dictionary_id_bytes())? as u32;

        let fcs_bytes = descriptor.frame_content_size_bytes();
        let content_size = match fcs_bytes {
            0 => None,
            2 => Some(reader.read_uint_le(2)? + 256),
            n => Some(reader.read_uint_le(n)?),
        };

        if descriptor.single_segment_flag() {
            // Single segment always carries a content size.
            window_size = content_size.unwrap_or(0);
        }

        Ok(Self {
            window_size,
            single_segment: descriptor.single_segment_flag(),
            dictionary_id,
            content_size,
            has_checksum: descriptor.content_checksum_flag(),
        })
    }

    /// Descriptor byte using the narrowest field widths for this header.
    pub fn descriptor(&self) -> u8 {
        let fcs_flag = match self.content_size {
            None => 0,
            Some(v) if self.single_segment && v < 256 => 0,
            Some(v) if (256..65_536 + 256).contains(&v) => 1,
            Some(v) if v <= u32::MAX as u64 => 2,
            Some(_) => 3,
        };
        let dict_flag = match self.dictionary_id {
            0 => 0,
            1..=0xFF => 1,
            0x100..=0xFFFF => 2,
            _ => 3,
        };
        (fcs_flag << 6)
            | ((self.single_segment as u8) << 5)
            | ((self.has_checksum as u8) << 2)
            | dict_flag
    }

    /// Emit magic number and header.
    ///
    /// A single-segment header must carry a content size.
    pub fn write(&self, writer: &mut ByteWriter) {
        debug_assert!(!self.single_segment || self.content_size.is_some());
        let descriptor = self.descriptor();
        let parsed = FrameDescriptor { raw: descriptor };

        writer.write_u32_le(ZSTD_MAGIC);
        writer.write_u8(descriptor);
        if !self.single_segment {
            writer.write_u8(encode_window_descriptor(self.window_size));
        }
        writer.write_uint_le(self.dictionary_id as u64, parsed.dictionary_id_bytes());
        if let Some(size) = self.content_size {
            match parsed.frame_content_size_bytes() {
                2 => writer.write_uint_le(size - 256, 2),
                n => writer.write_uint_le(size, n),
            }
        }
    }
}

/// Window size from the Window_Descriptor byte.
pub fn decode_window_descriptor(byte: u8) -> u64 {
    let exponent = (byte >> 3) as u32;
    let mantissa = (byte & 0x07) as u64;
    let base = 1u64 << (10 + exponent);
    base + (base / 8) * mantissa
}

/// Smallest Window_Descriptor covering `window_size` (at least 1 KiB).
pub fn encode_window_descriptor(window_size: u64) -> u8 {
    let window_size = window_size.max(1 << 10);
    let log = 63 - window_size.leading_zeros();
    let base = 1u64 << log;
    let step = base / 8;
    let mantissa = (window_size - base + step - 1) / step;
    if mantissa >= 8 {
        ((log + 1 - 10) as u8) << 3
    } else {
        (((log - 10) as u8) << 3) | mantissa as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlscomp_core::ErrorKind;

    fn roundtrip(header: FrameHeader) -> (Vec<u8>, FrameHeader) {
        let mut w = ByteWriter::new();
        header.write(&mut w);
        let bytes = w.into_inner();
        let mut r = ByteReader::new(&bytes[4..]);
        let parsed = FrameHeader::parse(&mut r).unwrap();
        assert!(r.is_empty());
        (bytes, parsed)
    }

    #[test]
    fn test_descriptor_flags() {
        let desc = FrameDescriptor::new(0b1110_0111, 0).unwrap();
        assert_eq!(desc.frame_content_size_flag(), 3);
        assert!(desc.single_segment_flag());
        assert!(desc.content_checksum_flag());
        assert_eq!(desc.dictionary_id_bytes(), 4);
        assert_eq!(desc.frame_content_size_bytes(), 8);
        assert_eq!(desc.header_size(), 1 + 4 + 8);
    }

    #[test]
    fn test_reserved_bit_rejected_with_offset() {
        let err = FrameDescriptor::new(0x08, 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFrameHeader);
        assert_eq!(err.offset(), Some(4));
    }

    #[test]
    fn test_single_segment_one_byte_size() {
        // Descriptor 0x20, FCS 3.
        let data = [0x20, 0x03];
        let header = FrameHeader::parse(&mut ByteReader::new(&data)).unwrap();
        assert!(header.single_segment);
        assert_eq!(header.content_size, Some(3));
        assert_eq!(header.window_size, 3);
    }

    #[test]
    fn test_two_byte_size_is_offset_by_256() {
        // FCS flag 1, single segment, value 0 -> 256.
        let data = [0x60, 0x00, 0x00];
        let header = FrameHeader::parse(&mut ByteReader::new(&data)).unwrap();
        assert_eq!(header.content_size, Some(256));
    }

    #[test]
    fn test_window_descriptor_decoding() {
        assert_eq!(decode_window_descriptor(0x00), 1024);
        // exponent 9, mantissa 0 -> 512 KiB
        assert_eq!(decode_window_descriptor(9 << 3), 512 * 1024);
        // exponent 0, mantissa 7 -> 1024 + 7 * 128
        assert_eq!(decode_window_descriptor(0x07), 1024 + 896);
    }

    #[test]
    fn test_window_descriptor_encoding() {
        assert_eq!(encode_window_descriptor(1 << 19), 9 << 3);
        assert_eq!(encode_window_descriptor(100), 0);
        let byte = encode_window_descriptor(1024 + 200);
        assert!(decode_window_descriptor(byte) >= 1224);
    }

    #[test]
    fn test_minimal_widths() {
        let (bytes, parsed) = roundtrip(FrameHeader {
            window_size: 3,
            single_segment: true,
            dictionary_id: 0,
            content_size: Some(3),
            has_checksum: true,
        });
        assert_eq!(bytes.len(), 4 + 2);
        assert_eq!(parsed.content_size, Some(3));
        assert!(parsed.has_checksum);

        let (bytes, parsed) = roundtrip(FrameHeader {
            window_size: 1 << 20,
            single_segment: false,
            dictionary_id: 0x1234,
            content_size: Some(70_000),
            has_checksum: false,
        });
        // magic, descriptor, window, 2-byte dict id, 4-byte fcs
        assert_eq!(bytes.len(), 4 + 1 + 1 + 2 + 4);
        assert_eq!(parsed.dictionary_id, 0x1234);
        assert_eq!(parsed.window_size, 1 << 20);
        assert_eq!(parsed.content_size, Some(70_000));
    }

    #[test]
    fn test_eight_byte_content_size() {
        let (_, parsed) = roundtrip(FrameHeader {
            window_size: 1 << 27,
            single_segment: false,
            dictionary_id: 0xDEAD_BEEF,
            content_size: Some(1 << 33),
            has_checksum: false,
        });
        assert_eq!(parsed.content_size, Some(1 << 33));
        assert_eq!(parsed.dictionary_id, 0xDEAD_BEEF);
    }

    #[test]
    fn test_truncated_header() {
        // Descriptor asks for a 4-byte dictionary id, only 2 present.
        let data = [0x23, 0x01, 0x02];
        let err = FrameHeader::parse(&mut ByteReader::new(&data)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEndOfStream);
    }
}
