//! Content checksum.
//!
//! A frame with the checksum flag set ends with the low 32 bits of the
//! XXH64 (seed 0) of the decoded content, little-endian.

use xxhash_rust::xxh64::xxh64;

/// Low 32 bits of XXH64 over `data`.
pub fn content_checksum(data: &[u8]) -> u32 {
    xxh64(data, 0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_known_value() {
        // XXH64("", 0) = 0xEF46DB3751D8E999
        assert_eq!(content_checksum(b""), 0x51D8_E999);
    }

    #[test]
    fn test_single_byte_flip_changes_checksum() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();
        let mut flipped = data.clone();
        flipped[500] ^= 0x01;
        assert_ne!(content_checksum(&data), content_checksum(&flipped));
    }
}
