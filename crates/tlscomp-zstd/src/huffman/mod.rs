//! Huffman coding for Zstandard literals.
//!
//! ## Overview
//!
//! Zstd uses canonical Huffman codes described only by per-symbol weights.
//! The tree description is either:
//! - FSE-compressed (first byte < 128 is the compressed size)
//! - Direct 4-bit weights (first byte >= 128, at most 128 weights)
//!
//! Literal streams are read backward like every other Zstd entropy payload.
//! Regenerated sizes of 256 bytes or more are split across four streams.
//!
//! ## References
//!
//! - [RFC 8878 Section 4.2](https://datatracker.ietf.org/doc/html/rfc8878#section-4.2)

mod decoder;
mod encoder;
mod table;

pub use decoder::{parse_huffman_weights, read_huffman_table, HuffmanDecoder};
pub use encoder::{HuffmanCode, HuffmanEncoder};
pub use table::{complete_weights, HuffmanTable, HuffmanTableEntry};

/// Maximum number of symbols in a Huffman table (0-255 for literals).
pub const HUFFMAN_MAX_SYMBOLS: usize = 256;

/// Largest weight symbol accepted from an FSE-compressed description.
pub const HUFFMAN_MAX_WEIGHT: u8 = 12;

/// Maximum number of bits for a Huffman code.
pub const HUFFMAN_MAX_BITS: u8 = 11;

/// Maximum accuracy log of the FSE table that compresses weights.
pub const HUFFMAN_WEIGHT_MAX_LOG: u8 = 6;
