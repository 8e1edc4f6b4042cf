//! # tlscomp Zstd
//!
//! Native Rust implementation of Zstandard (RFC 8878) for TLS certificate
//! compression (RFC 8879, algorithm code point 3).
//!
//! Output is a standard Zstd frame that the reference library decodes, and
//! frames produced by the reference library decode here, including
//! formatted and raw-content dictionaries.
//!
//! ## Quick Start
//!
//! ```rust
//! use tlscomp_zstd::{ZstdCodec, ZstdCompressor, ZstdConfig};
//! use tlscomp_core::{CompressionLevel, Compressor, Decompressor};
//!
//! let codec = ZstdCodec::new();
//! let compressed = codec.compress(b"Hello, World!").unwrap();
//! let original = codec.decompress(&compressed).unwrap();
//! assert_eq!(original, b"Hello, World!");
//!
//! let compressor = ZstdCompressor::with_config(
//!     ZstdConfig::default()
//!         .with_level(CompressionLevel::Best)
//!         .with_checksum(true),
//! );
//! let compressed = compressor.compress(b"test data").unwrap();
//! assert_eq!(tlscomp_zstd::decompress(&compressed).unwrap(), b"test data");
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      tlscomp-zstd                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  compress/          │  decompress.rs                        │
//! │  ├── match_finder   │  (frame state machine, limits)        │
//! │  ├── literals.rs    │                                       │
//! │  └── sequences.rs   │  dictionary.rs, config.rs             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  huffman/           │  fse/                                 │
//! │  ├── encoder.rs     │  ├── encoder.rs                       │
//! │  ├── decoder.rs     │  ├── decoder.rs                       │
//! │  └── table.rs       │  └── table.rs                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  frame/             │  block/                               │
//! │  ├── header.rs      │  ├── literals.rs                      │
//! │  ├── block.rs       │  └── sequences.rs                     │
//! │  └── checksum.rs    │  window.rs, bits.rs, bytes.rs         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Errors
//!
//! Every decode failure is terminal for the frame and carries the
//! absolute input offset where it was detected (see
//! [`tlscomp_core::Error::offset`]).

pub mod bits;
pub mod block;
pub mod bytes;
pub mod compress;
pub mod config;
pub mod decompress;
pub mod dictionary;
pub mod frame;
pub mod fse;
pub mod huffman;
pub mod window;

pub use config::ZstdConfig;
pub use decompress::{DecoderLimits, FrameDecoder};
pub use dictionary::ZstdDictionary;
pub use frame::{read_frame_info, write_skippable_frame, FrameInfo, ZSTD_MAGIC};

use std::sync::Arc;

use tlscomp_core::{Algorithm, Codec, CompressionLevel, Compressor, Decompressor, Result};

/// Compress `input` into one Zstd frame.
pub fn compress(input: &[u8], config: &ZstdConfig) -> Result<Vec<u8>> {
    compress::compress_frame(input, config)
}

/// Decompress every frame in `input`, skipping skippable frames.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    decompress::decompress_frames(input, None, DecoderLimits::default())
}

/// Decompress every frame in `input` with an optional dictionary.
pub fn decompress_with_dictionary(
    input: &[u8],
    dictionary: Option<&ZstdDictionary>,
) -> Result<Vec<u8>> {
    decompress::decompress_frames(input, dictionary, DecoderLimits::default())
}

/// Decompress only the first frame; returns content and bytes consumed.
pub fn decompress_frame(
    input: &[u8],
    dictionary: Option<&ZstdDictionary>,
) -> Result<(Vec<u8>, usize)> {
    decompress::decompress_first_frame(input, dictionary, DecoderLimits::default())
}

/// Zstandard compressor.
///
/// # Example
///
/// ```rust
/// use tlscomp_zstd::ZstdCompressor;
/// use tlscomp_core::{CompressionLevel, Compressor};
///
/// let compressor = ZstdCompressor::with_level(CompressionLevel::Fast);
/// let compressed = compressor.compress(b"Hello, World!").unwrap();
/// assert!(compressed.len() <= compressor.max_compressed_size(13));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ZstdCompressor {
    config: ZstdConfig,
}

impl ZstdCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(level: CompressionLevel) -> Self {
        Self::with_config(ZstdConfig::default().with_level(level))
    }

    pub fn with_config(config: ZstdConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ZstdConfig {
        &self.config
    }
}

impl Compressor for ZstdCompressor {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Zstd
    }

    fn level(&self) -> CompressionLevel {
        self.config.level()
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        compress(input, &self.config)
    }

    fn max_compressed_size(&self, input_len: usize) -> usize {
        // Zstd worst case: input + (input / 128) + 512
        input_len + (input_len >> 7) + 512
    }
}

/// Zstandard decompressor.
///
/// Holds an optional shared dictionary and the limits applied to every
/// frame.
#[derive(Debug, Clone, Default)]
pub struct ZstdDecompressor {
    dictionary: Option<Arc<ZstdDictionary>>,
    limits: DecoderLimits,
}

impl ZstdDecompressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dictionary(mut self, dictionary: Arc<ZstdDictionary>) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    pub fn with_limits(mut self, limits: DecoderLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn dictionary(&self) -> Option<&ZstdDictionary> {
        self.dictionary.as_deref()
    }

    pub fn limits(&self) -> DecoderLimits {
        self.limits
    }
}

impl Decompressor for ZstdDecompressor {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Zstd
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        decompress::decompress_frames(input, self.dictionary(), self.limits)
    }
}

/// Zstandard codec combining compression and decompression.
///
/// A dictionary set on the config is used in both directions.
#[derive(Debug, Clone, Default)]
pub struct ZstdCodec {
    config: ZstdConfig,
}

impl ZstdCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(level: CompressionLevel) -> Self {
        Self::with_config(ZstdConfig::default().with_level(level))
    }

    pub fn with_config(config: ZstdConfig) -> Self {
        Self { config }
    }
}

impl Compressor for ZstdCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Zstd
    }

    fn level(&self) -> CompressionLevel {
        self.config.level()
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        compress(input, &self.config)
    }

    fn max_compressed_size(&self, input_len: usize) -> usize {
        ZstdCompressor::new().max_compressed_size(input_len)
    }
}

impl Decompressor for ZstdCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Zstd
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        decompress_with_dictionary(input, self.config.dictionary())
    }
}

impl Codec for ZstdCodec {
    fn new() -> Self {
        ZstdCodec::new()
    }

    fn with_level(level: CompressionLevel) -> Self {
        ZstdCodec::with_level(level)
    }
}
