//! # tlscomp
//!
//! Certificate-chain compression for TLS (RFC 8879).
//!
//! The algorithm set is closed: [`Algorithm::Zstd`] is implemented natively
//! by `tlscomp-zstd`, [`Algorithm::None`] is the identity transform, and
//! [`Algorithm::Brotli`] belongs to an external collaborator and reports
//! [`Error::Unsupported`] here.
//!
//! ## Quick Start
//!
//! ```rust
//! use tlscomp::{compress, decompress, Algorithm};
//!
//! let chain = b"-----BEGIN CERTIFICATE-----".repeat(8);
//! let compressed = compress(&chain, Algorithm::Zstd).unwrap();
//! assert_eq!(decompress(&compressed, Algorithm::Zstd).unwrap(), chain);
//! ```

pub use tlscomp_core::{
    Algorithm, Codec, CompressionLevel, CompressionRatio, Compressor, Decompressor, Error,
    ErrorKind, Result,
};

pub use tlscomp_zstd::{
    read_frame_info, write_skippable_frame, DecoderLimits, FrameInfo, ZstdCodec, ZstdCompressor,
    ZstdConfig, ZstdDecompressor, ZstdDictionary,
};

use tlscomp_zstd::frame::{is_skippable_magic, ZSTD_MAGIC};
use tracing::debug;

/// A codec for one member of the closed algorithm set.
#[derive(Debug, Clone)]
pub enum CertificateCodec {
    Zstd(ZstdCodec),
    Brotli(CompressionLevel),
    Identity,
}

impl CertificateCodec {
    pub fn new(algorithm: Algorithm) -> Self {
        Self::with_level(algorithm, CompressionLevel::Default)
    }

    pub fn with_level(algorithm: Algorithm, level: CompressionLevel) -> Self {
        match algorithm {
            Algorithm::Zstd => CertificateCodec::Zstd(ZstdCodec::with_level(level)),
            Algorithm::Brotli => CertificateCodec::Brotli(level),
            Algorithm::None => CertificateCodec::Identity,
        }
    }

    /// Zstd codec with full configuration, e.g. a shared dictionary.
    pub fn zstd(config: ZstdConfig) -> Self {
        CertificateCodec::Zstd(ZstdCodec::with_config(config))
    }

    fn unsupported(&self) -> Error {
        Error::Unsupported(format!(
            "{} is provided by an external codec",
            Compressor::algorithm(self).name()
        ))
    }
}

impl Compressor for CertificateCodec {
    fn algorithm(&self) -> Algorithm {
        match self {
            CertificateCodec::Zstd(_) => Algorithm::Zstd,
            CertificateCodec::Brotli(_) => Algorithm::Brotli,
            CertificateCodec::Identity => Algorithm::None,
        }
    }

    fn level(&self) -> CompressionLevel {
        match self {
            CertificateCodec::Zstd(codec) => Compressor::level(codec),
            CertificateCodec::Brotli(level) => *level,
            CertificateCodec::Identity => CompressionLevel::None,
        }
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            CertificateCodec::Zstd(codec) => codec.compress(input),
            CertificateCodec::Brotli(_) => Err(self.unsupported()),
            CertificateCodec::Identity => Ok(input.to_vec()),
        }
    }

    fn max_compressed_size(&self, input_len: usize) -> usize {
        match self {
            CertificateCodec::Zstd(codec) => codec.max_compressed_size(input_len),
            CertificateCodec::Brotli(_) | CertificateCodec::Identity => input_len,
        }
    }
}

impl Decompressor for CertificateCodec {
    fn algorithm(&self) -> Algorithm {
        Compressor::algorithm(self)
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            CertificateCodec::Zstd(codec) => codec.decompress(input),
            CertificateCodec::Brotli(_) => Err(self.unsupported()),
            CertificateCodec::Identity => Ok(input.to_vec()),
        }
    }
}

/// Compress data using the specified algorithm.
pub fn compress(data: &[u8], algorithm: Algorithm) -> Result<Vec<u8>> {
    compress_with_level(data, algorithm, CompressionLevel::Default)
}

/// Compress data using the specified algorithm and level.
pub fn compress_with_level(
    data: &[u8],
    algorithm: Algorithm,
    level: CompressionLevel,
) -> Result<Vec<u8>> {
    CertificateCodec::with_level(algorithm, level).compress(data)
}

/// Decompress data using the specified algorithm.
pub fn decompress(data: &[u8], algorithm: Algorithm) -> Result<Vec<u8>> {
    CertificateCodec::new(algorithm).decompress(data)
}

/// Decompress a certificate message body whose uncompressed length was
/// announced by the peer; any other length is rejected.
pub fn decompress_certificate(
    data: &[u8],
    algorithm: Algorithm,
    uncompressed_length: usize,
) -> Result<Vec<u8>> {
    let output = decompress(data, algorithm)?;
    if output.len() != uncompressed_length {
        debug!(
            algorithm = algorithm.name(),
            announced = uncompressed_length,
            actual = output.len(),
            "certificate length mismatch"
        );
        return Err(Error::corrupted(
            format!(
                "decompressed {} bytes, peer announced {uncompressed_length}",
                output.len()
            ),
            data.len(),
        ));
    }
    Ok(output)
}

/// Auto-detect algorithm from compressed data header.
///
/// Only Zstd frames (including skippable frames) carry a magic number.
pub fn detect_algorithm(data: &[u8]) -> Option<Algorithm> {
    let magic = u32::from_le_bytes(data.get(..4)?.try_into().ok()?);
    if magic == ZSTD_MAGIC || is_skippable_magic(magic) {
        Some(Algorithm::Zstd)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zstd_roundtrip() {
        let data = b"Hello, tlscomp! This is a test of Zstd compression.";
        let compressed = compress(data, Algorithm::Zstd).unwrap();
        let decompressed = decompress(&compressed, Algorithm::Zstd).unwrap();
        assert_eq!(decompressed.as_slice(), data);
    }

    #[test]
    fn test_identity_passthrough() {
        let data = b"uncompressed certificate";
        assert_eq!(compress(data, Algorithm::None).unwrap(), data);
        assert_eq!(decompress(data, Algorithm::None).unwrap(), data);
        assert_eq!(CertificateCodec::new(Algorithm::None).max_compressed_size(10), 10);
    }

    #[test]
    fn test_brotli_unsupported() {
        let err = compress(b"data", Algorithm::Brotli).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        let err = decompress(b"data", Algorithm::Brotli).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_detect_zstd() {
        let compressed = compress(b"Hello, tlscomp!", Algorithm::Zstd).unwrap();
        assert_eq!(detect_algorithm(&compressed), Some(Algorithm::Zstd));
        assert_eq!(detect_algorithm(b"plain"), None);
        assert_eq!(detect_algorithm(b"ab"), None);
    }

    #[test]
    fn test_compression_levels() {
        let data = b"Test data for compression level testing with some extra content.";
        for level in [
            CompressionLevel::Fast,
            CompressionLevel::Default,
            CompressionLevel::Best,
        ] {
            let compressed = compress_with_level(data, Algorithm::Zstd, level).unwrap();
            let decompressed = decompress(&compressed, Algorithm::Zstd).unwrap();
            assert_eq!(decompressed.as_slice(), data);
        }
    }

    #[test]
    fn test_announced_length_enforced() {
        let data = b"certificate chain bytes".repeat(4);
        let compressed = compress(&data, Algorithm::Zstd).unwrap();
        assert_eq!(
            decompress_certificate(&compressed, Algorithm::Zstd, data.len()).unwrap(),
            data
        );
        let err = decompress_certificate(&compressed, Algorithm::Zstd, data.len() + 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptedData);
    }

    #[test]
    fn test_codec_reports_algorithm() {
        for algorithm in [Algorithm::Zstd, Algorithm::Brotli, Algorithm::None] {
            let codec = CertificateCodec::new(algorithm);
            assert_eq!(Compressor::algorithm(&codec), algorithm);
            assert_eq!(Decompressor::algorithm(&codec), algorithm);
        }
    }
}
