//! Core type definitions for compression operations.

/// Compression level presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionLevel {
    /// No match search beyond the cheapest lookup (fastest).
    None,

    /// Optimized for speed over ratio (level 1-3).
    Fast,

    /// Balanced speed and ratio (level 4-6, default).
    #[default]
    Default,

    /// Optimized for ratio over speed (level 7-9).
    Best,

    /// Maximum search effort, slowest (level 10+).
    Ultra,

    /// Custom level (algorithm-specific range).
    Custom(i32),
}

impl CompressionLevel {
    /// Convert to numeric level for algorithms.
    pub fn to_level(self) -> i32 {
        match self {
            CompressionLevel::None => 0,
            CompressionLevel::Fast => 1,
            CompressionLevel::Default => 6,
            CompressionLevel::Best => 9,
            CompressionLevel::Ultra => 12,
            CompressionLevel::Custom(level) => level,
        }
    }

    /// Create from numeric level.
    pub fn from_level(level: i32) -> Self {
        match level {
            0 => CompressionLevel::None,
            1..=3 => CompressionLevel::Fast,
            4..=6 => CompressionLevel::Default,
            7..=9 => CompressionLevel::Best,
            10.. => CompressionLevel::Ultra,
            _ => CompressionLevel::Custom(level),
        }
    }
}

/// Compression algorithms known to the TLS certificate-compression layer.
///
/// This is a closed set: callers pick a variant at the call site rather than
/// looking an implementation up by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Zstandard (RFC 8878).
    Zstd,
    /// Brotli (RFC 7932). Provided by an external collaborator.
    Brotli,
    /// Identity transform.
    None,
}

impl Algorithm {
    /// Get algorithm name as string.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Zstd => "zstd",
            Algorithm::Brotli => "brotli",
            Algorithm::None => "none",
        }
    }

    /// Code point in the TLS `CertificateCompressionAlgorithm` registry (RFC 8879).
    pub fn tls_code_point(self) -> Option<u16> {
        match self {
            Algorithm::Brotli => Some(2),
            Algorithm::Zstd => Some(3),
            Algorithm::None => None,
        }
    }

    /// Map a TLS code point back to an algorithm.
    pub fn from_tls_code_point(code: u16) -> Option<Self> {
        match code {
            2 => Some(Algorithm::Brotli),
            3 => Some(Algorithm::Zstd),
            _ => None,
        }
    }

    /// Check if algorithm supports dictionaries.
    pub fn supports_dictionary(self) -> bool {
        matches!(self, Algorithm::Zstd | Algorithm::Brotli)
    }
}

/// Compression ratio metrics.
#[derive(Debug, Clone, Copy)]
pub struct CompressionRatio {
    /// Original uncompressed size in bytes.
    pub original_size: usize,
    /// Compressed size in bytes.
    pub compressed_size: usize,
}

impl CompressionRatio {
    /// Create new ratio from sizes.
    pub fn new(original: usize, compressed: usize) -> Self {
        CompressionRatio {
            original_size: original,
            compressed_size: compressed,
        }
    }

    /// Calculate ratio (original / compressed). Higher is better.
    pub fn ratio(&self) -> f64 {
        if self.compressed_size == 0 {
            return 0.0;
        }
        self.original_size as f64 / self.compressed_size as f64
    }

    /// Calculate space savings as percentage (0-100).
    pub fn savings_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (1.0 - (self.compressed_size as f64 / self.original_size as f64)) * 100.0
    }

    /// Check if compression was effective (saved space).
    pub fn is_effective(&self) -> bool {
        self.compressed_size < self.original_size
    }
}
