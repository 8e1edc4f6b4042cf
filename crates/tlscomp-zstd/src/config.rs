//! Encoder configuration.

use std::sync::Arc;

use crate::dictionary::ZstdDictionary;
use crate::frame::{MAX_BLOCK_SIZE, MIN_WINDOW_SIZE};
use tlscomp_core::{CompressionLevel, Error, Result};

/// Smallest accepted window log (1 KiB).
pub const MIN_WINDOW_LOG: u8 = 10;

/// Largest accepted window log (128 MiB).
pub const MAX_WINDOW_LOG: u8 = 27;

/// Default window log (512 KiB).
pub const DEFAULT_WINDOW_LOG: u8 = 19;

/// Compression settings.
///
/// # Example
///
/// ```rust
/// use tlscomp_zstd::ZstdConfig;
/// use tlscomp_core::CompressionLevel;
///
/// let config = ZstdConfig::default()
///     .with_level(CompressionLevel::Best)
///     .with_checksum(true)
///     .with_window_log(16);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ZstdConfig {
    level: CompressionLevel,
    checksum: bool,
    window_log: u8,
    max_block_size: usize,
    content_size: bool,
    dictionary: Option<Arc<ZstdDictionary>>,
}

impl Default for ZstdConfig {
    fn default() -> Self {
        Self {
            level: CompressionLevel::Default,
            checksum: false,
            window_log: DEFAULT_WINDOW_LOG,
            max_block_size: MAX_BLOCK_SIZE,
            content_size: true,
            dictionary: None,
        }
    }
}

impl ZstdConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }

    /// Append the XXH64-derived content checksum to each frame.
    pub fn with_checksum(mut self, checksum: bool) -> Self {
        self.checksum = checksum;
        self
    }

    /// Window size as a power of two (10..=27).
    pub fn with_window_log(mut self, window_log: u8) -> Self {
        self.window_log = window_log;
        self
    }

    /// Largest block the encoder emits (at most 128 KiB).
    pub fn with_max_block_size(mut self, max_block_size: usize) -> Self {
        self.max_block_size = max_block_size;
        self
    }

    /// Record the content size in the frame header.
    pub fn with_content_size(mut self, content_size: bool) -> Self {
        self.content_size = content_size;
        self
    }

    pub fn with_dictionary(mut self, dictionary: Arc<ZstdDictionary>) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    pub fn level(&self) -> CompressionLevel {
        self.level
    }

    pub fn checksum(&self) -> bool {
        self.checksum
    }

    pub fn window_log(&self) -> u8 {
        self.window_log
    }

    pub fn window_size(&self) -> u64 {
        1u64 << self.window_log
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    pub fn content_size(&self) -> bool {
        self.content_size
    }

    pub fn dictionary(&self) -> Option<&ZstdDictionary> {
        self.dictionary.as_deref()
    }

    /// Reject out-of-range settings.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_WINDOW_LOG..=MAX_WINDOW_LOG).contains(&self.window_log) {
            return Err(Error::config(format!(
                "window log {} outside {MIN_WINDOW_LOG}..={MAX_WINDOW_LOG}",
                self.window_log
            )));
        }
        if !(MIN_WINDOW_SIZE..=MAX_BLOCK_SIZE).contains(&self.max_block_size) {
            return Err(Error::config(format!(
                "block size {} outside {MIN_WINDOW_SIZE}..={MAX_BLOCK_SIZE}",
                self.max_block_size
            )));
        }
        if let CompressionLevel::Custom(level) = self.level {
            if level < 0 {
                return Err(Error::config(format!("negative compression level {level}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlscomp_core::ErrorKind;

    #[test]
    fn test_defaults_are_valid() {
        let config = ZstdConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_size(), 512 * 1024);
        assert_eq!(config.max_block_size(), 128 * 1024);
        assert!(!config.checksum());
        assert!(config.content_size());
    }

    #[test]
    fn test_window_log_range() {
        for log in [9u8, 28] {
            let err = ZstdConfig::default().with_window_log(log).validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        }
        assert!(ZstdConfig::default().with_window_log(27).validate().is_ok());
    }

    #[test]
    fn test_block_size_range() {
        let too_big = ZstdConfig::default().with_max_block_size(MAX_BLOCK_SIZE + 1);
        assert!(too_big.validate().is_err());
        let too_small = ZstdConfig::default().with_max_block_size(100);
        assert!(too_small.validate().is_err());
    }

    #[test]
    fn test_negative_custom_level() {
        let config = ZstdConfig::default().with_level(CompressionLevel::Custom(-1));
        assert!(config.validate().is_err());
    }
}
