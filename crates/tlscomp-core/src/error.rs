//! Error types for compression operations.
//!
//! Every decode-side variant records the byte offset in the caller's input
//! where the problem was detected. Parsers that only see a sub-slice report
//! offsets relative to that slice; the layer above rebases them with
//! [`Error::at_offset`] so the final error always points into the original
//! buffer.

use thiserror::Error;

/// Result type alias for compression operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Compression error types.
#[derive(Debug, Error)]
pub enum Error {
    /// Frame magic number is neither a Zstd nor a skippable-frame magic.
    #[error("invalid magic number 0x{magic:08x} at offset {offset}")]
    InvalidMagic { magic: u32, offset: usize },

    /// Reserved descriptor bits set, truncated header, or malformed size fields.
    #[error("invalid frame header at offset {offset}: {message}")]
    InvalidFrameHeader { message: String, offset: usize },

    /// Block exceeds the maximum block size, window, or declared content size.
    #[error("block size {size} exceeds limit {limit} at offset {offset}")]
    BlockSize {
        size: usize,
        limit: usize,
        offset: usize,
    },

    /// Reserved block type (3).
    #[error("unknown block type {block_type} at offset {offset}")]
    UnknownBlockType { block_type: u8, offset: usize },

    /// Huffman weights violate the Kraft sum or exceed the maximum code length.
    #[error("invalid Huffman table at offset {offset}: {message}")]
    HuffmanTable { message: String, offset: usize },

    /// FSE normalized counts are malformed or the accuracy log is out of range.
    #[error("invalid FSE table at offset {offset}: {message}")]
    FseTable { message: String, offset: usize },

    /// Repeat/treeless mode used without a previous table or dictionary seed.
    #[error("repeat mode requested for {table} with no previous table at offset {offset}")]
    RepeatModeUnavailable { table: &'static str, offset: usize },

    /// Match references bytes before the start of the history.
    #[error("match offset {match_offset} exceeds history of {history} bytes at offset {offset}")]
    OffsetOutOfRange {
        match_offset: usize,
        history: usize,
        offset: usize,
    },

    /// Input or bitstream exhausted before the expected content was decoded.
    #[error("unexpected end of stream at offset {offset}")]
    UnexpectedEndOfStream { offset: usize },

    /// Content checksum does not match the decoded data.
    #[error("checksum mismatch at offset {offset}: expected 0x{expected:08x}, got 0x{actual:08x}")]
    ChecksumMismatch {
        expected: u32,
        actual: u32,
        offset: usize,
    },

    /// Frame names a dictionary that was not supplied (or a different one was).
    #[error("dictionary mismatch at offset {offset}: frame requires id {expected}, provided {provided:?}")]
    DictionaryMismatch {
        expected: u32,
        provided: Option<u32>,
        offset: usize,
    },

    /// Dictionary bytes could not be parsed.
    #[error("invalid dictionary: {0}")]
    InvalidDictionary(String),

    /// Structurally inconsistent data not covered by a more specific variant.
    #[error("corrupted data at offset {offset}: {message}")]
    CorruptedData { message: String, offset: usize },

    /// Buffer too small for output.
    #[error("buffer too small: need {required} bytes, got {provided}")]
    BufferTooSmall { required: usize, provided: usize },

    /// Encoder configuration out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unsupported feature or algorithm.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Fieldless mirror of [`Error`] for matching on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidMagic,
    InvalidFrameHeader,
    BlockSize,
    UnknownBlockType,
    HuffmanTable,
    FseTable,
    RepeatModeUnavailable,
    OffsetOutOfRange,
    UnexpectedEndOfStream,
    ChecksumMismatch,
    DictionaryMismatch,
    InvalidDictionary,
    CorruptedData,
    BufferTooSmall,
    InvalidConfig,
    Unsupported,
}

impl Error {
    /// Create a corrupted data error.
    pub fn corrupted(message: impl Into<String>, offset: usize) -> Self {
        Error::CorruptedData {
            message: message.into(),
            offset,
        }
    }

    /// Create an invalid frame header error.
    pub fn frame_header(message: impl Into<String>, offset: usize) -> Self {
        Error::InvalidFrameHeader {
            message: message.into(),
            offset,
        }
    }

    /// Create a Huffman table error.
    pub fn huffman(message: impl Into<String>, offset: usize) -> Self {
        Error::HuffmanTable {
            message: message.into(),
            offset,
        }
    }

    /// Create an FSE table error.
    pub fn fse(message: impl Into<String>, offset: usize) -> Self {
        Error::FseTable {
            message: message.into(),
            offset,
        }
    }

    /// Create an unexpected end-of-stream error.
    pub fn unexpected_end(offset: usize) -> Self {
        Error::UnexpectedEndOfStream { offset }
    }

    /// Create a buffer too small error.
    pub fn buffer_too_small(required: usize, provided: usize) -> Self {
        Error::BufferTooSmall { required, provided }
    }

    /// Create an invalid configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::InvalidConfig(message.into())
    }

    /// Shift the recorded offset by `base`.
    ///
    /// Used when an error bubbles out of a parser that was handed a
    /// sub-slice starting `base` bytes into the enclosing buffer.
    pub fn at_offset(mut self, base: usize) -> Self {
        if let Some(offset) = self.offset_mut() {
            *offset += base;
        }
        self
    }

    fn offset_mut(&mut self) -> Option<&mut usize> {
        match self {
            Error::InvalidMagic { offset, .. }
            | Error::InvalidFrameHeader { offset, .. }
            | Error::BlockSize { offset, .. }
            | Error::UnknownBlockType { offset, .. }
            | Error::HuffmanTable { offset, .. }
            | Error::FseTable { offset, .. }
            | Error::RepeatModeUnavailable { offset, .. }
            | Error::OffsetOutOfRange { offset, .. }
            | Error::UnexpectedEndOfStream { offset }
            | Error::ChecksumMismatch { offset, .. }
            | Error::DictionaryMismatch { offset, .. }
            | Error::CorruptedData { offset, .. } => Some(offset),
            Error::InvalidDictionary(_)
            | Error::BufferTooSmall { .. }
            | Error::InvalidConfig(_)
            | Error::Unsupported(_) => None,
        }
    }

    /// Byte offset in the input where the error was detected, if any.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::InvalidMagic { offset, .. }
            | Error::InvalidFrameHeader { offset, .. }
            | Error::BlockSize { offset, .. }
            | Error::UnknownBlockType { offset, .. }
            | Error::HuffmanTable { offset, .. }
            | Error::FseTable { offset, .. }
            | Error::RepeatModeUnavailable { offset, .. }
            | Error::OffsetOutOfRange { offset, .. }
            | Error::UnexpectedEndOfStream { offset }
            | Error::ChecksumMismatch { offset, .. }
            | Error::DictionaryMismatch { offset, .. }
            | Error::CorruptedData { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidMagic { .. } => ErrorKind::InvalidMagic,
            Error::InvalidFrameHeader { .. } => ErrorKind::InvalidFrameHeader,
            Error::BlockSize { .. } => ErrorKind::BlockSize,
            Error::UnknownBlockType { .. } => ErrorKind::UnknownBlockType,
            Error::HuffmanTable { .. } => ErrorKind::HuffmanTable,
            Error::FseTable { .. } => ErrorKind::FseTable,
            Error::RepeatModeUnavailable { .. } => ErrorKind::RepeatModeUnavailable,
            Error::OffsetOutOfRange { .. } => ErrorKind::OffsetOutOfRange,
            Error::UnexpectedEndOfStream { .. } => ErrorKind::UnexpectedEndOfStream,
            Error::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Error::DictionaryMismatch { .. } => ErrorKind::DictionaryMismatch,
            Error::InvalidDictionary(_) => ErrorKind::InvalidDictionary,
            Error::CorruptedData { .. } => ErrorKind::CorruptedData,
            Error::BufferTooSmall { .. } => ErrorKind::BufferTooSmall,
            Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Error::Unsupported(_) => ErrorKind::Unsupported,
        }
    }

    /// Get error category for metrics.
    pub fn category(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidMagic => "invalid_magic",
            ErrorKind::InvalidFrameHeader => "invalid_frame_header",
            ErrorKind::BlockSize => "block_size",
            ErrorKind::UnknownBlockType => "unknown_block_type",
            ErrorKind::HuffmanTable => "huffman_table",
            ErrorKind::FseTable => "fse_table",
            ErrorKind::RepeatModeUnavailable => "repeat_mode_unavailable",
            ErrorKind::OffsetOutOfRange => "offset_out_of_range",
            ErrorKind::UnexpectedEndOfStream => "unexpected_end_of_stream",
            ErrorKind::ChecksumMismatch => "checksum_mismatch",
            ErrorKind::DictionaryMismatch => "dictionary_mismatch",
            ErrorKind::InvalidDictionary => "invalid_dictionary",
            ErrorKind::CorruptedData => "corrupted_data",
            ErrorKind::BufferTooSmall => "buffer_too_small",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::Unsupported => "unsupported",
        }
    }
}
