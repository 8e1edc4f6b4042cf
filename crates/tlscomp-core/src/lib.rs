//! # tlscomp core
//!
//! Shared error taxonomy, algorithm selection, and codec traits for the
//! certificate-compression codecs.
//!
//! ## Core Traits
//!
//! - [`Compressor`] - One-shot compression operations
//! - [`Decompressor`] - One-shot decompression operations
//! - [`Codec`] - Combined compress/decompress capability
//!
//! ## Example
//!
//! ```ignore
//! use tlscomp_core::{Codec, CompressionLevel};
//! use tlscomp_zstd::ZstdCodec;
//!
//! let codec = ZstdCodec::with_level(CompressionLevel::Fast);
//! let compressed = codec.compress(data)?;
//! let original = codec.decompress(&compressed)?;
//! ```

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use traits::{Codec, Compressor, Decompressor};
pub use types::{Algorithm, CompressionLevel, CompressionRatio};
