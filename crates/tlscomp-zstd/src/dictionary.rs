//! Zstandard dictionaries.
//!
//! ## Dictionary Format
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ Magic: 0xEC30A437 (4 bytes)                                     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Dictionary ID (4 bytes)                                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Huffman tree description (literals)                             │
//! │ FSE table: offsets, match lengths, literal lengths              │
//! │ Repeat offsets (3 x 4 bytes)                                    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Content (history primed before the first block)                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Buffers that do not start with the magic are raw-content dictionaries:
//! the whole buffer is history and the entropy state starts from defaults.
//! Dictionaries are immutable once built and are shared through `Arc`.

use crate::block::{EntropyState, RepeatOffsets, SequenceChannel};
use crate::bytes::{ByteReader, ByteWriter};
use crate::fse::FseTable;
use crate::huffman::{read_huffman_table, HuffmanEncoder, HuffmanTable};
use tlscomp_core::{Error, Result};
use tracing::debug;
use xxhash_rust::xxh64::xxh64;

/// Zstd dictionary magic number.
pub const DICT_MAGIC: u32 = 0xEC30A437;

/// Minimum dictionary content size.
pub const MIN_DICT_SIZE: usize = 8;

/// Lowest ID handed out to raw-content dictionaries.
const DERIVED_ID_BASE: u64 = 32768;

/// Entropy tables of a formatted dictionary.
#[derive(Debug, Clone)]
pub struct DictionaryTables {
    huffman: HuffmanTable,
    offsets: FseTable,
    match_lengths: FseTable,
    literal_lengths: FseTable,
    repeat_offsets: RepeatOffsets,
    /// Serialized section between the ID and the content.
    encoded: Vec<u8>,
}

impl DictionaryTables {
    pub fn huffman(&self) -> &HuffmanTable {
        &self.huffman
    }

    pub fn table(&self, channel: SequenceChannel) -> &FseTable {
        match channel {
            SequenceChannel::LiteralLength => &self.literal_lengths,
            SequenceChannel::Offset => &self.offsets,
            SequenceChannel::MatchLength => &self.match_lengths,
        }
    }

    pub fn repeat_offsets(&self) -> RepeatOffsets {
        self.repeat_offsets
    }
}

/// A Zstandard dictionary.
#[derive(Debug, Clone)]
pub struct ZstdDictionary {
    id: u32,
    content: Vec<u8>,
    tables: Option<DictionaryTables>,
}

impl ZstdDictionary {
    /// Raw-content dictionary with an ID derived from the content hash.
    pub fn from_content(content: Vec<u8>) -> Result<Self> {
        if content.len() < MIN_DICT_SIZE {
            return Err(Error::InvalidDictionary(format!(
                "content of {} bytes is below the {MIN_DICT_SIZE}-byte minimum",
                content.len()
            )));
        }
        let id = Self::derive_id(&content);
        debug!(id, size = content.len(), "raw-content dictionary");
        Ok(Self {
            id,
            content,
            tables: None,
        })
    }

    /// Formatted dictionary whose literal table is fitted to `content` and
    /// whose sequence tables are the predefined distributions.
    pub fn build(id: u32, content: Vec<u8>) -> Result<Self> {
        if id == 0 {
            return Err(Error::InvalidDictionary("dictionary ID 0 is reserved".into()));
        }
        if content.len() < MIN_DICT_SIZE {
            return Err(Error::InvalidDictionary(format!(
                "content of {} bytes is below the {MIN_DICT_SIZE}-byte minimum",
                content.len()
            )));
        }

        let mut histogram = [0u32; 256];
        for &b in &content {
            histogram[b as usize] += 1;
        }
        // Every byte gets a code so later inputs can use treeless literals.
        let mut smoothed = histogram;
        for count in smoothed.iter_mut() {
            *count += 1;
        }
        let (encoder, tree) = [smoothed, histogram]
            .iter()
            .filter_map(|h| {
                let encoder = HuffmanEncoder::build(h)?;
                let tree = encoder.write_header()?;
                Some((encoder, tree))
            })
            .next()
            .ok_or_else(|| {
                Error::InvalidDictionary("content does not yield a literal table".into())
            })?;
        let huffman = HuffmanTable::from_weights(encoder.weights())?;

        let offsets = SequenceChannel::Offset.default_table().clone();
        let match_lengths = SequenceChannel::MatchLength.default_table().clone();
        let literal_lengths = SequenceChannel::LiteralLength.default_table().clone();
        let repeat_offsets = RepeatOffsets::default();

        let mut writer = ByteWriter::new();
        writer.write_bytes(&tree);
        writer.write_bytes(&offsets.write_header());
        writer.write_bytes(&match_lengths.write_header());
        writer.write_bytes(&literal_lengths.write_header());
        for offset in repeat_offsets.offsets() {
            writer.write_u32_le(offset);
        }

        debug!(id, size = content.len(), "built formatted dictionary");
        Ok(Self {
            id,
            content,
            tables: Some(DictionaryTables {
                huffman,
                offsets,
                match_lengths,
                literal_lengths,
                repeat_offsets,
                encoded: writer.into_inner(),
            }),
        })
    }

    /// Parse a formatted dictionary, or treat the bytes as raw content.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 8 || ByteReader::new(data).peek_u32_le()? != DICT_MAGIC {
            return Self::from_content(data.to_vec());
        }

        let invalid = |e: Error| Error::InvalidDictionary(e.to_string());
        let mut reader = ByteReader::new(data);
        reader.skip(4)?;
        let id = reader.read_u32_le()?;
        if id == 0 {
            return Err(Error::InvalidDictionary("dictionary ID 0 is reserved".into()));
        }

        let section_start = reader.position();
        let (huffman, consumed) = read_huffman_table(reader.rest()).map_err(invalid)?;
        reader.skip(consumed)?;

        let fse = |channel: SequenceChannel, reader: &mut ByteReader<'_>| {
            let (table, consumed) =
                FseTable::parse(reader.rest(), channel.max_log(), channel.max_symbol())
                    .map_err(invalid)?;
            reader.skip(consumed)?;
            Ok::<_, Error>(table)
        };
        let offsets = fse(SequenceChannel::Offset, &mut reader)?;
        let match_lengths = fse(SequenceChannel::MatchLength, &mut reader)?;
        let literal_lengths = fse(SequenceChannel::LiteralLength, &mut reader)?;

        let mut reps = [0u32; 3];
        for rep in reps.iter_mut() {
            *rep = reader.read_u32_le().map_err(invalid)?;
        }
        let section_end = reader.position();
        let content = reader.rest().to_vec();
        for rep in reps {
            if rep == 0 || rep as usize > content.len() {
                return Err(Error::InvalidDictionary(format!(
                    "repeat offset {rep} outside {} content bytes",
                    content.len()
                )));
            }
        }

        debug!(id, size = content.len(), "parsed formatted dictionary");
        Ok(Self {
            id,
            content,
            tables: Some(DictionaryTables {
                huffman,
                offsets,
                match_lengths,
                literal_lengths,
                repeat_offsets: RepeatOffsets::new(reps),
                encoded: data[section_start..section_end].to_vec(),
            }),
        })
    }

    /// Serialize; raw-content dictionaries serialize to their content.
    pub fn to_bytes(&self) -> Vec<u8> {
        match &self.tables {
            None => self.content.clone(),
            Some(tables) => {
                let mut writer =
                    ByteWriter::with_capacity(8 + tables.encoded.len() + self.content.len());
                writer.write_u32_le(DICT_MAGIC);
                writer.write_u32_le(self.id);
                writer.write_bytes(&tables.encoded);
                writer.write_bytes(&self.content);
                writer.into_inner()
            }
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// ID written into frame headers. Raw-content dictionaries are not
    /// announced, matching the reference encoder.
    pub fn frame_id(&self) -> u32 {
        match self.tables {
            Some(_) => self.id,
            None => 0,
        }
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }

    pub fn tables(&self) -> Option<&DictionaryTables> {
        self.tables.as_ref()
    }

    /// Decoder state at the start of a frame using this dictionary.
    pub fn entropy_state(&self) -> EntropyState {
        match &self.tables {
            None => EntropyState::default(),
            Some(t) => EntropyState {
                huffman: Some(t.huffman.clone()),
                literal_lengths: Some(t.literal_lengths.clone()),
                offsets: Some(t.offsets.clone()),
                match_lengths: Some(t.match_lengths.clone()),
                repeat_offsets: t.repeat_offsets,
            },
        }
    }

    fn derive_id(content: &[u8]) -> u32 {
        let span = (1u64 << 31) - DERIVED_ID_BASE;
        ((xxh64(content, 0) % span) + DERIVED_ID_BASE) as u32
    }
}
