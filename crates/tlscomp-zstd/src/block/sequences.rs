//! Sequences section.
//!
//! Sequences are LZ77 commands `(literal_length, offset, match_length)`.
//! Each field is transmitted as an FSE-coded symbol plus extra bits; the
//! three FSE states share one backward bitstream.
//!
//! ## Repeat Offsets
//!
//! Offset values 1-3 refer to the three most recent offsets (initially
//! `[1, 4, 8]`). With a zero literal length the references shift by one
//! and value 3 means "most recent offset minus one".
//!
//! ## Symbol Compression Modes
//!
//! - Predefined: the fixed default distribution
//! - RLE: one symbol for every sequence
//! - Compressed: an FSE table description precedes the bitstream
//! - Repeat: the table of the previous block (or dictionary)

use super::EntropyState;
use crate::bits::{highest_bit, BackwardBitReader};
use crate::bytes::ByteWriter;
use crate::fse::{
    literal_length_default, match_length_default, offset_default, FseDecoder, FseTable,
};
use tlscomp_core::{Error, Result};
use tracing::trace;

pub const MAX_LITERAL_LENGTH_SYMBOL: u8 = 35;
pub const MAX_OFFSET_SYMBOL: u8 = 31;
pub const MAX_MATCH_LENGTH_SYMBOL: u8 = 52;

pub const LITERAL_LENGTH_MAX_LOG: u8 = 9;
pub const OFFSET_MAX_LOG: u8 = 8;
pub const MATCH_LENGTH_MAX_LOG: u8 = 9;

/// Smallest match length a sequence can describe.
pub const MIN_MATCH_LENGTH: u32 = 3;

const LONG_SEQUENCE_COUNT: usize = 0x7F00;

/// Largest count the 3-byte form can carry.
pub const MAX_SEQUENCE_COUNT: usize = LONG_SEQUENCE_COUNT + 0xFFFF;

/// Literal length code to (extra bits, baseline).
pub const LITERAL_LENGTH_BASELINE: [(u8, u32); 36] = [
    (0, 0), (0, 1), (0, 2), (0, 3), (0, 4), (0, 5), (0, 6), (0, 7),
    (0, 8), (0, 9), (0, 10), (0, 11), (0, 12), (0, 13), (0, 14), (0, 15),
    (1, 16), (1, 18), (1, 20), (1, 22), (2, 24), (2, 28), (3, 32), (3, 40),
    (4, 48), (6, 64), (7, 128), (8, 256), (9, 512), (10, 1024), (11, 2048), (12, 4096),
    (13, 8192), (14, 16384), (15, 32768), (16, 65536),
];

/// Match length code to (extra bits, baseline).
pub const MATCH_LENGTH_BASELINE: [(u8, u32); 53] = [
    (0, 3), (0, 4), (0, 5), (0, 6), (0, 7), (0, 8), (0, 9), (0, 10),
    (0, 11), (0, 12), (0, 13), (0, 14), (0, 15), (0, 16), (0, 17), (0, 18),
    (0, 19), (0, 20), (0, 21), (0, 22), (0, 23), (0, 24), (0, 25), (0, 26),
    (0, 27), (0, 28), (0, 29), (0, 30), (0, 31), (0, 32), (0, 33), (0, 34),
    (1, 35), (1, 37), (1, 39), (1, 41), (2, 43), (2, 47), (3, 51), (3, 59),
    (4, 67), (4, 83), (5, 99), (7, 131), (8, 259), (9, 515), (10, 1027), (11, 2051),
    (12, 4099), (13, 8195), (14, 16387), (15, 32771), (16, 65539),
];

/// Code whose range contains `literal_length`.
pub fn literal_length_code(literal_length: u32) -> u8 {
    if literal_length < 16 {
        return literal_length as u8;
    }
    LITERAL_LENGTH_BASELINE
        .iter()
        .rposition(|&(_, base)| base <= literal_length)
        .unwrap_or(0) as u8
}

/// Code whose range contains `match_length` (at least 3).
pub fn match_length_code(match_length: u32) -> u8 {
    if match_length < 35 {
        return match_length.saturating_sub(MIN_MATCH_LENGTH) as u8;
    }
    MATCH_LENGTH_BASELINE
        .iter()
        .rposition(|&(_, base)| base <= match_length)
        .unwrap_or(0) as u8
}

/// Offset code of an offset value: its highest set bit.
pub fn offset_code(offset_value: u32) -> u8 {
    highest_bit(offset_value) as u8
}

/// Table compression mode of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceMode {
    Predefined,
    Rle,
    Compressed,
    Repeat,
}

impl SequenceMode {
    pub fn from_field(field: u8) -> Self {
        match field & 0x03 {
            0 => SequenceMode::Predefined,
            1 => SequenceMode::Rle,
            2 => SequenceMode::Compressed,
            _ => SequenceMode::Repeat,
        }
    }

    pub fn field(self) -> u8 {
        match self {
            SequenceMode::Predefined => 0,
            SequenceMode::Rle => 1,
            SequenceMode::Compressed => 2,
            SequenceMode::Repeat => 3,
        }
    }
}

/// One of the three symbol streams, in header order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceChannel {
    LiteralLength,
    Offset,
    MatchLength,
}

impl SequenceChannel {
    /// Order of the mode fields and table descriptions.
    pub const ALL: [SequenceChannel; 3] = [
        SequenceChannel::LiteralLength,
        SequenceChannel::Offset,
        SequenceChannel::MatchLength,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SequenceChannel::LiteralLength => "literal lengths",
            SequenceChannel::Offset => "offsets",
            SequenceChannel::MatchLength => "match lengths",
        }
    }

    pub fn max_symbol(self) -> u8 {
        match self {
            SequenceChannel::LiteralLength => MAX_LITERAL_LENGTH_SYMBOL,
            SequenceChannel::Offset => MAX_OFFSET_SYMBOL,
            SequenceChannel::MatchLength => MAX_MATCH_LENGTH_SYMBOL,
        }
    }

    pub fn max_log(self) -> u8 {
        match self {
            SequenceChannel::LiteralLength => LITERAL_LENGTH_MAX_LOG,
            SequenceChannel::Offset => OFFSET_MAX_LOG,
            SequenceChannel::MatchLength => MATCH_LENGTH_MAX_LOG,
        }
    }

    /// Predefined decoding table.
    pub fn default_table(self) -> &'static FseTable {
        match self {
            SequenceChannel::LiteralLength => &literal_length_default().0,
            SequenceChannel::Offset => &offset_default().0,
            SequenceChannel::MatchLength => &match_length_default().0,
        }
    }

    /// Bit position of this channel's mode in the modes byte.
    fn mode_shift(self) -> u8 {
        match self {
            SequenceChannel::LiteralLength => 6,
            SequenceChannel::Offset => 4,
            SequenceChannel::MatchLength => 2,
        }
    }
}

/// Number of sequences and per-channel modes (LL, OF, ML).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencesHeader {
    pub num_sequences: usize,
    pub modes: [SequenceMode; 3],
}

impl SequencesHeader {
    pub fn parse(data: &[u8]) -> Result<(Self, usize)> {
        let byte = |i: usize| {
            data.get(i)
                .copied()
                .ok_or_else(|| Error::unexpected_end(data.len()))
        };

        let b0 = byte(0)?;
        let (num_sequences, mut pos) = match b0 {
            0 => {
                return Ok((
                    Self {
                        num_sequences: 0,
                        modes: [SequenceMode::Predefined; 3],
                    },
                    1,
                ))
            }
            1..=127 => (b0 as usize, 1),
            128..=254 => ((((b0 - 128) as usize) << 8) + byte(1)? as usize, 2),
            255 => (
                byte(1)? as usize + ((byte(2)? as usize) << 8) + LONG_SEQUENCE_COUNT,
                3,
            ),
        };

        let modes_byte = byte(pos)?;
        if modes_byte & 0x03 != 0 {
            return Err(Error::corrupted("reserved bits set in sequence modes", pos));
        }
        pos += 1;
        let modes = SequenceChannel::ALL.map(|c| SequenceMode::from_field(modes_byte >> c.mode_shift()));
        Ok((
            Self {
                num_sequences,
                modes,
            },
            pos,
        ))
    }

    /// Serialize the header.
    ///
    /// `num_sequences` must not exceed [`MAX_SEQUENCE_COUNT`]. A block of
    /// at most 128 KiB never produces more than about 43,700 sequences.
    pub fn write(&self, writer: &mut ByteWriter) {
        let n = self.num_sequences;
        debug_assert!(n <= MAX_SEQUENCE_COUNT, "sequence count {n} not encodable");
        if n < 128 {
            writer.write_u8(n as u8);
        } else if n < LONG_SEQUENCE_COUNT {
            writer.write_u8(((n >> 8) + 128) as u8);
            writer.write_u8(n as u8);
        } else {
            writer.write_u8(255);
            writer.write_u16_le((n - LONG_SEQUENCE_COUNT) as u16);
        }
        if n == 0 {
            return;
        }
        let modes_byte = SequenceChannel::ALL
            .iter()
            .zip(self.modes)
            .fold(0u8, |acc, (c, m)| acc | (m.field() << c.mode_shift()));
        writer.write_u8(modes_byte);
    }
}

/// A decoded sequence with its offset already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    pub literal_length: u32,
    pub offset: u32,
    pub match_length: u32,
}

impl Sequence {
    pub fn new(literal_length: u32, offset: u32, match_length: u32) -> Self {
        Self {
            literal_length,
            offset,
            match_length,
        }
    }
}

/// The three most recent match offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatOffsets {
    offsets: [u32; 3],
}

impl Default for RepeatOffsets {
    fn default() -> Self {
        Self { offsets: [1, 4, 8] }
    }
}

impl RepeatOffsets {
    pub fn new(offsets: [u32; 3]) -> Self {
        Self { offsets }
    }

    pub fn offsets(&self) -> [u32; 3] {
        self.offsets
    }

    /// Turn an offset value into an actual offset and update history.
    ///
    /// Returns `None` when a repeat reference resolves to offset 0.
    pub fn resolve(&mut self, offset_value: u32, literal_length: u32) -> Option<u32> {
        if offset_value > 3 {
            let offset = offset_value - 3;
            self.offsets = [offset, self.offsets[0], self.offsets[1]];
            return Some(offset);
        }

        let index = offset_value - 1 + u32::from(literal_length == 0);
        let offset = match index {
            0 => return Some(self.offsets[0]),
            3 => self.offsets[0].wrapping_sub(1),
            i => self.offsets[i as usize],
        };
        if offset == 0 {
            return None;
        }
        if index > 1 {
            self.offsets[2] = self.offsets[1];
        }
        self.offsets[1] = self.offsets[0];
        self.offsets[0] = offset;
        Some(offset)
    }

    /// Choose the offset value for `offset`, updating history exactly as
    /// [`resolve`](Self::resolve) will on the decoding side.
    pub fn encode(&mut self, offset: u32, literal_length: u32) -> u32 {
        let [r0, r1, r2] = self.offsets;
        let offset_value = if literal_length > 0 {
            match offset {
                o if o == r0 => 1,
                o if o == r1 => 2,
                o if o == r2 => 3,
                o => o + 3,
            }
        } else {
            match offset {
                o if o == r1 => 1,
                o if o == r2 => 2,
                o if o + 1 == r0 => 3,
                o => o + 3,
            }
        };
        let resolved = self.resolve(offset_value, literal_length);
        debug_assert_eq!(resolved, Some(offset));
        offset_value
    }
}

/// Decode a sequences section, updating the persisted tables and repeat
/// offsets in `state`.
pub fn decode_sequences(data: &[u8], state: &mut EntropyState) -> Result<Vec<Sequence>> {
    let (header, mut pos) = SequencesHeader::parse(data)?;
    if header.num_sequences == 0 {
        if pos != data.len() {
            return Err(Error::corrupted(
                format!("{} bytes after an empty sequences section", data.len() - pos),
                pos,
            ));
        }
        return Ok(Vec::new());
    }
    trace!(
        count = header.num_sequences,
        modes = ?header.modes,
        "sequences section"
    );

    for (channel, mode) in SequenceChannel::ALL.into_iter().zip(header.modes) {
        let slot = state.table_mut(channel);
        match mode {
            SequenceMode::Predefined => *slot = Some(channel.default_table().clone()),
            SequenceMode::Rle => {
                let symbol = *data.get(pos).ok_or_else(|| Error::unexpected_end(data.len()))?;
                if symbol > channel.max_symbol() {
                    return Err(Error::fse(
                        format!("RLE symbol {symbol} out of range for {}", channel.name()),
                        pos,
                    ));
                }
                *slot = Some(FseTable::rle(symbol));
                pos += 1;
            }
            SequenceMode::Compressed => {
                let (table, consumed) =
                    FseTable::parse(&data[pos..], channel.max_log(), channel.max_symbol())
                        .map_err(|e| e.at_offset(pos))?;
                *slot = Some(table);
                pos += consumed;
            }
            SequenceMode::Repeat => {
                if slot.is_none() {
                    return Err(Error::RepeatModeUnavailable {
                        table: channel.name(),
                        offset: pos,
                    });
                }
            }
        }
    }

    let EntropyState {
        literal_lengths,
        offsets,
        match_lengths,
        repeat_offsets,
        ..
    } = state;
    let missing = |channel: SequenceChannel| Error::RepeatModeUnavailable {
        table: channel.name(),
        offset: pos,
    };
    let ll_table = literal_lengths
        .as_ref()
        .ok_or_else(|| missing(SequenceChannel::LiteralLength))?;
    let of_table = offsets
        .as_ref()
        .ok_or_else(|| missing(SequenceChannel::Offset))?;
    let ml_table = match_lengths
        .as_ref()
        .ok_or_else(|| missing(SequenceChannel::MatchLength))?;

    let mut bits = BackwardBitReader::new(&data[pos..]).map_err(|e| e.at_offset(pos))?;
    let mut ll = FseDecoder::new(ll_table, &mut bits);
    let mut of = FseDecoder::new(of_table, &mut bits);
    let mut ml = FseDecoder::new(ml_table, &mut bits);

    let count = header.num_sequences;
    let mut sequences = Vec::with_capacity(count);
    for i in 0..count {
        let of_code = of.peek_symbol();
        let ml_code = ml.peek_symbol() as usize;
        let ll_code = ll.peek_symbol() as usize;

        let offset_value = (1u32 << of_code) + bits.read(of_code as u32) as u32;
        let (ml_bits, ml_base) = MATCH_LENGTH_BASELINE[ml_code];
        let match_length = ml_base + bits.read(ml_bits as u32) as u32;
        let (ll_bits, ll_base) = LITERAL_LENGTH_BASELINE[ll_code];
        let literal_length = ll_base + bits.read(ll_bits as u32) as u32;

        let offset = repeat_offsets
            .resolve(offset_value, literal_length)
            .ok_or_else(|| Error::corrupted(format!("sequence {i} resolves to offset 0"), pos))?;
        sequences.push(Sequence::new(literal_length, offset, match_length));

        if i + 1 < count {
            ll.update(&mut bits);
            ml.update(&mut bits);
            of.update(&mut bits);
        }
    }

    if bits.is_overflowed() {
        return Err(Error::unexpected_end(pos));
    }
    if !bits.is_finished() {
        return Err(Error::corrupted(
            format!("{} unread bits after sequences", bits.remaining()),
            pos,
        ));
    }
    Ok(sequences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlscomp_core::ErrorKind;

    fn header_bytes(header: SequencesHeader) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        header.write(&mut writer);
        writer.into_inner()
    }

    #[test]
    fn test_sequence_count_encodings() {
        let modes = [SequenceMode::Predefined; 3];
        let cases = [
            (1, 2),
            (127, 2),
            (128, 3),
            (0x7EFF, 3),
            (0x7F00, 4),
            (MAX_SEQUENCE_COUNT, 4),
        ];
        for (count, len) in cases {
            let header = SequencesHeader {
                num_sequences: count,
                modes,
            };
            let bytes = header_bytes(header);
            assert_eq!(bytes.len(), len, "count {count}");
            assert_eq!(SequencesHeader::parse(&bytes).unwrap(), (header, len));
        }
        assert_eq!(header_bytes(SequencesHeader { num_sequences: 0, modes }), vec![0]);
    }

    #[test]
    fn test_largest_sequence_count_parses() {
        let (header, consumed) = SequencesHeader::parse(&[0xFF, 0xFF, 0xFF, 0x00]).unwrap();
        assert_eq!(header.num_sequences, 98_047);
        assert_eq!(header.num_sequences, MAX_SEQUENCE_COUNT);
        assert_eq!(consumed, 4);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not encodable")]
    fn test_oversized_sequence_count_refused() {
        header_bytes(SequencesHeader {
            num_sequences: MAX_SEQUENCE_COUNT + 1,
            modes: [SequenceMode::Predefined; 3],
        });
    }

    #[test]
    fn test_modes_byte_layout() {
        let header = SequencesHeader {
            num_sequences: 1,
            modes: [SequenceMode::Compressed, SequenceMode::Rle, SequenceMode::Repeat],
        };
        assert_eq!(header_bytes(header), vec![1, 0b10_01_11_00]);
    }

    #[test]
    fn test_reserved_mode_bits_rejected() {
        let err = SequencesHeader::parse(&[1, 0b0000_0001]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptedData);
        assert_eq!(err.offset(), Some(1));
    }

    #[test]
    fn test_code_lookup() {
        assert_eq!(literal_length_code(0), 0);
        assert_eq!(literal_length_code(15), 15);
        assert_eq!(literal_length_code(17), 16);
        assert_eq!(literal_length_code(63), 24);
        assert_eq!(literal_length_code(64), 25);
        assert_eq!(literal_length_code(131_071), 35);
        assert_eq!(match_length_code(3), 0);
        assert_eq!(match_length_code(34), 31);
        assert_eq!(match_length_code(35), 32);
        assert_eq!(match_length_code(130), 42);
        assert_eq!(match_length_code(131), 43);
        assert_eq!(match_length_code(131_074), 52);
        assert_eq!(offset_code(1), 0);
        assert_eq!(offset_code(4), 2);
        assert_eq!(offset_code(1027), 10);
    }

    #[test]
    fn test_repeat_offsets_resolve() {
        let mut reps = RepeatOffsets::default();
        // Repeat 1 with literals: unchanged history.
        assert_eq!(reps.resolve(1, 5), Some(1));
        assert_eq!(reps.offsets(), [1, 4, 8]);
        // Repeat 2 with literals.
        assert_eq!(reps.resolve(2, 5), Some(4));
        assert_eq!(reps.offsets(), [4, 1, 8]);
        // Repeat 3 with literals rotates all three.
        assert_eq!(reps.resolve(3, 5), Some(8));
        assert_eq!(reps.offsets(), [8, 4, 1]);
        // Zero literals: value 3 means r0 - 1.
        assert_eq!(reps.resolve(3, 0), Some(7));
        assert_eq!(reps.offsets(), [7, 8, 4]);
        // New offset.
        assert_eq!(reps.resolve(103, 2), Some(100));
        assert_eq!(reps.offsets(), [100, 7, 8]);
    }

    #[test]
    fn test_repeat_offset_zero_rejected() {
        let mut reps = RepeatOffsets::default();
        assert_eq!(reps.resolve(3, 0), None);
    }

    #[test]
    fn test_repeat_offsets_encode_mirrors_resolve() {
        let mut enc = RepeatOffsets::default();
        let mut dec = RepeatOffsets::default();
        let commands = [(5, 4), (0, 4), (3, 1), (0, 8), (2, 100), (0, 99), (1, 100), (0, 3)];
        for (ll, offset) in commands {
            let value = enc.encode(offset, ll);
            assert_eq!(dec.resolve(value, ll), Some(offset));
            assert_eq!(enc, dec);
        }
    }

    #[test]
    fn test_empty_section() {
        let mut state = EntropyState::default();
        assert!(decode_sequences(&[0], &mut state).unwrap().is_empty());
        assert!(decode_sequences(&[0, 1], &mut state).is_err());
    }

    #[test]
    fn test_repeat_without_previous_table() {
        let mut state = EntropyState::default();
        let err = decode_sequences(&[1, 0b11_11_11_00, 0x01], &mut state).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RepeatModeUnavailable);
    }

    #[test]
    fn test_rle_symbol_out_of_range() {
        let mut state = EntropyState::default();
        // LL in RLE mode with symbol 36.
        let err = decode_sequences(&[1, 0b01_00_00_00, 36, 0x01], &mut state).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FseTable);
        assert_eq!(err.offset(), Some(2));
    }

    #[test]
    fn test_single_rle_sequence() {
        // All three channels RLE: LL code 4, OF code 2 (value 4..8), ML code 1.
        // OF code 2 reads 2 extra bits; value 3 -> offset value 7 -> offset 4.
        let mut writer = crate::bits::BitWriter::new();
        writer.write(3, 2);
        let stream = writer.finish_with_end_mark();
        let mut data = vec![1, 0b01_01_01_00, 4, 2, 1];
        data.extend_from_slice(&stream);

        let mut state = EntropyState::default();
        let sequences = decode_sequences(&data, &mut state).unwrap();
        assert_eq!(sequences, vec![Sequence::new(4, 4, 4)]);
        assert_eq!(state.repeat_offsets.offsets(), [4, 1, 4]);
    }
}
