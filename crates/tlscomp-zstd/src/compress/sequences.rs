//! Sequences section encoding.
//!
//! Each channel (LL, OF, ML) independently picks the cheapest table mode
//! by estimated size: the table description plus `count * cost(symbol)`,
//! where a symbol with normalized probability `p / 2^log` costs
//! `log - log2(p)` bits. Extra bits are the same in every mode and are
//! left out of the comparison. Ties go to the cheapest description:
//! Repeat, then RLE, then Predefined, then Compressed.
//!
//! Repeat is only offered for tables the decoder received as an FSE
//! description (or from the dictionary).

use std::sync::Arc;

use super::EncoderState;
use crate::bits::BitWriter;
use crate::block::{
    literal_length_code, match_length_code, offset_code, Sequence, SequenceChannel,
    SequenceMode, SequencesHeader, LITERAL_LENGTH_BASELINE, MATCH_LENGTH_BASELINE,
};
use crate::bytes::ByteWriter;
use crate::fse::{
    literal_length_default, match_length_default, normalize_counts, offset_default,
    optimal_accuracy_log, FseEncodeTable, FseEncoder, FseTable,
};
use tlscomp_core::Result;
use tracing::trace;

/// A transmitted FSE table kept for Repeat mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelTable {
    pub table: FseTable,
    pub encoder: FseEncodeTable,
}

impl ChannelTable {
    pub fn new(table: FseTable) -> Result<Self> {
        let encoder = FseEncodeTable::new(&table)?;
        Ok(Self { table, encoder })
    }
}

/// A sequence split into codes and extra bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CodedSequence {
    ll_code: u8,
    ll_extra: u32,
    ml_code: u8,
    ml_extra: u32,
    of_code: u8,
    of_extra: u32,
}

impl CodedSequence {
    fn code(&self, channel: SequenceChannel) -> u8 {
        match channel {
            SequenceChannel::LiteralLength => self.ll_code,
            SequenceChannel::Offset => self.of_code,
            SequenceChannel::MatchLength => self.ml_code,
        }
    }
}

/// Table chosen for one channel.
enum Choice<'a> {
    Predefined(&'static FseEncodeTable),
    Rle(u8, FseEncodeTable),
    Compressed(Arc<ChannelTable>, Vec<u8>),
    Repeat(&'a FseEncodeTable),
}

impl Choice<'_> {
    fn mode(&self) -> SequenceMode {
        match self {
            Choice::Predefined(_) => SequenceMode::Predefined,
            Choice::Rle(..) => SequenceMode::Rle,
            Choice::Compressed(..) => SequenceMode::Compressed,
            Choice::Repeat(_) => SequenceMode::Repeat,
        }
    }

    fn encoder(&self) -> &FseEncodeTable {
        match self {
            Choice::Predefined(e) | Choice::Repeat(e) => e,
            Choice::Rle(_, e) => e,
            Choice::Compressed(t, _) => &t.encoder,
        }
    }
}

fn predefined(channel: SequenceChannel) -> &'static (FseTable, FseEncodeTable) {
    match channel {
        SequenceChannel::LiteralLength => literal_length_default(),
        SequenceChannel::Offset => offset_default(),
        SequenceChannel::MatchLength => match_length_default(),
    }
}

/// Estimated bits to code `histogram` with `table`, or `None` if a
/// present symbol has zero probability.
fn symbol_cost(table: &FseTable, histogram: &[u32]) -> Option<f64> {
    let log = table.accuracy_log() as f64;
    let counts = table.counts();
    let mut bits = 0.0;
    for (symbol, &n) in histogram.iter().enumerate() {
        if n == 0 {
            continue;
        }
        let norm = match counts.get(symbol).copied().unwrap_or(0) {
            0 => return None,
            -1 => 1.0,
            c => c as f64,
        };
        bits += n as f64 * (log - norm.log2());
    }
    Some(bits)
}

fn choose_table<'a>(
    channel: SequenceChannel,
    histogram: &[u32],
    count: usize,
    previous: Option<&'a Arc<ChannelTable>>,
) -> Result<Choice<'a>> {
    let present: Vec<usize> = (0..histogram.len()).filter(|&s| histogram[s] > 0).collect();
    let mut best: Option<(f64, Choice<'a>)> = None;
    let mut consider = |cost: f64, choice: Choice<'a>| {
        if best.as_ref().map_or(true, |(c, _)| cost < *c) {
            best = Some((cost, choice));
        }
    };

    if let Some(prev) = previous {
        if let Some(cost) = symbol_cost(&prev.table, histogram) {
            consider(cost, Choice::Repeat(&prev.encoder));
        }
    }

    if let [symbol] = present[..] {
        let table = FseTable::rle(symbol as u8);
        consider(8.0, Choice::Rle(symbol as u8, FseEncodeTable::new(&table)?));
    }

    let (default_table, default_encoder) = predefined(channel);
    if let Some(cost) = symbol_cost(default_table, histogram) {
        consider(cost, Choice::Predefined(default_encoder));
    }

    if present.len() > 1 {
        let max_symbol = present.last().copied().unwrap_or(0);
        let log = optimal_accuracy_log(count, max_symbol, channel.max_log());
        if let Some(counts) = normalize_counts(histogram, log) {
            let table = FseTable::from_normalized(&counts, log)?;
            if let Some(cost) = symbol_cost(&table, histogram) {
                let header = table.write_header();
                let total = cost + header.len() as f64 * 8.0;
                consider(total, Choice::Compressed(Arc::new(ChannelTable::new(table)?), header));
            }
        }
    }

    // Predefined tables cover every code, so a choice always exists.
    Ok(best.map(|(_, c)| c).unwrap_or(Choice::Predefined(default_encoder)))
}

/// Encode a sequences section, updating repeat offsets and tables in
/// `state`.
pub fn encode_sequences(sequences: &[Sequence], state: &mut EncoderState) -> Result<Vec<u8>> {
    let mut writer = ByteWriter::new();
    if sequences.is_empty() {
        SequencesHeader {
            num_sequences: 0,
            modes: [SequenceMode::Predefined; 3],
        }
        .write(&mut writer);
        return Ok(writer.into_inner());
    }

    let coded: Vec<CodedSequence> = sequences
        .iter()
        .map(|seq| {
            let offset_value = state.repeat_offsets.encode(seq.offset, seq.literal_length);
            let ll_code = literal_length_code(seq.literal_length);
            let ml_code = match_length_code(seq.match_length);
            let of_code = offset_code(offset_value);
            CodedSequence {
                ll_code,
                ll_extra: seq.literal_length - LITERAL_LENGTH_BASELINE[ll_code as usize].1,
                ml_code,
                ml_extra: seq.match_length - MATCH_LENGTH_BASELINE[ml_code as usize].1,
                of_code,
                of_extra: offset_value - (1 << of_code),
            }
        })
        .collect();

    let mut choices = Vec::with_capacity(3);
    for (i, channel) in SequenceChannel::ALL.into_iter().enumerate() {
        let mut histogram = vec![0u32; channel.max_symbol() as usize + 1];
        for seq in &coded {
            histogram[seq.code(channel) as usize] += 1;
        }
        choices.push(choose_table(
            channel,
            &histogram,
            coded.len(),
            state.tables[i].as_ref(),
        )?);
    }

    let modes = [choices[0].mode(), choices[1].mode(), choices[2].mode()];
    trace!(count = coded.len(), ?modes, "sequence table modes");
    SequencesHeader {
        num_sequences: coded.len(),
        modes,
    }
    .write(&mut writer);
    for choice in &choices {
        match choice {
            Choice::Rle(symbol, _) => writer.write_u8(*symbol),
            Choice::Compressed(_, header) => writer.write_bytes(header),
            Choice::Predefined(_) | Choice::Repeat(_) => {}
        }
    }

    let stream = write_bitstream(
        &coded,
        choices[0].encoder(),
        choices[1].encoder(),
        choices[2].encoder(),
    );
    writer.write_bytes(&stream);

    let updated: Vec<Option<Arc<ChannelTable>>> = choices
        .into_iter()
        .enumerate()
        .map(|(i, choice)| match choice {
            Choice::Compressed(table, _) => Some(table),
            Choice::Repeat(_) => state.tables[i].clone(),
            Choice::Predefined(_) | Choice::Rle(..) => None,
        })
        .collect();
    for (slot, table) in state.tables.iter_mut().zip(updated) {
        *slot = table;
    }
    Ok(writer.into_inner())
}

/// Interleave the three FSE states and extra bits, last sequence first.
fn write_bitstream(
    coded: &[CodedSequence],
    ll_table: &FseEncodeTable,
    of_table: &FseEncodeTable,
    ml_table: &FseEncodeTable,
) -> Vec<u8> {
    let mut bits = BitWriter::with_capacity(coded.len() * 8);
    let Some((last, rest)) = coded.split_last() else {
        return bits.finish_with_end_mark();
    };

    let mut ml = FseEncoder::new(ml_table, last.ml_code);
    let mut of = FseEncoder::new(of_table, last.of_code);
    let mut ll = FseEncoder::new(ll_table, last.ll_code);
    write_extra_bits(&mut bits, last);

    for seq in rest.iter().rev() {
        of.encode(&mut bits, seq.of_code);
        ml.encode(&mut bits, seq.ml_code);
        ll.encode(&mut bits, seq.ll_code);
        write_extra_bits(&mut bits, seq);
    }

    ml.flush(&mut bits);
    of.flush(&mut bits);
    ll.flush(&mut bits);
    bits.finish_with_end_mark()
}

#[inline]
fn write_extra_bits(bits: &mut BitWriter, seq: &CodedSequence) {
    bits.write(
        seq.ll_extra as u64,
        LITERAL_LENGTH_BASELINE[seq.ll_code as usize].0 as u32,
    );
    bits.write(
        seq.ml_extra as u64,
        MATCH_LENGTH_BASELINE[seq.ml_code as usize].0 as u32,
    );
    bits.write(seq.of_extra as u64, seq.of_code as u32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{decode_sequences, EntropyState, RepeatOffsets};

    fn roundtrip(sequences: &[Sequence], enc: &mut EncoderState, dec: &mut EntropyState) -> Vec<u8> {
        let section = encode_sequences(sequences, enc).unwrap();
        let decoded = decode_sequences(&section, dec).unwrap();
        assert_eq!(decoded, sequences);
        assert_eq!(enc.repeat_offsets, dec.repeat_offsets);
        section
    }

    fn varied_sequences(n: usize) -> Vec<Sequence> {
        (0..n)
            .map(|i| {
                let i = i as u32;
                Sequence::new(1 + (i % 3) * 7, 40 + (i % 5) * 300, 4 + (i % 4) * 2)
            })
            .collect()
    }

    #[test]
    fn test_empty_section() {
        let mut state = EncoderState::default();
        assert_eq!(encode_sequences(&[], &mut state).unwrap(), vec![0]);
    }

    #[test]
    fn test_single_sequence() {
        let mut enc = EncoderState::default();
        let mut dec = EntropyState::default();
        roundtrip(&[Sequence::new(5, 12, 7)], &mut enc, &mut dec);
    }

    #[test]
    fn test_uniform_sequences_use_rle() {
        let sequences = vec![Sequence::new(2, 4, 4); 50];
        let mut enc = EncoderState::default();
        let mut dec = EntropyState::default();
        let section = roundtrip(&sequences, &mut enc, &mut dec);
        // Offsets mix two repeat codes; both length channels are uniform.
        let (header, _) = SequencesHeader::parse(&section).unwrap();
        assert_eq!(header.modes[0], SequenceMode::Rle);
        assert_eq!(header.modes[2], SequenceMode::Rle);
    }

    #[test]
    fn test_long_lengths_and_offsets() {
        let sequences = vec![
            Sequence::new(70_000, 1 << 20, 100_000),
            Sequence::new(0, 3, 3),
            Sequence::new(17, 65_536, 131_074),
        ];
        let mut enc = EncoderState::default();
        let mut dec = EntropyState::default();
        roundtrip(&sequences, &mut enc, &mut dec);
    }

    #[test]
    fn test_identical_blocks_reuse_all_tables() {
        let sequences = varied_sequences(2000);
        let mut enc = EncoderState::default();
        let mut dec = EntropyState::default();

        let first = roundtrip(&sequences, &mut enc, &mut dec);
        let (first_header, _) = SequencesHeader::parse(&first).unwrap();
        assert_eq!(first_header.modes, [SequenceMode::Compressed; 3]);

        let second = roundtrip(&sequences, &mut enc, &mut dec);
        let (second_header, _) = SequencesHeader::parse(&second).unwrap();
        assert_eq!(second_header.modes, [SequenceMode::Repeat; 3]);
        assert!(second.len() < first.len());
    }

    #[test]
    fn test_seeded_repeat_offsets() {
        let mut enc = EncoderState {
            repeat_offsets: RepeatOffsets::new([10, 20, 30]),
            ..EncoderState::default()
        };
        let mut dec = EntropyState {
            repeat_offsets: RepeatOffsets::new([10, 20, 30]),
            ..EntropyState::default()
        };
        roundtrip(
            &[Sequence::new(1, 20, 5), Sequence::new(0, 19, 6)],
            &mut enc,
            &mut dec,
        );
    }

    #[test]
    fn test_symbol_cost_rejects_uncovered() {
        let table = FseTable::rle(3);
        assert_eq!(symbol_cost(&table, &[0, 0, 0, 9]), Some(0.0));
        assert_eq!(symbol_cost(&table, &[1, 0, 0, 9]), None);
    }
}
