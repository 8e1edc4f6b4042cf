//! Finite State Entropy (FSE) coding.
//!
//! FSE is the tANS entropy coder used for sequence codes and for the
//! compressed form of Huffman weights. A table is built from a normalized
//! distribution; decoding walks states forward while consuming a backward
//! bitstream, encoding runs the same machine in reverse.
//!
//! The three predefined sequence tables are built once and cached with
//! `OnceLock`; they are immutable after construction.
//!
//! ## References
//!
//! - [RFC 8878 Section 4.1](https://datatracker.ietf.org/doc/html/rfc8878#section-4.1)
//! - [FSE Educational Decoder](https://github.com/facebook/zstd/blob/dev/doc/educational_decoder.md)

mod decoder;
mod encoder;
mod table;

use std::sync::OnceLock;

pub use decoder::FseDecoder;
pub use encoder::{FseEncodeTable, FseEncoder};
pub use table::{
    normalize_counts, optimal_accuracy_log, spread_symbols, write_normalized_counts, FseTable,
    FseTableEntry, FSE_MAX_ACCURACY_LOG, FSE_MIN_ACCURACY_LOG,
};

/// Predefined literal-length distribution (accuracy log 6).
pub const LITERAL_LENGTH_DEFAULT_DISTRIBUTION: [i16; 36] = [
    4, 3, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 3, 2, 1, 1, 1, 1, 1,
    -1, -1, -1, -1,
];
pub const LITERAL_LENGTH_DEFAULT_LOG: u8 = 6;

/// Predefined match-length distribution (accuracy log 6).
pub const MATCH_LENGTH_DEFAULT_DISTRIBUTION: [i16; 53] = [
    1, 4, 3, 2, 2, 2, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1, -1, -1,
];
pub const MATCH_LENGTH_DEFAULT_LOG: u8 = 6;

/// Predefined offset-code distribution (accuracy log 5).
pub const OFFSET_DEFAULT_DISTRIBUTION: [i16; 29] = [
    1, 1, 1, 1, 1, 1, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1,
];
pub const OFFSET_DEFAULT_LOG: u8 = 5;

static LL_DEFAULT: OnceLock<(FseTable, FseEncodeTable)> = OnceLock::new();
static ML_DEFAULT: OnceLock<(FseTable, FseEncodeTable)> = OnceLock::new();
static OF_DEFAULT: OnceLock<(FseTable, FseEncodeTable)> = OnceLock::new();

fn build_default(counts: &[i16], log: u8) -> (FseTable, FseEncodeTable) {
    let table = FseTable::from_normalized(counts, log)
        .expect("predefined distribution construction should never fail");
    let encode =
        FseEncodeTable::new(&table).expect("predefined encoding table should never fail");
    (table, encode)
}

/// Cached predefined literal-length tables.
pub fn literal_length_default() -> &'static (FseTable, FseEncodeTable) {
    LL_DEFAULT.get_or_init(|| {
        build_default(
            &LITERAL_LENGTH_DEFAULT_DISTRIBUTION,
            LITERAL_LENGTH_DEFAULT_LOG,
        )
    })
}

/// Cached predefined match-length tables.
pub fn match_length_default() -> &'static (FseTable, FseEncodeTable) {
    ML_DEFAULT.get_or_init(|| {
        build_default(&MATCH_LENGTH_DEFAULT_DISTRIBUTION, MATCH_LENGTH_DEFAULT_LOG)
    })
}

/// Cached predefined offset tables.
pub fn offset_default() -> &'static (FseTable, FseEncodeTable) {
    OF_DEFAULT.get_or_init(|| build_default(&OFFSET_DEFAULT_DISTRIBUTION, OFFSET_DEFAULT_LOG))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mass(counts: &[i16]) -> i32 {
        counts
            .iter()
            .map(|&c| if c == -1 { 1 } else { c as i32 })
            .sum()
    }

    #[test]
    fn test_default_distributions_sum() {
        assert_eq!(mass(&LITERAL_LENGTH_DEFAULT_DISTRIBUTION), 64);
        assert_eq!(mass(&MATCH_LENGTH_DEFAULT_DISTRIBUTION), 64);
        assert_eq!(mass(&OFFSET_DEFAULT_DISTRIBUTION), 32);
    }

    #[test]
    fn test_default_tables_build() {
        assert_eq!(literal_length_default().0.size(), 64);
        assert_eq!(match_length_default().0.size(), 64);
        assert_eq!(offset_default().0.size(), 32);
    }

    #[test]
    fn test_literal_length_default_first_states() {
        // RFC 8878 Appendix A: state 0 -> LL code 0, 4 bits, baseline 0;
        // state 1 -> code 0, 4 bits, baseline 16; state 2 -> code 1, 5 bits, baseline 32.
        let table = &literal_length_default().0;
        assert_eq!(table.entry(0), FseTableEntry { symbol: 0, num_bits: 4, baseline: 0 });
        assert_eq!(table.entry(1), FseTableEntry { symbol: 0, num_bits: 4, baseline: 16 });
        assert_eq!(table.entry(2), FseTableEntry { symbol: 1, num_bits: 5, baseline: 32 });
    }

    #[test]
    fn test_offset_default_first_states() {
        // RFC 8878 Appendix A: state 0 -> OF code 0, 5 bits; state 1 -> code 6, 4 bits.
        let table = &offset_default().0;
        assert_eq!(table.entry(0), FseTableEntry { symbol: 0, num_bits: 5, baseline: 0 });
        assert_eq!(table.entry(1), FseTableEntry { symbol: 6, num_bits: 4, baseline: 0 });
    }
}
