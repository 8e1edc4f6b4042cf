//! FSE encoding.
//!
//! Symbols are encoded in reverse order so the decoder, which walks the
//! bitstream backward, emits them forward. Each symbol's transform holds:
//!
//! - `delta_nb_bits`: `(state + delta_nb_bits) >> 16` is the number of
//!   state bits to flush before the transition.
//! - `delta_find_state`: offset into the state table for the next state.

use super::table::{spread_symbols, FseTable};
use crate::bits::{highest_bit, BitWriter};
use tlscomp_core::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SymbolTransform {
    delta_nb_bits: i32,
    delta_find_state: i32,
}

/// Encoding counterpart of an [`FseTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FseEncodeTable {
    accuracy_log: u8,
    /// Next-state values, in `[size, 2 * size)`.
    state_table: Vec<u16>,
    transforms: Vec<SymbolTransform>,
}

impl FseEncodeTable {
    /// Derive the encoding table from a decoding table's distribution.
    pub fn new(table: &FseTable) -> Result<Self> {
        let log = table.accuracy_log() as u32;
        let counts = table.counts();
        let size = 1usize << log;
        let spread = spread_symbols(counts, table.accuracy_log())?;

        let mut cumul = vec![0usize; counts.len() + 1];
        for (s, &c) in counts.iter().enumerate() {
            let share = if c == -1 { 1 } else { c.max(0) as usize };
            cumul[s + 1] = cumul[s] + share;
        }

        let mut state_table = vec![0u16; size];
        for (u, &symbol) in spread.iter().enumerate() {
            let slot = &mut cumul[symbol as usize];
            state_table[*slot] = (size + u) as u16;
            *slot += 1;
        }

        let mut total = 0i32;
        let transforms = counts
            .iter()
            .map(|&c| match c {
                0 => SymbolTransform {
                    delta_nb_bits: (((log + 1) << 16) as i32) - (1 << log),
                    delta_find_state: 0,
                },
                -1 | 1 => {
                    let t = SymbolTransform {
                        delta_nb_bits: ((log << 16) as i32) - (1 << log),
                        delta_find_state: total - 1,
                    };
                    total += 1;
                    t
                }
                c => {
                    let c = c as u32;
                    let max_bits_out = log - highest_bit(c - 1);
                    let min_state_plus = c << max_bits_out;
                    let t = SymbolTransform {
                        delta_nb_bits: ((max_bits_out << 16) as i32) - min_state_plus as i32,
                        delta_find_state: total - c as i32,
                    };
                    total += c as i32;
                    t
                }
            })
            .collect();

        Ok(Self {
            accuracy_log: table.accuracy_log(),
            state_table,
            transforms,
        })
    }

    #[inline]
    pub fn accuracy_log(&self) -> u8 {
        self.accuracy_log
    }

    /// Bits needed to leave `state` when encoding `symbol`.
    #[inline]
    fn nb_bits_out(&self, state: u32, symbol: u8) -> u32 {
        let t = self.transforms[symbol as usize];
        ((state as i32 + t.delta_nb_bits) >> 16) as u32
    }
}

/// One FSE state accumulating bits into a [`BitWriter`].
#[derive(Debug)]
pub struct FseEncoder<'a> {
    table: &'a FseEncodeTable,
    state: u32,
}

impl<'a> FseEncoder<'a> {
    /// Start in the cheapest state that decodes to `first_symbol`.
    ///
    /// `first_symbol` is the last symbol of the message.
    pub fn new(table: &'a FseEncodeTable, first_symbol: u8) -> Self {
        let t = table.transforms[first_symbol as usize];
        let nb_bits = ((t.delta_nb_bits + (1 << 15)) >> 16) as u32;
        let value = ((nb_bits << 16) as i32 - t.delta_nb_bits) as u32;
        let index = (value >> nb_bits) as i32 + t.delta_find_state;
        Self {
            table,
            state: table.state_table[index as usize] as u32,
        }
    }

    /// Encode `symbol`, flushing the bits that identify the current state.
    #[inline]
    pub fn encode(&mut self, writer: &mut BitWriter, symbol: u8) {
        let t = self.table.transforms[symbol as usize];
        let nb_bits = self.table.nb_bits_out(self.state, symbol);
        writer.write(self.state as u64, nb_bits);
        let index = (self.state >> nb_bits) as i32 + t.delta_find_state;
        self.state = self.table.state_table[index as usize] as u32;
    }

    /// Write the final state; the decoder reads it first.
    pub fn flush(self, writer: &mut BitWriter) {
        writer.write(self.state as u64, self.table.accuracy_log as u32);
    }
}
