//! FSE stream decoder.

use super::table::FseTable;
use crate::bits::BackwardBitReader;

/// One FSE state walking a backward bitstream.
///
/// The symbol comes from the current state; the following state is formed
/// from the entry's baseline plus freshly read bits.
#[derive(Debug)]
pub struct FseDecoder<'a> {
    table: &'a FseTable,
    state: usize,
}

impl<'a> FseDecoder<'a> {
    /// Initialize by reading `accuracy_log` bits.
    pub fn new(table: &'a FseTable, bits: &mut BackwardBitReader<'_>) -> Self {
        let state = bits.read(table.accuracy_log() as u32) as usize;
        Self { table, state }
    }

    /// Symbol of the current state.
    #[inline]
    pub fn peek_symbol(&self) -> u8 {
        self.table.entry(self.state).symbol
    }

    /// Advance to the next state.
    #[inline]
    pub fn update(&mut self, bits: &mut BackwardBitReader<'_>) {
        let entry = self.table.entry(self.state);
        let add = bits.read(entry.num_bits as u32) as usize;
        self.state = entry.baseline as usize + add;
    }

    /// Emit the current symbol, then advance.
    #[inline]
    pub fn decode_symbol(&mut self, bits: &mut BackwardBitReader<'_>) -> u8 {
        let symbol = self.peek_symbol();
        self.update(bits);
        symbol
    }

    pub fn state(&self) -> usize {
        self.state
    }
}
