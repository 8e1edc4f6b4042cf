//! LZ77 match finding over hash chains.
//!
//! Positions are absolute indices into one history buffer holding the
//! dictionary content (if any) followed by the frame's input, so matches
//! may cross block boundaries and reach into the dictionary.
//!
//! At each position the three repeat offsets are tried first since they
//! are the cheapest to encode; the hash chain is then walked up to the
//! level-dependent search depth. Levels from `Default` upward add one step
//! of lazy evaluation: a match is deferred when the next position starts a
//! longer one.

use crate::block::{RepeatOffsets, Sequence};
use tlscomp_core::CompressionLevel;

/// Shortest match the finder emits.
pub const MIN_MATCH: usize = 4;

/// Longest match a single sequence can describe.
pub const MAX_MATCH: usize = 131_074;

const HASH_LOG: u32 = 16;
const HASH_SIZE: usize = 1 << HASH_LOG;

/// Multiplicative hash constant (golden ratio).
const HASH_PRIME: u32 = 0x9E37_79B1;

/// Matches at least this long end the chain walk early.
const GOOD_ENOUGH: usize = 64;

/// A match found at `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub position: usize,
    pub offset: usize,
    pub length: usize,
}

impl Match {
    #[inline]
    pub fn new(position: usize, offset: usize, length: usize) -> Self {
        Self {
            position,
            offset,
            length,
        }
    }
}

/// A block split into LZ77 commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBlock {
    /// Literal bytes in order of appearance.
    pub literals: Vec<u8>,
    /// `(literal_length, offset, match_length)` with actual offsets.
    pub sequences: Vec<Sequence>,
}

/// Hash-chain match finder.
///
/// `head` holds `position + 1` of the newest entry per bucket (0 = empty);
/// `chain[p]` links position `p` to the previous entry in its bucket.
#[derive(Clone)]
pub struct MatchFinder {
    search_depth: usize,
    lazy: bool,
    max_offset: usize,
    head: Vec<u32>,
    chain: Vec<u32>,
}

impl core::fmt::Debug for MatchFinder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MatchFinder")
            .field("search_depth", &self.search_depth)
            .field("lazy", &self.lazy)
            .field("max_offset", &self.max_offset)
            .field("chain_len", &self.chain.len())
            .finish()
    }
}

/// Hash chain depth for a level.
pub fn search_depth(level: CompressionLevel) -> usize {
    match level {
        CompressionLevel::None => 1,
        CompressionLevel::Fast => 4,
        CompressionLevel::Default => 16,
        CompressionLevel::Best => 64,
        CompressionLevel::Ultra => 256,
        CompressionLevel::Custom(n) => n.clamp(1, 1024) as usize,
    }
}

impl MatchFinder {
    /// Finder for `level` whose matches never reach further back than
    /// `max_offset` bytes.
    pub fn new(level: CompressionLevel, max_offset: usize) -> Self {
        let search_depth = search_depth(level);
        Self {
            search_depth,
            lazy: search_depth >= 16,
            max_offset: max_offset.max(1),
            head: vec![0; HASH_SIZE],
            chain: Vec::new(),
        }
    }

    pub fn search_depth(&self) -> usize {
        self.search_depth
    }

    #[inline]
    fn hash(data: &[u8], pos: usize) -> usize {
        let bytes = [data[pos], data[pos + 1], data[pos + 2], data[pos + 3]];
        (u32::from_le_bytes(bytes).wrapping_mul(HASH_PRIME) >> (32 - HASH_LOG)) as usize
    }

    /// Record `pos` in the hash chains.
    #[inline]
    pub fn insert(&mut self, data: &[u8], pos: usize) {
        if pos + MIN_MATCH > data.len() {
            return;
        }
        if self.chain.len() <= pos {
            self.chain.resize(data.len().max(pos + 1), 0);
        }
        let h = Self::hash(data, pos);
        self.chain[pos] = self.head[h];
        self.head[h] = (pos + 1) as u32;
    }

    /// Insert every position in `start..end`.
    pub fn insert_range(&mut self, data: &[u8], start: usize, end: usize) {
        for pos in start..end {
            self.insert(data, pos);
        }
    }

    /// Common prefix length of `data[a..]` and `data[b..]`, stopping at
    /// `limit` (exclusive) for the `b` side. Requires `a < b`.
    #[inline]
    fn common_length(data: &[u8], a: usize, b: usize, limit: usize) -> usize {
        let max = (limit - b).min(MAX_MATCH);
        data[a..]
            .iter()
            .zip(&data[b..b + max])
            .take_while(|(x, y)| x == y)
            .count()
    }

    /// Best match starting at `pos`, not extending past `end`.
    ///
    /// `reps` are the repeat offsets in effect at `pos`.
    pub fn find_best(&self, data: &[u8], pos: usize, end: usize, reps: [u32; 3]) -> Option<Match> {
        if pos + MIN_MATCH > end {
            return None;
        }

        let mut best: Option<Match> = None;
        for &rep in &reps {
            let offset = rep as usize;
            if offset == 0 || offset > pos || offset > self.max_offset {
                continue;
            }
            let length = Self::common_length(data, pos - offset, pos, end);
            if length >= MIN_MATCH && best.map_or(true, |b| length > b.length) {
                best = Some(Match::new(pos, offset, length));
            }
        }

        // A repeat match only loses to a chain match that is at least two
        // bytes longer.
        let rep_bonus = best.map_or(0, |b| b.length + 1);
        let h = Self::hash(data, pos);
        let mut candidate = self.head[h] as usize;
        let mut depth = 0;
        let mut best_chain: Option<Match> = None;
        while candidate != 0 && depth < self.search_depth {
            let cand = candidate - 1;
            if cand >= pos {
                candidate = self.chain.get(cand).copied().unwrap_or(0) as usize;
                continue;
            }
            let offset = pos - cand;
            if offset > self.max_offset {
                break;
            }
            if data[cand..cand + MIN_MATCH] == data[pos..pos + MIN_MATCH] {
                let length = Self::common_length(data, cand, pos, end);
                if best_chain.map_or(true, |b| length > b.length) {
                    best_chain = Some(Match::new(pos, offset, length));
                    if length >= GOOD_ENOUGH || pos + length >= end {
                        break;
                    }
                }
            }
            candidate = self.chain[cand] as usize;
            depth += 1;
        }

        match best_chain {
            Some(m) if m.length > rep_bonus => Some(m),
            _ => best.or(best_chain),
        }
    }

    /// Parse `data[start..end]` into literals and sequences.
    ///
    /// Positions before `start` must already be inserted. Every position
    /// of the block is inserted on return.
    pub fn parse_block(
        &mut self,
        data: &[u8],
        start: usize,
        end: usize,
        repeat_offsets: RepeatOffsets,
    ) -> ParsedBlock {
        let mut parsed = ParsedBlock::default();
        let mut reps = repeat_offsets;
        let mut anchor = start;
        let mut pos = start;

        while pos + MIN_MATCH <= end {
            let Some(mut found) = self.find_best(data, pos, end, reps.offsets()) else {
                self.insert(data, pos);
                pos += 1;
                continue;
            };

            if self.lazy {
                self.insert(data, pos);
                while found.position + 1 + MIN_MATCH <= end {
                    let next = found.position + 1;
                    match self.find_best(data, next, end, reps.offsets()) {
                        Some(m) if m.length > found.length + 1 => {
                            self.insert(data, next);
                            found = m;
                        }
                        _ => break,
                    }
                }
            }

            let literal_length = (found.position - anchor) as u32;
            parsed
                .literals
                .extend_from_slice(&data[anchor..found.position]);
            reps.encode(found.offset as u32, literal_length);
            parsed.sequences.push(Sequence::new(
                literal_length,
                found.offset as u32,
                found.length as u32,
            ));

            let match_end = found.position + found.length;
            let first_new = if self.lazy { found.position + 1 } else { pos };
            self.insert_range(data, first_new.max(pos), match_end);
            pos = match_end;
            anchor = match_end;
        }

        self.insert_range(data, pos, end);
        parsed.literals.extend_from_slice(&data[anchor..end]);
        parsed
    }
}
