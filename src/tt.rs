//! Transposition table
//!
//! Fixed-size cache of search results keyed by position hash. The table is
//! an array of four-entry buckets; within a bucket the full 64-bit key
//! disambiguates, and eviction picks the entry with the highest replacement
//! score, preferring stale generations first and shallow entries among
//! equals. A key of 0 marks an empty slot; a real position hashing to
//! exactly 0 simply never hits, which is accepted.
//!
//! The table is single-threaded: probes refresh entry ages in place and
//! stores mutate buckets directly. A parallel port must either write the
//! payload before the key or pack `key ^ payload` so torn writes fail the
//! key check; neither is needed here.

use crate::board::{Position, UndoInfo};
use crate::moves::Move;
use log::{debug, info};
use smallvec::SmallVec;
use std::fmt;
use thiserror::Error;

/// Entries per bucket
pub const BUCKET_SIZE: usize = 4;

/// Number of distinct generations before the age counter wraps
pub const GENERATION_LIMIT: u8 = 8;

/// Smallest accepted table budget
pub const MIN_TABLE_BYTES: usize = 1024;

/// Weight of one generation step in the replacement score
const AGE_STEP: i32 = 128;

// Bit layout of the entry payload:
// [63-32] move
// [31-16] score (i16)
// [15-8]  depth
// [7-4]   age
// [1-0]   bound
const MOVE_SHIFT: u32 = 32;
const SCORE_SHIFT: u32 = 16;
const SCORE_MASK: u64 = 0xFFFF;
const DEPTH_SHIFT: u32 = 8;
const DEPTH_MASK: u64 = 0xFF;
const AGE_SHIFT: u32 = 4;
const AGE_MASK: u64 = 0xF;
const BOUND_MASK: u64 = 0x3;

/// How a stored score bounds the true value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    /// Exact score (PV node)
    Exact = 0,
    /// Lower bound (fail high)
    Lower = 1,
    /// Upper bound (fail low)
    Upper = 2,
}

/// Error from table construction
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TtError {
    #[error("table budget of {0} bytes is below the {MIN_TABLE_BYTES} byte minimum")]
    TooSmall(usize),
}

/// One cached search result, packed into 16 bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtEntry {
    key: u64,
    data: u64,
}

impl TtEntry {
    const EMPTY: TtEntry = TtEntry { key: 0, data: 0 };

    fn new(key: u64, mv: Move, depth: i32, score: i32, bound: Bound, age: u8) -> Self {
        let score = score.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        let depth = depth.clamp(0, DEPTH_MASK as i32) as u64;
        let data = ((mv.to_raw() as u64) << MOVE_SHIFT)
            | ((score as u16 as u64) << SCORE_SHIFT)
            | (depth << DEPTH_SHIFT)
            | (((age & AGE_MASK as u8) as u64) << AGE_SHIFT)
            | bound as u64;
        TtEntry { key, data }
    }

    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    /// Best or refutation move recorded for the position
    #[inline]
    pub fn mv(&self) -> Move {
        Move::from_raw((self.data >> MOVE_SHIFT) as u32)
    }

    /// Stored score, sign-extended back from 16 bits
    #[inline]
    pub fn score(&self) -> i32 {
        ((self.data >> SCORE_SHIFT) & SCORE_MASK) as u16 as i16 as i32
    }

    #[inline]
    pub fn depth(&self) -> i32 {
        ((self.data >> DEPTH_SHIFT) & DEPTH_MASK) as i32
    }

    #[inline]
    pub fn age(&self) -> u8 {
        ((self.data >> AGE_SHIFT) & AGE_MASK) as u8
    }

    #[inline]
    pub fn bound(&self) -> Bound {
        match self.data & BOUND_MASK {
            0 => Bound::Exact,
            1 => Bound::Lower,
            2 => Bound::Upper,
            raw => {
                debug_assert!(false, "corrupted bound bits: {raw}");
                Bound::Exact
            }
        }
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.key == 0
    }

    #[inline]
    fn set_age(&mut self, age: u8) {
        self.data = (self.data & !(AGE_MASK << AGE_SHIFT))
            | (((age & AGE_MASK as u8) as u64) << AGE_SHIFT);
    }
}

/// Probe and replacement statistics
#[derive(Clone, Debug, Default)]
pub struct HashStats {
    pub hits: u64,
    pub misses: u64,
    pub occupied: u64,
    pub evictions: u64,
    pub exact: i64,
    pub lower: i64,
    pub upper: i64,
}

impl fmt::Display for HashStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let probes = self.hits + self.misses;
        let rate = |n: u64| {
            if probes == 0 {
                0.0
            } else {
                n as f64 / probes as f64 * 100.0
            }
        };
        write!(
            f,
            "filled: {} evictions: {} hits: {} ({:.2}%) misses: {} ({:.2}%) \
             upper: {} lower: {} exact: {}",
            self.occupied,
            self.evictions,
            self.hits,
            rate(self.hits),
            self.misses,
            rate(self.misses),
            self.upper,
            self.lower,
            self.exact,
        )
    }
}

/// Bucketed transposition table
pub struct TranspositionTable {
    entries: Vec<TtEntry>,
    num_buckets: usize,
    generation: u8,
    /// Replacement cost per stored age, refreshed when the generation
    /// advances; current-generation entries cost the most to evict
    age_scores: [i32; GENERATION_LIMIT as usize],
    stats: HashStats,
}

impl TranspositionTable {
    /// Build a table using at most `max_bytes` of entry storage. The
    /// bucket count is the largest power of two that fits the budget.
    pub fn new(max_bytes: usize) -> Result<Self, TtError> {
        if max_bytes < MIN_TABLE_BYTES {
            return Err(TtError::TooSmall(max_bytes));
        }
        let entry_bytes = std::mem::size_of::<TtEntry>();
        let mut size = entry_bytes * BUCKET_SIZE;
        let mut num_buckets = 1usize;
        while size <= max_bytes >> 1 {
            size <<= 1;
            num_buckets <<= 1;
        }

        let mut table = TranspositionTable {
            entries: vec![TtEntry::EMPTY; num_buckets * BUCKET_SIZE],
            num_buckets,
            generation: 0,
            age_scores: [0; GENERATION_LIMIT as usize],
            stats: HashStats::default(),
        };
        table.set_generation(0);
        debug!(
            "transposition table: {} buckets, {} entries, {} KiB",
            table.num_buckets,
            table.entry_count(),
            size / 1024
        );
        Ok(table)
    }

    /// Total entry capacity
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.num_buckets * BUCKET_SIZE
    }

    #[inline]
    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    #[inline]
    pub fn generation(&self) -> u8 {
        self.generation
    }

    #[inline]
    pub fn stats(&self) -> &HashStats {
        &self.stats
    }

    /// Wipe all entries and statistics
    pub fn clear(&mut self) {
        self.entries.fill(TtEntry::EMPTY);
        self.stats = HashStats::default();
    }

    /// Advance the generation, once per root iteration
    pub fn increment_age(&mut self) {
        self.set_generation((self.generation + 1) % GENERATION_LIMIT);
    }

    fn set_generation(&mut self, generation: u8) {
        debug_assert!(generation < GENERATION_LIMIT);
        self.generation = generation;
        for (i, score) in self.age_scores.iter_mut().enumerate() {
            let mut age = generation as i32 - i as i32;
            if age < 0 {
                age += GENERATION_LIMIT as i32;
            }
            *score = age * AGE_STEP;
        }
    }

    #[inline]
    fn bucket_base(&self, key: u64) -> usize {
        (key as usize & (self.num_buckets - 1)) * BUCKET_SIZE
    }

    #[inline]
    fn replace_score(&self, entry: &TtEntry) -> i32 {
        self.age_scores[entry.age() as usize % GENERATION_LIMIT as usize] - entry.depth()
    }

    /// Look up a position. On a hit the entry's age is refreshed to the
    /// current generation.
    pub fn probe(&mut self, key: u64) -> Option<TtEntry> {
        if key != 0 {
            let base = self.bucket_base(key);
            for entry in &mut self.entries[base..base + BUCKET_SIZE] {
                if entry.key == key {
                    entry.set_age(self.generation);
                    self.stats.hits += 1;
                    return Some(*entry);
                }
            }
        }
        self.stats.misses += 1;
        None
    }

    /// Record a search result. An entry with the same key is updated in
    /// place; otherwise the bucket's best eviction victim is replaced.
    pub fn store(&mut self, key: u64, mv: Move, depth: i32, score: i32, bound: Bound) {
        let base = self.bucket_base(key);
        let mut victim = base;
        let mut victim_score = i32::MIN;

        for i in base..base + BUCKET_SIZE {
            let entry = self.entries[i];
            if key != 0 && entry.key == key {
                self.count_bound(bound, 1);
                self.count_bound(entry.bound(), -1);
                self.entries[i] = TtEntry::new(key, mv, depth, score, bound, self.generation);
                return;
            }
            let replace_score = self.replace_score(&entry);
            if replace_score > victim_score {
                victim = i;
                victim_score = replace_score;
            }
        }

        let old = self.entries[victim];
        if old.is_empty() || old.age() != self.generation {
            self.stats.occupied += 1;
        } else {
            self.stats.evictions += 1;
        }
        self.count_bound(bound, 1);
        self.entries[victim] = TtEntry::new(key, mv, depth, score, bound, self.generation);
    }

    /// Reinsert a whole line of play, walking the position forward and
    /// storing each move as exact at decreasing depth. Used to refresh the
    /// principal variation after an iteration so eviction cannot lose it.
    pub fn store_line(&mut self, pos: &mut Position, line: &[Move], depth: i32, score: i32) {
        let mut undos: SmallVec<[UndoInfo; 64]> = SmallVec::new();
        let mut remaining_depth = depth;
        for &mv in line {
            if mv.is_none() {
                break;
            }
            self.store(pos.hash, mv, remaining_depth, score, Bound::Exact);
            undos.push(pos.do_move(mv));
            remaining_depth -= 1;
        }
        while let Some(undo) = undos.pop() {
            pos.undo_move(line[undos.len()], undo);
        }
    }

    /// Emit the statistics line through the logger
    pub fn print_stats(&self) {
        info!("hash entries {} {}", self.entry_count(), self.stats);
    }

    fn count_bound(&mut self, bound: Bound, delta: i64) {
        match bound {
            Bound::Exact => self.stats.exact += delta,
            Bound::Lower => self.stats.lower += delta,
            Bound::Upper => self.stats.upper += delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Color, Piece, PieceType, Square};
    use crate::movegen::generate_pseudo_moves;
    use crate::moves::MoveList;

    fn any_move() -> Move {
        let knight = Piece::new(PieceType::Knight, Color::White);
        Move::new(Square::new(6, 0), Square::new(5, 2), knight)
    }

    /// Keys that all land in bucket 0 of a 64-bucket table
    fn bucket_zero_key(tag: u64) -> u64 {
        tag << 32
    }

    #[test]
    fn entry_packing_round_trip() {
        let mv = any_move();
        let entry = TtEntry::new(0x1234_5678_9ABC_DEF0, mv, 12, -1234, Bound::Lower, 5);
        assert_eq!(entry.key(), 0x1234_5678_9ABC_DEF0);
        assert_eq!(entry.mv(), mv);
        assert_eq!(entry.depth(), 12);
        assert_eq!(entry.score(), -1234);
        assert_eq!(entry.bound(), Bound::Lower);
        assert_eq!(entry.age(), 5);
    }

    #[test]
    fn entry_is_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<TtEntry>(), 16);
    }

    #[test]
    fn score_extremes_survive_packing() {
        for score in [i16::MIN as i32, -1, 0, 1, i16::MAX as i32] {
            let entry = TtEntry::new(1, Move::NONE, 1, score, Bound::Exact, 0);
            assert_eq!(entry.score(), score);
        }
    }

    #[test]
    fn rejects_tiny_budget() {
        match TranspositionTable::new(1023) {
            Err(TtError::TooSmall(bytes)) => assert_eq!(bytes, 1023),
            _ => panic!("expected TooSmall error"),
        }
        assert!(TranspositionTable::new(MIN_TABLE_BYTES).is_ok());
    }

    #[test]
    fn sizing_is_largest_fitting_power_of_two() {
        // 16-byte entries, 4 per bucket
        let table = TranspositionTable::new(4096).expect("valid size");
        assert_eq!(table.num_buckets(), 64);
        assert_eq!(table.entry_count(), 256);

        let table = TranspositionTable::new(1024).expect("valid size");
        assert_eq!(table.num_buckets(), 16);

        // A budget one byte short of the next doubling stays put
        let table = TranspositionTable::new(8191).expect("valid size");
        assert_eq!(table.num_buckets(), 64);
    }

    #[test]
    fn store_probe_round_trip() {
        let mut table = TranspositionTable::new(64 * 1024).expect("valid size");
        let key = 0xDEAD_BEEF_CAFE_F00D;
        let mv = any_move();
        table.store(key, mv, 9, 421, Bound::Exact);

        let entry = table.probe(key).expect("stored entry");
        assert_eq!(entry.key(), key);
        assert_eq!(entry.mv(), mv);
        assert_eq!(entry.depth(), 9);
        assert_eq!(entry.score(), 421);
        assert_eq!(entry.bound(), Bound::Exact);
        assert_eq!(entry.age(), table.generation());

        assert!(table.probe(key ^ 1).is_none());
        assert_eq!(table.stats().hits, 1);
        assert_eq!(table.stats().misses, 1);
    }

    #[test]
    fn probe_refreshes_age() {
        let mut table = TranspositionTable::new(64 * 1024).expect("valid size");
        let key = 0x1111_2222_3333_4444;
        table.store(key, any_move(), 5, 0, Bound::Exact);

        table.increment_age();
        table.increment_age();
        let entry = table.probe(key).expect("stored entry");
        assert_eq!(entry.age(), table.generation());
    }

    #[test]
    fn same_key_updates_in_place() {
        let mut table = TranspositionTable::new(4096).expect("valid size");
        let key = bucket_zero_key(7);
        table.store(key, any_move(), 3, 10, Bound::Upper);
        table.store(key, any_move(), 8, -20, Bound::Lower);

        let entry = table.probe(key).expect("stored entry");
        assert_eq!(entry.depth(), 8);
        assert_eq!(entry.score(), -20);
        assert_eq!(entry.bound(), Bound::Lower);
        // Still a single slot used
        assert_eq!(table.stats().occupied, 1);
        assert_eq!(table.stats().upper, 0);
        assert_eq!(table.stats().lower, 1);
    }

    #[test]
    fn full_bucket_evicts_shallowest_same_age() {
        let mut table = TranspositionTable::new(4096).expect("valid size");
        assert_eq!(table.num_buckets(), 64);

        // Fill bucket 0 with four entries of one generation, depth 10
        // except one shallow entry
        let keys: Vec<u64> = (1..=4).map(bucket_zero_key).collect();
        table.store(keys[0], any_move(), 10, 0, Bound::Exact);
        table.store(keys[1], any_move(), 10, 0, Bound::Exact);
        table.store(keys[2], any_move(), 4, 0, Bound::Exact);
        table.store(keys[3], any_move(), 10, 0, Bound::Exact);

        // A fifth key displaces the shallowest entry, not the newcomer
        let newcomer = bucket_zero_key(5);
        table.store(newcomer, any_move(), 5, 0, Bound::Exact);

        assert!(table.probe(newcomer).is_some());
        assert!(table.probe(keys[2]).is_none());
        for &key in [keys[0], keys[1], keys[3]].iter() {
            assert!(table.probe(key).is_some(), "deep entry was evicted");
        }
        assert_eq!(table.stats().evictions, 1);
    }

    #[test]
    fn stale_generations_evict_before_shallow_current() {
        let mut table = TranspositionTable::new(4096).expect("valid size");
        let old_deep = bucket_zero_key(1);
        table.store(old_deep, any_move(), 12, 0, Bound::Exact);

        table.increment_age();
        let fresh: Vec<u64> = (2..=4).map(bucket_zero_key).collect();
        for &key in &fresh {
            table.store(key, any_move(), 2, 0, Bound::Exact);
        }

        // Bucket now holds one stale deep entry and three fresh shallow
        // ones; the stale one goes first
        table.store(bucket_zero_key(5), any_move(), 2, 0, Bound::Exact);
        assert!(table.probe(old_deep).is_none());
        for &key in &fresh {
            assert!(table.probe(key).is_some());
        }
    }

    #[test]
    fn age_replacement_score_ordering() {
        let mut table = TranspositionTable::new(4096).expect("valid size");
        let previous = TtEntry::new(1, Move::NONE, 6, 0, Bound::Exact, table.generation());
        table.increment_age();
        let current = TtEntry::new(2, Move::NONE, 6, 0, Bound::Exact, table.generation());
        assert!(table.replace_score(&previous) > table.replace_score(&current));
    }

    #[test]
    fn generation_wraps_around() {
        let mut table = TranspositionTable::new(4096).expect("valid size");
        for _ in 0..GENERATION_LIMIT {
            table.increment_age();
        }
        assert_eq!(table.generation(), 0);
        // After a full wrap, an entry written back at generation 0 is
        // indistinguishable from a fresh one
        let entry = TtEntry::new(1, Move::NONE, 6, 0, Bound::Exact, 0);
        let fresh = TtEntry::new(2, Move::NONE, 6, 0, Bound::Exact, table.generation());
        assert_eq!(table.replace_score(&entry), table.replace_score(&fresh));
    }

    #[test]
    fn clear_wipes_entries_and_stats() {
        let mut table = TranspositionTable::new(4096).expect("valid size");
        let key = bucket_zero_key(9);
        table.store(key, any_move(), 5, 50, Bound::Exact);
        table.probe(key);
        table.clear();
        assert!(table.probe(key).is_none());
        assert_eq!(table.stats().hits, 0);
        assert_eq!(table.stats().occupied, 0);
    }

    #[test]
    fn store_line_restores_position_and_seeds_prefixes() {
        let mut pos = Position::startpos();
        let fen_before = pos.to_fen();

        // A short legal line from the starting position
        let line = [
            Move::new(
                Square::new(4, 1),
                Square::new(4, 3),
                Piece::new(PieceType::Pawn, Color::White),
            ),
            Move::new(
                Square::new(4, 6),
                Square::new(4, 4),
                Piece::new(PieceType::Pawn, Color::Black),
            ),
            Move::new(
                Square::new(6, 0),
                Square::new(5, 2),
                Piece::new(PieceType::Knight, Color::White),
            ),
        ];

        let mut table = TranspositionTable::new(64 * 1024).expect("valid size");
        table.store_line(&mut pos, &line, 9, 33);
        assert_eq!(pos.to_fen(), fen_before);

        // Each prefix position knows its continuation
        let mut probe_pos = Position::startpos();
        for (i, &mv) in line.iter().enumerate() {
            let entry = table.probe(probe_pos.hash).expect("line entry");
            assert_eq!(entry.mv(), mv);
            assert_eq!(entry.depth(), 9 - i as i32);
            assert_eq!(entry.bound(), Bound::Exact);
            probe_pos.do_move(mv);
        }
    }

    #[test]
    fn line_moves_stay_applicable() {
        // The moves written by store_line must be replayable from the
        // stored positions
        let mut pos = Position::startpos();
        let mut list = MoveList::new();
        generate_pseudo_moves(&pos, &mut list);
        let mv = *list.iter().find(|m| m.is_some()).expect("some move");
        let mut table = TranspositionTable::new(4096).expect("valid size");
        table.store_line(&mut pos, &[mv], 3, 0);
        let entry = table.probe(pos.hash).expect("entry");
        assert!(pos.is_pseudo_move_legal(entry.mv()));
    }
}
