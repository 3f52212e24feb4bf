//! History heuristic
//!
//! A small accumulator scoring quiet moves by how often they produced beta
//! cutoffs, indexed by moving piece and destination square. The selector
//! reads it to order the quiet phase; the search bumps it on cutoffs and
//! decays or clears it between games.

use crate::moves::Move;

/// Bound on history scores. Also the grain separating the move ordering
/// layers, so layer boundaries never overlap.
pub const MAX_HISTORY: i32 = 1 << 14;

/// Piece-code (16) times destination square (64)
const HISTORY_SIZE: usize = 16 * 64;

/// Cutoff history for quiet move ordering
pub struct History {
    table: [i32; HISTORY_SIZE],
}

impl History {
    pub fn new() -> Self {
        History {
            table: [0; HISTORY_SIZE],
        }
    }

    /// Score for a quiet move, in `[-MAX_HISTORY, MAX_HISTORY]`
    #[inline]
    pub fn get(&self, mv: Move) -> i32 {
        self.table[mv.history_index()]
    }

    /// Push the score toward the bound by `delta` (negative to punish).
    /// The gravity term keeps the value inside the bound while preserving
    /// relative ordering.
    pub fn bump(&mut self, mv: Move, delta: i32) {
        let entry = &mut self.table[mv.history_index()];
        *entry += delta - *entry * delta.abs() / MAX_HISTORY;
        *entry = (*entry).clamp(-MAX_HISTORY, MAX_HISTORY);
    }

    /// Halve every score, softening stale statistics between searches
    pub fn decay(&mut self) {
        for entry in self.table.iter_mut() {
            *entry /= 2;
        }
    }

    /// Forget everything (new game)
    pub fn clear(&mut self) {
        self.table = [0; HISTORY_SIZE];
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
