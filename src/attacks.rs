//! Attack tables
//!
//! Leaper attacks (knight, king, pawn) come from precomputed per-square
//! tables built once at startup. Slider attacks are computed on demand by
//! walking rays against the live occupancy, so callers can pass a modified
//! occupancy to see through removed pieces.

use crate::board::{Bitboard, Color, Square};
use once_cell::sync::Lazy;

/// Process-wide attack tables
pub static ATTACK_TABLES: Lazy<AttackTables> = Lazy::new(AttackTables::new);

const BISHOP_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ROOK_DIRS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

pub struct AttackTables {
    knight: [Bitboard; 64],
    king: [Bitboard; 64],
    /// Squares a pawn of the given color attacks from here
    pawn: [[Bitboard; 64]; 2],
}

impl AttackTables {
    fn new() -> Self {
        let mut knight = [Bitboard::EMPTY; 64];
        let mut king = [Bitboard::EMPTY; 64];
        let mut pawn = [[Bitboard::EMPTY; 64]; 2];

        for sq in 0..64u8 {
            let file = (sq & 7) as i8;
            let rank = (sq >> 3) as i8;

            for (df, dr) in [
                (1, 2),
                (2, 1),
                (2, -1),
                (1, -2),
                (-1, -2),
                (-2, -1),
                (-2, 1),
                (-1, 2),
            ] {
                if let Some(to) = offset_square(file, rank, df, dr) {
                    knight[sq as usize].set(to);
                }
            }

            for (df, dr) in [
                (1, 0),
                (1, 1),
                (0, 1),
                (-1, 1),
                (-1, 0),
                (-1, -1),
                (0, -1),
                (1, -1),
            ] {
                if let Some(to) = offset_square(file, rank, df, dr) {
                    king[sq as usize].set(to);
                }
            }

            for df in [-1, 1] {
                if let Some(to) = offset_square(file, rank, df, 1) {
                    pawn[Color::White as usize][sq as usize].set(to);
                }
                if let Some(to) = offset_square(file, rank, df, -1) {
                    pawn[Color::Black as usize][sq as usize].set(to);
                }
            }
        }

        AttackTables { knight, king, pawn }
    }

    #[inline]
    pub fn knight_attacks(&self, sq: Square) -> Bitboard {
        self.knight[sq.index()]
    }

    #[inline]
    pub fn king_attacks(&self, sq: Square) -> Bitboard {
        self.king[sq.index()]
    }

    /// Capture targets of a pawn of `color` standing on `sq`
    #[inline]
    pub fn pawn_attacks(&self, sq: Square, color: Color) -> Bitboard {
        self.pawn[color as usize][sq.index()]
    }

    pub fn bishop_attacks(&self, sq: Square, occ: Bitboard) -> Bitboard {
        sliding_attacks(sq, occ, &BISHOP_DIRS)
    }

    pub fn rook_attacks(&self, sq: Square, occ: Bitboard) -> Bitboard {
        sliding_attacks(sq, occ, &ROOK_DIRS)
    }

    pub fn queen_attacks(&self, sq: Square, occ: Bitboard) -> Bitboard {
        self.bishop_attacks(sq, occ) | self.rook_attacks(sq, occ)
    }
}

fn sliding_attacks(sq: Square, occ: Bitboard, dirs: &[(i8, i8)]) -> Bitboard {
    let mut attacks = Bitboard::EMPTY;
    for &(df, dr) in dirs {
        let mut file = sq.file() as i8;
        let mut rank = sq.rank() as i8;
        loop {
            file += df;
            rank += dr;
            if !(0..8).contains(&file) || !(0..8).contains(&rank) {
                break;
            }
            let to = Square::new(file as u8, rank as u8);
            attacks.set(to);
            if occ.test(to) {
                break;
            }
        }
    }
    attacks
}

#[inline]
fn offset_square(file: i8, rank: i8, df: i8, dr: i8) -> Option<Square> {
    let file = file + df;
    let rank = rank + dr;
    if (0..8).contains(&file) && (0..8).contains(&rank) {
        Some(Square::new(file as u8, rank as u8))
    } else {
        None
    }
}
