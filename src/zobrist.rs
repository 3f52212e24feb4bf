//! Zobrist hashing keys
//!
//! One 64-bit key per (piece, square), plus keys for the side to move,
//! each castling-rights mask and each en passant file. The keys come from
//! a fixed-seed xoshiro stream so hashes are stable across runs.

use crate::board::{CastleRights, Piece, Square};
use once_cell::sync::Lazy;
use rand::RngCore;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Process-wide zobrist keys
pub static ZOBRIST: Lazy<Zobrist> = Lazy::new(Zobrist::new);

const ZOBRIST_SEED: u64 = 0x7ac1_01f5_8ed3_a947;

pub struct Zobrist {
    /// Indexed by the 4-bit piece code (0 and unused codes stay zero)
    pieces: [[u64; 64]; 16],
    castling: [u64; 16],
    ep_file: [u64; 8],
    side: u64,
}

impl Zobrist {
    fn new() -> Self {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(ZOBRIST_SEED);
        let mut pieces = [[0u64; 64]; 16];
        for code in [1, 2, 3, 4, 5, 6, 9, 10, 11, 12, 13, 14] {
            for sq in 0..64 {
                pieces[code][sq] = rng.next_u64();
            }
        }
        let mut castling = [0u64; 16];
        for key in castling.iter_mut() {
            *key = rng.next_u64();
        }
        let mut ep_file = [0u64; 8];
        for key in ep_file.iter_mut() {
            *key = rng.next_u64();
        }
        Zobrist {
            pieces,
            castling,
            ep_file,
            side: rng.next_u64(),
        }
    }

    #[inline]
    pub fn piece_key(&self, piece: Piece, sq: Square) -> u64 {
        self.pieces[piece.code() as usize][sq.index()]
    }

    #[inline]
    pub fn castling_key(&self, rights: CastleRights) -> u64 {
        self.castling[rights.index()]
    }

    #[inline]
    pub fn ep_key(&self, ep: Square) -> u64 {
        self.ep_file[ep.file() as usize]
    }

    /// Xored into the hash when black is to move
    #[inline]
    pub fn side_key(&self) -> u64 {
        self.side
    }
}
