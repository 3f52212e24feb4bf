//! Static exchange evaluation
//!
//! Resolves the capture sequence on one square by repeatedly applying the
//! least valuable attacker, recomputing slider attacks against the shrinking
//! occupancy so x-ray attackers join in as the pieces in front of them are
//! spent. The result is the material balance of the exchange for the side
//! making the first capture.

use crate::board::{Bitboard, Color, PieceType, Position, Square};
use crate::moves::Move;

/// Piece values used for move ordering and exchange evaluation. These are
/// not evaluation weights; they only have to rank exchanges sensibly and
/// make queen captures dominate.
#[inline]
pub fn material_value(piece_type: PieceType) -> i32 {
    match piece_type {
        PieceType::Pawn => 100,
        PieceType::Knight => 300,
        PieceType::Bishop => 300,
        PieceType::Rook => 500,
        PieceType::Queen => 900,
        PieceType::King => 20000,
    }
}

impl Position {
    /// Static exchange evaluation of `mv`, in ordering material units
    pub fn static_exchange_eval(&self, mv: Move) -> i32 {
        let to = mv.to();
        let mut gain = [0i32; 32];
        let mut occ = self.board.all_bb;
        let mut stm = self.side_to_move;
        let mut attacker_sq = mv.from();
        let mut attacker_value = material_value(mv.piece().piece_type);

        gain[0] = mv.capture().map_or(0, |p| material_value(p.piece_type));
        if mv.is_en_passant() {
            occ.clear(Square::new(to.file(), mv.from().rank()));
        }
        if let Some(promo) = mv.promotion() {
            attacker_value = material_value(promo);
            gain[0] += attacker_value - material_value(PieceType::Pawn);
        }

        let mut depth = 0usize;
        while depth + 1 < gain.len() {
            occ.clear(attacker_sq);
            stm = stm.opposite();
            let attackers =
                self.attackers_to(to, occ) & self.board.occupied_bb[stm as usize] & occ;
            let Some((sq, piece_type)) = least_attacker(self, attackers, stm) else {
                break;
            };
            if piece_type == PieceType::King {
                // The king cannot recapture on a square the opponent
                // still covers
                let mut after = occ;
                after.clear(sq);
                let opponents = self.attackers_to(to, after)
                    & self.board.occupied_bb[stm.opposite() as usize]
                    & after;
                if !opponents.is_empty() {
                    break;
                }
            }
            depth += 1;
            gain[depth] = attacker_value - gain[depth - 1];
            attacker_value = material_value(piece_type);
            attacker_sq = sq;
        }

        // Either side may decline to continue the exchange
        while depth > 0 {
            gain[depth - 1] = -(-gain[depth - 1]).max(gain[depth]);
            depth -= 1;
        }
        gain[0]
    }
}

fn least_attacker(
    pos: &Position,
    attackers: Bitboard,
    color: Color,
) -> Option<(Square, PieceType)> {
    for piece_type in PieceType::ALL {
        let mut bb = attackers & pos.board.pieces(color, piece_type);
        if let Some(sq) = bb.pop_lsb() {
            return Some((sq, piece_type));
        }
    }
    None
}
