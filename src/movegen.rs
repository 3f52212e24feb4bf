//! Pseudo-legal move generation
//!
//! Generators fill a caller-owned `MoveList` and are split by the move
//! classes the selector stages want: tactical (captures and promotions),
//! quiet, check evasions and the quiescence set. Castling is generated
//! fully legally (rights, empty path, no attacked transit square); other
//! moves are pseudo-legal and may still leave the own king in check.
//!
//! The legality helpers come in two strengths. `is_pseudo_move_legal` is
//! the strict test applied to moves imported from other nodes (hash moves,
//! killers). `is_plausible_move_legal` is the cheap screen run first; it
//! skips only the castle transit-attack scan, so it can false-positive on
//! a castle through a guarded square and on nothing else.

use crate::attacks::ATTACK_TABLES;
use crate::board::{Bitboard, CastleRights, Color, Piece, PieceType, Position, Square};
use crate::moves::{Move, MoveList};

const PROMOTION_KINDS: [PieceType; 4] = [
    PieceType::Queen,
    PieceType::Rook,
    PieceType::Bishop,
    PieceType::Knight,
];

/// Generate captures (including en passant) and all promotions
pub fn generate_pseudo_tactical_moves(pos: &Position, list: &mut MoveList) {
    let us = pos.side_to_move;
    let them = us.opposite();
    let tables = &*ATTACK_TABLES;
    let occ = pos.board.all_bb;
    let theirs = pos.board.occupied_bb[them as usize];

    let pawn = Piece::new(PieceType::Pawn, us);
    let promo_rank: u8 = if us == Color::White { 7 } else { 0 };
    let forward: i8 = if us == Color::White { 8 } else { -8 };

    for from in pos.board.pieces(us, PieceType::Pawn) {
        for to in tables.pawn_attacks(from, us) & theirs {
            // Unoccupied targets were masked out above
            let Some(victim) = pos.board.piece_on(to) else { continue };
            if to.rank() == promo_rank {
                for promo in PROMOTION_KINDS {
                    list.push(Move::new_promotion(from, to, pawn, promo, Some(victim)));
                }
            } else {
                list.push(Move::new_capture(from, to, pawn, victim));
            }
        }

        let push = Square((from.0 as i8 + forward) as u8);
        if push.rank() == promo_rank && !occ.test(push) {
            for promo in PROMOTION_KINDS {
                list.push(Move::new_promotion(from, push, pawn, promo, None));
            }
        }

        if let Some(ep) = pos.ep_square {
            if tables.pawn_attacks(from, us).test(ep) {
                list.push(Move::new_en_passant(from, ep, pawn, Piece::new(PieceType::Pawn, them)));
            }
        }
    }

    for piece_type in [
        PieceType::Knight,
        PieceType::Bishop,
        PieceType::Rook,
        PieceType::Queen,
        PieceType::King,
    ] {
        let piece = Piece::new(piece_type, us);
        for from in pos.board.pieces(us, piece_type) {
            for to in piece_attacks(piece_type, from, occ) & theirs {
                let Some(victim) = pos.board.piece_on(to) else { continue };
                list.push(Move::new_capture(from, to, piece, victim));
            }
        }
    }
}

/// Generate non-capturing, non-promoting moves, castling included
pub fn generate_pseudo_quiet_moves(pos: &Position, list: &mut MoveList) {
    let us = pos.side_to_move;
    let tables = &*ATTACK_TABLES;
    let occ = pos.board.all_bb;

    let pawn = Piece::new(PieceType::Pawn, us);
    let promo_rank: u8 = if us == Color::White { 7 } else { 0 };
    let start_rank: u8 = if us == Color::White { 1 } else { 6 };
    let forward: i8 = if us == Color::White { 8 } else { -8 };

    for from in pos.board.pieces(us, PieceType::Pawn) {
        let push = Square((from.0 as i8 + forward) as u8);
        if push.rank() != promo_rank && !occ.test(push) {
            list.push(Move::new(from, push, pawn));
            if from.rank() == start_rank {
                let double = Square((push.0 as i8 + forward) as u8);
                if !occ.test(double) {
                    list.push(Move::new(from, double, pawn));
                }
            }
        }
    }

    for piece_type in [
        PieceType::Knight,
        PieceType::Bishop,
        PieceType::Rook,
        PieceType::Queen,
        PieceType::King,
    ] {
        let piece = Piece::new(piece_type, us);
        for from in pos.board.pieces(us, piece_type) {
            for to in piece_attacks(piece_type, from, occ) & !occ {
                list.push(Move::new(from, to, piece));
            }
        }
    }

    generate_castles(pos, list);
}

/// Generate all pseudo-legal moves
pub fn generate_pseudo_moves(pos: &Position, list: &mut MoveList) {
    generate_pseudo_tactical_moves(pos, list);
    generate_pseudo_quiet_moves(pos, list);
}

/// Generate fully legal replies to check
pub fn generate_evasions(pos: &Position, list: &mut MoveList) {
    debug_assert!(pos.in_check());
    let us = pos.side_to_move;
    let them = us.opposite();

    let mut candidates = MoveList::new();
    generate_pseudo_moves(pos, &mut candidates);

    let mut probe = pos.clone();
    for &mv in candidates.iter() {
        let undo = probe.do_move(mv);
        let legal = match probe.king_square(us) {
            Some(king) => !probe.square_attacked(king, them),
            None => true,
        };
        probe.undo_move(mv, undo);
        if legal {
            list.push(mv);
        }
    }
}

/// Generate the quiescence set: captures and promotions, plus quiet
/// checking moves when `include_checks` is set
pub fn generate_quiescence_moves(pos: &Position, list: &mut MoveList, include_checks: bool) {
    generate_pseudo_tactical_moves(pos, list);
    if !include_checks {
        return;
    }

    let mut quiets = MoveList::new();
    generate_pseudo_quiet_moves(pos, &mut quiets);

    let mut probe = pos.clone();
    for &mv in quiets.iter() {
        let undo = probe.do_move(mv);
        let checks = probe.in_check();
        probe.undo_move(mv, undo);
        if checks {
            list.push(mv);
        }
    }
}

fn generate_castles(pos: &Position, list: &mut MoveList) {
    let us = pos.side_to_move;
    let them = us.opposite();
    let occ = pos.board.all_bb;
    let king = Piece::new(PieceType::King, us);
    let rook = Piece::new(PieceType::Rook, us);
    let back: u8 = if us == Color::White { 0 } else { 7 };
    let king_from = Square::new(4, back);

    if pos.board.piece_on(king_from) != Some(king) || pos.square_attacked(king_from, them) {
        return;
    }

    let (kingside, queenside) = match us {
        Color::White => (CastleRights::WHITE_KINGSIDE, CastleRights::WHITE_QUEENSIDE),
        Color::Black => (CastleRights::BLACK_KINGSIDE, CastleRights::BLACK_QUEENSIDE),
    };

    if pos.castling.has(kingside)
        && pos.board.piece_on(Square::new(7, back)) == Some(rook)
        && !occ.test(Square::new(5, back))
        && !occ.test(Square::new(6, back))
        && !pos.square_attacked(Square::new(5, back), them)
        && !pos.square_attacked(Square::new(6, back), them)
    {
        list.push(Move::new_castle(king_from, Square::new(6, back), king));
    }

    if pos.castling.has(queenside)
        && pos.board.piece_on(Square::new(0, back)) == Some(rook)
        && !occ.test(Square::new(1, back))
        && !occ.test(Square::new(2, back))
        && !occ.test(Square::new(3, back))
        && !pos.square_attacked(Square::new(2, back), them)
        && !pos.square_attacked(Square::new(3, back), them)
    {
        list.push(Move::new_castle(king_from, Square::new(2, back), king));
    }
}

#[inline]
fn piece_attacks(piece_type: PieceType, from: Square, occ: Bitboard) -> Bitboard {
    let tables = &*ATTACK_TABLES;
    match piece_type {
        PieceType::Knight => tables.knight_attacks(from),
        PieceType::Bishop => tables.bishop_attacks(from, occ),
        PieceType::Rook => tables.rook_attacks(from, occ),
        PieceType::Queen => tables.queen_attacks(from, occ),
        PieceType::King => tables.king_attacks(from),
        PieceType::Pawn => Bitboard::EMPTY,
    }
}

impl Position {
    /// Does the move fit the current board? Checks the moving piece, the
    /// captured piece, the target square and the movement geometry,
    /// including slider paths. For castles it checks rights, rook and an
    /// empty path but not attacked transit squares, so it can claim
    /// legality for a castle through a guarded square.
    pub fn is_plausible_move_legal(&self, mv: Move) -> bool {
        self.move_matches_board(mv)
    }

    /// Strict pseudo-legality: everything the plausible test checks, plus
    /// the castle transit-attack scan. The move may still leave the own
    /// king in check.
    pub fn is_pseudo_move_legal(&self, mv: Move) -> bool {
        self.move_matches_board(mv) && (!mv.is_castle() || self.castle_path_safe(mv))
    }

    /// Full legality, by making the move and testing king safety
    pub fn is_move_legal(&self, mv: Move) -> bool {
        if !self.is_pseudo_move_legal(mv) {
            return false;
        }
        let us = self.side_to_move;
        let mut probe = self.clone();
        probe.do_move(mv);
        match probe.king_square(us) {
            Some(king) => !probe.square_attacked(king, us.opposite()),
            None => true,
        }
    }

    /// Does the move give check to the opponent?
    pub fn gives_check(&self, mv: Move) -> bool {
        let mut probe = self.clone();
        probe.do_move(mv);
        probe.in_check()
    }

    fn move_matches_board(&self, mv: Move) -> bool {
        if mv.is_none() {
            return false;
        }
        let piece = mv.piece();
        let from = mv.from();
        let to = mv.to();
        if piece.color != self.side_to_move || self.board.piece_on(from) != Some(piece) {
            return false;
        }
        if mv.promotion().is_some() && piece.piece_type != PieceType::Pawn {
            return false;
        }

        let tables = &*ATTACK_TABLES;
        let occ = self.board.all_bb;

        if mv.is_en_passant() {
            return piece.piece_type == PieceType::Pawn
                && self.ep_square == Some(to)
                && tables.pawn_attacks(from, piece.color).test(to);
        }

        match mv.capture() {
            Some(captured) => {
                if self.board.piece_on(to) != Some(captured) {
                    return false;
                }
            }
            None => {
                if self.board.piece_on(to).is_some() {
                    return false;
                }
            }
        }

        match piece.piece_type {
            PieceType::Pawn => {
                let promo_rank: u8 = if piece.color == Color::White { 7 } else { 0 };
                if (to.rank() == promo_rank) != mv.promotion().is_some() {
                    return false;
                }
                if mv.is_capture() {
                    tables.pawn_attacks(from, piece.color).test(to)
                } else {
                    let forward: i8 = if piece.color == Color::White { 8 } else { -8 };
                    let single = from.0 as i8 + forward;
                    if to.0 as i8 == single {
                        true
                    } else if to.0 as i8 == single + forward {
                        let start_rank: u8 = if piece.color == Color::White { 1 } else { 6 };
                        from.rank() == start_rank && !occ.test(Square(single as u8))
                    } else {
                        false
                    }
                }
            }
            PieceType::Knight => tables.knight_attacks(from).test(to),
            PieceType::Bishop => tables.bishop_attacks(from, occ).test(to),
            PieceType::Rook => tables.rook_attacks(from, occ).test(to),
            PieceType::Queen => tables.queen_attacks(from, occ).test(to),
            PieceType::King => {
                if mv.is_castle() {
                    self.castle_move_matches(mv)
                } else {
                    tables.king_attacks(from).test(to)
                }
            }
        }
    }

    fn castle_move_matches(&self, mv: Move) -> bool {
        let us = self.side_to_move;
        let occ = self.board.all_bb;
        let rook = Piece::new(PieceType::Rook, us);
        let back: u8 = if us == Color::White { 0 } else { 7 };
        if mv.from() != Square::new(4, back) || mv.is_capture() {
            return false;
        }

        let (kingside, queenside) = match us {
            Color::White => (CastleRights::WHITE_KINGSIDE, CastleRights::WHITE_QUEENSIDE),
            Color::Black => (CastleRights::BLACK_KINGSIDE, CastleRights::BLACK_QUEENSIDE),
        };

        if mv.to() == Square::new(6, back) {
            self.castling.has(kingside)
                && self.board.piece_on(Square::new(7, back)) == Some(rook)
                && !occ.test(Square::new(5, back))
                && !occ.test(Square::new(6, back))
        } else if mv.to() == Square::new(2, back) {
            self.castling.has(queenside)
                && self.board.piece_on(Square::new(0, back)) == Some(rook)
                && !occ.test(Square::new(1, back))
                && !occ.test(Square::new(2, back))
                && !occ.test(Square::new(3, back))
        } else {
            false
        }
    }

    fn castle_path_safe(&self, mv: Move) -> bool {
        let us = self.side_to_move;
        let them = us.opposite();
        let back: u8 = if us == Color::White { 0 } else { 7 };
        let transit: &[u8] = if mv.to() == Square::new(6, back) {
            &[4, 5, 6]
        } else {
            &[4, 3, 2]
        };
        transit
            .iter()
            .all(|&file| !self.square_attacked(Square::new(file, back), them))
    }
}
