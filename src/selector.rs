//! Staged move selection
//!
//! Per-node state machine that generates and orders pseudo-legal moves
//! lazily, one phase at a time:
//!
//! 1. Hash move from the transposition table
//! 2. Winning tactics (captures and promotions passing exchange evaluation)
//! 3. Killer moves, including the grand-parent's at ply 2 and deeper
//! 4. Quiet moves ordered by history
//! 5. Losing tactics, demoted here when their exchange came out negative
//!
//! Root, in-check and quiescence nodes use their own phase lists. The
//! ordering decides how much of the tree alpha-beta can cut, so everything
//! here is allocation-free: candidate buffers are fixed-size arrays inside
//! the selector, and each move is yielded at most once per node.

use crate::history::{History, MAX_HISTORY};
use crate::movegen::{
    generate_evasions, generate_pseudo_quiet_moves, generate_pseudo_tactical_moves,
    generate_quiescence_moves,
};
use crate::moves::{Move, MoveList, MAX_MOVES};
use crate::board::{PieceType, Position};
use crate::search::{EngineOptions, RootData, SearchStack};
use crate::see::material_value;

/// Node kinds, each with its own phase list and ordered-prefix length
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Generator {
    Root = 0,
    Pv = 1,
    NonPv = 2,
    Escape = 3,
    Quiescence = 4,
    QuiescenceCheck = 5,
}

/// Selection phases. Each generator walks its own slice of these, strictly
/// forward; no phase is entered twice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Trans,
    GoodTactics,
    Killers,
    Quiet,
    BadTactics,
    Evasions,
    Root,
    QSearch,
    QSearchChecks,
    End,
}

const ROOT_PHASES: &[Phase] = &[Phase::Root, Phase::End];
const MAIN_PHASES: &[Phase] = &[
    Phase::Trans,
    Phase::GoodTactics,
    Phase::Killers,
    Phase::Quiet,
    Phase::BadTactics,
    Phase::End,
];
const ESCAPE_PHASES: &[Phase] = &[Phase::Evasions, Phase::End];
const QUIESCENCE_PHASES: &[Phase] = &[Phase::Trans, Phase::QSearch, Phase::End];
const QUIESCENCE_CHECK_PHASES: &[Phase] = &[Phase::Trans, Phase::QSearchChecks, Phase::End];

/// How many yields of a phase pick the best remaining score before falling
/// back to generation order. Root moves are pre-sorted, so zero there.
const ORDERED_MOVE_COUNT: [usize; 6] = [0, 256, 256, 16, 4, 4];

/// Most killer slots a node can merge: two of its own plus two inherited
const MAX_KILLERS: usize = 5;

fn phase_list(generator: Generator) -> &'static [Phase] {
    match generator {
        Generator::Root => ROOT_PHASES,
        Generator::Pv | Generator::NonPv => MAIN_PHASES,
        Generator::Escape => ESCAPE_PHASES,
        Generator::Quiescence => QUIESCENCE_PHASES,
        Generator::QuiescenceCheck => QUIESCENCE_CHECK_PHASES,
    }
}

/// Staged per-node move selector. Created at entry to a node, drained by
/// `next`, then dropped; it borrows the position and history and owns no
/// heap memory.
pub struct MoveSelector<'a> {
    pos: &'a Position,
    history: &'a History,
    generator: Generator,
    phases: &'static [Phase],
    phase_idx: usize,
    hash_move: Move,
    depth: i32,
    ply: usize,
    ordered_moves: usize,
    moves: MoveList,
    scores: [i32; MAX_MOVES],
    /// Cursor into the current phase's candidates
    current: usize,
    killers: [Move; MAX_KILLERS],
    num_killers: usize,
    mate_killer: Move,
    bad_tactics: [Move; MAX_MOVES],
    /// Exchange scores of the bad tactics, kept for a future ordering
    /// experiment; yields are in insertion order
    bad_scores: [i32; MAX_MOVES],
    num_bad: usize,
    single_reply: bool,
    yielded: usize,
}

impl<'a> MoveSelector<'a> {
    /// Create a selector for a main-search, in-check or quiescence node.
    /// If the position is in check the generator is overridden to
    /// `Escape`. Killers come from the search stack at `ply` and, from
    /// ply 2 on, the grand-parent node.
    pub fn new(
        pos: &'a Position,
        history: &'a History,
        generator: Generator,
        stack: Option<&SearchStack>,
        hash_move: Move,
        depth: i32,
        ply: usize,
    ) -> Self {
        debug_assert!(generator != Generator::Root, "root nodes use new_root");
        let generator = if pos.in_check() { Generator::Escape } else { generator };

        let mut killers = [Move::NONE; MAX_KILLERS];
        let mut num_killers = 0;
        let mut mate_killer = Move::NONE;
        if let Some(stack) = stack {
            let node = stack.node(ply);
            mate_killer = node.mate_killer;
            if node.killers[0].is_some() {
                killers[0] = node.killers[0];
                num_killers = 1;
                if node.killers[1].is_some() {
                    killers[1] = node.killers[1];
                    num_killers = 2;
                }
            }
            if let Some(grandparent) = stack.grandparent(ply) {
                let inherited = grandparent.killers;
                if inherited[0] != killers[0]
                    && inherited[0] != killers[1]
                    && inherited[0].is_some()
                {
                    killers[num_killers] = inherited[0];
                    num_killers += 1;
                    if inherited[1] != killers[0]
                        && inherited[1] != killers[1]
                        && inherited[1].is_some()
                    {
                        killers[num_killers] = inherited[1];
                        num_killers += 1;
                    }
                }
            }
        }

        let mut selector = MoveSelector {
            pos,
            history,
            generator,
            phases: phase_list(generator),
            phase_idx: 0,
            hash_move,
            depth,
            ply,
            ordered_moves: ORDERED_MOVE_COUNT[generator as usize],
            moves: MoveList::new(),
            scores: [0; MAX_MOVES],
            current: 0,
            killers,
            num_killers,
            mate_killer,
            bad_tactics: [Move::NONE; MAX_MOVES],
            bad_scores: [0; MAX_MOVES],
            num_bad: 0,
            single_reply: false,
            yielded: 0,
        };
        selector.enter_phase();
        selector
    }

    /// Create a selector for the root node. Root moves arrive pre-scored
    /// by the driver and are sorted up front: the hash move first, then by
    /// quiescence score at shallow depths, by previous score in multi-PV
    /// mode, and otherwise by subtree size from the last iteration.
    pub fn new_root(
        pos: &'a Position,
        history: &'a History,
        root: &RootData,
        options: &EngineOptions,
        hash_move: Move,
        depth: i32,
    ) -> Self {
        let mut selector = MoveSelector {
            pos,
            history,
            generator: Generator::Root,
            phases: ROOT_PHASES,
            phase_idx: 0,
            hash_move,
            depth,
            ply: 0,
            ordered_moves: ORDERED_MOVE_COUNT[Generator::Root as usize],
            moves: MoveList::new(),
            scores: [0; MAX_MOVES],
            current: 0,
            killers: [Move::NONE; MAX_KILLERS],
            num_killers: 0,
            mate_killer: Move::NONE,
            bad_tactics: [Move::NONE; MAX_MOVES],
            bad_scores: [0; MAX_MOVES],
            num_bad: 0,
            single_reply: false,
            yielded: 0,
        };
        selector.sort_root_moves(root, options);
        selector
    }

    /// Only one legal reply to the check at this node. Valid after
    /// construction of an `Escape` selector; consumers extend the search
    /// on forced lines.
    #[inline]
    pub fn single_reply(&self) -> bool {
        self.single_reply
    }

    /// The generator actually in effect, after any in-check override
    #[inline]
    pub fn generator(&self) -> Generator {
        self.generator
    }

    /// Moves handed out so far
    #[inline]
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Distance from the root this selector was created at
    #[inline]
    pub fn ply(&self) -> usize {
        self.ply
    }

    /// Return the next move to search, or `None` when the node is
    /// exhausted. Within a phase the first `ordered_moves` yields pick the
    /// best remaining score; the rest come in generation order.
    pub fn next(&mut self) -> Option<Move> {
        loop {
            match self.phases[self.phase_idx] {
                Phase::End => return None,

                Phase::Trans => {
                    if self.current == 0 {
                        self.current = 1;
                        let mv = self.hash_move;
                        if mv.is_some() && self.pos.is_plausible_move_legal(mv) {
                            self.yielded += 1;
                            return Some(mv);
                        }
                    }
                    self.advance_phase();
                }

                Phase::Killers => {
                    while self.current < self.num_killers {
                        let mv = self.killers[self.current];
                        self.current += 1;
                        if mv.is_some()
                            && mv != self.hash_move
                            && self.pos.is_plausible_move_legal(mv)
                        {
                            self.yielded += 1;
                            return Some(mv);
                        }
                    }
                    self.advance_phase();
                }

                Phase::Root => {
                    if self.current < self.moves.len() {
                        let mv = self.moves[self.current];
                        self.current += 1;
                        self.yielded += 1;
                        return Some(mv);
                    }
                    self.advance_phase();
                }

                Phase::Evasions => {
                    if self.current >= self.ordered_moves {
                        if self.current < self.moves.len() {
                            let mv = self.moves[self.current];
                            self.current += 1;
                            self.yielded += 1;
                            return Some(mv);
                        }
                    } else if let Some((mv, _)) = self.pick_best() {
                        self.yielded += 1;
                        return Some(mv);
                    }
                    self.advance_phase();
                }

                Phase::GoodTactics => {
                    while let Some((mv, _)) = self.pick_best() {
                        if mv == self.hash_move || !self.pos.is_pseudo_move_legal(mv) {
                            continue;
                        }
                        let see = self.pos.static_exchange_eval(mv);
                        if see < 0 {
                            self.bad_scores[self.num_bad] = see;
                            self.bad_tactics[self.num_bad] = mv;
                            self.num_bad += 1;
                            continue;
                        }
                        self.yielded += 1;
                        return Some(mv);
                    }
                    self.advance_phase();
                }

                Phase::Quiet => {
                    while let Some((mv, _)) = self.pick_best() {
                        if mv == self.hash_move
                            || self.killers[..self.num_killers].contains(&mv)
                            || !self.pos.is_pseudo_move_legal(mv)
                        {
                            continue;
                        }
                        self.yielded += 1;
                        return Some(mv);
                    }
                    self.advance_phase();
                }

                Phase::BadTactics => {
                    if self.current < self.num_bad {
                        let mv = self.bad_tactics[self.current];
                        self.current += 1;
                        debug_assert!(self.bad_scores[self.current - 1] < 0);
                        debug_assert!(
                            mv != self.hash_move
                                && !self.killers[..self.num_killers].contains(&mv)
                        );
                        self.yielded += 1;
                        return Some(mv);
                    }
                    self.advance_phase();
                }

                Phase::QSearch | Phase::QSearchChecks => {
                    while self.current >= self.ordered_moves {
                        if self.current >= self.moves.len() {
                            break;
                        }
                        let mv = self.moves[self.current];
                        self.current += 1;
                        if mv == self.hash_move || !self.pos.is_pseudo_move_legal(mv) {
                            continue;
                        }
                        self.yielded += 1;
                        return Some(mv);
                    }
                    if self.current >= self.ordered_moves {
                        self.advance_phase();
                        continue;
                    }
                    while let Some((mv, best_score)) = self.pick_best() {
                        // Late quiets are gated out of quiescence: only
                        // queen promotions may score below the history
                        // bound and still get searched
                        if mv.promotion() != Some(PieceType::Queen)
                            && best_score < MAX_HISTORY
                        {
                            continue;
                        }
                        if mv == self.hash_move || !self.pos.is_pseudo_move_legal(mv) {
                            continue;
                        }
                        self.yielded += 1;
                        return Some(mv);
                    }
                    self.advance_phase();
                }
            }
        }
    }

    fn advance_phase(&mut self) {
        debug_assert!(self.phases[self.phase_idx] != Phase::End);
        self.phase_idx += 1;
        self.enter_phase();
    }

    /// Generate and score the candidate set of the phase just entered
    fn enter_phase(&mut self) {
        self.current = 0;
        debug_assert!(
            matches!(
                self.phases[self.phase_idx],
                Phase::Evasions | Phase::Root | Phase::End
            ) || !self.pos.in_check()
        );
        match self.phases[self.phase_idx] {
            Phase::End | Phase::Trans | Phase::Killers | Phase::Root | Phase::BadTactics => {}
            Phase::Evasions => {
                self.moves.clear();
                generate_evasions(self.pos, &mut self.moves);
                self.score_all();
                self.single_reply =
                    self.generator == Generator::Escape && self.moves.len() == 1;
            }
            Phase::GoodTactics => {
                self.moves.clear();
                generate_pseudo_tactical_moves(self.pos, &mut self.moves);
                self.num_bad = 0;
                self.score_tactics();
            }
            Phase::Quiet => {
                self.moves.clear();
                generate_pseudo_quiet_moves(self.pos, &mut self.moves);
                self.score_quiets();
            }
            Phase::QSearch => {
                self.moves.clear();
                generate_quiescence_moves(self.pos, &mut self.moves, false);
                self.score_all();
            }
            Phase::QSearchChecks => {
                self.moves.clear();
                generate_quiescence_moves(self.pos, &mut self.moves, true);
                self.score_all();
            }
        }
    }

    /// Swap the best-scored remaining candidate to the cursor and take it
    fn pick_best(&mut self) -> Option<(Move, i32)> {
        if self.current >= self.moves.len() {
            return None;
        }
        let mut best = self.current;
        for i in self.current + 1..self.moves.len() {
            if self.scores[i] > self.scores[best] {
                best = i;
            }
        }
        let mv = self.moves[best];
        let score = self.scores[best];
        self.moves.swap(self.current, best);
        self.scores.swap(self.current, best);
        self.current += 1;
        Some((mv, score))
    }

    /// Generic scoring for mixed candidate sets (evasions, quiescence):
    /// hash move on top, then the mate killer, tactics around the
    /// plus/minus tactical layers, killers next, history for the rest
    fn score_all(&mut self) {
        let grain = MAX_HISTORY;
        let hash_score = 1000 * grain;
        let killer_score = 700 * grain;
        for i in 0..self.moves.len() {
            let mv = self.moves[i];
            self.scores[i] = if mv == self.hash_move {
                hash_score
            } else if mv == self.mate_killer {
                hash_score - 1
            } else if mv.is_tactical() {
                self.score_tactical_move(mv)
            } else if let Some(slot) =
                self.killers[..self.num_killers].iter().position(|&k| k == mv)
            {
                killer_score - slot as i32
            } else {
                self.history.get(mv)
            };
        }
    }

    /// Tactical layer score for one capture or promotion: winning tactics
    /// land far above history range, losing ones far below, both ordered
    /// by most-valuable-victim, least-valuable-attacker within the layer
    fn score_tactical_move(&self, mv: Move) -> i32 {
        let grain = MAX_HISTORY;
        let piece = mv.piece().piece_type;
        let capture = mv.capture().map(|p| p.piece_type);
        let good = match mv.promotion() {
            Some(promo) if promo != PieceType::Queen => false,
            _ => match capture {
                Some(victim) if piece <= victim => true,
                _ => self.pos.static_exchange_eval(mv) >= 0,
            },
        };
        let layer = if good { 800 * grain } else { -800 * grain };
        6 * capture.map_or(0, |c| c as i32) - piece as i32 + 5 + layer
    }

    /// Cheap exchange proxy used to order the good-tactics phase before
    /// any exchange evaluation runs: victims weigh six attackers, clearly
    /// winning captures get the material difference on top, and
    /// underpromotions sink
    fn score_tactics(&mut self) {
        for i in 0..self.moves.len() {
            let mv = self.moves[i];
            let piece = mv.piece().piece_type;
            let capture = mv.capture().map(|p| p.piece_type);
            let mut bonus = 0;
            match mv.promotion() {
                Some(promo) if promo != PieceType::Queen => bonus = -1000,
                _ => {
                    if let Some(victim) = capture {
                        if piece <= victim {
                            bonus = material_value(victim) - material_value(piece);
                        }
                    }
                }
            }
            self.scores[i] = 6 * capture.map_or(0, |c| c as i32) - piece as i32 + bonus;
        }
    }

    fn score_quiets(&mut self) {
        for i in 0..self.moves.len() {
            self.scores[i] = self.history.get(self.moves[i]);
        }
    }

    fn sort_root_moves(&mut self, root: &RootData, options: &EngineOptions) {
        let mut keys = [0i128; MAX_MOVES];
        for rm in &root.root_moves {
            let i = self.moves.len();
            self.moves.push(rm.mv);
            keys[i] = if rm.mv == self.hash_move {
                i128::MAX
            } else if self.depth <= 2 {
                rm.qsearch_score as i128
            } else if options.multi_pv > 1 {
                rm.score as i128
            } else {
                rm.nodes as i128
            };
        }

        // Insertion sort, descending; stable and fast for the root's
        // typical thirty-odd moves
        for i in 1..self.moves.len() {
            let mv = self.moves[i];
            let key = keys[i];
            let mut j = i;
            while j > 0 && keys[j - 1] < key {
                keys[j] = keys[j - 1];
                self.moves[j] = self.moves[j - 1];
                j -= 1;
            }
            keys[j] = key;
            self.moves[j] = mv;
        }
    }
}
