//! Search-support core for a chess engine
//!
//! The two subsystems that decide which move an alpha-beta search tries
//! next and how results are remembered across nodes: a staged, lazily
//! generating move selector and a bucketed transposition table with an
//! age/depth replacement policy. The board, move generation and exchange
//! evaluation collaborators they consume live alongside them.

pub mod attacks;
pub mod board;
pub mod history;
pub mod movegen;
pub mod moves;
pub mod search;
pub mod see;
pub mod selector;
pub mod tt;
pub mod zobrist;

pub use attacks::{AttackTables, ATTACK_TABLES};
pub use board::{
    Bitboard, Board, CastleRights, Color, FenError, Piece, PieceType, Position, Square, UndoInfo,
};
pub use history::{History, MAX_HISTORY};
pub use moves::{Move, MoveList, MAX_MOVES};
pub use search::{EngineOptions, RootData, RootMove, SearchNode, SearchStack, MAX_PLY};
pub use selector::{Generator, MoveSelector};
pub use tt::{Bound, HashStats, TranspositionTable, TtEntry, TtError};
pub use zobrist::ZOBRIST;
