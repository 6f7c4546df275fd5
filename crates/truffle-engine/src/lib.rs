//! Search and evaluation for truffle.
//!
//! The crate implements a parallel iterative-deepening alpha-beta search
//! (root splitting, aspiration windows, quiescence, shared transposition
//! table) and a compact tapered evaluation. Move generation comes from the
//! `chess` crate.

pub mod eval;
pub mod search;
pub mod time;

pub use eval::{evaluate, relative};
pub use search::control::SearchControl;
pub use search::draw::{game_outcome, GameOutcome};
pub use search::negamax::{INF, MATE_SCORE, MATE_THRESHOLD};
pub use search::{SearchParams, SearchResult, Searcher, ENGINE_DEPTH};
pub use time::limits_from_go;
