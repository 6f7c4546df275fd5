//! Iterative-deepening search driver.
//!
//! - `Searcher`: owns the shared tables and runs the depth loop
//! - `pool`: parallel root split within one iteration
//! - `negamax`: recursive alpha-beta with quiescence
//! - `ordering`: move-ordering oracle
//! - `heuristics`: killer and history tables
//! - `tt`: shared transposition table
//! - `control`: stop flag and time budget
//! - `draw`: game-over and draw-by-rule detection

pub mod control;
pub mod draw;
pub mod heuristics;
pub mod negamax;
pub mod ordering;
pub mod pool;
pub mod tt;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chess::{Board, ChessMove, Color, MoveGen, EMPTY};
use tracing::debug;

use control::SearchControl;
use heuristics::{HistoryTable, KillerTable};
use negamax::{INF, MATE_SCORE};
use tt::{Bound, TranspositionTable};

/// Hard cap on iterative-deepening depth.
pub const ENGINE_DEPTH: i32 = 30;

/// Default transposition table size in megabytes.
const DEFAULT_TT_MB: usize = 64;

/// Iterations examined by the stability check.
const STABILITY_WINDOW: usize = 4;

/// Maximum score swing between adjacent iterations that still counts as
/// stable, in centipawns.
const STABILITY_MARGIN: i32 = 25;

/// Knobs for a single search call.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Worker threads for the root split.
    pub threads: usize,
    /// Maximum iterative-deepening depth.
    pub max_depth: i32,
    /// Quiescence depth budget at the horizon.
    pub q_depth: i32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            threads: 1,
            max_depth: 8,
            q_depth: 10,
        }
    }
}

/// Result of a completed search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Best move at the highest completed depth; `None` when the position
    /// is terminal or no iteration finished in time.
    pub best_move: Option<ChessMove>,
    /// Score in centipawns from the side to move's perspective.
    pub score: i32,
    /// Principal variation of the last completed iteration.
    pub pv: Vec<ChessMove>,
    /// Depth of the last completed iteration.
    pub depth: i32,
    /// Nodes visited across all iterations and workers.
    pub nodes: u64,
}

/// Shared mutable search state, borrowed by every root worker.
pub struct SearchContext {
    /// Transposition table (lock-free).
    pub tt: TranspositionTable,
    /// Killer moves per ply.
    pub killers: KillerTable,
    /// History heuristic counters.
    pub history: HistoryTable,
    nodes: AtomicU64,
}

impl SearchContext {
    /// Create a context with a transposition table of `tt_mb` megabytes.
    pub fn new(tt_mb: usize) -> Self {
        Self {
            tt: TranspositionTable::new(tt_mb),
            killers: KillerTable::new(),
            history: HistoryTable::new(),
            nodes: AtomicU64::new(0),
        }
    }

    /// Count one visited node.
    #[inline]
    pub fn count_node(&self) {
        self.nodes.fetch_add(1, Ordering::Relaxed);
    }

    /// Nodes visited since the counter was last reset.
    pub fn nodes(&self) -> u64 {
        self.nodes.load(Ordering::Relaxed)
    }

    fn reset_nodes(&self) {
        self.nodes.store(0, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Stability tracking
// ---------------------------------------------------------------------------

/// Tracks root scores across iterations; the search may stop on its soft
/// time budget only once the score has settled.
struct StabilityTracker {
    scores: Vec<i32>,
}

impl StabilityTracker {
    fn new() -> Self {
        Self { scores: Vec::new() }
    }

    /// Record an iteration score. Returns whether the last
    /// [`STABILITY_WINDOW`] iterations moved by at most
    /// [`STABILITY_MARGIN`] between neighbours.
    fn update(&mut self, score: i32) -> bool {
        self.scores.push(score);
        if self.scores.len() < STABILITY_WINDOW {
            return false;
        }
        let recent = &self.scores[self.scores.len() - STABILITY_WINDOW..];
        recent
            .windows(2)
            .all(|pair| (pair[0] - pair[1]).abs() <= STABILITY_MARGIN)
    }
}

// ---------------------------------------------------------------------------
// Searcher
// ---------------------------------------------------------------------------

/// Iterative-deepening searcher with shared tables.
pub struct Searcher {
    ctx: SearchContext,
}

impl Searcher {
    /// Create a searcher with the default table size.
    pub fn new() -> Self {
        Self::with_hash_size(DEFAULT_TT_MB)
    }

    /// Create a searcher with a transposition table of `mb` megabytes.
    pub fn with_hash_size(mb: usize) -> Self {
        Self {
            ctx: SearchContext::new(mb),
        }
    }

    /// Replace the transposition table with one of `mb` megabytes.
    pub fn resize_tt(&mut self, mb: usize) {
        self.ctx.tt = TranspositionTable::new(mb);
    }

    /// Clear every table (new game).
    pub fn clear_tables(&self) {
        self.ctx.tt.clear();
        self.ctx.killers.clear();
        self.ctx.history.clear();
    }

    /// Pick a best move under a wall-clock budget.
    ///
    /// Convenience wrapper over [`search`](Self::search): the budget maps to
    /// a soft limit of `time_ms` and a hard limit of twice that. Returns
    /// `None` when the position is terminal or no iteration completed.
    pub fn find_best_move(
        &self,
        board: &Board,
        threads: usize,
        max_depth: i32,
        q_depth: i32,
        time_ms: u64,
    ) -> Option<ChessMove> {
        let params = SearchParams {
            threads,
            max_depth,
            q_depth,
        };
        let control = SearchControl::new_timed(
            Arc::new(AtomicBool::new(false)),
            Duration::from_millis(time_ms),
            Duration::from_millis(time_ms.saturating_mul(2)),
        );
        self.search(board, &[], 0, &params, &control, |_, _, _, _| {})
            .best_move
    }

    /// Run the iterative-deepening loop.
    ///
    /// `history` holds the Zobrist hashes of every earlier game position
    /// and `halfmove` the current fifty-move clock; both feed draw
    /// detection. `on_iter(depth, score, nodes, pv)` fires after each
    /// completed iteration for progress output.
    pub fn search<F>(
        &self,
        board: &Board,
        history: &[u64],
        halfmove: u32,
        params: &SearchParams,
        control: &SearchControl,
        mut on_iter: F,
    ) -> SearchResult
    where
        F: FnMut(i32, i32, u64, &[ChessMove]),
    {
        self.ctx.reset_nodes();
        self.ctx.killers.clear();
        self.ctx.history.age();

        // Bare king on either side: keep every move at full depth.
        let mop_up = board.color_combined(Color::White).popcnt() == 1
            || board.color_combined(Color::Black).popcnt() == 1;

        let legal: Vec<ChessMove> = MoveGen::new_legal(board).collect();
        if legal.is_empty() {
            let score = if *board.checkers() != EMPTY {
                -MATE_SCORE
            } else {
                negamax::DRAW_SCORE
            };
            return SearchResult {
                best_move: None,
                score,
                pv: Vec::new(),
                depth: 0,
                nodes: 0,
            };
        }

        // A forced move needs no search.
        if legal.len() == 1 {
            return SearchResult {
                best_move: Some(legal[0]),
                score: 0,
                pv: vec![legal[0]],
                depth: 0,
                nodes: 0,
            };
        }

        // First iteration orders by the oracle; later ones reuse the
        // previous iteration's scores.
        let initial = ordering::ordered_moves(
            board,
            legal,
            self.ctx.tt.hash_move(board.get_hash()),
            self.ctx.killers.at(0),
            &self.ctx.history,
            None,
        );
        let mut root_moves: Vec<ChessMove> = initial.into_iter().map(|(mv, _)| mv).collect();

        let mut aspiration_center = crate::eval::relative(board);
        let mut prev_pv: Vec<ChessMove> = Vec::new();
        let mut completed: Option<(ChessMove, i32, Vec<ChessMove>, i32)> = None;
        let mut stability = StabilityTracker::new();

        for depth in 1..=params.max_depth.min(ENGINE_DEPTH) {
            if control.stop_requested() {
                break;
            }

            let result = pool::search_root(
                &self.ctx,
                control,
                board,
                history,
                halfmove,
                &root_moves,
                depth,
                params.q_depth,
                aspiration_center,
                &prev_pv,
                mop_up,
                params.threads,
            );

            let best_move = match result.best_move {
                Some(mv) if result.completed => mv,
                // Abandoned iteration: fall back to the previous one.
                _ => break,
            };

            aspiration_center = result.best_score;
            prev_pv = result.pv.clone();
            completed = Some((best_move, result.best_score, result.pv, depth));

            // Seed the next game's ordering with the root result.
            self.ctx.tt.store(
                board.get_hash(),
                depth,
                result.best_score,
                Bound::Exact,
                Some(best_move),
                0,
            );

            on_iter(depth, result.best_score, self.ctx.nodes(), &prev_pv);
            debug!(
                depth,
                score = result.best_score,
                nodes = self.ctx.nodes(),
                "iteration complete"
            );

            // Resort root moves for the next iteration, best first.
            let mut scored = result.scores;
            scored.sort_by_key(|entry| std::cmp::Reverse(entry.score));
            root_moves = scored.into_iter().map(|entry| entry.mv).collect();

            let stable = stability.update(result.best_score);
            if control.soft_exceeded()
                && (stable || depth >= ENGINE_DEPTH || control.hard_exceeded())
            {
                break;
            }
        }

        match completed {
            Some((best_move, score, pv, depth)) => SearchResult {
                best_move: Some(best_move),
                score,
                pv,
                depth,
                nodes: self.ctx.nodes(),
            },
            None => SearchResult {
                best_move: None,
                score: -INF,
                pv: Vec::new(),
                depth: 0,
                nodes: self.ctx.nodes(),
            },
        }
    }
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Searcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Searcher").field("tt", &self.ctx.tt).finish()
    }
}
