//! Parallel root split.
//!
//! Within one iterative-deepening iteration the root moves are dispatched
//! dynamically: scoped worker threads pull indices from an atomic cursor,
//! search their root move on a local board copy with a per-move aspiration
//! window, then compete under a mutex to update the shared best. The
//! transposition, killer, and history tables are shared through
//! [`SearchContext`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chess::{Board, ChessMove, Piece, EMPTY};

use crate::search::control::SearchControl;
use crate::search::negamax::{
    extend_budget, is_mate_threat, is_promotion_threat, late_move_reduction, SearchWorker, INF,
};
use crate::search::{ordering, SearchContext};

/// Half-width of the initial aspiration window, in centipawns.
const ASPIRATION_WINDOW: i32 = 50;

/// Ply-extension budget granted to each root move.
const EXTENSION_BUDGET: i32 = 4;

/// Score of a single root move at one depth.
#[derive(Debug, Clone, Copy)]
pub(super) struct RootScore {
    pub mv: ChessMove,
    pub score: i32,
}

/// Outcome of one parallel root iteration.
pub(super) struct RootResult {
    /// Per-move scores, in completion order.
    pub scores: Vec<RootScore>,
    /// Best move of the iteration, if any worker finished.
    pub best_move: Option<ChessMove>,
    /// Score of the best move.
    pub best_score: i32,
    /// Principal variation starting with `best_move`.
    pub pv: Vec<ChessMove>,
    /// Whether every root move was searched (an abandoned iteration must
    /// not be trusted).
    pub completed: bool,
}

struct RootBest {
    score: i32,
    mv: Option<ChessMove>,
    pv: Vec<ChessMove>,
}

/// Search every root move at `depth` across `threads` workers.
#[allow(clippy::too_many_arguments)]
pub(super) fn search_root(
    ctx: &SearchContext,
    control: &SearchControl,
    board: &Board,
    history: &[u64],
    halfmove: u32,
    root_moves: &[ChessMove],
    depth: i32,
    q_depth: i32,
    aspiration_center: i32,
    prev_pv: &[ChessMove],
    mop_up: bool,
    threads: usize,
) -> RootResult {
    let cursor = AtomicUsize::new(0);
    let best = Mutex::new(RootBest {
        score: -INF,
        mv: None,
        pv: Vec::new(),
    });
    let scores: Mutex<Vec<RootScore>> = Mutex::new(Vec::with_capacity(root_moves.len()));

    let workers = threads.max(1).min(root_moves.len());

    std::thread::scope(|scope| {
        for _ in 1..workers {
            scope.spawn(|| {
                run_worker(
                    ctx, control, board, history, halfmove, root_moves, depth, q_depth,
                    aspiration_center, prev_pv, mop_up, &cursor, &best, &scores,
                );
            });
        }
        // The calling thread is worker zero.
        run_worker(
            ctx, control, board, history, halfmove, root_moves, depth, q_depth,
            aspiration_center, prev_pv, mop_up, &cursor, &best, &scores,
        );
    });

    let best = best.into_inner().expect("root best mutex poisoned");
    let scores = scores.into_inner().expect("root scores mutex poisoned");
    let completed = scores.len() == root_moves.len() && !control.stop_requested();

    RootResult {
        scores,
        best_move: best.mv,
        best_score: best.score,
        pv: best.pv,
        completed,
    }
}

/// One worker: pull the next unsearched root move, search it, publish.
#[allow(clippy::too_many_arguments)]
fn run_worker(
    ctx: &SearchContext,
    control: &SearchControl,
    board: &Board,
    history: &[u64],
    halfmove: u32,
    root_moves: &[ChessMove],
    depth: i32,
    q_depth: i32,
    aspiration_center: i32,
    prev_pv: &[ChessMove],
    mop_up: bool,
    cursor: &AtomicUsize,
    best: &Mutex<RootBest>,
    scores: &Mutex<Vec<RootScore>>,
) {
    loop {
        let index = cursor.fetch_add(1, Ordering::Relaxed);
        if index >= root_moves.len() {
            return;
        }
        if control.stop_requested() || control.hard_exceeded() {
            return;
        }

        let mv = root_moves[index];
        let leftmost = index == 0;

        let mut worker = SearchWorker {
            ctx,
            control,
            prev_pv,
            mop_up,
            q_depth,
            path: history.to_vec(),
        };

        let mut extension = EXTENSION_BUDGET;
        let mut next_depth = late_move_reduction(board, mv, index, depth, true, mop_up);

        let resets_clock = ordering::is_capture(board, mv)
            || board.piece_on(mv.get_source()) == Some(Piece::Pawn);
        let mate_threat = is_mate_threat(board, mv);
        let promo_threat = is_promotion_threat(board, mv);

        let child = board.make_move_new(mv);
        let child_in_check = *child.checkers() != EMPTY;
        let child_halfmove = if resets_clock { 0 } else { halfmove + 1 };

        next_depth += extend_budget(
            child_in_check,
            mate_threat,
            promo_threat,
            root_moves.len() == 1,
            &mut extension,
        );

        // Aspiration scout: a narrow window around the previous iteration's
        // score, doubling the side that fails until the score fits.
        let mut window_low = ASPIRATION_WINDOW;
        let mut window_high = ASPIRATION_WINDOW;
        let mut child_pv = Vec::new();
        let mut score;

        loop {
            let alpha = (aspiration_center - window_low).max(-INF + 1);
            let beta = (aspiration_center + window_high).min(INF - 1);

            child_pv.clear();
            worker.path.push(board.get_hash());
            score = -worker.search(
                &child,
                next_depth,
                1,
                -beta,
                -alpha,
                child_halfmove,
                &mut child_pv,
                leftmost,
                extension,
            );
            worker.path.pop();

            if control.stop_requested() {
                return;
            }

            if score <= alpha && alpha > -INF + 1 {
                window_low *= 2;
            } else if score >= beta && beta < INF - 1 {
                window_high *= 2;
            } else {
                break;
            }
        }

        // A reduced root move that looks like a new best gets a full-window
        // re-search at full depth before it may take the crown.
        let provisional_best = {
            let best = best.lock().expect("root best mutex poisoned");
            score > best.score
        };
        if provisional_best && next_depth < depth - 1 {
            child_pv.clear();
            worker.path.push(board.get_hash());
            score = -worker.search(
                &child,
                depth - 1,
                1,
                -INF,
                INF,
                child_halfmove,
                &mut child_pv,
                leftmost,
                extension,
            );
            worker.path.pop();
        }

        scores
            .lock()
            .expect("root scores mutex poisoned")
            .push(RootScore { mv, score });

        let mut best = best.lock().expect("root best mutex poisoned");
        if score > best.score {
            best.score = score;
            best.mv = Some(mv);
            best.pv.clear();
            best.pv.push(mv);
            best.pv.extend_from_slice(&child_pv);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use chess::{Board, MoveGen};

    use super::*;
    use crate::search::control::SearchControl;

    fn infinite() -> SearchControl {
        SearchControl::new_infinite(Arc::new(AtomicBool::new(false)))
    }

    fn root(board: &Board, depth: i32, threads: usize) -> RootResult {
        let ctx = SearchContext::new(4);
        let control = infinite();
        let moves: Vec<_> = MoveGen::new_legal(board).collect();
        search_root(
            &ctx, &control, board, &[], 0, &moves, depth, 10, 0, &[], false, threads,
        )
    }

    #[test]
    fn every_root_move_is_scored() {
        let board = Board::default();
        let result = root(&board, 2, 2);
        assert!(result.completed);
        assert_eq!(result.scores.len(), 20);
        assert!(result.best_move.is_some());
    }

    #[test]
    fn best_score_is_maximum_of_move_scores() {
        let board = Board::default();
        let result = root(&board, 2, 1);
        let max = result.scores.iter().map(|s| s.score).max().unwrap();
        assert_eq!(result.best_score, max);
    }

    #[test]
    fn pv_starts_with_best_move() {
        let board = Board::default();
        let result = root(&board, 3, 2);
        assert_eq!(result.pv.first().copied(), result.best_move);
    }

    #[test]
    fn finds_capture_of_hanging_queen() {
        // Black queen hangs on d4; depth-2 root search must take it.
        let board = Board::from_str("4k3/8/8/8/3q4/8/3R4/4K3 w - - 0 1").unwrap();
        let result = root(&board, 2, 2);
        let best = result.best_move.unwrap();
        assert_eq!(best.get_dest(), chess::Square::D4);
    }

    #[test]
    fn stop_flag_abandons_iteration() {
        let board = Board::default();
        let ctx = SearchContext::new(4);
        let stopped = Arc::new(AtomicBool::new(true));
        let control = SearchControl::new_infinite(stopped);
        let moves: Vec<_> = MoveGen::new_legal(&board).collect();
        let result = search_root(
            &ctx, &control, &board, &[], 0, &moves, 5, 10, 0, &[], false, 4,
        );
        assert!(!result.completed);
    }
}
