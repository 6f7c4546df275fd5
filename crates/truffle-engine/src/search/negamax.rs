//! Negamax alpha-beta search with quiescence.
//!
//! Every score is from the side to move's perspective; callers negate at
//! make time. Pruning: futility, razoring, null move. Reductions: late
//! moves in three tiers. Extensions: check, mate threat, promotion threat,
//! and sole reply, capped by a per-path budget.

use chess::{Board, ChessMove, Color, MoveGen, Piece, EMPTY};

use crate::eval;
use crate::eval::pawns::{chebyshev_distance, is_passed_pawn, manhattan_distance};
use crate::search::control::SearchControl;
use crate::search::draw::{insufficient_material, is_repetition};
use crate::search::ordering;
use crate::search::tt::Bound;
use crate::search::SearchContext;

/// Score above any reachable evaluation; reserved as window sentinel.
pub const INF: i32 = 32_000;

/// Base score for checkmate, adjusted by ply so shallower mates dominate.
pub const MATE_SCORE: i32 = INF / 2;

/// Scores beyond this threshold encode a forced mate.
pub const MATE_THRESHOLD: i32 = MATE_SCORE - MAX_PLY as i32;

/// Hard ceiling on search depth in plies.
pub const MAX_PLY: usize = 128;

/// Score for any drawn position.
pub const DRAW_SCORE: i32 = 0;

/// Futility margin per ply of remaining depth.
const FUTILITY_MARGIN: i32 = 130;

/// Razoring margin: base plus a small step per ply of depth.
const RAZOR_BASE: i32 = 300;
const RAZOR_STEP: i32 = 60;

/// Minimum depth for null-move pruning.
const NULL_MOVE_MIN_DEPTH: i32 = 4;

/// Delta-pruning margin in quiescence.
const DELTA_MARGIN: i32 = 400;

/// One search worker: borrows the shared context and keeps the per-thread
/// state — the path hashes for repetition detection and the previous
/// iteration's PV used to seed leftmost ordering.
pub(crate) struct SearchWorker<'a> {
    pub ctx: &'a SearchContext,
    pub control: &'a SearchControl,
    /// Previous iteration's principal variation, indexed by ply.
    pub prev_pv: &'a [ChessMove],
    /// One side has a bare king: disable reductions entirely.
    pub mop_up: bool,
    /// Quiescence depth budget at the horizon.
    pub q_depth: i32,
    /// Zobrist hashes of every position from game start to the parent of
    /// the current node.
    pub path: Vec<u64>,
}

impl SearchWorker<'_> {
    /// Recursive alpha-beta search.
    ///
    /// Returns the score of `board` for its side to move. Writes the best
    /// line into `pv` whenever a move raises alpha. `extension` is the
    /// remaining ply-extension budget along this path.
    #[allow(clippy::too_many_arguments)]
    pub fn search(
        &mut self,
        board: &Board,
        depth: i32,
        ply: usize,
        mut alpha: i32,
        beta: i32,
        halfmove: u32,
        pv: &mut Vec<ChessMove>,
        mut leftmost: bool,
        mut extension: i32,
    ) -> i32 {
        self.ctx.count_node();

        if ply >= MAX_PLY {
            return eval::relative(board);
        }

        let hash = board.get_hash();

        // Draws by rule end the node before anything else.
        if ply > 0 {
            if halfmove >= 100 || is_repetition(&self.path, hash) || insufficient_material(board)
            {
                return DRAW_SCORE;
            }
        }

        let moves: Vec<ChessMove> = MoveGen::new_legal(board).collect();
        if moves.is_empty() {
            return if *board.checkers() != EMPTY {
                // Mated here; negation at make time flips the sign for the parent.
                -(MATE_SCORE - ply as i32)
            } else {
                DRAW_SCORE
            };
        }

        // Transposition probe. A hit settles the node outright when its
        // bound proves the window; otherwise the stored move seeds ordering.
        let mut tt_move: Option<ChessMove> = None;
        if let Some(entry) = self.ctx.tt.probe(hash, ply) {
            tt_move = entry.best_move.filter(|&m| board.legal(m));
            if entry.depth >= depth {
                match entry.bound {
                    Bound::Exact => {
                        if let Some(m) = tt_move {
                            pv.clear();
                            pv.push(m);
                        }
                        return entry.score;
                    }
                    Bound::Lower => {
                        if entry.score >= beta {
                            return entry.score;
                        }
                        if entry.score > alpha {
                            alpha = entry.score;
                        }
                    }
                    Bound::Upper => {
                        if entry.score <= alpha {
                            return entry.score;
                        }
                    }
                    Bound::None => {}
                }
            }
        }

        // Horizon: resolve captures before trusting the static eval.
        if depth <= 0 {
            let score = self.qsearch(board, self.q_depth, ply, alpha, beta);
            let bound = bound_for(score, alpha, beta);
            self.ctx.tt.store(hash, 0, score, bound, None, ply);
            return score;
        }

        if self.control.should_stop(self.ctx.nodes()) {
            // Unwind fast; the driver discards this iteration.
            return alpha;
        }

        let is_pv = alpha < beta - 1;
        let in_check = *board.checkers() != EMPTY;
        let stand_pat = eval::relative(board);
        let end_game = eval::phase::is_endgame(board);

        // Never prune in check, in mop-up, in the endgame, or near mate —
        // the static eval cannot be trusted to miss a forced line there.
        let prune_ok = !in_check && !self.mop_up && !end_game && alpha.abs() < INF / 4;

        // Futility: the position is already so far above beta that a
        // shallow search will not bring it back down.
        if depth < 3 && prune_ok {
            let margin = depth * FUTILITY_MARGIN;
            if stand_pat - margin > beta {
                return stand_pat - margin;
            }
        }

        // Razoring: too far below alpha to recover — fall to quiescence.
        if depth <= 3 && prune_ok && !is_pv {
            let margin = RAZOR_BASE + (depth - 1) * RAZOR_STEP;
            if stand_pat + margin < alpha {
                return self.qsearch(board, self.q_depth, ply, alpha, beta);
            }
        }

        // Null move: hand the opponent a free move; if the position still
        // fails high the real search would too.
        if depth >= NULL_MOVE_MIN_DEPTH && !in_check && !leftmost && !end_game {
            if let Some(null_board) = board.null_move() {
                let reduction = 3 + depth / 4;
                let mut null_pv = Vec::new();
                self.path.push(hash);
                let null_score = -self.search(
                    &null_board,
                    depth - reduction,
                    ply + 1,
                    -beta,
                    -beta + 1,
                    halfmove + 1,
                    &mut null_pv,
                    false,
                    extension,
                );
                self.path.pop();
                if null_score >= beta {
                    return beta;
                }
            }
        }

        let pv_hint = if leftmost {
            self.prev_pv.get(ply).copied()
        } else {
            None
        };
        let ordered = ordering::ordered_moves(
            board,
            moves,
            tt_move,
            self.ctx.killers.at(ply),
            &self.ctx.history,
            pv_hint,
        );
        let one_reply = ordered.len() == 1;

        let orig_alpha = alpha;
        let mut best_score = -INF;

        for (index, &(mv, _)) in ordered.iter().enumerate() {
            if index > 0 {
                leftmost = false;
            }

            let mut next_depth = late_move_reduction(board, mv, index, depth, is_pv, self.mop_up);

            let is_capture = ordering::is_capture(board, mv);
            let resets_clock =
                is_capture || board.piece_on(mv.get_source()) == Some(Piece::Pawn);
            let mate_threat = is_mate_threat(board, mv);
            let promo_threat = is_promotion_threat(board, mv);

            let child = board.make_move_new(mv);
            let child_in_check = *child.checkers() != EMPTY;
            let child_halfmove = if resets_clock { 0 } else { halfmove + 1 };

            next_depth += extend_budget(
                child_in_check,
                mate_threat,
                promo_threat,
                one_reply,
                &mut extension,
            );

            let mut child_pv = Vec::new();
            self.path.push(hash);
            let mut score = if is_pv || leftmost {
                -self.search(
                    &child,
                    depth - 1,
                    ply + 1,
                    -beta,
                    -alpha,
                    child_halfmove,
                    &mut child_pv,
                    leftmost,
                    extension,
                )
            } else {
                -self.search(
                    &child,
                    next_depth,
                    ply + 1,
                    -(alpha + 1),
                    -alpha,
                    child_halfmove,
                    &mut child_pv,
                    false,
                    extension,
                )
            };

            // A reduced scout that beats alpha must be re-searched at full
            // depth and window before it is trusted.
            if !(is_pv || leftmost) && score > alpha && next_depth < depth - 1 {
                child_pv.clear();
                score = -self.search(
                    &child,
                    depth - 1,
                    ply + 1,
                    -beta,
                    -alpha,
                    child_halfmove,
                    &mut child_pv,
                    false,
                    extension,
                );
            }
            self.path.pop();

            if score > best_score {
                best_score = score;
            }

            if score > alpha {
                alpha = score;
                pv.clear();
                pv.push(mv);
                pv.extend_from_slice(&child_pv);

                if alpha >= beta {
                    if !is_capture {
                        self.ctx.killers.store(ply, mv);
                        self.ctx.history.reward(board.side_to_move(), mv, depth);
                    }
                    break;
                }
            }
        }

        // Scores from an aborted iteration are garbage; keep them out of
        // the shared table.
        if !self.control.stop_requested() {
            let bound = if best_score >= beta {
                Bound::Lower
            } else if best_score > orig_alpha {
                Bound::Exact
            } else {
                Bound::Upper
            };
            let best_move = pv.first().copied().or(tt_move);
            self.ctx.tt.store(hash, depth, best_score, bound, best_move, ply);
        }

        best_score
    }

    /// Quiescence search over captures and queen promotions.
    ///
    /// Stabilises the horizon: the side to move may stand pat or continue
    /// capturing until the position is quiet.
    pub fn qsearch(
        &mut self,
        board: &Board,
        depth: i32,
        ply: usize,
        mut alpha: i32,
        beta: i32,
    ) -> i32 {
        self.ctx.count_node();

        let stand_pat = eval::relative(board);
        if stand_pat >= beta {
            return beta;
        }
        if stand_pat > alpha {
            alpha = stand_pat;
        }
        if depth <= 0 || ply >= MAX_PLY - 1 {
            return stand_pat;
        }

        // Captures (MVV-LVA) plus queen promotions.
        let mut candidates: Vec<(ChessMove, i32)> = Vec::new();
        for mv in MoveGen::new_legal(board) {
            if let Some(victim) = board.piece_on(mv.get_dest()) {
                let attacker = board.piece_on(mv.get_source()).unwrap_or(Piece::Pawn);
                candidates.push((
                    mv,
                    ordering::piece_value(victim) - ordering::piece_value(attacker),
                ));
            } else if ordering::is_en_passant(board, mv) {
                candidates.push((mv, 0));
            } else if mv.get_promotion() == Some(Piece::Queen) {
                candidates.push((mv, ordering::piece_value(Piece::Queen)));
            }
        }
        candidates.sort_by_key(|&(_, priority)| std::cmp::Reverse(priority));

        let mut best_score = stand_pat;

        for &(mv, _) in &candidates {
            // Delta pruning: even winning this victim outright cannot
            // bring the score back to alpha.
            if let Some(victim) = board.piece_on(mv.get_dest()) {
                if stand_pat + ordering::piece_value(victim) + DELTA_MARGIN < alpha {
                    continue;
                }
            }

            let child = board.make_move_new(mv);
            let score = -self.qsearch(&child, depth - 1, ply + 1, -beta, -alpha);

            if score > best_score {
                best_score = score;
            }
            if score > alpha {
                alpha = score;
            }
            if alpha >= beta {
                return beta;
            }
        }

        best_score
    }
}

/// Classify a score against the original window for a table store.
fn bound_for(score: i32, alpha: i32, beta: i32) -> Bound {
    if score >= beta {
        Bound::Lower
    } else if score <= alpha {
        Bound::Upper
    } else {
        Bound::Exact
    }
}

/// Consume one extension point when any trigger applies; every trigger is
/// worth a single ply, however many fire at once.
pub(crate) fn extend_budget(
    gives_check: bool,
    mate_threat: bool,
    promo_threat: bool,
    one_reply: bool,
    budget: &mut i32,
) -> i32 {
    if (gives_check || mate_threat || promo_threat || one_reply) && *budget > 0 {
        *budget -= 1;
        1
    } else {
        0
    }
}

// ---------------------------------------------------------------------------
// Late-move reduction
// ---------------------------------------------------------------------------

/// Depth for the move at `index` in the ordered list.
///
/// Three tiers: no reduction for early moves, shallow depth, mop-up and
/// threatening moves; one extra ply off for captures, checks, and slightly
/// later moves; two extra plies off for everything else.
pub(crate) fn late_move_reduction(
    board: &Board,
    mv: ChessMove,
    index: usize,
    depth: i32,
    is_pv: bool,
    mop_up: bool,
) -> i32 {
    let full_until = if is_pv { 2 } else { 1 };
    let reduce_less_until = if is_pv { 5 } else { 3 };

    let no_reduce = mop_up
        || mv.get_promotion() == Some(Piece::Queen)
        || is_mate_threat(board, mv)
        || is_promotion_threat(board, mv);

    if index <= full_until || depth <= 3 || no_reduce {
        return depth - 1;
    }

    let reduce_less = ordering::gives_check(board, mv)
        || *board.checkers() != EMPTY
        || ordering::is_capture(board, mv);

    if index <= reduce_less_until || reduce_less {
        depth - 2
    } else {
        depth - 3
    }
}

// ---------------------------------------------------------------------------
// Tactical-threat predicates
// ---------------------------------------------------------------------------

/// Whether the move crowds the enemy king — landing within Manhattan
/// distance 3, or a rook/queen arriving next to it.
pub(crate) fn is_mate_threat(board: &Board, mv: ChessMove) -> bool {
    let their_king = board.king_square(!board.side_to_move());

    if manhattan_distance(mv.get_dest(), their_king) <= 3 {
        return true;
    }

    match board.piece_on(mv.get_source()) {
        Some(Piece::Rook) | Some(Piece::Queen) => {
            chebyshev_distance(mv.get_dest(), their_king) <= 1
        }
        _ => false,
    }
}

/// Whether the move advances a passed pawn into the enemy half.
pub(crate) fn is_promotion_threat(board: &Board, mv: ChessMove) -> bool {
    if board.piece_on(mv.get_source()) != Some(Piece::Pawn) {
        return false;
    }

    let color = board.side_to_move();
    let their_pawns = *board.pieces(Piece::Pawn) & *board.color_combined(!color);
    if !is_passed_pawn(mv.get_dest(), color, their_pawns) {
        return false;
    }

    let rank = mv.get_dest().get_rank().to_index();
    match color {
        Color::White => rank > 3,
        Color::Black => rank < 4,
    }
}
