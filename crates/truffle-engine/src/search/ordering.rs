//! Move ordering oracle.
//!
//! Priority bands, highest first:
//! - previous-iteration PV move: 10,000 (leftmost nodes only)
//! - hash move:                   9,000
//! - queen promotion:             6,000
//! - capture:                     4,000 + victim − attacker (MVV-LVA)
//! - checking move:               3,000
//! - killer at this ply:          2,000
//! - quiet move:                  history score
//!
//! Tactical moves (everything above the quiet band) are sorted among
//! themselves and always searched before the quiet group, however large a
//! quiet move's history counter has grown. Both sorts are stable, so moves
//! with equal priority keep generator order.

use std::cmp::Reverse;

use chess::{Board, ChessMove, Piece, EMPTY};

use crate::search::heuristics::HistoryTable;

pub(crate) const PV_PRIORITY: i32 = 10_000;
pub(crate) const HASH_PRIORITY: i32 = 9_000;
pub(crate) const PROMOTION_PRIORITY: i32 = 6_000;
pub(crate) const CAPTURE_PRIORITY: i32 = 4_000;
pub(crate) const CHECK_PRIORITY: i32 = 3_000;
pub(crate) const KILLER_PRIORITY: i32 = 2_000;

/// Piece values for MVV-LVA and pruning margins, indexed by
/// [`Piece::to_index`].
const PIECE_VALUES: [i32; 6] = [100, 320, 330, 500, 900, 20_000];

/// MVV-LVA piece value.
pub(crate) fn piece_value(piece: Piece) -> i32 {
    PIECE_VALUES[piece.to_index()]
}

/// A pawn moving diagonally onto an empty square is an en-passant capture.
pub(crate) fn is_en_passant(board: &Board, mv: ChessMove) -> bool {
    board.piece_on(mv.get_source()) == Some(Piece::Pawn)
        && mv.get_source().get_file() != mv.get_dest().get_file()
        && board.piece_on(mv.get_dest()).is_none()
}

/// Whether the move captures anything, en passant included.
pub(crate) fn is_capture(board: &Board, mv: ChessMove) -> bool {
    board.piece_on(mv.get_dest()).is_some() || is_en_passant(board, mv)
}

/// Whether the move gives check. Makes the move on a scratch copy.
pub(crate) fn gives_check(board: &Board, mv: ChessMove) -> bool {
    *board.make_move_new(mv).checkers() != EMPTY
}

/// Rank all legal moves of a position by expected cutoff strength.
///
/// `pv_hint` is the previous iteration's PV move for this ply (set only on
/// leftmost nodes); `tt_move` is the hash-move hint. Both are matched
/// against the generated legal moves, so a stale or colliding hint is
/// silently ignored.
pub(crate) fn ordered_moves(
    board: &Board,
    moves: Vec<ChessMove>,
    tt_move: Option<ChessMove>,
    killers: [Option<ChessMove>; 2],
    history: &HistoryTable,
    pv_hint: Option<ChessMove>,
) -> Vec<(ChessMove, i32)> {
    let side = board.side_to_move();
    let mut tactical: Vec<(ChessMove, i32)> = Vec::with_capacity(moves.len());
    let mut quiet: Vec<(ChessMove, i32)> = Vec::new();

    for mv in moves {
        if pv_hint == Some(mv) {
            tactical.push((mv, PV_PRIORITY));
            continue;
        }
        if tt_move == Some(mv) {
            tactical.push((mv, HASH_PRIORITY));
            continue;
        }
        if mv.get_promotion() == Some(Piece::Queen) {
            tactical.push((mv, PROMOTION_PRIORITY));
            continue;
        }
        if let Some(victim) = board.piece_on(mv.get_dest()) {
            let attacker = board.piece_on(mv.get_source()).unwrap_or(Piece::Pawn);
            tactical.push((mv, CAPTURE_PRIORITY + piece_value(victim) - piece_value(attacker)));
            continue;
        }
        if is_en_passant(board, mv) {
            // Pawn takes pawn.
            tactical.push((mv, CAPTURE_PRIORITY));
            continue;
        }
        if gives_check(board, mv) {
            tactical.push((mv, CHECK_PRIORITY));
            continue;
        }
        if killers[0] == Some(mv) || killers[1] == Some(mv) {
            tactical.push((mv, KILLER_PRIORITY));
            continue;
        }
        quiet.push((mv, history.score(side, mv)));
    }

    tactical.sort_by_key(|&(_, priority)| Reverse(priority));
    quiet.sort_by_key(|&(_, priority)| Reverse(priority));
    tactical.extend(quiet);
    tactical
}
