//! Static position evaluation.
//!
//! [`evaluate`] returns centipawns from White's perspective; the search
//! works in negamax convention and calls [`relative`] for a side-to-move
//! score. The evaluation is material + piece-square tables + passed pawns,
//! tapered between middlegame and endgame weights, with a king-cornering
//! term for mop-up endings.

pub mod material;
pub mod pawns;
pub mod phase;
pub mod pst;
pub mod score;

use chess::{Board, Color};

/// Evaluate a position in centipawns from White's perspective.
pub fn evaluate(board: &Board) -> i32 {
    let phase = phase::game_phase(board);
    let total = material::material(board) + pst::pst(board) + pawns::passed_pawn_bonus(board);
    total.taper(phase) + mop_up(board)
}

/// Evaluate a position from the side to move's perspective (negamax).
pub fn relative(board: &Board) -> i32 {
    match board.side_to_move() {
        Color::White => evaluate(board),
        Color::Black => -evaluate(board),
    }
}

/// King-cornering term for positions where one side has a bare king.
///
/// Rewards pushing the defending king away from the centre and walking the
/// attacking king up to it, so won endings actually convert.
fn mop_up(board: &Board) -> i32 {
    let white_bare = board.color_combined(Color::White).popcnt() == 1;
    let black_bare = board.color_combined(Color::Black).popcnt() == 1;
    if white_bare == black_bare {
        return 0;
    }

    let strong = if black_bare { Color::White } else { Color::Black };
    let weak_king = board.king_square(!strong);
    let strong_king = board.king_square(strong);

    let drive = 10 * pawns::center_distance(weak_king)
        + 4 * (14 - pawns::manhattan_distance(strong_king, weak_king));

    match strong {
        Color::White => drive,
        Color::Black => -drive,
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chess::Board;

    use super::{evaluate, relative};

    #[test]
    fn starting_position_is_balanced() {
        assert_eq!(evaluate(&Board::default()), 0);
    }

    #[test]
    fn relative_negates_for_black() {
        // White up a queen; Black to move sees a negative score.
        let board =
            Board::from_str("rnb1kbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1").unwrap();
        assert!(evaluate(&board) > 0);
        assert_eq!(relative(&board), -evaluate(&board));
    }

    #[test]
    fn mirrored_positions_evaluate_symmetrically() {
        // 1.e4 and its color mirror.
        let original =
            Board::from_str("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1").unwrap();
        let mirrored =
            Board::from_str("rnbqkbnr/pppp1ppp/8/4p3/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").unwrap();
        assert_eq!(relative(&original), relative(&mirrored));
    }

    #[test]
    fn mop_up_rewards_cornering() {
        // Same material, Black king driven to the corner scores higher for White.
        let centered = Board::from_str("8/8/8/4k3/8/4K3/4Q3/8 w - - 0 1").unwrap();
        let cornered = Board::from_str("k7/8/1K6/8/8/8/4Q3/8 w - - 0 1").unwrap();
        assert!(evaluate(&cornered) > evaluate(&centered));
    }
}
