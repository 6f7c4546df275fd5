//! Game-over and draw detection.
//!
//! The `chess` crate's `Board` answers checkmate/stalemate but keeps no
//! history, so the fifty-move clock and repetition hashes are threaded in
//! from the protocol layer and maintained by the search along its path.

use chess::{Board, BoardStatus, Piece};

/// Terminal state of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    /// Play continues.
    Ongoing,
    /// Side to move is checkmated.
    Checkmate,
    /// Side to move has no legal move and is not in check.
    Stalemate,
    /// Fifty-move rule (halfmove clock reached 100).
    DrawFifty,
    /// Threefold repetition.
    DrawRepetition,
    /// Neither side can deliver mate.
    DrawInsufficient,
}

/// Classify a position given the game history (Zobrist hashes of earlier
/// positions, current position excluded) and the current halfmove clock.
pub fn game_outcome(board: &Board, history: &[u64], halfmove_clock: u32) -> GameOutcome {
    match board.status() {
        BoardStatus::Checkmate => return GameOutcome::Checkmate,
        BoardStatus::Stalemate => return GameOutcome::Stalemate,
        BoardStatus::Ongoing => {}
    }

    if halfmove_clock >= 100 {
        return GameOutcome::DrawFifty;
    }

    let hash = board.get_hash();
    if history.iter().filter(|&&h| h == hash).count() >= 2 {
        return GameOutcome::DrawRepetition;
    }

    if insufficient_material(board) {
        return GameOutcome::DrawInsufficient;
    }

    GameOutcome::Ongoing
}

/// King vs king, or king vs king and a single minor piece.
pub(crate) fn insufficient_material(board: &Board) -> bool {
    let total = board.combined().popcnt();
    if total == 2 {
        return true;
    }
    if total == 3 {
        let minors = *board.pieces(Piece::Knight) | *board.pieces(Piece::Bishop);
        return minors.popcnt() == 1;
    }
    false
}

/// Whether the position already occurred on the search path or in the game
/// history. A single recurrence scores as a draw inside the search — the
/// side to move can force the threefold.
pub(crate) fn is_repetition(path: &[u64], hash: u64) -> bool {
    path.iter().any(|&h| h == hash)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chess::Board;

    use super::*;

    #[test]
    fn fresh_game_is_ongoing() {
        assert_eq!(game_outcome(&Board::default(), &[], 0), GameOutcome::Ongoing);
    }

    #[test]
    fn checkmate_detected() {
        // Back-rank mate: Black king h8, White queen g7 guarded by king f6.
        let board = Board::from_str("7k/6Q1/5K2/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(game_outcome(&board, &[], 0), GameOutcome::Checkmate);
    }

    #[test]
    fn stalemate_detected() {
        let board = Board::from_str("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(game_outcome(&board, &[], 0), GameOutcome::Stalemate);
    }

    #[test]
    fn fifty_move_rule() {
        let board = Board::from_str("4k3/8/8/8/8/8/3R4/4K3 w - - 100 80").unwrap();
        assert_eq!(game_outcome(&board, &[], 100), GameOutcome::DrawFifty);
    }

    #[test]
    fn threefold_repetition() {
        let board = Board::default();
        let hash = board.get_hash();
        assert_eq!(
            game_outcome(&board, &[hash, 1, hash, 2], 4),
            GameOutcome::DrawRepetition
        );
        // A single earlier occurrence is not yet a threefold at game level.
        assert_eq!(game_outcome(&board, &[hash], 2), GameOutcome::Ongoing);
    }

    #[test]
    fn bare_kings_insufficient() {
        let board = Board::from_str("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(game_outcome(&board, &[], 0), GameOutcome::DrawInsufficient);
        assert!(insufficient_material(&board));
    }

    #[test]
    fn king_and_knight_insufficient() {
        let board = Board::from_str("4k3/8/8/8/8/8/8/2N1K3 w - - 0 1").unwrap();
        assert!(insufficient_material(&board));
    }

    #[test]
    fn king_and_rook_sufficient() {
        let board = Board::from_str("4k3/8/8/8/8/8/8/2R1K3 w - - 0 1").unwrap();
        assert!(!insufficient_material(&board));
    }

    #[test]
    fn search_path_repetition() {
        assert!(is_repetition(&[5, 9, 12], 9));
        assert!(!is_repetition(&[5, 9, 12], 7));
    }
}
