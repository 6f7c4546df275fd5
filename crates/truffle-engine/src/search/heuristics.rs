//! Killer-move and history-heuristic tables, shared across search workers.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

use chess::{ChessMove, Color};

use crate::search::negamax::MAX_PLY;

/// Two killer moves per ply — quiet moves that caused beta cutoffs in
/// sibling subtrees.
///
/// Shared by every root worker; a single mutex is enough because the table
/// is tiny and touched once per ordered node.
pub struct KillerTable {
    slots: Mutex<[[Option<ChessMove>; 2]; MAX_PLY]>,
}

impl KillerTable {
    /// Create an empty killer table.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new([[None; 2]; MAX_PLY]),
        }
    }

    /// Forget all killers.
    pub fn clear(&self) {
        *self.slots.lock().expect("killer table mutex poisoned") = [[None; 2]; MAX_PLY];
    }

    /// Record a quiet cutoff move at `ply`.
    ///
    /// The previous top killer shifts to slot 1 unless the move is already
    /// there, keeping the two slots distinct.
    pub fn store(&self, ply: usize, mv: ChessMove) {
        if ply >= MAX_PLY {
            return;
        }
        let mut slots = self.slots.lock().expect("killer table mutex poisoned");
        if slots[ply][0] != Some(mv) {
            slots[ply][1] = slots[ply][0];
            slots[ply][0] = Some(mv);
        }
    }

    /// Snapshot of both killer slots at `ply`.
    pub fn at(&self, ply: usize) -> [Option<ChessMove>; 2] {
        if ply >= MAX_PLY {
            return [None; 2];
        }
        self.slots.lock().expect("killer table mutex poisoned")[ply]
    }

    /// Whether `mv` is a killer at `ply`.
    pub fn is_killer(&self, ply: usize, mv: ChessMove) -> bool {
        let slots = self.at(ply);
        slots[0] == Some(mv) || slots[1] == Some(mv)
    }
}

impl Default for KillerTable {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// History heuristic
// ---------------------------------------------------------------------------

const SQUARES: usize = 64;
const SIDE_SIZE: usize = SQUARES * SQUARES;

/// History heuristic — one 64×64 from/to counter grid per side.
///
/// Quiet moves that cause beta cutoffs earn `depth²`; the counters order
/// quiet moves behind the tactical bands. Atomic cells let workers update
/// concurrently without a lock; a lost increment is irrelevant.
pub struct HistoryTable {
    table: Box<[AtomicI32]>,
}

impl HistoryTable {
    /// Create a zeroed history table.
    pub fn new() -> Self {
        Self {
            table: (0..2 * SIDE_SIZE).map(|_| AtomicI32::new(0)).collect(),
        }
    }

    fn index(side: Color, mv: ChessMove) -> usize {
        side.to_index() * SIDE_SIZE
            + mv.get_source().to_index() * SQUARES
            + mv.get_dest().to_index()
    }

    /// Reward a quiet move that caused a beta cutoff at `depth`.
    pub fn reward(&self, side: Color, mv: ChessMove, depth: i32) {
        let bonus = depth * depth;
        self.table[Self::index(side, mv)].fetch_add(bonus, Ordering::Relaxed);
    }

    /// Ordering score for a quiet move.
    pub fn score(&self, side: Color, mv: ChessMove) -> i32 {
        self.table[Self::index(side, mv)].load(Ordering::Relaxed)
    }

    /// Halve every counter — called once per search so counters from old
    /// positions fade instead of growing without bound over a long game.
    pub fn age(&self) {
        for cell in self.table.iter() {
            let value = cell.load(Ordering::Relaxed);
            cell.store(value / 2, Ordering::Relaxed);
        }
    }

    /// Zero every counter.
    pub fn clear(&self) {
        for cell in self.table.iter() {
            cell.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::Square;

    fn mv(from: Square, to: Square) -> ChessMove {
        ChessMove::new(from, to, None)
    }

    #[test]
    fn killer_store_and_check() {
        let killers = KillerTable::new();
        let first = mv(Square::E2, Square::E4);
        let second = mv(Square::D2, Square::D4);

        killers.store(5, first);
        assert!(killers.is_killer(5, first));
        assert!(!killers.is_killer(5, second));

        // Second killer shifts the first into slot 1.
        killers.store(5, second);
        assert!(killers.is_killer(5, first));
        assert!(killers.is_killer(5, second));
    }

    #[test]
    fn killer_repeated_store_keeps_slots_distinct() {
        let killers = KillerTable::new();
        let first = mv(Square::E2, Square::E4);
        let second = mv(Square::D2, Square::D4);

        killers.store(0, first);
        killers.store(0, second);
        killers.store(0, second);

        let slots = killers.at(0);
        assert_eq!(slots[0], Some(second));
        assert_eq!(slots[1], Some(first));
    }

    #[test]
    fn killer_plies_are_independent() {
        let killers = KillerTable::new();
        let m = mv(Square::G1, Square::F3);
        killers.store(3, m);
        assert!(killers.is_killer(3, m));
        assert!(!killers.is_killer(4, m));
    }

    #[test]
    fn killer_out_of_range_ply_is_ignored() {
        let killers = KillerTable::new();
        let m = mv(Square::G1, Square::F3);
        killers.store(MAX_PLY + 10, m);
        assert!(!killers.is_killer(MAX_PLY + 10, m));
    }

    #[test]
    fn history_reward_is_depth_squared() {
        let history = HistoryTable::new();
        let m = mv(Square::B1, Square::C3);

        history.reward(Color::White, m, 4);
        assert_eq!(history.score(Color::White, m), 16);

        history.reward(Color::White, m, 3);
        assert_eq!(history.score(Color::White, m), 25);
    }

    #[test]
    fn history_sides_are_independent() {
        let history = HistoryTable::new();
        let m = mv(Square::B1, Square::C3);
        history.reward(Color::White, m, 5);
        assert_eq!(history.score(Color::Black, m), 0);
    }

    #[test]
    fn history_age_halves_scores() {
        let history = HistoryTable::new();
        let m = mv(Square::B1, Square::C3);
        history.reward(Color::White, m, 10);
        history.age();
        assert_eq!(history.score(Color::White, m), 50);
    }

    #[test]
    fn history_clear_zeroes() {
        let history = HistoryTable::new();
        let m = mv(Square::B1, Square::C3);
        history.reward(Color::Black, m, 6);
        history.clear();
        assert_eq!(history.score(Color::Black, m), 0);
    }
}
