//! Lock-free transposition table shared by all search workers.
//!
//! Fixed power-of-two capacity, always-replace. Each slot is two atomic
//! words: a packed payload and the position hash XORed with that payload.
//! A probe recomputes the XOR to validate the pair, so torn writes from
//! racing workers are detected and discarded rather than locked against —
//! transposition data is a heuristic and a lost entry is harmless.

use std::sync::atomic::{AtomicU64, Ordering};

use chess::{ChessMove, Piece, Square};

use crate::search::negamax::MATE_THRESHOLD;

/// Bound kind stored in a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    /// No bound information (empty slot).
    None = 0,
    /// The stored score is exact (PV node).
    Exact = 1,
    /// The stored score is a lower bound (failed high).
    Lower = 2,
    /// The stored score is an upper bound (failed low).
    Upper = 3,
}

impl Bound {
    const fn from_bits(bits: u64) -> Self {
        match bits & 0x03 {
            1 => Bound::Exact,
            2 => Bound::Lower,
            3 => Bound::Upper,
            _ => Bound::None,
        }
    }
}

/// Result of a successful probe.
#[derive(Debug, Clone)]
pub struct TtProbe {
    /// Best move from a previous search of this position, if one was stored.
    pub best_move: Option<ChessMove>,
    /// Depth the stored score was searched to.
    pub depth: i32,
    /// Bound kind of the stored score.
    pub bound: Bound,
    /// Score, already converted back from mate-distance form for `ply`.
    pub score: i32,
}

// ---------------------------------------------------------------------------
// Mate-score adjustment
// ---------------------------------------------------------------------------

/// Convert a search score to table-storable form.
///
/// Mate scores are path-dependent (`MATE_SCORE - ply`); stored as distance
/// from the probing node instead of distance from the root they stay valid
/// when the position is reached along a different path.
pub fn score_to_tt(score: i32, ply: usize) -> i32 {
    if score > MATE_THRESHOLD {
        score + ply as i32
    } else if score < -MATE_THRESHOLD {
        score - ply as i32
    } else {
        score
    }
}

/// Reverse the adjustment applied by [`score_to_tt`].
pub fn score_from_tt(score: i32, ply: usize) -> i32 {
    if score > MATE_THRESHOLD {
        score - ply as i32
    } else if score < -MATE_THRESHOLD {
        score + ply as i32
    } else {
        score
    }
}

// ---------------------------------------------------------------------------
// Entry packing
// ---------------------------------------------------------------------------

// Payload layout: move(16) | depth(8) << 16 | bound(2) << 24 | score(16) << 32.

fn pack_move(mv: Option<ChessMove>) -> u64 {
    match mv {
        Some(m) => {
            let promo = match m.get_promotion() {
                Some(Piece::Knight) => 1u64,
                Some(Piece::Bishop) => 2,
                Some(Piece::Rook) => 3,
                Some(Piece::Queen) => 4,
                _ => 0,
            };
            (m.get_source().to_index() as u64)
                | ((m.get_dest().to_index() as u64) << 6)
                | (promo << 12)
        }
        None => 0,
    }
}

fn unpack_move(bits: u64) -> Option<ChessMove> {
    let bits = bits & 0xFFFF;
    if bits == 0 {
        // a1-to-a1 is not a move; zero means "no move stored".
        return None;
    }
    let from = unsafe { Square::new((bits & 0x3F) as u8) };
    let to = unsafe { Square::new(((bits >> 6) & 0x3F) as u8) };
    let promo = match (bits >> 12) & 0x7 {
        1 => Some(Piece::Knight),
        2 => Some(Piece::Bishop),
        3 => Some(Piece::Rook),
        4 => Some(Piece::Queen),
        _ => None,
    };
    Some(ChessMove::new(from, to, promo))
}

fn pack_data(mv: Option<ChessMove>, depth: u8, bound: Bound, score: i16) -> u64 {
    pack_move(mv)
        | ((depth as u64) << 16)
        | ((bound as u8 as u64) << 24)
        | (((score as u16) as u64) << 32)
}

struct TtSlot {
    key: AtomicU64,
    data: AtomicU64,
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Fixed-size transposition table with always-replace policy.
pub struct TranspositionTable {
    slots: Box<[TtSlot]>,
    mask: u64,
}

impl TranspositionTable {
    /// Create a table of the given size in megabytes (rounded down to a
    /// power-of-two entry count).
    pub fn new(mb: usize) -> Self {
        let bytes = mb.max(1) * 1024 * 1024;
        let entry_size = 2 * std::mem::size_of::<u64>();
        let num_entries = ((bytes / entry_size).next_power_of_two() >> 1).max(1);

        let slots: Box<[TtSlot]> = (0..num_entries)
            .map(|_| TtSlot {
                key: AtomicU64::new(0),
                data: AtomicU64::new(0),
            })
            .collect();

        Self {
            mask: (num_entries - 1) as u64,
            slots,
        }
    }

    /// Empty every slot.
    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.key.store(0, Ordering::Relaxed);
            slot.data.store(0, Ordering::Relaxed);
        }
    }

    /// Probe the table for a position.
    ///
    /// The stored score is converted back to root-relative form using `ply`.
    /// Callers gate on `TtProbe::depth` themselves; the best-move hint is
    /// useful for ordering even when the stored depth is too shallow.
    pub fn probe(&self, hash: u64, ply: usize) -> Option<TtProbe> {
        let slot = &self.slots[(hash & self.mask) as usize];
        // Relaxed is deliberate: a torn pair fails the XOR check below.
        let key = slot.key.load(Ordering::Relaxed);
        let data = slot.data.load(Ordering::Relaxed);

        if key ^ data != hash {
            return None;
        }
        let bound = Bound::from_bits(data >> 24);
        if bound == Bound::None {
            return None;
        }

        Some(TtProbe {
            best_move: unpack_move(data),
            depth: ((data >> 16) & 0xFF) as i32,
            bound,
            score: score_from_tt(((data >> 32) as u16) as i16 as i32, ply),
        })
    }

    /// Best-move hint for ordering, ignoring depth and bound.
    pub fn hash_move(&self, hash: u64) -> Option<ChessMove> {
        self.probe(hash, 0).and_then(|entry| entry.best_move)
    }

    /// Store a position unconditionally (always-replace).
    pub fn store(
        &self,
        hash: u64,
        depth: i32,
        score: i32,
        bound: Bound,
        best_move: Option<ChessMove>,
        ply: usize,
    ) {
        let depth = depth.clamp(0, u8::MAX as i32) as u8;
        let score = score_to_tt(score, ply).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        let data = pack_data(best_move, depth, bound, score);

        let slot = &self.slots[(hash & self.mask) as usize];
        slot.key.store(hash ^ data, Ordering::Relaxed);
        slot.data.store(data, Ordering::Relaxed);
    }

    /// Number of entries the table can hold.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl std::fmt::Debug for TranspositionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranspositionTable")
            .field("capacity", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::negamax::MATE_SCORE;

    fn mv(from: Square, to: Square) -> ChessMove {
        ChessMove::new(from, to, None)
    }

    #[test]
    fn store_and_probe_roundtrip() {
        let tt = TranspositionTable::new(1);
        let hash: u64 = 0xDEAD_BEEF_1234_5678;
        let best = mv(Square::E2, Square::E4);

        tt.store(hash, 5, 100, Bound::Exact, Some(best), 0);

        let probe = tt.probe(hash, 0).expect("stored entry should be found");
        assert_eq!(probe.best_move, Some(best));
        assert_eq!(probe.depth, 5);
        assert_eq!(probe.bound, Bound::Exact);
        assert_eq!(probe.score, 100);
    }

    #[test]
    fn probe_miss_returns_none() {
        let tt = TranspositionTable::new(1);
        assert!(tt.probe(0x1234_5678_9ABC_DEF0, 0).is_none());
    }

    #[test]
    fn promotion_move_roundtrip() {
        let tt = TranspositionTable::new(1);
        let hash: u64 = 42;
        let promo = ChessMove::new(Square::E7, Square::E8, Some(Piece::Queen));

        tt.store(hash, 3, 850, Bound::Lower, Some(promo), 2);

        let probe = tt.probe(hash, 2).unwrap();
        assert_eq!(probe.best_move, Some(promo));
    }

    #[test]
    fn entry_without_move_roundtrip() {
        let tt = TranspositionTable::new(1);
        tt.store(7, 1, -40, Bound::Upper, None, 0);
        let probe = tt.probe(7, 0).unwrap();
        assert_eq!(probe.best_move, None);
        assert_eq!(probe.bound, Bound::Upper);
    }

    #[test]
    fn mate_score_adjustment_roundtrip() {
        // Mate found at ply 5: stored as distance-from-node, restored
        // to the same root-relative value when probed at the same ply.
        let mate = MATE_SCORE - 3;
        let stored = score_to_tt(mate, 5);
        assert_eq!(score_from_tt(stored, 5), mate);

        let mated = -(MATE_SCORE - 3);
        let stored = score_to_tt(mated, 7);
        assert_eq!(score_from_tt(stored, 7), mated);
    }

    #[test]
    fn mate_score_shrinks_when_probed_shallower() {
        // An entry written at ply 6 probed at ply 2 promises a mate four
        // plies closer to the root.
        let mate_at_6 = MATE_SCORE - 10;
        let tt = TranspositionTable::new(1);
        tt.store(99, 8, mate_at_6, Bound::Exact, None, 6);
        let probe = tt.probe(99, 2).unwrap();
        assert_eq!(probe.score, MATE_SCORE - 6);
    }

    #[test]
    fn normal_score_not_adjusted() {
        assert_eq!(score_to_tt(150, 10), 150);
        assert_eq!(score_from_tt(150, 10), 150);
    }

    #[test]
    fn always_replace() {
        let tt = TranspositionTable::new(1);
        let hash: u64 = 0xAAAA_BBBB_CCCC_DDDD;

        tt.store(hash, 10, 100, Bound::Exact, Some(mv(Square::E2, Square::E4)), 0);
        tt.store(hash, 1, 200, Bound::Lower, Some(mv(Square::D2, Square::D4)), 0);

        let probe = tt.probe(hash, 0).unwrap();
        assert_eq!(probe.depth, 1, "later store should win");
        assert_eq!(probe.score, 200);
    }

    #[test]
    fn clear_removes_all_entries() {
        let tt = TranspositionTable::new(1);
        tt.store(123, 5, 100, Bound::Exact, None, 0);
        assert!(tt.probe(123, 0).is_some());

        tt.clear();
        assert!(tt.probe(123, 0).is_none());
    }

    #[test]
    fn hash_move_ignores_depth() {
        let tt = TranspositionTable::new(1);
        let best = mv(Square::G1, Square::F3);
        tt.store(55, 1, 10, Bound::Upper, Some(best), 0);
        assert_eq!(tt.hash_move(55), Some(best));
    }

    #[test]
    fn capacity_is_power_of_two() {
        let tt = TranspositionTable::new(4);
        assert!(tt.capacity().is_power_of_two());
    }
}
