//! Captured pieces tally
//!
//! Counts captured pieces by the colour of the piece that was taken and its
//! kind. The tally is always derivable from the move history: sessions
//! update it incrementally on every move and rebuild it with
//! [`CaptureTally::from_moves`] whenever history shrinks.
//!
//! # Material Values
//!
//! - Pawn: 1
//! - Knight/Bishop: 3
//! - Rook: 5
//! - Queen: 9
//! - King: 0 (cannot be captured)
//!
//! Positive advantage means White is ahead, negative means Black is ahead.
//! Example: if White took a rook and a pawn (5+1) and Black took a knight
//! (3), the advantage is +3.

use crate::game::history::MoveRecord;
use serde::{Deserialize, Serialize};
use shared::{PieceColor, PieceKind};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureTally {
    /// `counts[captured colour][kind]`
    counts: [[u8; 6]; 2],
}

impl CaptureTally {
    /// Recompute the tally from scratch
    pub fn from_moves<'a>(moves: impl IntoIterator<Item = &'a MoveRecord>) -> Self {
        let mut tally = Self::default();
        for record in moves {
            tally.record_move(record);
        }
        tally
    }

    /// Count the capture made by `record`, if any
    pub fn record_move(&mut self, record: &MoveRecord) {
        if let Some(kind) = record.captured {
            self.record(record.mover.opposite(), kind);
        }
    }

    /// Record that a `captured_color` piece of `kind` was taken
    pub fn record(&mut self, captured_color: PieceColor, kind: PieceKind) {
        let slot = &mut self.counts[captured_color.index()][kind.index()];
        *slot = slot.saturating_add(1);
    }

    /// How many `color` pieces of `kind` have been captured
    pub fn count(&self, color: PieceColor, kind: PieceKind) -> u8 {
        self.counts[color.index()][kind.index()]
    }

    /// Pieces taken *by* `color`, i.e. the opponent's captured pieces
    pub fn captured_by(&self, color: PieceColor) -> Vec<PieceKind> {
        let taken = color.opposite();
        PieceKind::ALL
            .iter()
            .flat_map(|&kind| std::iter::repeat(kind).take(self.count(taken, kind).into()))
            .collect()
    }

    /// Material difference in pawn units
    pub fn material_advantage(&self) -> i32 {
        let value_taken = |color: PieceColor| -> i32 {
            PieceKind::ALL
                .iter()
                .map(|&kind| i32::from(self.count(color, kind)) * piece_value(kind))
                .sum()
        };
        value_taken(PieceColor::Black) - value_taken(PieceColor::White)
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().flatten().map(|&n| u32::from(n)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn clear(&mut self) {
        self.counts = [[0; 6]; 2];
    }
}

/// Value of a piece in pawns
fn piece_value(kind: PieceKind) -> i32 {
    match kind {
        PieceKind::Pawn => 1,
        PieceKind::Knight => 3,
        PieceKind::Bishop => 3,
        PieceKind::Rook => 5,
        PieceKind::Queen => 9,
        PieceKind::King => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_default() {
        //! Verifies the tally starts empty
        let tally = CaptureTally::default();
        assert!(tally.is_empty());
        assert!(tally.captured_by(PieceColor::White).is_empty());
        assert_eq!(tally.material_advantage(), 0);
    }

    #[test]
    fn test_white_takes_black() {
        //! A captured black queen is credited to White
        let mut tally = CaptureTally::default();
        tally.record(PieceColor::Black, PieceKind::Queen);

        assert_eq!(tally.count(PieceColor::Black, PieceKind::Queen), 1);
        assert_eq!(tally.captured_by(PieceColor::White), vec![PieceKind::Queen]);
        assert!(tally.captured_by(PieceColor::Black).is_empty());
        assert_eq!(tally.material_advantage(), 9);
    }

    #[test]
    fn test_material_advantage_black_ahead() {
        //! Tests material calculation when Black is ahead
        let mut tally = CaptureTally::default();
        tally.record(PieceColor::White, PieceKind::Rook); // Black takes Rook (5)
        tally.record(PieceColor::Black, PieceKind::Bishop); // White takes Bishop (3)

        assert_eq!(tally.material_advantage(), -2);
    }

    #[test]
    fn test_complex_exchange() {
        //! Tests a realistic run of captures on both sides
        let mut tally = CaptureTally::default();

        // White captures: Queen(9), Rook(5), Pawn(1) = 15
        tally.record(PieceColor::Black, PieceKind::Queen);
        tally.record(PieceColor::Black, PieceKind::Rook);
        tally.record(PieceColor::Black, PieceKind::Pawn);

        // Black captures: Rook(5), Knight(3), Bishop(3) = 11
        tally.record(PieceColor::White, PieceKind::Rook);
        tally.record(PieceColor::White, PieceKind::Knight);
        tally.record(PieceColor::White, PieceKind::Bishop);

        assert_eq!(tally.total(), 6);
        assert_eq!(
            tally.captured_by(PieceColor::White),
            vec![PieceKind::Pawn, PieceKind::Rook, PieceKind::Queen]
        );
        assert_eq!(tally.material_advantage(), 4);
    }

    #[test]
    fn test_clear() {
        //! Tests clearing the tally for a new game
        let mut tally = CaptureTally::default();
        tally.record(PieceColor::Black, PieceKind::Queen);
        tally.record(PieceColor::White, PieceKind::Rook);

        tally.clear();

        assert!(tally.is_empty());
        assert_eq!(tally, CaptureTally::default());
    }

    #[test]
    fn test_piece_values() {
        //! Verifies standard chess piece values
        assert_eq!(piece_value(PieceKind::Pawn), 1);
        assert_eq!(piece_value(PieceKind::Knight), 3);
        assert_eq!(piece_value(PieceKind::Bishop), 3);
        assert_eq!(piece_value(PieceKind::Rook), 5);
        assert_eq!(piece_value(PieceKind::Queen), 9);
        assert_eq!(piece_value(PieceKind::King), 0);
    }
}
