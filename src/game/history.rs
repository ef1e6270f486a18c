//! Move history of one session
//!
//! `positions[0]` is the starting position and `positions[n]` the position
//! after ply `n`, so there is always exactly one more position than moves.

use crate::game::rules::{AppliedMove, Position};
use serde::{Deserialize, Serialize};
use shared::{MovePayload, PieceColor, PieceKind, Square};

/// One applied half-move. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub mover: PieceColor,
    pub payload: MovePayload,
    pub captured: Option<PieceKind>,
    /// Position after the move
    pub position: Position,
}

impl MoveRecord {
    pub fn source(&self) -> Square {
        self.payload.source
    }

    pub fn destination(&self) -> Square {
        self.payload.destination
    }

    pub fn promotion(&self) -> Option<PieceKind> {
        self.payload.promotion
    }
}

impl From<AppliedMove> for MoveRecord {
    fn from(applied: AppliedMove) -> Self {
        Self {
            mover: applied.mover,
            payload: applied.payload,
            captured: applied.captured,
            position: applied.position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHistory {
    positions: Vec<Position>,
    moves: Vec<MoveRecord>,
}

impl SessionHistory {
    pub fn new(initial: Position) -> Self {
        Self {
            positions: vec![initial],
            moves: Vec::new(),
        }
    }

    pub fn push(&mut self, record: MoveRecord) {
        self.positions.push(record.position.clone());
        self.moves.push(record);
    }

    /// Remove the latest move, keeping the starting position
    pub fn pop(&mut self) -> Option<MoveRecord> {
        let record = self.moves.pop()?;
        self.positions.pop();
        Some(record)
    }

    /// Drop every move, back to the starting position
    pub fn reset(&mut self) {
        self.positions.truncate(1);
        self.moves.clear();
    }

    pub fn current(&self) -> &Position {
        // `positions` is never empty
        &self.positions[self.positions.len() - 1]
    }

    pub fn initial(&self) -> &Position {
        &self.positions[0]
    }

    /// Positions before the current one, oldest first
    pub fn earlier_positions(&self) -> &[Position] {
        &self.positions[..self.positions.len() - 1]
    }

    pub fn last_move(&self) -> Option<&MoveRecord> {
        self.moves.last()
    }

    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Number of half-moves played
    pub fn ply(&self) -> usize {
        self.moves.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.moves.is_empty()
    }
}
