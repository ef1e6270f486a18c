//! Rules engine seam
//!
//! Sessions never compute legality themselves. They hand the current
//! [`Position`] and a candidate [`MovePayload`] to a [`RulesEngine`] and get
//! back either the resulting position plus move metadata, or a rejection.
//! [`ShakmatyRules`] is the production implementation.
//!
//! Positions are FEN text plus the side to move, so they can be logged,
//! compared and shipped without exposing the engine's own types.

use crate::game::error::{GameError, GameResult};
use crate::game::status::DrawReason;
use serde::{Deserialize, Serialize};
use shakmaty::{
    fen::Fen, uci::UciMove, CastlingMode, Chess, Color, EnPassantMode, Move, Position as _, Role,
};
use shared::{MovePayload, PieceColor, PieceKind, Square};

/// Serializable board snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    fen: String,
    side_to_move: PieceColor,
}

impl Position {
    /// Build a position from parts already validated by a rules engine
    pub fn new(fen: impl Into<String>, side_to_move: PieceColor) -> Self {
        Self {
            fen: fen.into(),
            side_to_move,
        }
    }

    pub fn fen(&self) -> &str {
        &self.fen
    }

    pub fn side_to_move(&self) -> PieceColor {
        self.side_to_move
    }

    /// Placement, side to move, castling rights and en-passant square
    fn repetition_key(&self) -> impl Iterator<Item = &str> {
        self.fen.split_whitespace().take(4)
    }

    fn repeats(&self, other: &Position) -> bool {
        self.repetition_key().eq(other.repetition_key())
    }
}

/// A move the rules engine accepted, with everything needed to record it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    /// The move as applied, with the promotion piece filled in when implied
    pub payload: MovePayload,
    pub mover: PieceColor,
    pub captured: Option<PieceKind>,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Checkmate { winner: PieceColor },
    Draw(DrawReason),
}

pub trait RulesEngine: Send + Sync {
    fn initial_position(&self) -> Position;

    /// Validate a FEN string and turn it into a [`Position`]
    fn parse_position(&self, fen: &str) -> GameResult<Position>;

    /// Apply `mv` to `position`, or reject it with [`GameError::IllegalMove`]
    fn apply(&self, position: &Position, mv: &MovePayload) -> GameResult<AppliedMove>;

    /// Every legal move in `position`
    fn legal_moves(&self, position: &Position) -> GameResult<Vec<MovePayload>>;

    /// Squares the piece on `from` can legally move to
    fn legal_destinations(&self, position: &Position, from: Square) -> GameResult<Vec<Square>> {
        let mut squares: Vec<Square> = self
            .legal_moves(position)?
            .into_iter()
            .filter(|mv| mv.source == from)
            .map(|mv| mv.destination)
            .collect();
        squares.sort();
        squares.dedup();
        Ok(squares)
    }

    /// Whether the game has ended in `position`
    ///
    /// `earlier` holds the positions that preceded it in this game, oldest
    /// first, for repetition detection.
    fn terminal_state(&self, position: &Position, earlier: &[Position])
        -> GameResult<Option<Terminal>>;
}

/// Standard chess rules backed by `shakmaty`
#[derive(Debug, Clone, Copy, Default)]
pub struct ShakmatyRules;

impl ShakmatyRules {
    pub fn new() -> Self {
        Self
    }

    fn load(position: &Position) -> GameResult<Chess> {
        let fen: Fen = position.fen.parse().map_err(|e| GameError::InvalidPosition {
            message: format!("{e}"),
        })?;
        fen.into_position(CastlingMode::Standard)
            .map_err(|e| GameError::InvalidPosition {
                message: format!("{e}"),
            })
    }

    fn snapshot(chess: &Chess) -> Position {
        Position {
            fen: Fen::from_position(chess.clone(), EnPassantMode::Legal).to_string(),
            side_to_move: color_from_engine(chess.turn()),
        }
    }

    fn resolve(chess: &Chess, mv: &MovePayload) -> Option<(Move, MovePayload)> {
        let attempt = |payload: MovePayload| {
            let uci: UciMove = payload.to_uci().parse().ok()?;
            uci.to_move(chess).ok().map(|m| (m, payload))
        };

        attempt(*mv).or_else(|| match mv.promotion {
            // Pawn reaching the last rank with no piece chosen
            None => attempt(mv.with_promotion(PieceKind::Queen)),
            // Promotion piece given for an ordinary move
            Some(_) => attempt(MovePayload::new(mv.source, mv.destination)),
        })
    }
}

impl RulesEngine for ShakmatyRules {
    fn initial_position(&self) -> Position {
        Self::snapshot(&Chess::default())
    }

    fn parse_position(&self, fen: &str) -> GameResult<Position> {
        let probe = Position::new(fen.trim(), PieceColor::White);
        Ok(Self::snapshot(&Self::load(&probe)?))
    }

    fn apply(&self, position: &Position, mv: &MovePayload) -> GameResult<AppliedMove> {
        let mut chess = Self::load(position)?;
        let (m, payload) = Self::resolve(&chess, mv).ok_or_else(|| GameError::IllegalMove {
            mv: mv.to_uci(),
            reason: format!("not legal for {}", position.side_to_move),
        })?;

        let mover = color_from_engine(chess.turn());
        let captured = m.capture().map(kind_from_role);
        chess.play_unchecked(&m);

        Ok(AppliedMove {
            payload,
            mover,
            captured,
            position: Self::snapshot(&chess),
        })
    }

    fn legal_moves(&self, position: &Position) -> GameResult<Vec<MovePayload>> {
        let chess = Self::load(position)?;
        chess
            .legal_moves()
            .iter()
            .map(|m| {
                let uci = UciMove::from_move(m, CastlingMode::Standard).to_string();
                MovePayload::from_uci(&uci).map_err(|e| GameError::InvalidPosition {
                    message: e.to_string(),
                })
            })
            .collect()
    }

    fn terminal_state(
        &self,
        position: &Position,
        earlier: &[Position],
    ) -> GameResult<Option<Terminal>> {
        let chess = Self::load(position)?;

        let terminal = if chess.is_checkmate() {
            Some(Terminal::Checkmate {
                winner: color_from_engine(chess.turn()).opposite(),
            })
        } else if chess.is_stalemate() {
            Some(Terminal::Draw(DrawReason::Stalemate))
        } else if chess.is_insufficient_material() {
            Some(Terminal::Draw(DrawReason::InsufficientMaterial))
        } else if chess.halfmoves() >= 100 {
            Some(Terminal::Draw(DrawReason::FiftyMoveRule))
        } else if earlier.iter().filter(|p| p.repeats(position)).count() >= 2 {
            Some(Terminal::Draw(DrawReason::ThreefoldRepetition))
        } else {
            None
        };
        Ok(terminal)
    }
}

fn color_from_engine(color: Color) -> PieceColor {
    match color {
        Color::White => PieceColor::White,
        Color::Black => PieceColor::Black,
    }
}

fn kind_from_role(role: Role) -> PieceKind {
    match role {
        Role::Pawn => PieceKind::Pawn,
        Role::Knight => PieceKind::Knight,
        Role::Bishop => PieceKind::Bishop,
        Role::Rook => PieceKind::Rook,
        Role::Queen => PieceKind::Queen,
        Role::King => PieceKind::King,
    }
}
