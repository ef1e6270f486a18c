//! Error types for game module
//!
//! Covers move validation against the rules engine, turn discipline,
//! session state transitions and reconciliation with the remote peer.

use shared::PieceColor;

/// Errors that can occur in game logic
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// The rules engine rejected the move; nothing was changed
    #[error("Illegal move {mv}: {reason}")]
    IllegalMove { mv: String, reason: String },

    /// A local move was attempted while the other side is to move
    #[error("Not your turn: {to_move} is to move")]
    NotYourTurn { to_move: PieceColor },

    /// A remote move arrived while it is this session's turn
    #[error("Received a {mover} move out of turn")]
    OutOfTurn { mover: PieceColor },

    /// The game is over; only the rematch handshake is accepted
    #[error("The game is over")]
    SessionOver,

    /// Invalid game state transition
    #[error("Invalid game state transition: {message}")]
    InvalidStateTransition { message: String },

    #[error("Invalid position: {message}")]
    InvalidPosition { message: String },

    /// The remote peer's history no longer lines up with ours
    #[error("History out of sync: peer expects ply {expected}, local history has {actual}")]
    HistoryDesync { expected: usize, actual: usize },

    /// The computer opponent could not produce a usable move
    #[error("Computer opponent failed: {message}")]
    Bot { message: String },
}

impl GameError {
    pub(crate) fn transition(message: impl Into<String>) -> Self {
        GameError::InvalidStateTransition {
            message: message.into(),
        }
    }
}

/// Result type alias for game operations
pub type GameResult<T> = Result<T, GameError>;
