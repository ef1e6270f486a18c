//! Session lifecycle: playing or finished, and why it finished
//!
//! A session starts `Active` and moves to `Over` exactly once per game.
//! Every `Over` state is terminal for moves and undo; only the rematch
//! handshake brings the session back to `Active`.
//!
//! ```text
//! Active → Over(Checkmate | Draw | ResignedBySelf | ResignedByOpponent | TimedOut)
//! Over   → Active   (rematch agreed)
//! ```

use serde::{Deserialize, Serialize};
use shared::PieceColor;
use std::fmt;

/// Why a game ended without a winner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DrawReason {
    /// Side to move has no legal move and is not in check
    Stalemate,
    /// Neither side can deliver mate (e.g. K vs K, K+B vs K)
    InsufficientMaterial,
    /// 100 plies without a capture or pawn move
    FiftyMoveRule,
    /// Same position with the same side to move for the third time
    ThreefoldRepetition,
}

impl fmt::Display for DrawReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DrawReason::Stalemate => "stalemate",
            DrawReason::InsufficientMaterial => "insufficient material",
            DrawReason::FiftyMoveRule => "fifty-move rule",
            DrawReason::ThreefoldRepetition => "threefold repetition",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameOverReason {
    Checkmate { winner: PieceColor },
    Draw(DrawReason),
    /// This session resigned (or quit)
    ResignedBySelf,
    /// The opponent resigned, quit or went silent past the idle limit
    ResignedByOpponent,
    /// This session stayed silent past the opponent's idle limit
    TimedOut,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    #[default]
    Active,
    Over(GameOverReason),
}

impl SessionStatus {
    #[must_use]
    pub fn is_over(&self) -> bool {
        matches!(self, SessionStatus::Over(_))
    }

    /// Winning colour, seen from the session playing `local`
    ///
    /// `None` while playing and for draws.
    #[must_use]
    pub fn winner(&self, local: PieceColor) -> Option<PieceColor> {
        match self {
            SessionStatus::Active => None,
            SessionStatus::Over(reason) => match reason {
                GameOverReason::Checkmate { winner } => Some(*winner),
                GameOverReason::Draw(_) => None,
                GameOverReason::ResignedBySelf | GameOverReason::TimedOut => {
                    Some(local.opposite())
                }
                GameOverReason::ResignedByOpponent => Some(local),
            },
        }
    }

    /// Human-readable result line
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            SessionStatus::Active => "Game in progress".to_string(),
            SessionStatus::Over(GameOverReason::Checkmate { winner }) => {
                format!("Checkmate, {winner} wins")
            }
            SessionStatus::Over(GameOverReason::Draw(reason)) => format!("Draw by {reason}"),
            SessionStatus::Over(GameOverReason::ResignedBySelf) => "You resigned".to_string(),
            SessionStatus::Over(GameOverReason::ResignedByOpponent) => {
                "Opponent resigned".to_string()
            }
            SessionStatus::Over(GameOverReason::TimedOut) => {
                "You lost on time: the opponent stopped waiting".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_active() {
        //! A fresh session is playing and has no winner
        let status = SessionStatus::default();
        assert!(!status.is_over());
        assert_eq!(status.winner(PieceColor::White), None);
    }

    #[test]
    fn test_winner_by_reason() {
        let mate = SessionStatus::Over(GameOverReason::Checkmate {
            winner: PieceColor::Black,
        });
        assert_eq!(mate.winner(PieceColor::White), Some(PieceColor::Black));

        let resigned = SessionStatus::Over(GameOverReason::ResignedBySelf);
        assert_eq!(resigned.winner(PieceColor::White), Some(PieceColor::Black));

        let opponent_left = SessionStatus::Over(GameOverReason::ResignedByOpponent);
        assert_eq!(opponent_left.winner(PieceColor::White), Some(PieceColor::White));

        let draw = SessionStatus::Over(GameOverReason::Draw(DrawReason::Stalemate));
        assert!(draw.is_over());
        assert_eq!(draw.winner(PieceColor::Black), None);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            SessionStatus::Over(GameOverReason::Checkmate {
                winner: PieceColor::White
            })
            .message(),
            "Checkmate, white wins"
        );
        assert_eq!(
            SessionStatus::Over(GameOverReason::Draw(DrawReason::ThreefoldRepetition)).message(),
            "Draw by threefold repetition"
        );
    }
}
