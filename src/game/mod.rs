//! Chess game logic
//!
//! Pure, synchronous game state for one side of a game. Nothing here does
//! I/O; the networking driver feeds events in and carries effects out.
//!
//! # Module Organization
//!
//! - `rules` - Rules engine adapter (move legality, terminal states)
//! - `history` - Move records and the positions between them
//! - `captured` - Captured piece tally, derived from history
//! - `status` - Active / over, and why
//! - `rematch` - Two-sided rematch agreement
//! - `session` - The session state machine tying the above together
//! - `ai` - Sources of computer moves
//!
//! # Data Flow
//!
//! ```text
//! user intent ──► GameSession::propose_move ──► RulesEngine::apply
//!                        │
//!                        ▼
//!                 Vec<SessionEffect>  (relay event, bot request, logging, scoring)
//! ```

pub mod ai;
pub mod captured;
pub mod error;
pub mod history;
pub mod rematch;
pub mod rules;
pub mod session;
pub mod status;

pub use captured::CaptureTally;
pub use error::{GameError, GameResult};
pub use history::{MoveRecord, SessionHistory};
pub use rematch::{RematchHandshake, RematchState};
pub use rules::{AppliedMove, Position, RulesEngine, ShakmatyRules, Terminal};
pub use session::{
    BotRequest, BotTicket, ChatLine, Effects, GameSession, Opponent, SessionConfig, SessionEffect,
    WinAgainst, WinReport,
};
pub use status::{DrawReason, GameOverReason, SessionStatus};
