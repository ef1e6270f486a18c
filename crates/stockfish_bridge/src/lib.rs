//! Bridge to an external UCI search engine (Stockfish or compatible)
//!
//! Two ways of asking the engine for a move are provided:
//!
//! - [`search_once`]: spawn an engine, run a single search, shut it down.
//!   One subprocess per request, no state kept between requests.
//! - [`EngineHandle`]: a long-lived engine process owned by a worker task.
//!   Requests are queued and answered in order, each with its own
//!   timeout and cancellation token. Use one handle per bot game.
//!
//! Both speak the same line protocol:
//!
//! ```text
//! > uci
//! > setoption name Skill Level value 5
//! > position fen <fen>
//! > go depth 15
//! < bestmove e2e4 ponder e7e5
//! ```

pub mod error;
pub mod oneshot;
pub mod process;
pub mod uci;
pub mod worker;

pub use error::{BridgeError, BridgeResult};
pub use oneshot::search_once;
pub use process::{EngineCommand, EngineProcess};
pub use uci::{BotMoveResponse, SearchRequest, SearchSettings, SkillLevel, UciCommand};
pub use worker::EngineHandle;

pub use tokio_util::sync::CancellationToken;
