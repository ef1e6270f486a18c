//! duelchess: real-time two-player chess over a relay, or solo against a UCI engine
//!
//! - [`game`]: the per-client session state machine and its parts
//! - [`networking`]: relay client and the async driver around a session
//! - [`persistence`]: move-log and score collaborators
//! - [`core`]: command line configuration
//! - [`console`]: terminal input parsing and board rendering
//!
//! The relay itself lives in the `backend` crate, the engine bridge in
//! `stockfish_bridge` and the wire types in `shared`.

pub mod console;
pub mod core;
pub mod game;
pub mod networking;
pub mod persistence;

pub use game::{GameError, GameResult, GameSession, Opponent, SessionConfig, SessionEffect};
pub use networking::{RelayClient, SessionDriver, SessionSnapshot, UserCommand};
