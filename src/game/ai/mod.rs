//! Computer opponent
//!
//! The session decides *when* the computer moves (it emits a bot request
//! on the computer's turn); this module decides *how* a move is obtained:
//!
//! - [`EngineHandle`](stockfish_bridge::EngineHandle): one pooled engine
//!   process kept alive for the whole game
//! - [`OneShotEngine`]: a fresh engine process per move
//! - [`HttpBotClient`]: the relay's `/bot/move` endpoint
//!
//! All three implement [`BotMoveProvider`], so the session driver does not
//! care which one it was given.

pub mod provider;
pub mod resource;

pub use provider::{BotError, BotMoveProvider, HttpBotClient, OneShotEngine};
pub use resource::BotDifficulty;
