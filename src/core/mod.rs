//! Client configuration and its error type

pub mod config;
pub mod error;

pub use config::{BotArgs, Cli, Command, EngineSource, PersistenceArgs, PlayArgs};
pub use error::{CoreError, CoreResult};
