//! Error types for the engine bridge

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the engine subprocess
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The executable could not be started
    #[error("failed to spawn engine {path:?}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading from or writing to the engine failed
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine closed its output before answering
    #[error("engine exited before answering")]
    EngineExited,

    #[error("engine did not answer within {0:?}")]
    Timeout(Duration),

    #[error("search cancelled")]
    Cancelled,

    /// A `bestmove` line whose move could not be parsed
    #[error("malformed bestmove line: {0:?}")]
    MalformedBestMove(String),

    /// The requested position is not a six-field FEN
    #[error("invalid position {position:?}: {reason}")]
    InvalidPosition {
        position: String,
        reason: &'static str,
    },

    /// The pooled worker task is gone (engine crashed or handle shut down)
    #[error("engine worker is no longer running")]
    WorkerGone,
}

impl BridgeError {
    /// Whether the engine process can still be used after this error
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::Io(_) | BridgeError::EngineExited | BridgeError::Spawn { .. }
        )
    }
}

/// Result type alias for engine bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
