//! External collaborators for move logs and scoring
//!
//! Both are called fire-and-forget by the session driver: a failure is
//! logged and never rolls back or blocks the game.

pub mod http;
pub mod memory;

use crate::game::{MoveRecord, WinReport};
use async_trait::async_trait;
use shared::{PlayerId, SessionId};
use thiserror::Error;

pub use http::HttpCollaborator;
pub use memory::InMemoryStore;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} returned {status}")]
    Status { endpoint: String, status: u16 },
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Log of the moves played in a game
#[async_trait]
pub trait MoveLog: Send + Sync {
    async fn append(
        &self,
        game: &SessionId,
        player: &PlayerId,
        record: &MoveRecord,
    ) -> PersistResult<()>;

    async fn delete_all(&self, game: &SessionId) -> PersistResult<()>;
}

/// Points ledger fed by won games
#[async_trait]
pub trait ScoreLedger: Send + Sync {
    async fn increment(&self, report: &WinReport) -> PersistResult<()>;
}
