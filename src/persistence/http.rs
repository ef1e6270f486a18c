//! Collaborators backed by the game API over HTTP
//!
//! | call | request |
//! |---|---|
//! | append | `POST /api/moves/save {gameId, playerId, from, to, promotion?}` |
//! | delete_all | `DELETE /api/moves/delete {gameId}` |
//! | increment | `POST /api/games/win {winnerId, type, botLevel?}` |

use super::{MoveLog, PersistError, PersistResult, ScoreLedger};
use crate::game::{MoveRecord, WinAgainst, WinReport};
use async_trait::async_trait;
use serde_json::{json, Value};
use shared::{PlayerId, SessionId};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HttpCollaborator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCollaborator {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder, endpoint: &str) -> PersistResult<()> {
        let response = request.send().await?;
        let status = response.status();
        debug!("[PERSIST] {} -> {}", endpoint, status);
        if status.is_success() {
            Ok(())
        } else {
            Err(PersistError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            })
        }
    }
}

fn win_body(report: &WinReport) -> Value {
    match report.against {
        WinAgainst::Player => json!({
            "winnerId": report.winner,
            "type": "player",
        }),
        WinAgainst::Computer { level } => json!({
            "winnerId": report.winner,
            "type": "bot",
            "botLevel": level,
        }),
    }
}

#[async_trait]
impl MoveLog for HttpCollaborator {
    async fn append(
        &self,
        game: &SessionId,
        player: &PlayerId,
        record: &MoveRecord,
    ) -> PersistResult<()> {
        let body = json!({
            "gameId": game,
            "playerId": player,
            "from": record.source(),
            "to": record.destination(),
            "promotion": record.promotion(),
        });
        let endpoint = "/api/moves/save";
        self.send(self.client.post(self.url(endpoint)).json(&body), endpoint)
            .await
    }

    async fn delete_all(&self, game: &SessionId) -> PersistResult<()> {
        let endpoint = "/api/moves/delete";
        self.send(
            self.client
                .delete(self.url(endpoint))
                .json(&json!({ "gameId": game })),
            endpoint,
        )
        .await
    }
}

#[async_trait]
impl ScoreLedger for HttpCollaborator {
    async fn increment(&self, report: &WinReport) -> PersistResult<()> {
        let endpoint = "/api/games/win";
        self.send(
            self.client.post(self.url(endpoint)).json(&win_body(report)),
            endpoint,
        )
        .await
    }
}
