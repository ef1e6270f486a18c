//! Sources of computer moves

use async_trait::async_trait;
use shared::MovePayload;
use stockfish_bridge::{
    search_once, BotMoveResponse, BridgeError, CancellationToken, EngineCommand, EngineHandle,
    SearchRequest, SearchSettings,
};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum BotError {
    #[error(transparent)]
    Engine(BridgeError),

    #[error("Bot service unreachable: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an error status
    #[error("Bot service returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("Bot request cancelled")]
    Cancelled,
}

impl From<BridgeError> for BotError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Cancelled => BotError::Cancelled,
            other => BotError::Engine(other),
        }
    }
}

/// Anything that can answer "what would the computer play here?"
///
/// `Ok(None)` means the position has no legal move.
#[async_trait]
pub trait BotMoveProvider: Send + Sync {
    async fn request_move(
        &self,
        request: SearchRequest,
        cancel: CancellationToken,
    ) -> Result<Option<MovePayload>, BotError>;
}

#[async_trait]
impl BotMoveProvider for EngineHandle {
    async fn request_move(
        &self,
        request: SearchRequest,
        cancel: CancellationToken,
    ) -> Result<Option<MovePayload>, BotError> {
        Ok(self.best_move(request, cancel).await?)
    }
}

/// Starts a new engine for every request
#[derive(Debug, Clone)]
pub struct OneShotEngine {
    command: EngineCommand,
    settings: SearchSettings,
}

impl OneShotEngine {
    pub fn new(command: EngineCommand, settings: SearchSettings) -> Self {
        Self { command, settings }
    }
}

#[async_trait]
impl BotMoveProvider for OneShotEngine {
    async fn request_move(
        &self,
        request: SearchRequest,
        cancel: CancellationToken,
    ) -> Result<Option<MovePayload>, BotError> {
        // Dropping the search kills the engine
        tokio::select! {
            result = search_once(&self.command, &request, &self.settings) => Ok(result?),
            _ = cancel.cancelled() => Err(BotError::Cancelled),
        }
    }
}

/// Client for the relay's `POST /bot/move`
#[derive(Debug, Clone)]
pub struct HttpBotClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBotClient {
    /// `base_url` is the relay's HTTP root, e.g. `http://127.0.0.1:3001`
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/bot/move", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, request: &SearchRequest) -> Result<Option<MovePayload>, BotError> {
        let response = self.client.post(&self.endpoint).json(request).send().await?;
        let status = response.status();
        let body: BotMoveResponse = response.json().await?;
        debug!("[ENGINE] {} answered {}: {:?}", self.endpoint, status, body);

        match body.error {
            Some(message) => Err(BotError::Service {
                status: status.as_u16(),
                message,
            }),
            None if !status.is_success() => Err(BotError::Service {
                status: status.as_u16(),
                message: "no error message".to_string(),
            }),
            None => Ok(body.best_move),
        }
    }
}

#[async_trait]
impl BotMoveProvider for HttpBotClient {
    async fn request_move(
        &self,
        request: SearchRequest,
        cancel: CancellationToken,
    ) -> Result<Option<MovePayload>, BotError> {
        tokio::select! {
            result = self.post(&request) => result,
            _ = cancel.cancelled() => Err(BotError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use stockfish_bridge::SkillLevel;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn request() -> SearchRequest {
        SearchRequest::new(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            SkillLevel::new(3),
        )
    }

    #[test]
    fn test_endpoint_joins_path() {
        let client = HttpBotClient::new("http://localhost:3001/");
        assert_eq!(client.endpoint(), "http://localhost:3001/bot/move");
    }

    #[tokio::test]
    async fn test_http_move_returned() {
        let router = Router::new().route(
            "/bot/move",
            post(|Json(req): Json<SearchRequest>| async move {
                assert_eq!(req.skill_level.get(), 3);
                Json(BotMoveResponse::found(MovePayload::from_uci("e2e4").ok()))
            }),
        );
        let base = serve(router).await;

        let best = HttpBotClient::new(&base)
            .request_move(request(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(best, Some(MovePayload::from_uci("e2e4").unwrap()));
    }

    #[tokio::test]
    async fn test_http_service_error() {
        let router = Router::new().route(
            "/bot/move",
            post(|| async {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(BotMoveResponse::failed("no engine configured")),
                )
            }),
        );
        let base = serve(router).await;

        let err = HttpBotClient::new(&base)
            .request_move(request(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(
            matches!(err, BotError::Service { status: 503, ref message } if message == "no engine configured"),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_answer() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        // Nothing listens on port 9; cancellation wins either way
        let err = HttpBotClient::new("http://127.0.0.1:9")
            .request_move(request(), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Cancelled | BotError::Http(_)));
    }

    #[test]
    fn test_bridge_cancel_maps_to_cancelled() {
        assert!(matches!(
            BotError::from(BridgeError::Cancelled),
            BotError::Cancelled
        ));
        assert!(matches!(
            BotError::from(BridgeError::WorkerGone),
            BotError::Engine(BridgeError::WorkerGone)
        ));
    }
}
