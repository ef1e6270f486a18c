//! Backend API Integration Tests
//!
//! Exercises the axum router with `Router::oneshot`.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use backend::{api, EngineConfig};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use stockfish_bridge::{EngineCommand, SearchSettings};
use tower::ServiceExt;

const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const FAKE_ENGINE: &str = r#"while IFS= read -r line; do
  case "$line" in
    uci) echo "uciok" ;;
    "position fen 7k/5Q2/6K1/8/8/8/8/8 b"*) mated=1 ;;
    go*) if [ -n "$mated" ]; then echo "bestmove (none)"; else echo "bestmove g1f3"; fi ;;
    quit) exit 0 ;;
  esac
done
"#;

struct ScriptFile(PathBuf);

impl Drop for ScriptFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn fake_engine() -> (ScriptFile, EngineConfig) {
    let path = std::env::temp_dir().join(format!("relay-engine-{}.sh", uuid::Uuid::new_v4()));
    std::fs::write(&path, FAKE_ENGINE).unwrap();
    let config = EngineConfig {
        command: EngineCommand::new("/bin/sh").arg(path.to_string_lossy()),
        settings: SearchSettings {
            depth: 4,
            timeout: Some(Duration::from_secs(5)),
        },
    };
    (ScriptFile(path), config)
}

fn bot_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/bot/move")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn router_without_engine() -> Router {
    api::router(api::AppState::new(None))
}

#[tokio::test]
async fn test_health_reports_counts() {
    let app = router_without_engine();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["rooms"], 0);
    assert_eq!(body["connections"], 0);
    assert_eq!(body["engine"], false);
}

#[tokio::test]
async fn test_bot_move_without_engine_is_unavailable() {
    let app = router_without_engine();

    let response = app
        .oneshot(bot_request(json!({"position": START_FEN, "skillLevel": 3})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["move"], Value::Null);
    assert!(body["error"].as_str().unwrap().contains("no engine"));
}

#[tokio::test]
async fn test_bot_move_returns_engine_move() {
    let (_script, engine) = fake_engine();
    let app = api::router(api::AppState::new(Some(engine)));

    let response = app
        .oneshot(bot_request(json!({"position": START_FEN, "skillLevel": 0})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["move"], json!({"source": "g1", "destination": "f3"}));
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_bot_move_null_when_no_legal_move() {
    //! A mated side gets `move: null` with a success status
    let (_script, engine) = fake_engine();
    let app = api::router(api::AppState::new(Some(engine)));

    let response = app
        .oneshot(bot_request(
            json!({"position": "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", "skillLevel": 20}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"move": null}));
}

#[tokio::test]
async fn test_bot_move_engine_failure_is_bad_gateway() {
    let engine = EngineConfig {
        command: EngineCommand::new("/nonexistent/engine"),
        settings: SearchSettings::default(),
    };
    let app = api::router(api::AppState::new(Some(engine)));

    let response = app
        .oneshot(bot_request(json!({"position": START_FEN, "skillLevel": 5})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["move"], Value::Null);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_bot_move_rejects_malformed_body() {
    let app = router_without_engine();

    let response = app
        .oneshot(bot_request(json!({"fen": START_FEN})))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_bot_move_rejects_command_injection() {
    //! A position carrying extra engine commands is refused with 400
    let (_script, engine) = fake_engine();
    let app = api::router(api::AppState::new(Some(engine)));

    let response = app
        .oneshot(bot_request(json!({
            "position": format!("{START_FEN}\nsetoption name Debug Log File value /tmp/relay-log"),
            "skillLevel": 3
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["move"], Value::Null);
    assert!(body["error"].as_str().unwrap().contains("invalid position"));
}

#[tokio::test]
async fn test_bot_move_rejects_non_fen_position() {
    let app = router_without_engine();

    let response = app
        .oneshot(bot_request(json!({"position": "startpos moves e2e4", "skillLevel": 3})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}
