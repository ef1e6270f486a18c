//! Bridge tests against a scripted UCI engine
//!
//! The engine is a small `/bin/sh` script, so these tests run without
//! Stockfish installed. Its behaviour on `go` is selected by its first
//! argument.

use std::path::PathBuf;
use std::time::Duration;
use stockfish_bridge::{
    search_once, BridgeError, CancellationToken, EngineCommand, EngineHandle, SearchRequest,
    SearchSettings, SkillLevel,
};

const WHITE_TO_MOVE: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const BLACK_TO_MOVE: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

const SCRIPT: &str = r#"mode="$1"
log="$2"
side=w
while IFS= read -r line; do
  if [ -n "$log" ]; then echo "$line" >> "$log"; fi
  case "$line" in
    uci) echo "id name FakeFish"; echo "uciok" ;;
    isready) echo "readyok" ;;
    "position fen "*" b "*) side=b ;;
    "position fen "*) side=w ;;
    go*)
      case "$mode" in
        crash) exit 3 ;;
        none) echo "bestmove (none)" ;;
        stall) if [ "$side" = b ]; then echo "bestmove e7e5"; fi ;;
        *)
          echo "info depth 1 score cp 20"
          if [ "$side" = b ]; then echo "bestmove e7e5"; else echo "bestmove e2e4 ponder e7e5"; fi ;;
      esac ;;
    stop) echo "bestmove a2a3" ;;
    quit) exit 0 ;;
  esac
done
"#;

struct FakeEngine {
    script: PathBuf,
}

impl FakeEngine {
    fn install() -> Self {
        let script = std::env::temp_dir().join(format!("fakefish-{}.sh", uuid::Uuid::new_v4()));
        std::fs::write(&script, SCRIPT).unwrap();
        Self { script }
    }

    fn command(&self, mode: &str) -> EngineCommand {
        EngineCommand::new("/bin/sh")
            .arg(self.script.to_string_lossy())
            .arg(mode)
    }
}

impl FakeEngine {
    /// Like `command`, but every line the engine reads is appended to `log`
    fn logging_command(&self, mode: &str, log: &std::path::Path) -> EngineCommand {
        self.command(mode).arg(log.to_string_lossy())
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.script);
    }
}

fn request(fen: &str) -> SearchRequest {
    SearchRequest::new(fen, SkillLevel::new(5))
}

fn with_timeout(ms: u64) -> SearchSettings {
    SearchSettings {
        depth: 4,
        timeout: Some(Duration::from_millis(ms)),
    }
}

#[tokio::test]
async fn test_search_once_returns_best_move() {
    //! A normal engine answers with the first token after `bestmove`
    let fake = FakeEngine::install();
    let mv = search_once(&fake.command("normal"), &request(WHITE_TO_MOVE), &with_timeout(5_000))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mv.to_uci(), "e2e4");
}

#[tokio::test]
async fn test_search_once_no_move() {
    let fake = FakeEngine::install();
    let mv = search_once(&fake.command("none"), &request(WHITE_TO_MOVE), &with_timeout(5_000))
        .await
        .unwrap();
    assert!(mv.is_none());
}

#[tokio::test]
async fn test_search_once_times_out() {
    //! A silent engine is abandoned after the configured limit
    let fake = FakeEngine::install();
    let result =
        search_once(&fake.command("stall"), &request(WHITE_TO_MOVE), &with_timeout(200)).await;
    assert!(matches!(result, Err(BridgeError::Timeout(_))));
}

#[tokio::test]
async fn test_search_once_engine_crash() {
    let fake = FakeEngine::install();
    let result =
        search_once(&fake.command("crash"), &request(WHITE_TO_MOVE), &with_timeout(5_000)).await;
    assert!(matches!(result, Err(BridgeError::EngineExited)));
}

#[tokio::test]
async fn test_search_once_missing_executable() {
    let command = EngineCommand::new("/nonexistent/stockfish-binary");
    let result = search_once(&command, &request(WHITE_TO_MOVE), &SearchSettings::default()).await;
    assert!(matches!(result, Err(BridgeError::Spawn { .. })));
}

#[tokio::test]
async fn test_worker_answers_in_order() {
    //! Concurrent requests on one handle are served one after another
    let fake = FakeEngine::install();
    let handle = EngineHandle::spawn(&fake.command("normal"), with_timeout(5_000), 4)
        .await
        .unwrap();

    let other = handle.clone();
    let (white, black) = tokio::join!(
        handle.best_move(request(WHITE_TO_MOVE), CancellationToken::new()),
        other.best_move(request(BLACK_TO_MOVE), CancellationToken::new()),
    );
    assert_eq!(white.unwrap().unwrap().to_uci(), "e2e4");
    assert_eq!(black.unwrap().unwrap().to_uci(), "e7e5");
    assert!(handle.is_running());
}

#[tokio::test]
async fn test_worker_cancel_keeps_engine_usable() {
    //! A cancelled search is stopped and the next one still gets answered
    let fake = FakeEngine::install();
    let handle = EngineHandle::spawn(&fake.command("stall"), SearchSettings::default(), 4)
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });
    let stalled = handle.best_move(request(WHITE_TO_MOVE), cancel).await;
    assert!(matches!(stalled, Err(BridgeError::Cancelled)));

    let answered = handle
        .best_move(request(BLACK_TO_MOVE), CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(answered.to_uci(), "e7e5");
}

#[tokio::test]
async fn test_worker_skips_already_cancelled_job() {
    let fake = FakeEngine::install();
    let handle = EngineHandle::spawn(&fake.command("normal"), with_timeout(5_000), 4)
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = handle.best_move(request(WHITE_TO_MOVE), cancel).await;
    assert!(matches!(result, Err(BridgeError::Cancelled)));
}

#[tokio::test]
async fn test_worker_timeout_then_recovers() {
    let fake = FakeEngine::install();
    let handle = EngineHandle::spawn(&fake.command("stall"), with_timeout(200), 4)
        .await
        .unwrap();

    let result = handle
        .best_move(request(WHITE_TO_MOVE), CancellationToken::new())
        .await;
    assert!(matches!(result, Err(BridgeError::Timeout(_))));
    assert!(handle.is_running());

    let answered = handle
        .best_move(request(BLACK_TO_MOVE), CancellationToken::new())
        .await
        .unwrap();
    assert!(answered.is_some());
}

#[tokio::test]
async fn test_worker_gone_after_crash() {
    //! A crashed engine fails the running search and every later one
    let fake = FakeEngine::install();
    let handle = EngineHandle::spawn(&fake.command("crash"), with_timeout(5_000), 4)
        .await
        .unwrap();

    let first = handle
        .best_move(request(WHITE_TO_MOVE), CancellationToken::new())
        .await;
    assert!(matches!(first, Err(e) if e.is_fatal()));

    let second = handle
        .best_move(request(WHITE_TO_MOVE), CancellationToken::new())
        .await;
    assert!(matches!(second, Err(BridgeError::WorkerGone)));
}

#[tokio::test]
async fn test_worker_spawn_fails_without_handshake() {
    let command = EngineCommand::new("/bin/sh").arg("-c").arg("exit 0");
    let result = EngineHandle::spawn(&command, SearchSettings::default(), 1).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_injected_commands_never_reach_the_engine() {
    //! A position smuggling a second line is refused before any process starts
    let fake = FakeEngine::install();
    let log = std::env::temp_dir().join(format!("fakefish-log-{}.txt", uuid::Uuid::new_v4()));
    let injected = format!("{WHITE_TO_MOVE}\nsetoption name Debug Log File value /tmp/elsewhere");

    let result = search_once(
        &fake.logging_command("normal", &log),
        &request(&injected),
        &with_timeout(5_000),
    )
    .await;
    assert!(matches!(result, Err(BridgeError::InvalidPosition { .. })));
    assert!(!log.exists());

    let handle = EngineHandle::spawn(&fake.logging_command("normal", &log), with_timeout(5_000), 2)
        .await
        .unwrap();
    let refused = handle
        .best_move(request(&injected), CancellationToken::new())
        .await;
    assert!(matches!(refused, Err(BridgeError::InvalidPosition { .. })));

    // The worker is unaffected and keeps serving valid requests
    let answered = handle
        .best_move(request(WHITE_TO_MOVE), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(answered.unwrap().to_uci(), "e2e4");

    let seen = std::fs::read_to_string(&log).unwrap();
    assert!(!seen.contains("Debug Log File"));
    let _ = std::fs::remove_file(&log);
}
