//! Engine bridge seen from the game side
//!
//! A scripted `/bin/sh` engine stands in for Stockfish. The real engine is
//! only exercised when `STOCKFISH_PATH` points at one.

use duelchess::game::ai::{BotError, BotMoveProvider, OneShotEngine};
use duelchess::game::{GameSession, Opponent, RulesEngine, SessionConfig, ShakmatyRules};
use duelchess::networking::{SessionDriver, UserCommand};
use duelchess::persistence::InMemoryStore;
use shared::{MovePayload, PieceColor, PlayerId, SessionId};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use stockfish_bridge::{
    CancellationToken, EngineCommand, EngineHandle, SearchRequest, SearchSettings, SkillLevel,
};

const SCRIPT: &str = r#"side=w
while IFS= read -r line; do
  case "$line" in
    uci) echo "id name ScriptFish"; echo "uciok" ;;
    isready) echo "readyok" ;;
    "position fen "*" b "*) side=b ;;
    "position fen "*) side=w ;;
    go*) if [ "$side" = b ]; then echo "bestmove e7e5"; else echo "bestmove e2e4"; fi ;;
    stop) echo "bestmove a2a3" ;;
    quit) exit 0 ;;
  esac
done
"#;

struct ScriptEngine {
    script: PathBuf,
}

impl ScriptEngine {
    fn install() -> Self {
        let script =
            std::env::temp_dir().join(format!("scriptfish-{}.sh", uuid::Uuid::new_v4()));
        std::fs::write(&script, SCRIPT).unwrap();
        Self { script }
    }

    fn command(&self) -> EngineCommand {
        EngineCommand::new("/bin/sh").arg(self.script.to_string_lossy())
    }
}

impl Drop for ScriptEngine {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.script);
    }
}

fn settings() -> SearchSettings {
    SearchSettings {
        depth: 2,
        timeout: Some(Duration::from_secs(5)),
    }
}

#[tokio::test]
async fn test_engine_move_is_legal_from_initial_position() {
    //! Skill 0 from the start position yields a member of the legal move set
    let engine = ScriptEngine::install();
    let rules = ShakmatyRules::new();
    let start = rules.initial_position();

    let provider = OneShotEngine::new(engine.command(), settings());
    let best = provider
        .request_move(
            SearchRequest::new(start.fen(), SkillLevel::new(0)),
            CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();

    assert!(rules.legal_moves(&start).unwrap().contains(&best));
}

#[tokio::test]
async fn test_pooled_engine_as_provider() {
    let engine = ScriptEngine::install();
    let handle = EngineHandle::spawn(&engine.command(), settings(), 2)
        .await
        .unwrap();
    let rules = ShakmatyRules::new();
    let after_e4 = rules
        .apply(
            &rules.initial_position(),
            &MovePayload::from_uci("e2e4").unwrap(),
        )
        .unwrap()
        .position;

    let provider: Arc<dyn BotMoveProvider> = Arc::new(handle);
    let best = provider
        .request_move(
            SearchRequest::new(after_e4.fen(), SkillLevel::new(5)),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(best, Some(MovePayload::from_uci("e7e5").unwrap()));
}

#[tokio::test]
async fn test_missing_engine_is_an_error() {
    let provider = OneShotEngine::new(
        EngineCommand::new("/nonexistent/duelchess-engine"),
        settings(),
    );
    let err = provider
        .request_move(
            SearchRequest::new(ShakmatyRules::new().initial_position().fen(), SkillLevel::MIN),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::Engine(_)));
}

#[tokio::test]
async fn test_bot_game_with_scripted_engine() {
    //! A full driver round trip: human move, engine reply, legal result
    let engine = ScriptEngine::install();
    let store = Arc::new(InMemoryStore::new());
    let config = SessionConfig::new(
        SessionId::from("scripted"),
        PlayerId::from("walter"),
        PieceColor::White,
        Opponent::Computer {
            skill: SkillLevel::new(4),
        },
    );
    let mut handle = SessionDriver::new(GameSession::standard(config), store.clone(), store)
        .with_bot(Arc::new(OneShotEngine::new(engine.command(), settings())))
        .spawn();

    handle.send(UserCommand::Move(MovePayload::from_uci("e2e4").unwrap()));
    let seen = handle
        .wait_for(Duration::from_secs(10), |s| s.ply == 2)
        .await
        .expect("engine reply");
    assert_eq!(
        seen.last_move.as_ref().unwrap().payload,
        MovePayload::from_uci("e7e5").unwrap()
    );
    assert!(seen.is_my_turn());
}

#[tokio::test]
async fn test_real_stockfish_when_available() {
    let Ok(path) = std::env::var("STOCKFISH_PATH") else {
        return;
    };
    let rules = ShakmatyRules::new();
    let start = rules.initial_position();
    let provider = OneShotEngine::new(
        EngineCommand::new(path),
        SearchSettings {
            depth: 8,
            timeout: Some(Duration::from_secs(30)),
        },
    );

    let best = provider
        .request_move(
            SearchRequest::new(start.fen(), SkillLevel::MIN),
            CancellationToken::new(),
        )
        .await
        .unwrap()
        .expect("a move from the start position");
    assert!(rules.legal_moves(&start).unwrap().contains(&best));
}
