//! Command line and environment configuration
//!
//! Every flag can also be supplied through the environment (and so through
//! a `.env` file loaded at startup).

use crate::core::error::{CoreError, CoreResult};
use crate::game::ai::BotDifficulty;
use clap::{Args, Parser, Subcommand};
use shared::{PieceColor, PlayerId, SessionId};
use std::path::PathBuf;
use std::time::Duration;
use stockfish_bridge::{uci::DEFAULT_DEPTH, EngineCommand, SearchSettings, SkillLevel};

#[derive(Parser, Debug)]
#[command(
    name = "duelchess",
    version,
    about = "Real-time two-player chess over a relay, or solo against a UCI engine"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play another person through the relay
    Play(PlayArgs),
    /// Play the computer
    Bot(BotArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PlayArgs {
    /// WebSocket endpoint of the relay
    #[arg(long, env = "RELAY_URL", default_value = "ws://127.0.0.1:3001/ws")]
    pub relay_url: String,

    /// Room shared with the opponent
    #[arg(long, env = "SESSION_ID")]
    pub session: String,

    /// Defaults to a random identifier
    #[arg(long, env = "PLAYER_ID")]
    pub player: Option<String>,

    #[arg(long, default_value = "white")]
    pub color: PieceColor,

    /// Seconds of opponent silence on their turn before they forfeit, 0 to wait forever
    #[arg(long, env = "IDLE_TIMEOUT_SECS", default_value_t = 300)]
    pub idle_timeout_secs: u64,

    #[command(flatten)]
    pub persistence: PersistenceArgs,
}

impl PlayArgs {
    pub fn session_id(&self) -> CoreResult<SessionId> {
        let id = self.session.trim();
        if id.is_empty() {
            return Err(CoreError::InvalidSetting {
                name: "session",
                value: self.session.clone(),
            });
        }
        Ok(SessionId::from(id))
    }

    pub fn player_id(&self) -> PlayerId {
        player_or_random(self.player.as_deref())
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

#[derive(Args, Debug, Clone)]
pub struct BotArgs {
    #[arg(long, env = "PLAYER_ID")]
    pub player: Option<String>,

    /// Colour played by the human
    #[arg(long, default_value = "white")]
    pub color: PieceColor,

    #[arg(long, value_enum, default_value_t = BotDifficulty::Medium)]
    pub difficulty: BotDifficulty,

    /// Explicit engine skill level (0-20); overrides `--difficulty`
    #[arg(long)]
    pub skill: Option<i64>,

    /// Local engine executable
    #[arg(long, env = "STOCKFISH_PATH")]
    pub stockfish_path: Option<PathBuf>,

    /// Ask the relay's `/bot/move` endpoint instead of a local engine
    #[arg(long, env = "BOT_SERVICE_URL")]
    pub bot_service_url: Option<String>,

    /// Start a fresh engine for every move instead of keeping one running
    #[arg(long)]
    pub one_shot: bool,

    #[arg(long, env = "ENGINE_DEPTH", default_value_t = DEFAULT_DEPTH)]
    pub engine_depth: u8,

    /// Per-search limit in milliseconds, 0 for none
    #[arg(long, env = "ENGINE_TIMEOUT_MS", default_value_t = 30_000)]
    pub engine_timeout_ms: u64,

    #[command(flatten)]
    pub persistence: PersistenceArgs,
}

/// Where bot moves come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineSource {
    /// One long-lived engine for the whole game
    Pooled(EngineCommand),
    /// A new engine process per move
    OneShot(EngineCommand),
    /// The relay's HTTP endpoint
    Service(String),
}

impl BotArgs {
    pub fn player_id(&self) -> PlayerId {
        player_or_random(self.player.as_deref())
    }

    pub fn skill(&self) -> SkillLevel {
        self.skill
            .map(SkillLevel::new)
            .unwrap_or_else(|| self.difficulty.skill())
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            depth: self.engine_depth,
            timeout: (self.engine_timeout_ms > 0)
                .then(|| Duration::from_millis(self.engine_timeout_ms)),
        }
    }

    /// A local engine wins over the HTTP service when both are configured
    pub fn engine_source(&self) -> CoreResult<EngineSource> {
        match (&self.stockfish_path, &self.bot_service_url) {
            (Some(path), _) if self.one_shot => {
                Ok(EngineSource::OneShot(EngineCommand::new(path)))
            }
            (Some(path), _) => Ok(EngineSource::Pooled(EngineCommand::new(path))),
            (None, Some(url)) => Ok(EngineSource::Service(url.clone())),
            (None, None) => Err(CoreError::Config {
                message: "set STOCKFISH_PATH or BOT_SERVICE_URL to play the computer".to_string(),
            }),
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct PersistenceArgs {
    /// Move log and score service; kept in memory when unset
    #[arg(long, env = "API_BASE_URL")]
    pub api_base_url: Option<String>,
}

fn player_or_random(player: Option<&str>) -> PlayerId {
    match player.map(str::trim).filter(|p| !p.is_empty()) {
        Some(id) => PlayerId::from(id),
        None => PlayerId::new(uuid::Uuid::new_v4().simple().to_string()),
    }
}
