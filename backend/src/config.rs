//! Relay process configuration (flags or environment)

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use stockfish_bridge::{uci::DEFAULT_DEPTH, EngineCommand, SearchSettings};

#[derive(Parser, Debug, Clone)]
#[command(name = "backend", about = "Game relay and bot-move service")]
pub struct RelayConfig {
    /// Address the HTTP/WebSocket server listens on
    #[arg(long, env = "RELAY_ADDR", default_value = "0.0.0.0:3001")]
    pub addr: SocketAddr,

    /// Search engine executable; `/bot/move` is disabled without it
    #[arg(long, env = "STOCKFISH_PATH")]
    pub stockfish_path: Option<PathBuf>,

    #[arg(long, env = "ENGINE_DEPTH", default_value_t = DEFAULT_DEPTH)]
    pub engine_depth: u8,

    /// Per-search limit in milliseconds, 0 for none
    #[arg(long, env = "ENGINE_TIMEOUT_MS", default_value_t = 30_000)]
    pub engine_timeout_ms: u64,
}

impl RelayConfig {
    pub fn engine(&self) -> Option<EngineConfig> {
        let path = self.stockfish_path.as_ref()?;
        Some(EngineConfig {
            command: EngineCommand::new(path),
            settings: SearchSettings {
                depth: self.engine_depth,
                timeout: (self.engine_timeout_ms > 0)
                    .then(|| Duration::from_millis(self.engine_timeout_ms)),
            },
        })
    }
}

/// How `/bot/move` runs its searches
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub command: EngineCommand,
    pub settings: SearchSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::parse_from(["backend"]);
        assert_eq!(config.addr.port(), 3001);
        assert_eq!(config.engine_depth, 15);
    }

    #[test]
    fn test_engine_settings_from_flags() {
        let config = RelayConfig::parse_from([
            "backend",
            "--stockfish-path",
            "/usr/games/stockfish",
            "--engine-depth",
            "8",
            "--engine-timeout-ms",
            "0",
        ]);
        let engine = config.engine().unwrap();
        assert_eq!(engine.command.path, PathBuf::from("/usr/games/stockfish"));
        assert_eq!(engine.settings.depth, 8);
        assert_eq!(engine.settings.timeout, None);
    }
}
