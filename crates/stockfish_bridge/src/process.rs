//! Engine subprocess with line-oriented standard streams

use crate::error::{BridgeError, BridgeResult};
use crate::uci::{self, UciCommand};
use shared::MovePayload;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, trace, warn};

/// Grace period for the engine to exit after `quit` before it is killed
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// Executable (and optional arguments) used to start the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub path: PathBuf,
    pub args: Vec<String>,
}

impl EngineCommand {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl From<PathBuf> for EngineCommand {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for EngineCommand {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

/// A running engine
///
/// The child is killed if this value is dropped without [`close`](Self::close).
pub struct EngineProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Lines<BufReader<ChildStdout>>,
}

impl EngineProcess {
    pub fn spawn(command: &EngineCommand) -> BridgeResult<Self> {
        let mut child = Command::new(&command.path)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BridgeError::Spawn {
                path: command.path.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(BridgeError::EngineExited)?;
        let stdout = child.stdout.take().ok_or(BridgeError::EngineExited)?;
        debug!("[ENGINE] Spawned {:?} (pid {:?})", command.path, child.id());

        Ok(Self {
            child,
            stdin: Some(stdin),
            lines: BufReader::new(stdout).lines(),
        })
    }

    pub async fn send(&mut self, command: &UciCommand) -> BridgeResult<()> {
        let stdin = self.stdin.as_mut().ok_or(BridgeError::EngineExited)?;
        trace!("[ENGINE] >> {}", command);
        stdin.write_all(format!("{command}\n").as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Next line of engine output. Cancel safe.
    pub async fn next_line(&mut self) -> BridgeResult<String> {
        match self.lines.next_line().await? {
            Some(line) => {
                trace!("[ENGINE] << {}", line);
                Ok(line)
            }
            None => Err(BridgeError::EngineExited),
        }
    }

    /// Skip output until a line starting with `prefix`
    pub async fn wait_for(&mut self, prefix: &str) -> BridgeResult<String> {
        loop {
            let line = self.next_line().await?;
            if line.starts_with(prefix) {
                return Ok(line);
            }
        }
    }

    /// Skip output until the `bestmove` line and parse it
    pub async fn read_best_move(&mut self) -> BridgeResult<Option<MovePayload>> {
        loop {
            let line = self.next_line().await?;
            if let Some(result) = uci::parse_best_move(&line) {
                return result;
            }
        }
    }

    /// `uci` / `uciok` followed by `isready` / `readyok`
    pub async fn handshake(&mut self) -> BridgeResult<()> {
        self.send(&UciCommand::Uci).await?;
        self.wait_for("uciok").await?;
        self.send(&UciCommand::IsReady).await?;
        self.wait_for("readyok").await?;
        Ok(())
    }

    /// Interrupt a running search and consume its `bestmove` answer
    pub async fn abort_search(&mut self, grace: Duration) -> BridgeResult<()> {
        self.send(&UciCommand::Stop).await?;
        match tokio::time::timeout(grace, self.read_best_move()).await {
            Ok(Ok(_)) | Ok(Err(BridgeError::MalformedBestMove(_))) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BridgeError::Timeout(grace)),
        }
    }

    /// Ask the engine to quit, close its input and reap it
    pub async fn close(mut self) {
        if let Err(e) = self.send(&UciCommand::Quit).await {
            debug!("[ENGINE] quit not delivered: {}", e);
        }
        drop(self.stdin.take());

        match tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!("[ENGINE] Exited with {}", status),
            Ok(Err(e)) => warn!("[ENGINE] Failed to reap engine: {}", e),
            Err(_) => {
                warn!("[ENGINE] Engine ignored quit, killing it");
                if let Err(e) = self.child.kill().await {
                    warn!("[ENGINE] Kill failed: {}", e);
                }
            }
        }
    }
}
