//! Long-lived engine owned by a worker task
//!
//! The worker is the only code that touches the engine's pipes. Callers
//! hold an [`EngineHandle`] and submit searches over a bounded queue;
//! searches are answered strictly in submission order. Each search can be
//! abandoned with its [`CancellationToken`], in which case the worker sends
//! `stop`, swallows the engine's `bestmove` and moves on to the next job.
//!
//! The worker exits, closing the engine, when every handle has been dropped
//! or when the engine fails in a way that leaves it unusable. After that,
//! every call on a remaining handle returns [`BridgeError::WorkerGone`].

use crate::error::{BridgeError, BridgeResult};
use crate::process::{EngineCommand, EngineProcess};
use crate::uci::{SearchRequest, SearchSettings, UciCommand};
use shared::MovePayload;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Limit on the `uci` / `isready` exchange at startup
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the engine gets to answer `stop`
const STOP_GRACE: Duration = Duration::from_secs(2);

type Reply = oneshot::Sender<BridgeResult<Option<MovePayload>>>;

struct SearchJob {
    request: SearchRequest,
    cancel: CancellationToken,
    reply: Reply,
}

/// Cloneable handle to a pooled engine
#[derive(Clone, Debug)]
pub struct EngineHandle {
    jobs: mpsc::Sender<SearchJob>,
}

impl EngineHandle {
    /// Start the engine, complete the UCI handshake and spawn the worker
    ///
    /// `queue_depth` bounds how many searches may wait behind the running one.
    pub async fn spawn(
        command: &EngineCommand,
        settings: SearchSettings,
        queue_depth: usize,
    ) -> BridgeResult<Self> {
        let mut engine = EngineProcess::spawn(command)?;

        let ready = match tokio::time::timeout(HANDSHAKE_TIMEOUT, engine.handshake()).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Timeout(HANDSHAKE_TIMEOUT)),
        };
        if let Err(e) = ready {
            engine.close().await;
            return Err(e);
        }
        engine.send(&UciCommand::UciNewGame).await?;

        let (jobs, queue) = mpsc::channel(queue_depth.max(1));
        tokio::spawn(run_worker(engine, queue, settings));
        info!(
            "[ENGINE] Worker started for {:?} (depth {})",
            command.path, settings.depth
        );

        Ok(Self { jobs })
    }

    /// Queue a search and wait for its answer
    ///
    /// Cancelling `cancel` before the answer arrives yields
    /// [`BridgeError::Cancelled`] and leaves the engine ready for the next job.
    pub async fn best_move(
        &self,
        request: SearchRequest,
        cancel: CancellationToken,
    ) -> BridgeResult<Option<MovePayload>> {
        request.validate()?;
        let (reply, answer) = oneshot::channel();
        self.jobs
            .send(SearchJob {
                request,
                cancel,
                reply,
            })
            .await
            .map_err(|_| BridgeError::WorkerGone)?;

        answer.await.map_err(|_| BridgeError::WorkerGone)?
    }

    /// Whether the worker is still accepting searches
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.jobs.is_closed()
    }
}

struct Outcome {
    reply: BridgeResult<Option<MovePayload>>,
    engine_usable: bool,
}

async fn run_worker(
    mut engine: EngineProcess,
    mut queue: mpsc::Receiver<SearchJob>,
    settings: SearchSettings,
) {
    while let Some(job) = queue.recv().await {
        if job.cancel.is_cancelled() || job.reply.is_closed() {
            debug!("[ENGINE] Skipping abandoned search");
            let _ = job.reply.send(Err(BridgeError::Cancelled));
            continue;
        }

        let outcome = search(&mut engine, &job.request, &settings, &job.cancel).await;
        let usable = outcome.engine_usable;
        if let Err(e) = &outcome.reply {
            debug!("[ENGINE] Search ended with {}", e);
        }
        // The caller may have stopped waiting; nothing to do then.
        let _ = job.reply.send(outcome.reply);

        if !usable {
            error!("[ENGINE] Engine unusable, stopping worker");
            break;
        }
    }

    queue.close();
    engine.close().await;
    debug!("[ENGINE] Worker stopped");
}

async fn search(
    engine: &mut EngineProcess,
    request: &SearchRequest,
    settings: &SearchSettings,
    cancel: &CancellationToken,
) -> Outcome {
    if let Err(e) = start_search(engine, request, settings.depth).await {
        return Outcome {
            engine_usable: !e.is_fatal(),
            reply: Err(e),
        };
    }

    let deadline = settings.timeout.map(|limit| (Instant::now() + limit, limit));
    let expired = async {
        match deadline {
            Some((at, _)) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };

    let interrupted = tokio::select! {
        result = engine.read_best_move() => {
            return Outcome {
                engine_usable: !matches!(&result, Err(e) if e.is_fatal()),
                reply: result,
            };
        }
        _ = cancel.cancelled() => BridgeError::Cancelled,
        _ = expired => match deadline {
            Some((_, limit)) => BridgeError::Timeout(limit),
            None => BridgeError::Cancelled,
        },
    };

    match engine.abort_search(STOP_GRACE).await {
        Ok(()) => Outcome {
            reply: Err(interrupted),
            engine_usable: true,
        },
        Err(e) => {
            warn!("[ENGINE] Engine did not honour stop: {}", e);
            Outcome {
                reply: Err(interrupted),
                engine_usable: false,
            }
        }
    }
}

async fn start_search(
    engine: &mut EngineProcess,
    request: &SearchRequest,
    depth: u8,
) -> BridgeResult<()> {
    engine.send(&UciCommand::skill(request.skill_level)).await?;
    engine
        .send(&UciCommand::Position {
            fen: request.position.clone(),
        })
        .await?;
    engine.send(&UciCommand::GoDepth(depth)).await
}
