//! Session driver: the async shell around a [`GameSession`]
//!
//! One task per session owns the session and waits on four sources at
//! once: user commands, relay frames, bot replies and the opponent idle
//! timer. Each wake-up is handled to completion before the next, so the
//! session itself needs no locking. After every step a fresh
//! [`SessionSnapshot`] is published on a `watch` channel.
//!
//! Effects are carried out here:
//!
//! - relay events go to the relay connection's outbox
//! - bot requests run on their own task with a cancellation token
//! - move-log and score calls are queued to a persistence task and never
//!   block play; their failures are only logged

use crate::game::ai::{BotError, BotMoveProvider};
use crate::game::{
    BotRequest, BotTicket, CaptureTally, ChatLine, Effects, GameSession, MoveRecord, Position,
    RematchState, SessionEffect, SessionStatus, WinReport,
};
use crate::networking::client::{RelayClient, RelaySender};
use crate::persistence::{MoveLog, ScoreLedger};
use serde::Serialize;
use shared::{MovePayload, PieceColor, PlayerId, RelayFrame, SessionId};
use std::future;
use std::sync::Arc;
use std::time::Duration;
use stockfish_bridge::{CancellationToken, SearchRequest};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// What the user can ask the driver to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Move(MovePayload),
    Undo,
    Resign,
    RequestRematch,
    AcceptRematch,
    Chat(String),
    /// Ask the computer again after a failed request
    RetryBot,
    Shutdown,
}

/// Read-only view of a session, published after every change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub local_color: PieceColor,
    pub position: Position,
    pub turn: PieceColor,
    pub ply: usize,
    pub status: SessionStatus,
    pub captures: CaptureTally,
    pub last_move: Option<MoveRecord>,
    pub rematch: RematchState,
    pub chat: Vec<ChatLine>,
    /// Why the last command or event was rejected, if it was
    pub last_error: Option<String>,
    pub bot_thinking: bool,
    /// Whether the relay connection is still up (always false in computer games)
    pub connected: bool,
}

impl SessionSnapshot {
    fn capture(session: &GameSession, last_error: Option<String>, connected: bool) -> Self {
        Self {
            session_id: session.config().session_id.clone(),
            local_color: session.config().local_color,
            position: session.position().clone(),
            turn: session.turn(),
            ply: session.ply(),
            status: session.status(),
            captures: session.captures().clone(),
            last_move: session.history().last_move().cloned(),
            rematch: session.rematch_state(),
            chat: session.chat().to_vec(),
            last_error,
            bot_thinking: session.pending_bot().is_some(),
            connected,
        }
    }

    pub fn is_my_turn(&self) -> bool {
        !self.status.is_over() && self.turn == self.local_color
    }
}

pub struct SessionDriver {
    session: GameSession,
    relay: Option<RelayClient>,
    bot: Option<Arc<dyn BotMoveProvider>>,
    moves: Arc<dyn MoveLog>,
    scores: Arc<dyn ScoreLedger>,
    idle_timeout: Option<Duration>,
}

impl SessionDriver {
    pub fn new(
        session: GameSession,
        moves: Arc<dyn MoveLog>,
        scores: Arc<dyn ScoreLedger>,
    ) -> Self {
        Self {
            session,
            relay: None,
            bot: None,
            moves,
            scores,
            idle_timeout: None,
        }
    }

    /// Connection (already joined) used for human games
    pub fn with_relay(mut self, client: RelayClient) -> Self {
        self.relay = Some(client);
        self
    }

    pub fn with_bot(mut self, provider: Arc<dyn BotMoveProvider>) -> Self {
        self.bot = Some(provider);
        self
    }

    /// Opponent silence on their turn after which they forfeit; `None` waits forever
    pub fn idle_timeout(mut self, limit: Option<Duration>) -> Self {
        self.idle_timeout = limit;
        self
    }

    pub fn spawn(self) -> DriverHandle {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let connected = self.relay.is_some();
        let (snapshots, snapshot_rx) = watch::channel(SessionSnapshot::capture(
            &self.session,
            None,
            connected,
        ));

        let (persist, persist_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_persistence(persist_rx, self.moves, self.scores));

        let (relay, frames) = match self.relay {
            Some(client) => {
                let (sender, frames) = client.split();
                (Some(sender), Some(frames))
            }
            None => (None, None),
        };
        let (bot_tx, bot_rx) = mpsc::unbounded_channel();

        let runner = Runner {
            player: self.session.config().player_id.clone(),
            session: self.session,
            relay,
            bot: self.bot,
            bot_tx,
            bot_cancel: None,
            persist,
            last_error: None,
            snapshots,
        };
        let task = tokio::spawn(runner.run(command_rx, frames, bot_rx, self.idle_timeout));

        DriverHandle {
            commands,
            snapshots: snapshot_rx,
            task,
        }
    }
}

/// Control side of a running driver
pub struct DriverHandle {
    commands: mpsc::UnboundedSender<UserCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<GameSession>,
}

impl DriverHandle {
    /// Queue a command; `false` if the driver has stopped
    pub fn send(&self, command: UserCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`
    ///
    /// Returns `None` on timeout or if the driver stopped first.
    pub async fn wait_for(
        &mut self,
        limit: Duration,
        mut predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Option<SessionSnapshot> {
        let waited = tokio::time::timeout(limit, self.snapshots.wait_for(|s| predicate(s))).await;
        match waited {
            Ok(Ok(snapshot)) => Some(snapshot.clone()),
            _ => None,
        }
    }

    /// Stop the driver and hand back the session
    pub async fn shutdown(self) -> Option<GameSession> {
        let _ = self.commands.send(UserCommand::Shutdown);
        self.task.await.ok()
    }
}

type BotReply = (BotTicket, Result<Option<MovePayload>, BotError>);

enum Step {
    Command(Option<UserCommand>),
    Frame(Option<RelayFrame>),
    Bot(BotReply),
    OpponentIdle,
}

struct Runner {
    session: GameSession,
    player: PlayerId,
    relay: Option<RelaySender>,
    bot: Option<Arc<dyn BotMoveProvider>>,
    bot_tx: mpsc::UnboundedSender<BotReply>,
    bot_cancel: Option<CancellationToken>,
    persist: mpsc::UnboundedSender<PersistJob>,
    last_error: Option<String>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl Runner {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<UserCommand>,
        mut frames: Option<mpsc::UnboundedReceiver<RelayFrame>>,
        mut bot_rx: mpsc::UnboundedReceiver<BotReply>,
        idle_timeout: Option<Duration>,
    ) -> GameSession {
        info!(
            "[SESSION] Driver started for {} as {}",
            self.session.config().session_id,
            self.session.config().local_color
        );
        let effects = self.session.start();
        self.execute(effects);
        self.publish(frames.is_some());

        let mut idle_deadline: Option<Instant> = None;
        loop {
            idle_deadline = match (idle_timeout, self.session.waiting_on_opponent()) {
                (Some(limit), true) => Some(idle_deadline.unwrap_or_else(|| Instant::now() + limit)),
                _ => None,
            };

            let step = tokio::select! {
                command = commands.recv() => Step::Command(command),
                frame = next_frame(&mut frames) => Step::Frame(frame),
                Some(reply) = bot_rx.recv() => Step::Bot(reply),
                _ = sleep_until(idle_deadline) => Step::OpponentIdle,
            };

            match step {
                Step::Command(None) | Step::Command(Some(UserCommand::Shutdown)) => break,
                Step::Command(Some(command)) => self.handle_command(command),
                Step::Frame(Some(frame)) => {
                    idle_deadline = None;
                    self.handle_frame(frame);
                }
                Step::Frame(None) => {
                    warn!("[NETWORK] Relay connection lost");
                    frames = None;
                    self.relay = None;
                    self.last_error = Some("relay connection lost".to_string());
                }
                Step::Bot((ticket, result)) => self.handle_bot_reply(ticket, result),
                Step::OpponentIdle => {
                    idle_deadline = None;
                    let effects = self.session.opponent_timed_out();
                    self.execute(effects);
                }
            }
            self.publish(frames.is_some());
        }

        if let Some(token) = self.bot_cancel.take() {
            token.cancel();
        }
        info!("[SESSION] Driver for {} stopped", self.session.config().session_id);
        self.session
    }

    fn handle_command(&mut self, command: UserCommand) {
        let result = match command {
            UserCommand::Move(mv) => self.session.propose_move(mv),
            UserCommand::Undo => self.session.undo(),
            UserCommand::Resign => self.session.request_quit(),
            UserCommand::RequestRematch => self.session.request_rematch(),
            UserCommand::AcceptRematch => self.session.confirm_rematch(),
            UserCommand::Chat(text) => Ok(self.session.send_chat(&text)),
            UserCommand::RetryBot => Ok(self.session.retry_bot()),
            UserCommand::Shutdown => Ok(Vec::new()),
        };
        match result {
            Ok(effects) => {
                self.last_error = None;
                self.execute(effects);
            }
            Err(e) => {
                debug!("[SESSION] Command rejected: {}", e);
                self.last_error = Some(e.to_string());
            }
        }
    }

    fn handle_frame(&mut self, frame: RelayFrame) {
        match frame {
            RelayFrame::Event { session_id, event } => {
                if session_id != self.session.config().session_id {
                    debug!("[NETWORK] Ignoring event for room {}", session_id);
                    return;
                }
                let name = event.name();
                match self.session.apply_remote_event(event) {
                    Ok(effects) => self.execute(effects),
                    Err(e) => {
                        warn!("[SESSION] Rejected remote {}: {}", name, e);
                        self.last_error = Some(e.to_string());
                    }
                }
            }
            RelayFrame::Error { message } => {
                warn!("[NETWORK] Relay error: {}", message);
                self.last_error = Some(message);
            }
            RelayFrame::Joined { members, .. } => {
                debug!("[NETWORK] Room now has {} member(s)", members);
            }
            RelayFrame::Join { .. } => {}
        }
    }

    fn handle_bot_reply(&mut self, ticket: BotTicket, result: Result<Option<MovePayload>, BotError>) {
        match result {
            Ok(mv) => match self.session.receive_bot_move(ticket, mv) {
                Ok(effects) => {
                    self.last_error = None;
                    self.execute(effects);
                }
                Err(e) => {
                    error!("[ENGINE] {}", e);
                    self.last_error = Some(format!("{e}; retry to ask again"));
                }
            },
            Err(BotError::Cancelled) => {
                self.session.bot_failed(ticket);
                debug!("[ENGINE] Request {:?} cancelled", ticket);
            }
            Err(e) => {
                if self.session.bot_failed(ticket) {
                    error!("[ENGINE] Bot move failed: {}", e);
                    self.last_error = Some(format!("Computer opponent failed: {e}; retry to ask again"));
                }
            }
        }
    }

    fn execute(&mut self, effects: Effects) {
        for effect in effects {
            match effect {
                SessionEffect::Relay(event) => match &self.relay {
                    Some(relay) => {
                        if let Err(e) = relay.send(event) {
                            warn!("[NETWORK] {}", e);
                            self.last_error = Some(e.to_string());
                        }
                    }
                    None => debug!("[NETWORK] Not connected, dropping {}", event.name()),
                },
                SessionEffect::RequestBotMove(request) => self.request_bot_move(request),
                SessionEffect::CancelBotMove => {
                    if let Some(token) = self.bot_cancel.take() {
                        token.cancel();
                    }
                }
                SessionEffect::AppendMoveLog(record) => self.persist(PersistJob::Append {
                    game: self.session.config().session_id.clone(),
                    player: self.player.clone(),
                    record,
                }),
                SessionEffect::ClearMoveLog => self.persist(PersistJob::Clear {
                    game: self.session.config().session_id.clone(),
                }),
                SessionEffect::ReportWin(report) => {
                    info!("[SESSION] {} wins {} point(s)", report.winner, report.points());
                    self.persist(PersistJob::Win(report));
                }
            }
        }
    }

    fn request_bot_move(&mut self, request: BotRequest) {
        let Some(provider) = self.bot.clone() else {
            self.session.bot_failed(request.ticket);
            self.last_error = Some("no computer opponent configured".to_string());
            return;
        };
        if let Some(previous) = self.bot_cancel.take() {
            previous.cancel();
        }

        let cancel = CancellationToken::new();
        self.bot_cancel = Some(cancel.clone());
        let replies = self.bot_tx.clone();
        let search = SearchRequest::new(request.position.fen(), request.skill);
        debug!("[ENGINE] Requesting a move for ply {}", request.ticket.ply);

        tokio::spawn(async move {
            let result = provider.request_move(search, cancel).await;
            let _ = replies.send((request.ticket, result));
        });
    }

    fn persist(&self, job: PersistJob) {
        if self.persist.send(job).is_err() {
            warn!("[PERSIST] Persistence task is gone");
        }
    }

    fn publish(&self, connected: bool) {
        self.snapshots.send_replace(SessionSnapshot::capture(
            &self.session,
            self.last_error.clone(),
            connected,
        ));
    }
}

async fn next_frame(frames: &mut Option<mpsc::UnboundedReceiver<RelayFrame>>) -> Option<RelayFrame> {
    match frames {
        Some(frames) => frames.recv().await,
        None => future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

enum PersistJob {
    Append {
        game: SessionId,
        player: PlayerId,
        record: MoveRecord,
    },
    Clear {
        game: SessionId,
    },
    Win(WinReport),
}

/// Runs collaborator calls one at a time, in the order the session produced them
async fn run_persistence(
    mut jobs: mpsc::UnboundedReceiver<PersistJob>,
    moves: Arc<dyn MoveLog>,
    scores: Arc<dyn ScoreLedger>,
) {
    while let Some(job) = jobs.recv().await {
        let (what, result) = match &job {
            PersistJob::Append {
                game,
                player,
                record,
            } => ("move log append", moves.append(game, player, record).await),
            PersistJob::Clear { game } => ("move log clear", moves.delete_all(game).await),
            PersistJob::Win(report) => ("score increment", scores.increment(report).await),
        };
        if let Err(e) = result {
            warn!("[PERSIST] {} failed: {}", what, e);
        }
    }
}
