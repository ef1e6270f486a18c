//! Per-client game session state machine
//!
//! A [`GameSession`] owns one side's view of a game: the history, the
//! capture tally, the lifecycle status and the rematch handshake. It never
//! performs I/O. Every operation returns a list of [`SessionEffect`]s that
//! the caller (normally the session driver) carries out: relaying an event
//! to the peer, asking the computer opponent for a move, logging a move or
//! reporting a win.
//!
//! # Trust boundary
//!
//! Moves from the peer are replayed through this session's own rules
//! engine against this session's own position. Undo from the peer carries
//! only a ply count; the position is recomputed from local history and the
//! peer's expected ply is checked against it.
//!
//! # Computer opponent
//!
//! Bot requests carry a [`BotTicket`]. Any reply whose ticket does not match
//! the outstanding request (because of an undo, quit or rematch in the
//! meantime) is discarded.

use crate::game::captured::CaptureTally;
use crate::game::error::{GameError, GameResult};
use crate::game::history::{MoveRecord, SessionHistory};
use crate::game::rematch::{RematchHandshake, RematchState};
use crate::game::rules::{Position, RulesEngine, ShakmatyRules, Terminal};
use crate::game::status::{GameOverReason, SessionStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{GameEvent, MovePayload, PieceColor, PlayerId, SessionId, Square};
use std::sync::Arc;
use stockfish_bridge::SkillLevel;
use tracing::{debug, info, warn};

/// Points for beating a human opponent
pub const HUMAN_WIN_POINTS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opponent {
    /// Another session on the far side of the relay
    Human,
    /// The search engine, playing the colour opposite the local player
    Computer { skill: SkillLevel },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub local_color: PieceColor,
    pub opponent: Opponent,
}

impl SessionConfig {
    pub fn new(
        session_id: SessionId,
        player_id: PlayerId,
        local_color: PieceColor,
        opponent: Opponent,
    ) -> Self {
        Self {
            session_id,
            player_id,
            local_color,
            opponent,
        }
    }
}

/// Identifies one bot request; `epoch` changes on undo, quit and rematch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BotTicket {
    pub epoch: u64,
    pub ply: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotRequest {
    pub ticket: BotTicket,
    pub position: Position,
    pub skill: SkillLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinAgainst {
    Player,
    Computer { level: SkillLevel },
}

/// A win to be credited to the local player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinReport {
    pub winner: PlayerId,
    pub against: WinAgainst,
}

impl WinReport {
    /// 20 for a human opponent, the bot's skill level for the computer
    pub fn points(&self) -> u32 {
        match self.against {
            WinAgainst::Player => HUMAN_WIN_POINTS,
            WinAgainst::Computer { level } => u32::from(level.get()),
        }
    }
}

/// Work the session asks its owner to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    /// Send to the other member of the room
    Relay(GameEvent),
    RequestBotMove(BotRequest),
    /// Abandon the outstanding bot request
    CancelBotMove,
    AppendMoveLog(MoveRecord),
    ClearMoveLog,
    ReportWin(WinReport),
}

pub type Effects = Vec<SessionEffect>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatLine {
    pub sender: PlayerId,
    pub text: String,
    /// Written by this session's player
    pub local: bool,
    pub at: DateTime<Utc>,
}

pub struct GameSession {
    config: SessionConfig,
    rules: Arc<dyn RulesEngine>,
    history: SessionHistory,
    captures: CaptureTally,
    status: SessionStatus,
    rematch: RematchHandshake,
    pending_bot: Option<BotTicket>,
    epoch: u64,
    chat: Vec<ChatLine>,
}

impl GameSession {
    pub fn new(config: SessionConfig, rules: Arc<dyn RulesEngine>) -> Self {
        let initial = rules.initial_position();
        Self::from_position(config, rules, initial)
    }

    /// Session with standard chess rules
    pub fn standard(config: SessionConfig) -> Self {
        Self::new(config, Arc::new(ShakmatyRules::new()))
    }

    /// Session starting (and restarting on rematch) from `initial`
    pub fn from_position(
        config: SessionConfig,
        rules: Arc<dyn RulesEngine>,
        initial: Position,
    ) -> Self {
        Self {
            config,
            rules,
            history: SessionHistory::new(initial),
            captures: CaptureTally::default(),
            status: SessionStatus::Active,
            rematch: RematchHandshake::default(),
            pending_bot: None,
            epoch: 0,
            chat: Vec::new(),
        }
    }

    /// Effects needed before the first move: a bot request if the computer plays white
    pub fn start(&mut self) -> Effects {
        self.bot_turn_effects()
    }

    // --- Accessors ---

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn position(&self) -> &Position {
        self.history.current()
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn captures(&self) -> &CaptureTally {
        &self.captures
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn rematch_state(&self) -> RematchState {
        self.rematch.state()
    }

    pub fn chat(&self) -> &[ChatLine] {
        &self.chat
    }

    pub fn pending_bot(&self) -> Option<BotTicket> {
        self.pending_bot
    }

    /// Side to move, read from the current position
    pub fn turn(&self) -> PieceColor {
        self.position().side_to_move()
    }

    pub fn is_my_turn(&self) -> bool {
        !self.status.is_over() && self.turn() == self.config.local_color
    }

    pub fn ply(&self) -> usize {
        self.history.ply()
    }

    pub fn is_human_game(&self) -> bool {
        self.config.opponent == Opponent::Human
    }

    /// Playing a human who is to move, so silence from them counts as idle time
    pub fn waiting_on_opponent(&self) -> bool {
        self.is_human_game() && !self.status.is_over() && self.turn() != self.config.local_color
    }

    pub fn legal_destinations(&self, from: Square) -> GameResult<Vec<Square>> {
        self.rules.legal_destinations(self.position(), from)
    }

    // --- Local operations ---

    /// Play a move for the local player
    ///
    /// Rejected moves leave the session untouched.
    pub fn propose_move(&mut self, mv: MovePayload) -> GameResult<Effects> {
        if self.status.is_over() {
            return Err(GameError::SessionOver);
        }
        let to_move = self.turn();
        if to_move != self.config.local_color {
            return Err(GameError::NotYourTurn { to_move });
        }

        let record = self.apply_to_history(&mv)?;
        let mut effects = Vec::new();
        if self.is_human_game() {
            effects.push(SessionEffect::Relay(GameEvent::Move(record.payload)));
            effects.push(SessionEffect::AppendMoveLog(record));
        }
        effects.extend(self.after_move());
        effects.extend(self.bot_turn_effects());
        Ok(effects)
    }

    /// Take back the latest move
    ///
    /// Against the computer this also takes back the bot's reply so the
    /// local player is to move again. Does nothing when there is not enough
    /// history.
    pub fn undo(&mut self) -> GameResult<Effects> {
        if self.status.is_over() {
            return Err(GameError::SessionOver);
        }

        let plies = match self.config.opponent {
            Opponent::Human => 1,
            Opponent::Computer { .. } => match self.history.last_move() {
                Some(last) if last.mover == self.config.local_color => 1,
                Some(_) => 2,
                None => 0,
            },
        };
        if plies == 0 || self.history.ply() < plies {
            debug!("[SESSION] Nothing to undo at ply {}", self.history.ply());
            return Ok(Vec::new());
        }

        self.pop_plies(plies);
        let mut effects = self.invalidate_bot();
        if self.is_human_game() {
            effects.push(SessionEffect::Relay(GameEvent::Undo {
                plies: wire_ply(plies),
                resulting_ply: wire_ply(self.history.ply()),
            }));
        }
        Ok(effects)
    }

    pub fn request_quit(&mut self) -> GameResult<Effects> {
        if self.status.is_over() {
            return Err(GameError::SessionOver);
        }
        self.finish(GameOverReason::ResignedBySelf);

        let mut effects = self.invalidate_bot();
        if self.is_human_game() {
            effects.push(SessionEffect::Relay(GameEvent::Quit {
                quitter_id: self.config.player_id.clone(),
            }));
        }
        Ok(effects)
    }

    /// Ask for (or, if the opponent already asked, accept) a rematch
    pub fn request_rematch(&mut self) -> GameResult<Effects> {
        if !self.status.is_over() {
            return Err(GameError::transition("a rematch needs a finished game"));
        }
        if !self.is_human_game() {
            return Ok(self.reset());
        }
        if self.rematch.local_requested() {
            return Ok(Vec::new());
        }

        if self.rematch.agree_local() {
            let mut effects = self.reset();
            effects.push(SessionEffect::Relay(GameEvent::Rematch));
            return Ok(effects);
        }
        info!("[SESSION] Rematch requested in {}", self.config.session_id);
        Ok(vec![SessionEffect::Relay(GameEvent::RematchRequest)])
    }

    /// Accept the opponent's rematch request
    pub fn confirm_rematch(&mut self) -> GameResult<Effects> {
        if !self.status.is_over() {
            return Err(GameError::transition("a rematch needs a finished game"));
        }
        if !self.is_human_game() {
            return Ok(self.reset());
        }
        if !self.rematch.remote_requested() {
            return Err(GameError::transition("the opponent has not asked for a rematch"));
        }

        self.rematch.agree_local();
        let mut effects = self.reset();
        effects.push(SessionEffect::Relay(GameEvent::Rematch));
        Ok(effects)
    }

    /// Post a chat line; blank messages are dropped
    pub fn send_chat(&mut self, text: &str) -> Effects {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        self.chat.push(ChatLine {
            sender: self.config.player_id.clone(),
            text: text.to_string(),
            local: true,
            at: Utc::now(),
        });

        if self.is_human_game() {
            vec![SessionEffect::Relay(GameEvent::ChatMessage {
                sender_id: self.config.player_id.clone(),
                text: text.to_string(),
            })]
        } else {
            Vec::new()
        }
    }

    // --- Remote events ---

    /// Apply an event forwarded by the relay
    pub fn apply_remote_event(&mut self, event: GameEvent) -> GameResult<Effects> {
        match event {
            GameEvent::Move(mv) => self.receive_move(mv),
            GameEvent::Undo {
                plies,
                resulting_ply,
            } => self.receive_undo(plies, resulting_ply),
            GameEvent::Quit { quitter_id } => self.receive_quit(&quitter_id),
            GameEvent::Forfeit { claimant_id } => self.receive_forfeit(&claimant_id),
            GameEvent::RematchRequest => self.receive_rematch_request(),
            GameEvent::Rematch => self.receive_rematch(),
            GameEvent::ChatMessage { sender_id, text } => {
                self.receive_chat(sender_id, &text);
                Ok(Vec::new())
            }
        }
    }

    /// Replay the opponent's move against this session's own position
    pub fn receive_move(&mut self, mv: MovePayload) -> GameResult<Effects> {
        self.require_human_game()?;
        if self.status.is_over() {
            debug!("[SESSION] Ignoring {} after game over", mv);
            return Ok(Vec::new());
        }
        if self.turn() == self.config.local_color {
            return Err(GameError::OutOfTurn {
                mover: self.config.local_color.opposite(),
            });
        }

        self.apply_to_history(&mv)?;
        Ok(self.after_move())
    }

    /// Pop `plies` from local history, provided we end up where the peer did
    pub fn receive_undo(&mut self, plies: u16, resulting_ply: u16) -> GameResult<Effects> {
        self.require_human_game()?;
        if self.status.is_over() {
            debug!("[SESSION] Ignoring undo after game over");
            return Ok(Vec::new());
        }

        let actual = self.history.ply();
        let expected = usize::from(resulting_ply);
        match actual.checked_sub(usize::from(plies)) {
            Some(after) if after == expected => {}
            _ => return Err(GameError::HistoryDesync { expected, actual }),
        }

        self.pop_plies(usize::from(plies));
        Ok(Vec::new())
    }

    pub fn receive_quit(&mut self, quitter: &PlayerId) -> GameResult<Effects> {
        self.require_human_game()?;
        if self.status.is_over() {
            return Ok(Vec::new());
        }
        info!("[SESSION] {} resigned in {}", quitter, self.config.session_id);
        self.finish(GameOverReason::ResignedByOpponent);
        Ok(vec![self.win_report()])
    }

    /// The opponent's idle timer ran out on our turn; the claimant reports its own win
    pub fn receive_forfeit(&mut self, claimant: &PlayerId) -> GameResult<Effects> {
        self.require_human_game()?;
        if self.status.is_over() {
            return Ok(Vec::new());
        }
        warn!(
            "[SESSION] {} claimed {} after we stayed idle",
            claimant, self.config.session_id
        );
        self.finish(GameOverReason::TimedOut);
        Ok(Vec::new())
    }

    pub fn receive_rematch_request(&mut self) -> GameResult<Effects> {
        self.require_human_game()?;
        if !self.status.is_over() {
            debug!("[SESSION] Ignoring rematch request during play");
            return Ok(Vec::new());
        }
        if self.rematch.agree_remote() {
            info!("[SESSION] Both sides asked for a rematch");
            return Ok(self.reset());
        }
        Ok(Vec::new())
    }

    /// The opponent accepted our request and has already reset
    pub fn receive_rematch(&mut self) -> GameResult<Effects> {
        self.require_human_game()?;
        if !self.status.is_over() {
            return Ok(Vec::new());
        }
        if !self.rematch.local_requested() {
            return Err(GameError::transition("rematch accepted but never requested"));
        }
        self.rematch.agree_remote();
        Ok(self.reset())
    }

    /// Record a chat line from the peer; blank messages are dropped
    pub fn receive_chat(&mut self, sender: PlayerId, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.chat.push(ChatLine {
            sender,
            text: text.to_string(),
            local: false,
            at: Utc::now(),
        });
        true
    }

    /// The opponent stayed silent on their turn for too long: they forfeit
    ///
    /// The opponent is told with a `forfeit` event so a late return finds
    /// the game already over.
    pub fn opponent_timed_out(&mut self) -> Effects {
        if !self.waiting_on_opponent() {
            return Vec::new();
        }
        warn!(
            "[SESSION] Opponent idle too long in {}, awarding the game",
            self.config.session_id
        );
        self.finish(GameOverReason::ResignedByOpponent);
        vec![
            SessionEffect::Relay(GameEvent::Forfeit {
                claimant_id: self.config.player_id.clone(),
            }),
            self.win_report(),
        ]
    }

    // --- Computer opponent ---

    /// Apply the engine's answer to the request identified by `ticket`
    pub fn receive_bot_move(
        &mut self,
        ticket: BotTicket,
        mv: Option<MovePayload>,
    ) -> GameResult<Effects> {
        if self.pending_bot != Some(ticket) {
            debug!("[SESSION] Discarding stale bot reply {:?}", ticket);
            return Ok(Vec::new());
        }
        self.pending_bot = None;

        let Some(mv) = mv else {
            return Err(GameError::Bot {
                message: "engine found no move in a live position".to_string(),
            });
        };
        self.apply_to_history(&mv).map_err(|e| GameError::Bot {
            message: e.to_string(),
        })?;
        Ok(self.after_move())
    }

    /// Forget a failed request; returns whether it was the outstanding one
    pub fn bot_failed(&mut self, ticket: BotTicket) -> bool {
        if self.pending_bot == Some(ticket) {
            self.pending_bot = None;
            true
        } else {
            false
        }
    }

    /// Ask the engine again if it is its turn and nothing is outstanding
    pub fn retry_bot(&mut self) -> Effects {
        self.bot_turn_effects()
    }

    // --- Internals ---

    fn require_human_game(&self) -> GameResult<()> {
        if self.is_human_game() {
            Ok(())
        } else {
            Err(GameError::transition("computer games have no remote peer"))
        }
    }

    fn apply_to_history(&mut self, mv: &MovePayload) -> GameResult<MoveRecord> {
        let applied = self.rules.apply(self.history.current(), mv)?;
        let record = MoveRecord::from(applied);
        self.captures.record_move(&record);
        self.history.push(record.clone());
        debug!(
            "[SESSION] {} played {} (ply {})",
            record.mover,
            record.payload,
            self.history.ply()
        );
        Ok(record)
    }

    fn pop_plies(&mut self, plies: usize) {
        for _ in 0..plies {
            self.history.pop();
        }
        self.captures = CaptureTally::from_moves(self.history.moves());
        debug!("[SESSION] Undid {} ply, now at {}", plies, self.history.ply());
    }

    fn after_move(&mut self) -> Effects {
        let terminal = self
            .rules
            .terminal_state(self.history.current(), self.history.earlier_positions())
            .unwrap_or_else(|e| {
                warn!("[SESSION] Terminal check failed: {}", e);
                None
            });

        match terminal {
            None => Vec::new(),
            Some(Terminal::Checkmate { winner }) => {
                self.finish(GameOverReason::Checkmate { winner });
                let mut effects = Vec::new();
                if self.is_human_game() {
                    effects.push(SessionEffect::ClearMoveLog);
                }
                if winner == self.config.local_color {
                    effects.push(self.win_report());
                }
                effects
            }
            Some(Terminal::Draw(reason)) => {
                self.finish(GameOverReason::Draw(reason));
                Vec::new()
            }
        }
    }

    fn finish(&mut self, reason: GameOverReason) {
        self.status = SessionStatus::Over(reason);
        self.rematch.reset();
        info!(
            "[SESSION] Game {} over: {}",
            self.config.session_id,
            self.status.message()
        );
    }

    fn win_report(&self) -> SessionEffect {
        let against = match self.config.opponent {
            Opponent::Human => WinAgainst::Player,
            Opponent::Computer { skill } => WinAgainst::Computer { level: skill },
        };
        SessionEffect::ReportWin(WinReport {
            winner: self.config.player_id.clone(),
            against,
        })
    }

    /// Queue a bot request when the computer is to move and none is outstanding
    fn bot_turn_effects(&mut self) -> Effects {
        let Opponent::Computer { skill } = self.config.opponent else {
            return Vec::new();
        };
        if self.status.is_over()
            || self.pending_bot.is_some()
            || self.turn() == self.config.local_color
        {
            return Vec::new();
        }

        let ticket = BotTicket {
            epoch: self.epoch,
            ply: self.history.ply(),
        };
        self.pending_bot = Some(ticket);
        vec![SessionEffect::RequestBotMove(BotRequest {
            ticket,
            position: self.position().clone(),
            skill,
        })]
    }

    /// Make any outstanding bot reply stale
    fn invalidate_bot(&mut self) -> Effects {
        self.epoch += 1;
        match self.pending_bot.take() {
            Some(_) => vec![SessionEffect::CancelBotMove],
            None => Vec::new(),
        }
    }

    fn reset(&mut self) -> Effects {
        let mut effects = self.invalidate_bot();
        self.history.reset();
        self.captures.clear();
        self.status = SessionStatus::Active;
        self.rematch.reset();
        info!("[SESSION] New game in {}", self.config.session_id);
        effects.extend(self.bot_turn_effects());
        effects
    }
}

fn wire_ply(ply: usize) -> u16 {
    u16::try_from(ply).unwrap_or(u16::MAX)
}
