use crate::types::{MovePayload, PlayerId, SessionId};
use serde::{Deserialize, Serialize};

/// Events exchanged between the two game sessions of a room
///
/// The relay forwards these without looking inside them. Serialized with
/// the event name next to its payload:
///
/// ```json
/// {"event": "move", "payload": {"source": "e2", "destination": "e4"}}
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(
    tag = "event",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum GameEvent {
    /// A move the sender already applied locally
    Move(MovePayload),

    /// Pop `plies` half-moves; the receiver should end up at `resulting_ply`
    Undo { plies: u16, resulting_ply: u16 },

    /// The sender resigned
    Quit { quitter_id: PlayerId },

    /// The sender gave up waiting: the receiver stayed silent on its turn
    /// past the idle limit and loses the game
    Forfeit { claimant_id: PlayerId },

    /// First phase of the rematch handshake
    RematchRequest,

    /// Second phase: the sender accepts the rematch and has already reset
    Rematch,

    ChatMessage { sender_id: PlayerId, text: String },
}

impl GameEvent {
    /// Wire name of the event, for logging
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::Move(_) => "move",
            GameEvent::Undo { .. } => "undo",
            GameEvent::Quit { .. } => "quit",
            GameEvent::Forfeit { .. } => "forfeit",
            GameEvent::RematchRequest => "rematchRequest",
            GameEvent::Rematch => "rematch",
            GameEvent::ChatMessage { .. } => "chatMessage",
        }
    }
}

/// Envelope of every text frame on the relay socket
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RelayFrame {
    // Client → Relay
    Join { session_id: SessionId },

    // Relay → Client (acknowledges a join; `members` includes the joiner)
    Joined { session_id: SessionId, members: usize },

    // Client → Relay → other room members, forwarded verbatim
    Event { session_id: SessionId, event: GameEvent },

    // Relay → Client
    Error { message: String },
}

impl RelayFrame {
    pub fn event(session_id: &SessionId, event: GameEvent) -> Self {
        RelayFrame::Event {
            session_id: session_id.clone(),
            event,
        }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
