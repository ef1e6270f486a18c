//! WebSocket client for the relay
//!
//! A connection is split into two tasks: a writer draining an unbounded
//! outbox (so sends never block the caller and keep their order) and a
//! reader decoding text frames into [`RelayFrame`]s.

use futures::{SinkExt, StreamExt};
use shared::{GameEvent, RelayFrame, SessionId};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use websocket::{ClientBuilder, Message};

/// How long to wait for the relay to acknowledge a join
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Could not connect to relay: {0}")]
    Connect(String),

    #[error("Relay connection closed")]
    Closed,

    #[error("Malformed frame: {0}")]
    Codec(#[from] serde_json::Error),

    /// The relay answered with an error frame or something unexpected
    #[error("Relay protocol error: {0}")]
    Protocol(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Sending half of a joined relay connection
#[derive(Debug, Clone)]
pub struct RelaySender {
    session_id: SessionId,
    outbox: mpsc::UnboundedSender<String>,
}

impl RelaySender {
    pub fn send(&self, event: GameEvent) -> ClientResult<()> {
        let name = event.name();
        let text = RelayFrame::event(&self.session_id, event).to_text()?;
        self.outbox.send(text).map_err(|_| ClientError::Closed)?;
        debug!("[NETWORK] Sent {} to {}", name, self.session_id);
        Ok(())
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn is_closed(&self) -> bool {
        self.outbox.is_closed()
    }
}

/// A connection that has joined one room
#[derive(Debug)]
pub struct RelayClient {
    sender: RelaySender,
    frames: mpsc::UnboundedReceiver<RelayFrame>,
    members: usize,
}

impl RelayClient {
    /// Connect to `url` (e.g. `ws://127.0.0.1:3001/ws`) and join `session_id`
    pub async fn connect(url: &str, session_id: &SessionId) -> ClientResult<Self> {
        let builder = ClientBuilder::new()
            .uri(url)
            .map_err(|e| ClientError::Connect(e.to_string()))?;
        let (stream, _) = builder
            .connect()
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;
        info!("[NETWORK] Connected to {}", url);

        let (mut sink, mut source) = stream.split();
        let (outbox, mut queued) = mpsc::unbounded_channel::<String>();
        let (inbound, frames) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(text) = queued.recv().await {
                if let Err(e) = sink.send(Message::text(text)).await {
                    warn!("[NETWORK] Send failed: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                let message = match message {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("[NETWORK] Receive failed: {}", e);
                        break;
                    }
                };
                let Some(text) = message.as_text() else {
                    continue;
                };
                match RelayFrame::from_text(text) {
                    Ok(frame) => {
                        if inbound.send(frame).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("[NETWORK] Dropping undecodable frame: {}", e),
                }
            }
            debug!("[NETWORK] Reader finished");
        });

        let mut client = Self {
            sender: RelaySender {
                session_id: session_id.clone(),
                outbox,
            },
            frames,
            members: 0,
        };
        client.join().await?;
        Ok(client)
    }

    async fn join(&mut self) -> ClientResult<()> {
        let join = RelayFrame::Join {
            session_id: self.sender.session_id.clone(),
        };
        self.sender
            .outbox
            .send(join.to_text()?)
            .map_err(|_| ClientError::Closed)?;

        let ack = tokio::time::timeout(JOIN_TIMEOUT, self.frames.recv())
            .await
            .map_err(|_| ClientError::Protocol("no join acknowledgement".to_string()))?;
        match ack {
            Some(RelayFrame::Joined { members, .. }) => {
                info!(
                    "[NETWORK] Joined {} ({} member(s))",
                    self.sender.session_id, members
                );
                self.members = members;
                Ok(())
            }
            Some(RelayFrame::Error { message }) => Err(ClientError::Protocol(message)),
            Some(other) => Err(ClientError::Protocol(format!(
                "expected a join acknowledgement, got {other:?}"
            ))),
            None => Err(ClientError::Closed),
        }
    }

    /// Room size reported when this connection joined, itself included
    pub fn members_at_join(&self) -> usize {
        self.members
    }

    pub fn send(&self, event: GameEvent) -> ClientResult<()> {
        self.sender.send(event)
    }

    /// Next frame from the relay; `None` once the connection is gone
    pub async fn recv(&mut self) -> Option<RelayFrame> {
        self.frames.recv().await
    }

    pub fn split(self) -> (RelaySender, mpsc::UnboundedReceiver<RelayFrame>) {
        (self.sender, self.frames)
    }
}
