//! Room membership and fan-out
//!
//! The relay groups connections into rooms keyed by [`SessionId`] and
//! copies text frames from one member to the others. It never looks at
//! game content: whatever the sender wrote is what the other members
//! receive.
//!
//! One `Relay` is built per process and shared by `Arc` with every
//! connection handler. Each connection registers an outbox (the sending
//! half of its writer task's channel); frames pushed into one outbox are
//! written to the socket in push order, which gives FIFO delivery per
//! sender.

use parking_lot::Mutex;
use shared::SessionId;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Identifies one registered connection
pub type ConnectionId = u64;

/// Frames queued for one connection's writer task
pub type Outbox = mpsc::UnboundedSender<String>;

#[derive(Default)]
struct Rooms {
    outboxes: HashMap<ConnectionId, Outbox>,
    members: HashMap<SessionId, HashSet<ConnectionId>>,
    memberships: HashMap<ConnectionId, HashSet<SessionId>>,
}

#[derive(Default)]
pub struct Relay {
    rooms: Mutex<Rooms>,
    next_id: AtomicU64,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and the channel its frames are written from
    pub fn register(&self, outbox: Outbox) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.rooms.lock().outboxes.insert(id, outbox);
        debug!("[RELAY] Connection {} registered", id);
        id
    }

    /// Add `connection` to the room `session`, creating the room if needed
    ///
    /// Joining a room twice is harmless. Returns the member count afterwards.
    pub fn join(&self, connection: ConnectionId, session: &SessionId) -> usize {
        let mut rooms = self.rooms.lock();
        let members = rooms.members.entry(session.clone()).or_default();
        let added = members.insert(connection);
        let count = members.len();
        rooms
            .memberships
            .entry(connection)
            .or_default()
            .insert(session.clone());

        if added {
            info!(
                "[RELAY] Connection {} joined room {} ({} member(s))",
                connection, session, count
            );
        }
        count
    }

    /// Deliver `frame` to every member of `session` except `sender`
    ///
    /// Returns how many members the frame was queued for. Zero means the
    /// frame was dropped because nobody else is in the room.
    pub fn forward(&self, sender: ConnectionId, session: &SessionId, frame: &str) -> usize {
        let rooms = self.rooms.lock();
        let Some(members) = rooms.members.get(session) else {
            debug!("[RELAY] Dropping frame for unknown room {}", session);
            return 0;
        };

        let mut delivered = 0;
        for member in members.iter().filter(|&&member| member != sender) {
            match rooms.outboxes.get(member) {
                Some(outbox) if outbox.send(frame.to_string()).is_ok() => delivered += 1,
                _ => debug!("[RELAY] Connection {} is closing, frame skipped", member),
            }
        }

        if delivered == 0 {
            debug!(
                "[RELAY] No other member in room {}, frame from {} dropped",
                session, sender
            );
        }
        delivered
    }

    /// Send a frame to one connection only
    pub fn reply(&self, connection: ConnectionId, frame: String) -> bool {
        self.rooms
            .lock()
            .outboxes
            .get(&connection)
            .is_some_and(|outbox| outbox.send(frame).is_ok())
    }

    /// Forget `connection`, removing it from every room it joined
    ///
    /// Rooms left without members are removed. The remaining members are
    /// not told; resigning is an explicit game event.
    pub fn leave(&self, connection: ConnectionId) {
        let mut rooms = self.rooms.lock();
        rooms.outboxes.remove(&connection);

        let joined = rooms.memberships.remove(&connection).unwrap_or_default();
        for session in joined {
            let now_empty = match rooms.members.get_mut(&session) {
                Some(members) => {
                    members.remove(&connection);
                    members.is_empty()
                }
                None => false,
            };
            if now_empty {
                rooms.members.remove(&session);
                info!("[RELAY] Room {} closed", session);
            }
        }
        debug!("[RELAY] Connection {} left", connection);
    }

    pub fn room_size(&self, session: &SessionId) -> usize {
        self.rooms
            .lock()
            .members
            .get(session)
            .map_or(0, HashSet::len)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().members.len()
    }

    pub fn connection_count(&self) -> usize {
        self.rooms.lock().outboxes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn connect(relay: &Relay) -> (ConnectionId, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (relay.register(tx), rx)
    }

    #[test]
    fn test_forward_skips_sender() {
        let relay = Relay::new();
        let room = SessionId::from("g1");
        let (alice, mut alice_rx) = connect(&relay);
        let (bob, mut bob_rx) = connect(&relay);
        relay.join(alice, &room);
        relay.join(bob, &room);

        assert_eq!(relay.forward(alice, &room, "hello"), 1);
        assert_eq!(bob_rx.try_recv().unwrap(), "hello");
        assert!(alice_rx.try_recv().is_err(), "sender must not get an echo");
    }

    #[test]
    fn test_join_is_idempotent() {
        let relay = Relay::new();
        let room = SessionId::from("g1");
        let (alice, _rx) = connect(&relay);
        assert_eq!(relay.join(alice, &room), 1);
        assert_eq!(relay.join(alice, &room), 1);
        assert_eq!(relay.room_size(&room), 1);
    }

    #[test]
    fn test_forward_into_empty_room_is_dropped() {
        let relay = Relay::new();
        let room = SessionId::from("lonely");
        let (alice, mut alice_rx) = connect(&relay);
        relay.join(alice, &room);

        assert_eq!(relay.forward(alice, &room, "anyone?"), 0);
        assert_eq!(relay.forward(alice, &SessionId::from("nowhere"), "x"), 0);
        assert!(alice_rx.try_recv().is_err());
    }

    #[test]
    fn test_rooms_are_isolated() {
        let relay = Relay::new();
        let (a, _a_rx) = connect(&relay);
        let (b, mut b_rx) = connect(&relay);
        let (c, mut c_rx) = connect(&relay);
        relay.join(a, &SessionId::from("g1"));
        relay.join(b, &SessionId::from("g1"));
        relay.join(c, &SessionId::from("g2"));

        relay.forward(a, &SessionId::from("g1"), "for g1");
        assert_eq!(b_rx.try_recv().unwrap(), "for g1");
        assert!(c_rx.try_recv().is_err());
    }

    #[test]
    fn test_leave_collects_empty_rooms() {
        let relay = Relay::new();
        let room = SessionId::from("g1");
        let (alice, _a) = connect(&relay);
        let (bob, _b) = connect(&relay);
        relay.join(alice, &room);
        relay.join(bob, &room);
        relay.join(alice, &SessionId::from("g2"));
        assert_eq!(relay.room_count(), 2);

        relay.leave(alice);
        assert_eq!(relay.room_size(&room), 1);
        assert_eq!(relay.room_count(), 1, "g2 had only alice");

        relay.leave(bob);
        assert_eq!(relay.room_count(), 0);
        assert_eq!(relay.connection_count(), 0);
    }

    #[test]
    fn test_frames_keep_sender_order() {
        let relay = Relay::new();
        let room = SessionId::from("g1");
        let (alice, _a) = connect(&relay);
        let (bob, mut bob_rx) = connect(&relay);
        relay.join(alice, &room);
        relay.join(bob, &room);

        for n in 0..5 {
            relay.forward(alice, &room, &format!("frame-{n}"));
        }
        for n in 0..5 {
            assert_eq!(bob_rx.try_recv().unwrap(), format!("frame-{n}"));
        }
    }
}
