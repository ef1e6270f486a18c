//! Types shared between the relay, the game client and the engine bridge.

pub mod protocol;
pub mod types;

pub use protocol::{GameEvent, RelayFrame};
pub use types::{MovePayload, PieceColor, PieceKind, PlayerId, ProtocolError, SessionId, Square};
