pub mod api;
pub mod config;
pub mod relay;

pub use api::{router, AppState};
pub use config::{EngineConfig, RelayConfig};
pub use relay::Relay;
