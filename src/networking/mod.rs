//! Relay connection and the task that drives a session over it

pub mod client;
pub mod driver;

pub use client::{ClientError, ClientResult, RelayClient, RelaySender};
pub use driver::{DriverHandle, SessionDriver, SessionSnapshot, UserCommand};
