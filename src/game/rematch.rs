//! Two-sided rematch agreement
//!
//! Each side holds its own flag. A rematch happens once both flags are set,
//! no matter which side set its flag first, including when both sides ask
//! at the same time.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RematchState {
    Idle,
    RequestedByLocal,
    RequestedByRemote,
    Agreed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RematchHandshake {
    local: bool,
    remote: bool,
}

impl RematchHandshake {
    /// Set the local flag; `true` once both sides agree
    pub fn agree_local(&mut self) -> bool {
        self.local = true;
        self.is_agreed()
    }

    /// Set the remote flag; `true` once both sides agree
    pub fn agree_remote(&mut self) -> bool {
        self.remote = true;
        self.is_agreed()
    }

    pub fn is_agreed(&self) -> bool {
        self.local && self.remote
    }

    pub fn local_requested(&self) -> bool {
        self.local
    }

    pub fn remote_requested(&self) -> bool {
        self.remote
    }

    pub fn state(&self) -> RematchState {
        match (self.local, self.remote) {
            (false, false) => RematchState::Idle,
            (true, false) => RematchState::RequestedByLocal,
            (false, true) => RematchState::RequestedByRemote,
            (true, true) => RematchState::Agreed,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
