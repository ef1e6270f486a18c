//! In-process collaborators, used when no API is configured and in tests

use super::{MoveLog, PersistResult, ScoreLedger};
use crate::game::{MoveRecord, WinReport};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared::{PlayerId, SessionId};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    moves: Mutex<HashMap<SessionId, Vec<(PlayerId, MoveRecord)>>>,
    scores: Mutex<HashMap<PlayerId, u32>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logged moves of `game`, oldest first
    pub fn moves(&self, game: &SessionId) -> Vec<MoveRecord> {
        self.moves
            .lock()
            .get(game)
            .map(|entries| entries.iter().map(|(_, record)| record.clone()).collect())
            .unwrap_or_default()
    }

    pub fn score(&self, player: &PlayerId) -> u32 {
        self.scores.lock().get(player).copied().unwrap_or(0)
    }
}

#[async_trait]
impl MoveLog for InMemoryStore {
    async fn append(
        &self,
        game: &SessionId,
        player: &PlayerId,
        record: &MoveRecord,
    ) -> PersistResult<()> {
        self.moves
            .lock()
            .entry(game.clone())
            .or_default()
            .push((player.clone(), record.clone()));
        Ok(())
    }

    async fn delete_all(&self, game: &SessionId) -> PersistResult<()> {
        self.moves.lock().remove(game);
        Ok(())
    }
}

#[async_trait]
impl ScoreLedger for InMemoryStore {
    async fn increment(&self, report: &WinReport) -> PersistResult<()> {
        *self.scores.lock().entry(report.winner.clone()).or_insert(0) += report.points();
        Ok(())
    }
}
