//! One engine process per search

use crate::error::{BridgeError, BridgeResult};
use crate::process::{EngineCommand, EngineProcess};
use crate::uci::{SearchRequest, SearchSettings, UciCommand};
use shared::MovePayload;
use tracing::{debug, info};

/// Spawn the engine, run a single search and shut the engine down
///
/// The engine is closed on every path, including errors and timeouts.
/// `Ok(None)` means the engine reported that no move exists. A request
/// whose position is not a well-formed FEN is refused before any process
/// is started.
pub async fn search_once(
    command: &EngineCommand,
    request: &SearchRequest,
    settings: &SearchSettings,
) -> BridgeResult<Option<MovePayload>> {
    request.validate()?;
    let mut engine = EngineProcess::spawn(command)?;

    let search = run_search(&mut engine, request, settings.depth);
    let result = match settings.timeout {
        Some(limit) => match tokio::time::timeout(limit, search).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Timeout(limit)),
        },
        None => search.await,
    };

    engine.close().await;

    match &result {
        Ok(Some(mv)) => info!("[ENGINE] Best move {} (skill {})", mv, request.skill_level),
        Ok(None) => info!("[ENGINE] No legal move in {}", request.position),
        Err(e) => debug!("[ENGINE] Search failed: {}", e),
    }
    result
}

async fn run_search(
    engine: &mut EngineProcess,
    request: &SearchRequest,
    depth: u8,
) -> BridgeResult<Option<MovePayload>> {
    engine.send(&UciCommand::Uci).await?;
    engine.send(&UciCommand::skill(request.skill_level)).await?;
    engine
        .send(&UciCommand::Position {
            fen: request.position.clone(),
        })
        .await?;
    engine.send(&UciCommand::GoDepth(depth)).await?;
    engine.read_best_move().await
}
