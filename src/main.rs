use anyhow::Context;
use clap::Parser;
use duelchess::console::{self, ConsoleInput};
use duelchess::core::{BotArgs, Cli, Command, EngineSource, PersistenceArgs, PlayArgs};
use duelchess::game::ai::{BotMoveProvider, HttpBotClient, OneShotEngine};
use duelchess::game::{GameSession, Opponent, RulesEngine, SessionConfig, ShakmatyRules};
use duelchess::networking::{DriverHandle, RelayClient, SessionDriver};
use duelchess::persistence::{HttpCollaborator, InMemoryStore, MoveLog, ScoreLedger};
use shared::SessionId;
use std::sync::Arc;
use stockfish_bridge::EngineHandle;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Searches allowed to wait behind the running one
const ENGINE_QUEUE_DEPTH: usize = 4;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so the board on stdout stays readable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let handle = match cli.command {
        Command::Play(args) => start_human_game(args).await?,
        Command::Bot(args) => start_bot_game(args).await?,
    };
    run_console(handle).await
}

fn collaborators(args: &PersistenceArgs) -> (Arc<dyn MoveLog>, Arc<dyn ScoreLedger>) {
    match &args.api_base_url {
        Some(url) => {
            info!("[PERSIST] Using game API at {}", url);
            let api = Arc::new(HttpCollaborator::new(url));
            let moves: Arc<dyn MoveLog> = api.clone();
            let scores: Arc<dyn ScoreLedger> = api;
            (moves, scores)
        }
        None => {
            info!("[PERSIST] API_BASE_URL not set, keeping moves and scores in memory");
            let store = Arc::new(InMemoryStore::new());
            let moves: Arc<dyn MoveLog> = store.clone();
            let scores: Arc<dyn ScoreLedger> = store;
            (moves, scores)
        }
    }
}

async fn start_human_game(args: PlayArgs) -> anyhow::Result<DriverHandle> {
    let session_id = args.session_id()?;
    let config = SessionConfig::new(
        session_id.clone(),
        args.player_id(),
        args.color,
        Opponent::Human,
    );

    let client = RelayClient::connect(&args.relay_url, &session_id)
        .await
        .with_context(|| format!("failed to join {} at {}", session_id, args.relay_url))?;
    if client.members_at_join() > 2 {
        warn!(
            "[NETWORK] Room {} already has {} members",
            session_id,
            client.members_at_join()
        );
    }

    let (moves, scores) = collaborators(&args.persistence);
    Ok(SessionDriver::new(GameSession::standard(config), moves, scores)
        .with_relay(client)
        .idle_timeout(args.idle_timeout())
        .spawn())
}

async fn start_bot_game(args: BotArgs) -> anyhow::Result<DriverHandle> {
    let settings = args.search_settings();
    let provider: Arc<dyn BotMoveProvider> = match args.engine_source()? {
        EngineSource::Pooled(command) => Arc::new(
            EngineHandle::spawn(&command, settings, ENGINE_QUEUE_DEPTH)
                .await
                .with_context(|| format!("failed to start engine {:?}", command.path))?,
        ),
        EngineSource::OneShot(command) => Arc::new(OneShotEngine::new(command, settings)),
        EngineSource::Service(url) => Arc::new(HttpBotClient::new(&url)),
    };

    let skill = args.skill();
    info!("[ENGINE] Computer plays {} at skill {}", args.color.opposite(), skill.get());
    let config = SessionConfig::new(
        SessionId::generate(),
        args.player_id(),
        args.color,
        Opponent::Computer { skill },
    );

    let (moves, scores) = collaborators(&args.persistence);
    Ok(SessionDriver::new(GameSession::standard(config), moves, scores)
        .with_bot(provider)
        .spawn())
}

async fn run_console(handle: DriverHandle) -> anyhow::Result<()> {
    let rules = ShakmatyRules::new();
    let mut snapshots = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut chat_seen = 0;

    println!("{}", console::HELP);
    let first = snapshots.borrow_and_update().clone();
    print!("{}", console::render(&first));

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                for line in snapshot.chat.iter().skip(chat_seen).filter(|l| !l.local) {
                    println!("{} [{}] {}", line.at.format("%H:%M"), line.sender, line.text);
                }
                chat_seen = snapshot.chat.len();
                print!("{}", console::render(&snapshot));
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match console::parse_line(&line) {
                    Ok(ConsoleInput::Command(command)) => {
                        if !handle.send(command) {
                            break;
                        }
                    }
                    Ok(ConsoleInput::ShowMoves(square)) => {
                        let snapshot = handle.snapshot();
                        match rules.legal_destinations(&snapshot.position, square) {
                            Ok(targets) if targets.is_empty() => println!("no moves from {square}"),
                            Ok(targets) => {
                                let names: Vec<String> = targets.iter().map(ToString::to_string).collect();
                                println!("{square}: {}", names.join(" "));
                            }
                            Err(e) => println!("{e}"),
                        }
                    }
                    Ok(ConsoleInput::Help) => println!("{}", console::HELP),
                    Ok(ConsoleInput::Exit) => break,
                    Ok(ConsoleInput::Empty) => {}
                    Err(message) => println!("{message}"),
                }
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}
