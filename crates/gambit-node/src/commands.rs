//! Subcommand implementations.

use crate::config::NodeConfig;
use gambit_engine::{AnalyzeOptions, EngineAdapter};
use gambit_identity::Keypair;
use gambit_session::{
    CreateGameOptions, JoinGameOptions, Session, SessionCallbacks, SessionError,
    SpectatorConnectOptions, SpectatorSession,
};
use gambit_swarm::{FsRendezvous, PeerId, Rendezvous};
use gambit_types::{GameId, InviteCode, Move, PlayerColor, SessionState};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Hosts a new game and runs the interactive move loop until it ends.
pub async fn host(config: &NodeConfig) -> anyhow::Result<()> {
    let keypair = load_or_generate_keypair(config)?;
    let rendezvous: Arc<dyn Rendezvous> = Arc::new(FsRendezvous::new(&config.rendezvous_dir));
    let callbacks: Arc<dyn SessionCallbacks> = Arc::new(CliCallbacks);

    let session = Session::create(
        CreateGameOptions {
            storage_dir: config.data_dir.clone(),
            bind_addr: config.bind_addr,
            rendezvous,
            keypair,
        },
        callbacks,
    )
    .await?;

    println!("Invite code: {}", session.invite_code().formatted());
    println!(
        "You are playing {}. Waiting for an opponent to join...",
        session.player_color()
    );
    run_move_loop(session).await
}

/// Joins an existing game by invite code and runs the move loop.
pub async fn join(config: &NodeConfig, invite_code: &str) -> anyhow::Result<()> {
    let invite_code = InviteCode::parse(invite_code)?;
    let keypair = load_or_generate_keypair(config)?;
    let rendezvous: Arc<dyn Rendezvous> = Arc::new(FsRendezvous::new(&config.rendezvous_dir));
    let callbacks: Arc<dyn SessionCallbacks> = Arc::new(CliCallbacks);

    let session = Session::join(
        JoinGameOptions {
            invite_code,
            storage_dir: config.data_dir.clone(),
            bind_addr: config.bind_addr,
            rendezvous,
            keypair,
        },
        callbacks,
    )
    .await?;

    println!("Joined as {}. Connecting...", session.player_color());
    run_move_loop(session).await
}

/// Watches a game in progress, read-only, until interrupted.
pub async fn spectate(config: &NodeConfig, invite_code: &str) -> anyhow::Result<()> {
    let invite_code = InviteCode::parse(invite_code)?;
    let keypair = load_or_generate_keypair(config)?;
    let rendezvous: Arc<dyn Rendezvous> = Arc::new(FsRendezvous::new(&config.rendezvous_dir));
    let callbacks: Arc<dyn SessionCallbacks> = Arc::new(CliCallbacks);

    let session = SpectatorSession::connect(
        SpectatorConnectOptions {
            invite_code,
            bind_addr: config.bind_addr,
            rendezvous,
            keypair,
        },
        callbacks,
    )
    .await?;

    println!(
        "Watching game {}. Press Ctrl+C to stop.",
        session.game_id().to_hex()
    );
    tokio::signal::ctrl_c().await?;
    session.destroy().await;
    Ok(())
}

/// Generates a fresh Ed25519 identity and prints or saves its secret key.
pub fn keygen(output: Option<&Path>) -> anyhow::Result<()> {
    let keypair = Keypair::generate();
    let public_key = keypair.public_key();
    let secret_hex = hex::encode(&*keypair.secret_bytes());

    println!("Public key: {public_key}");
    println!("Short id:   {}", public_key.short_id());

    match output {
        Some(path) => {
            std::fs::write(path, &secret_hex)?;
            println!("Secret key written to {}", path.display());
            println!("Keep this file secure: anyone with it can act as this identity.");
        }
        None => println!("Secret key (hex): {secret_hex}"),
    }
    Ok(())
}

/// Lists every game with a saved snapshot under `data_dir`.
pub async fn list_saved(data_dir: &Path) -> anyhow::Result<()> {
    let games = Session::list_saved_games(data_dir.to_path_buf()).await?;
    if games.is_empty() {
        println!("No saved games under {}", data_dir.display());
        return Ok(());
    }
    for game_id in games {
        println!("{}", game_id.to_hex());
    }
    Ok(())
}

/// Runs a one-shot analysis of `fen` against an engine binary and prints
/// its chosen move.
pub async fn engine(
    binary: Option<&Path>,
    fen: &str,
    depth: Option<u32>,
    movetime_ms: Option<u64>,
) -> anyhow::Result<()> {
    let resolved = gambit_engine::resolve(binary, "gambit-engine-analyzer")?;
    let adapter = EngineAdapter::spawn(&resolved)?;
    adapter.uci().await?;
    adapter.isready().await?;

    let result = adapter
        .analyze(fen, AnalyzeOptions { depth, movetime_ms })
        .await?;

    println!("Best move: {}", result.best_move);
    println!("Depth:     {}", result.depth);
    for line in &result.lines {
        println!("  depth {} pv {}", line.depth, line.moves.join(" "));
    }

    adapter.shutdown().await?;
    Ok(())
}

fn load_or_generate_keypair(config: &NodeConfig) -> anyhow::Result<Keypair> {
    match &config.private_key {
        Some(hex_key) => {
            let bytes = hex::decode(hex_key)?;
            Ok(Keypair::from_secret_bytes(&bytes)?)
        }
        None => Ok(Keypair::generate()),
    }
}

/// A line-oriented move submission loop for the `host`/`join` commands.
///
/// Each line is `<from> <to> <piece> <fen-after> [checkmate]`, e.g.
/// `e2 e4 p rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1`.
/// Move legality is this core's responsibility to transport, not to
/// validate, so the caller is trusted to supply a consistent FEN.
async fn run_move_loop(session: Arc<Session>) -> anyhow::Result<()> {
    println!("Enter moves as: <from> <to> <piece> <fen-after> [checkmate]");
    println!("Type 'quit' or press Ctrl+C to leave.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if session.state() == SessionState::Finished {
            break;
        }
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    None => break,
                    Some(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        if line.eq_ignore_ascii_case("quit") {
                            break;
                        }
                        match parse_move_line(line, session.game_id(), session.player_color()) {
                            Ok(mv) => {
                                if let Err(e) = session.send_move(mv).await {
                                    println!("move rejected: {e}");
                                }
                            }
                            Err(message) => println!("{message}"),
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.destroy().await;
    Ok(())
}

fn parse_move_line(line: &str, game_id: GameId, player: PlayerColor) -> Result<Move, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return Err("usage: <from> <to> <piece> <fen-after> [checkmate]".to_string());
    }
    let piece = parts[2]
        .chars()
        .next()
        .ok_or_else(|| "piece must be a single character".to_string())?;
    let checkmate = parts
        .get(4)
        .is_some_and(|s| s.eq_ignore_ascii_case("checkmate"));

    Ok(Move {
        timestamp: 0,
        player,
        from: parts[0].to_string(),
        to: parts[1].to_string(),
        piece,
        captured: None,
        promotion: None,
        check: false,
        checkmate,
        fen: parts[3].to_string(),
        san: format!("{}{}", parts[0], parts[1]),
        game_id,
    })
}

struct CliCallbacks;

#[async_trait::async_trait]
impl SessionCallbacks for CliCallbacks {
    async fn on_game_state_change(&self, state: SessionState, status: &str) {
        println!("[state] {state} ({status})");
    }

    async fn on_move_received(&self, mv: &Move) {
        println!("[move] {} {} -> {} ({})", mv.player, mv.from, mv.to, mv.san);
    }

    async fn on_connection_change(&self, peer_id: PeerId, status: &str) {
        println!("[peer {peer_id}] {status}");
    }

    async fn on_error(&self, err: &SessionError) {
        tracing::warn!(error = %err, "session error");
    }

    async fn on_game_end(&self, result: &str) {
        println!("[game end] {result}");
    }
}
