//! Command-line argument definitions.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Gambit — peer-to-peer chess session core.
#[derive(Parser, Debug)]
#[command(name = "gambit-node")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Load base configuration from a TOML file before env-var overrides.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the swarm listen address.
    #[arg(long)]
    pub bind_addr: Option<SocketAddr>,

    /// Override the data directory (logs + snapshots).
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Override the rendezvous directory.
    #[arg(long)]
    pub rendezvous_dir: Option<PathBuf>,

    /// Override the log level.
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Host a new game and print its invite code.
    Host,

    /// Join an existing game by invite code.
    Join {
        /// The host's invite code, e.g. `A1B-2C3`.
        invite_code: String,
    },

    /// Watch a game in progress, read-only.
    Spectate {
        /// The game's invite code, e.g. `A1B-2C3`.
        invite_code: String,
    },

    /// Generate a new Ed25519 identity.
    Keygen {
        /// Write the hex-encoded secret key here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List games with a saved snapshot under the data directory.
    ListSaved,

    /// One-shot position analysis via a UCI-like engine binary.
    Engine {
        /// Path to the engine binary; resolved from `PATH` if omitted.
        #[arg(long)]
        binary: Option<PathBuf>,

        /// The position to analyze, in FEN.
        fen: String,

        /// Fixed search depth (default if neither this nor `--movetime`
        /// is given).
        #[arg(long)]
        depth: Option<u32>,

        /// Fixed search time, in milliseconds.
        #[arg(long)]
        movetime_ms: Option<u64>,
    },
}
