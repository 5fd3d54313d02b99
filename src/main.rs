//! Mimble CLI Application
//!
//! A command-line interface over the confidential-transaction ledger core.

use clap::{Parser, Subcommand};
use mimble_core::cli::{self, AppState};
use mimble_core::config::{ChainParams, ChainType};

#[derive(Parser)]
#[command(name = "mimble")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Confidential-transaction ledger core", long_about = None)]
struct Cli {
    /// Network whose parameters to use
    #[arg(short, long, value_enum, default_value_t = ChainType::Development)]
    chain: ChainType,

    /// Keychain seed as hex (16, 32 or 64 bytes); random when omitted
    #[arg(short, long)]
    seed: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the root identifier and derived key identifiers
    Keys {
        /// Number of identifiers to derive
        #[arg(short = 'n', long, default_value = "5")]
        count: u32,
    },

    /// Build and validate a transaction back to this keychain
    BuildTx {
        /// Input values, one per input
        #[arg(short, long, required = true, num_args = 1..)]
        inputs: Vec<u64>,

        /// Fee, must be even
        #[arg(short, long, default_value = "2")]
        fee: u64,

        /// Lock height
        #[arg(short, long, default_value = "0")]
        lock_height: u64,
    },

    /// Assemble and validate a block on top of genesis
    Block {
        /// Include a sample transaction
        #[arg(long)]
        with_tx: bool,
    },

    /// Compute the next difficulty from `timestamp:difficulty` pairs, newest first
    Difficulty {
        history: Vec<String>,
    },

    /// Print consensus constants and chain parameters as JSON
    Params,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let params = ChainParams::for_chain(cli.chain);

    // Only the commands that touch keys build a keychain
    let state = || AppState::new(params.clone(), cli.seed.as_deref());

    match cli.command {
        Commands::Keys { count } => {
            cli::cmd_keys(&state()?, count)?;
        }

        Commands::BuildTx {
            inputs,
            fee,
            lock_height,
        } => {
            cli::cmd_build_tx(&state()?, &inputs, fee, lock_height)?;
        }

        Commands::Block { with_tx } => {
            cli::cmd_block(&state()?, with_tx)?;
        }

        Commands::Difficulty { history } => {
            cli::cmd_difficulty(&history)?;
        }

        Commands::Params => {
            cli::cmd_params(&params)?;
        }
    }

    Ok(())
}
