//! Command-line front end over the ledger core

pub mod commands;

pub use commands::{
    cmd_block, cmd_build_tx, cmd_difficulty, cmd_keys, cmd_params, AppState, CliResult,
};
