//! humanrig CLI - batch import of humanoid rig data
//!
//! # Commands
//!
//! - `humanrig import <data-dir>` - Build the rig, import and separate targets, write the records
//! - `humanrig weights` - Evaluate modifier values to blend-shape weights
//!
//! # Config (humanrig.toml)
//!
//! ```toml
//! base_mesh = "3dobjs/base.obj"
//! rig = "rigs/default.mhskel"
//! targets = "targets"
//! modifiers = "modifiers/modeling_modifiers.json"
//! separate_skeltargets = true
//! ```

mod import;
mod weights;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// humanrig - humanoid rig import and skeleton/blend-shape separation
#[derive(Parser)]
#[command(name = "humanrig")]
#[command(version)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a data directory and write rig, skin, blend-shape and skeltarget records
    Import(import::ImportArgs),

    /// Print the blend-shape weights for a set of modifier values
    Weights(weights::WeightsArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins unless --verbose asks for debug output.
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.verbose {
        logger.filter_module("humanrig", log::LevelFilter::Debug);
    }
    logger.init();

    match cli.command {
        Commands::Import(args) => import::execute(args),
        Commands::Weights(args) => weights::execute(args),
    }
}
