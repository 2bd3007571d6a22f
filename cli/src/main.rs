//! `titlescore` entry point: fetch a title corpus or train the scorer on one.

mod commands;
mod config;
mod telemetry;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "titlescore")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train the recurrent scorer for one epoch over a CSV corpus.
    Train {
        /// TOML settings; defaults to `train.toml` when present.
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
    /// Download recent items from the item API into a CSV corpus.
    Fetch {
        /// TOML settings; defaults to `fetch.toml` when present.
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Command::Train { config } => commands::run_train(config),
        Command::Fetch { config } => commands::run_fetch(config),
    }
}
