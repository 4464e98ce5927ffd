//! clap-based command line interface.
//!
//! Defines the [`Cli`] struct with subcommands [`Command`] (run, status)
//! and global flags (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// stemrender — render-queue worker driving a DAW to export stems.
#[derive(Debug, Parser)]
#[command(name = "stemrender", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file (default: stemrender.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output: per-job report dumps and debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the queue and render pending jobs.
    Run {
        /// Process a single poll cycle, then exit.
        #[arg(long, default_value_t = false)]
        once: bool,
    },

    /// List jobs currently awaiting a render.
    Status,
}
