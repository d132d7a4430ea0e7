//! CLI command definitions for mirror-sync.
//!
//! The main entry point is the `Cli` struct which contains subcommands.

use clap::{Parser, Subcommand};

/// Mirror tasks between lists of a project-management service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Path to the mirror rules file (overrides config)
    #[arg(short, long, global = true)]
    pub rules: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Print an example rules file
    ExampleRules,

    /// Re-run mirroring over stored tasks, then poll recent changes once
    Sync,

    /// Refetch every stored task and sync it; tasks the service no longer has are marked deleted
    DbSync,

    /// Poll recent changes every poll interval until interrupted
    Watch,
}
