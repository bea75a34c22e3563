// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

mod args;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

pub use args::{ItemFilterArgs, LimitArgs};

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "trawl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Mirror issue tracker projects into a local, searchable store")]
#[command(
    long_about = "Mirror issue tracker projects into a local, searchable store.\n\n\
    Sync is incremental and resumable: an interrupted run picks up at the last\n\
    fully applied page. Storage is owned by a background worker (trawld)."
)]
pub struct Cli {
    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Log progress to stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sync enabled targets (or the named ones) into local storage
    #[command(after_help = "\
Examples:
  trawl sync                Sync every enabled target
  trawl sync PROJ OPS       Sync two targets, enabled or not
  trawl sync PROJ --full    Discard PROJ's checkpoint and refetch everything")]
    Sync {
        /// Targets to sync (default: all enabled)
        targets: Vec<String>,

        /// Ignore checkpoints and the incremental watermark
        #[arg(long)]
        full: bool,
    },

    /// Show targets, stored counts, and pending resumes
    Status {
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Manage sync targets
    #[command(subcommand)]
    Targets(TargetsCommand),

    /// List stored items
    List {
        #[command(flatten)]
        filter: ItemFilterArgs,

        #[command(flatten)]
        limits: LimitArgs,

        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Search stored items by key or summary
    Search {
        /// Text to match (case-insensitive)
        #[arg(value_parser = non_empty_string)]
        query: String,

        #[command(flatten)]
        filter: ItemFilterArgs,

        #[command(flatten)]
        limits: LimitArgs,

        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Show one stored item with its change history
    Show {
        /// Item key or id
        key: String,

        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Show recent sync runs
    Runs {
        /// Only runs of this target
        #[arg(long, short = 't', value_name = "TARGET")]
        target: Option<String>,

        #[command(flatten)]
        limits: LimitArgs,

        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Manage the storage worker
    #[command(subcommand)]
    Worker(WorkerCommand),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum TargetsCommand {
    /// List known targets
    List {
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Fetch the target list from the source; new targets start disabled
    Discover,

    /// Include targets in `trawl sync`
    #[command(arg_required_else_help = true)]
    Enable {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Exclude targets from `trawl sync`
    #[command(arg_required_else_help = true)]
    Disable {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum WorkerCommand {
    /// Show whether the worker is running
    Status,

    /// Start the worker if it is not running
    Start,

    /// Stop the worker
    Stop,

    /// Print the tail of the worker log
    Logs {
        /// Number of lines
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration (token masked)
    Show,

    /// Print the config file location
    Path,
}

#[cfg(test)]
#[path = "../cli_tests/mod.rs"]
mod tests;
