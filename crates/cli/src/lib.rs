// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! trawl - mirror issue tracker projects into local storage.
//!
//! This crate is the coordinator behind the `trawl` CLI. It pages items out
//! of a tracker, applies them through the storage worker (`trawld`), and
//! checkpoints after every page so an interrupted sync resumes where it
//! stopped.
//!
//! # Main Components
//!
//! - [`source`] - Tracker client and the [`BatchIterator`](source::BatchIterator) pager
//! - [`proxy`] - Worker lifecycle and request/response bridge ([`StorageProxy`](proxy::StorageProxy))
//! - [`storage`] - Typed storage operations over the proxy
//! - [`sync`] - The [`SyncOrchestrator`](sync::SyncOrchestrator) state machine
//! - [`checkpoint`], [`targets`], [`settings`] - Durable coordinator state
//!
//! # Embedding
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trawl::{commands::Context, Config};
//!
//! let ctx = Context::new(Config::load(path)?, path.to_path_buf());
//! let orchestrator = ctx.orchestrator()?;
//! let report = orchestrator.sync_all().await?;
//! ```

mod cli;
pub mod commands;

pub mod checkpoint;
pub mod config;
pub mod env;
pub mod error;
pub mod proxy;
pub mod settings;
pub mod source;
pub mod storage;
pub mod sync;
pub mod targets;

pub use cli::{
    Cli, Command, ConfigCommand, ItemFilterArgs, LimitArgs, OutputFormat, TargetsCommand,
    WorkerCommand,
};
pub use config::Config;
pub use error::{Error, Result};

use commands::Context;

/// Execute a parsed command line. This is the binary's entry point, kept in
/// the library so it can be driven without spawning a process.
pub fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose);
    let ctx = Context::load(cli.config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(dispatch(&ctx, cli.command))
}

async fn dispatch(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Sync { targets, full } => commands::sync::run(ctx, targets, full).await,
        Command::Status { output } => commands::status::run(ctx, output).await,
        Command::Targets(cmd) => match cmd {
            TargetsCommand::List { output } => commands::targets::list(ctx, output),
            TargetsCommand::Discover => commands::targets::discover(ctx).await,
            TargetsCommand::Enable { ids } => commands::targets::set_enabled(ctx, &ids, true),
            TargetsCommand::Disable { ids } => commands::targets::set_enabled(ctx, &ids, false),
        },
        Command::List {
            filter,
            limits,
            output,
        } => commands::browse::search(ctx, None, filter, limits.limit, output).await,
        Command::Search {
            query,
            filter,
            limits,
            output,
        } => commands::browse::search(ctx, Some(query), filter, limits.limit, output).await,
        Command::Show { key, output } => commands::browse::show(ctx, &key, output).await,
        Command::Runs {
            target,
            limits,
            output,
        } => commands::browse::runs(ctx, target.as_deref(), limits.limit, output).await,
        Command::Worker(cmd) => match cmd {
            WorkerCommand::Status => commands::worker::status(ctx),
            WorkerCommand::Start => commands::worker::start(ctx).await,
            WorkerCommand::Stop => commands::worker::stop(ctx),
            WorkerCommand::Logs { lines } => commands::worker::logs(ctx, lines),
        },
        Command::Config(cmd) => commands::config::run(ctx, cmd),
    }
}

/// Log to stderr: `warn` by default, `info` with `-v`, `RUST_LOG` wins.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
