// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared argument structs for CLI commands.
//!
//! Used with `#[command(flatten)]` by the browse commands.

use clap::Args;

/// Filters shared by `list` and `search`.
#[derive(Args, Clone, Debug, Default)]
pub struct ItemFilterArgs {
    /// Only items of this target
    #[arg(long, short = 't', value_name = "TARGET")]
    pub target: Option<String>,

    /// Only items with this status (case-insensitive)
    #[arg(long, short)]
    pub status: Option<String>,
}

/// Limit arguments for result lists.
#[derive(Args, Clone, Debug, Default)]
pub struct LimitArgs {
    /// Maximum number of results
    #[arg(short = 'n', long, default_value_t = 50)]
    pub limit: usize,
}
