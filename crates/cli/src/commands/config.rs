// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use crate::cli::ConfigCommand;
use crate::config::Config;
use crate::error::{Error, Result};

use super::Context;

const MASK: &str = "********";

/// Execute a config subcommand.
pub fn run(ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            print!("{}", render(&ctx.config)?);
        }
        ConfigCommand::Path => {
            let marker = if ctx.config_path.exists() {
                ""
            } else {
                " (not created)"
            };
            println!("{}{}", ctx.config_path.display(), marker);
        }
    }
    Ok(())
}

/// The effective configuration as TOML, with the token masked and the
/// resolved state directory filled in.
pub(crate) fn render(config: &Config) -> Result<String> {
    let mut shown = config.clone();
    if shown.source.token.is_some() {
        shown.source.token = Some(MASK.to_string());
    }
    shown.state_dir = Some(config.state_dir());
    toml::to_string_pretty(&shown)
        .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
