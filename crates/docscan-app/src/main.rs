// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docscan: document scanner
//
// Entry point. Initialises logging, loads the configuration, and dispatches
// the subcommand.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use docscan_core::AppConfig;
use docscan_core::human_errors::humanize_error;
use tracing_subscriber::EnvFilter;

use docscan_app::cli::Cli;
use docscan_app::commands;
use docscan_app::services::data_dir;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(data_dir::default_config_path);
    let config = AppConfig::load_or_default(&config_path);
    tracing::debug!(path = %config_path.display(), "Configuration resolved");

    let Some(command) = cli.command else {
        if let Err(err) = Cli::command().print_help() {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    };

    match commands::run(command, config, config_path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "docscan failed");
            let human = humanize_error(&err);
            eprintln!("error: {}", human.message);
            eprintln!("  {}", human.suggestion);
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr; `RUST_LOG` wins, otherwise `info` (or `debug` with `-v`).
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}
