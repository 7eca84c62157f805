// SPDX-FileCopyrightText: 2026 Comptoir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Comptoir - unified inbox ingestion and classification core.
//!
//! Binary entry point. `comptoir serve` (the default) runs the webhook
//! receiver, the IMAP polling scheduler, and the classification workers
//! in one process; `comptoir integration` manages tenant channels;
//! `comptoir config` inspects the resolved configuration; `comptoir
//! doctor` runs environment diagnostics.

mod doctor;
mod integration;
mod serve;

use clap::{Parser, Subcommand};
use comptoir_config::ComptoirConfig;
use comptoir_core::ComptoirError;

/// Comptoir - unified inbox ingestion and classification core.
#[derive(Parser, Debug)]
#[command(name = "comptoir", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the ingestion core: webhook receiver, IMAP poller, classifiers.
    Serve,
    /// Manage inbound channel integrations.
    Integration {
        #[command(subcommand)]
        command: integration::IntegrationCommands,
    },
    /// Inspect the resolved configuration.
    Config {
        /// Print the full resolved configuration as TOML.
        #[arg(long)]
        show: bool,
    },
    /// Run diagnostic checks against the environment.
    Doctor {
        /// Run additional intensive checks.
        #[arg(long)]
        deep: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match comptoir_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            comptoir_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) | None => serve::run_serve(config).await,
        Some(Commands::Integration { command }) => {
            integration::run_integration(&config, command).await
        }
        Some(Commands::Config { show }) => run_config(&config, show),
        Some(Commands::Doctor { deep }) => doctor::run_doctor(&config, deep).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Print the resolved configuration. Secrets are replaced before
/// rendering; their plaintext never reaches stdout.
fn run_config(config: &ComptoirConfig, show: bool) -> Result<(), ComptoirError> {
    if !show {
        println!("database:  {}", config.database.url);
        println!("uploads:   {}", config.uploads.dir);
        println!("webhook:   {}", config.webhook.bind_address);
        println!(
            "vault key: {}",
            if config.vault.encryption_key.is_some() {
                "set"
            } else {
                "not set"
            }
        );
        println!(
            "llm:       {}",
            if config.llm.api_key.is_some() {
                config.llm.model.as_str()
            } else {
                "disabled (no API key)"
            }
        );
        println!();
        println!("Run with --show for the full resolved configuration.");
        return Ok(());
    }

    print!("{}", redacted_toml(config)?);
    Ok(())
}

/// Render the configuration as TOML with secrets replaced.
fn redacted_toml(config: &ComptoirConfig) -> Result<String, ComptoirError> {
    let mut shown = config.clone();
    if shown.vault.encryption_key.is_some() {
        shown.vault.encryption_key = Some("[redacted]".to_string());
    }
    if shown.llm.api_key.is_some() {
        shown.llm.api_key = Some("[redacted]".to_string());
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| ComptoirError::Internal(format!("failed to render config: {e}")))
}
