// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # LLM Bridge CLI
//!
//! The `llm-bridge` binary loads a bridge configuration, builds the
//! connector registry and exposes the bridge surface for operators.
//!
//! ## Commands
//!
//! - `llm-bridge query|stream <PROMPT>` - Send a completion request
//! - `llm-bridge providers` - Show the registry and selection policy
//! - `llm-bridge test` - Probe every provider
//! - `llm-bridge models` - List backend models
//! - `llm-bridge config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use llm_bridge_cli::commands::{self, ConfigCommand, QueryArgs};

/// LLM Bridge - resilient access to interchangeable LLM backends
#[derive(Parser)]
#[command(name = "llm-bridge")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "LLM_BRIDGE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LLM_BRIDGE_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a prompt and print the completion
    #[command(name = "query")]
    Query {
        #[command(flatten)]
        args: QueryArgs,
    },

    /// Send a prompt and print tokens as they arrive
    #[command(name = "stream")]
    Stream {
        #[command(flatten)]
        args: QueryArgs,
    },

    /// Show registered providers and selection policy
    #[command(name = "providers")]
    Providers,

    /// Test connectivity to every provider
    #[command(name = "test")]
    Test,

    /// List models exposed by the backends
    #[command(name = "models")]
    Models {
        /// Only list models for this provider
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials commonly live in a local .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Query { args }) => commands::query::query(args, cli.config).await,
        Some(Commands::Stream { args }) => commands::query::stream(args, cli.config).await,
        Some(Commands::Providers) => commands::providers::providers(cli.config).await,
        Some(Commands::Test) => commands::providers::test(cli.config).await,
        Some(Commands::Models { provider }) => {
            commands::providers::models(provider, cli.config).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    // stdout carries command output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
