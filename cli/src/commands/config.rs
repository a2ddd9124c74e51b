// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use llm_bridge_core::domain::bridge_config::CONFIG_PATH_ENV;
use llm_bridge_core::BridgeConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./llm-bridge.yaml)
        #[arg(short, long, default_value = "./llm-bridge.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = BridgeConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./llm-bridge.yaml");
        println!("  4. ~/.llm-bridge/config.yaml");
        println!("  5. /etc/llm-bridge/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Selection:".bold());
    println!("  Default provider: {}", config.default_provider);
    println!("  Load balancing: {}", config.load_balancing);
    println!("  Fallback: {}", config.enable_fallback);
    println!();

    println!("{}", "Providers:".bold());
    if config.providers.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for provider in &config.providers {
        let kind = provider
            .resolved_kind()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let state = if provider.enabled {
            "enabled".green()
        } else {
            "disabled".dimmed()
        };

        println!("  {} ({}, {})", provider.name.bold(), kind, state);
        if let Some(base_url) = &provider.base_url {
            println!("    Endpoint: {}", base_url);
        }
        if let Some(model) = &provider.model {
            println!("    Model: {}", model);
        }
        if let Some(api_key) = &provider.api_key {
            println!("    API key: {}", mask_key(api_key));
        }
        println!(
            "    Retry: {} attempts, {} ms base delay; timeout {} ms",
            provider.retry_attempts, provider.retry_delay_ms, provider.timeout_ms
        );
    }
    println!();

    Ok(())
}

/// Show `env:` references as-is, hide literal secrets
fn mask_key(key: &str) -> String {
    if key.starts_with("env:") {
        key.to_string()
    } else if key.len() > 8 {
        format!("{}…", key.chars().take(4).collect::<String>())
    } else {
        "****".to_string()
    }
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = BridgeConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
