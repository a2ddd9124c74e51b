// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Provider inspection commands
//!
//! Commands: providers, test, models

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use llm_bridge_core::LLMBridge;

use super::load_bridge;

pub async fn providers(config_path: Option<PathBuf>) -> Result<()> {
    let bridge = load_bridge(config_path)?;
    let stats = bridge.get_stats();

    println!("{}", "LLM Bridge:".bold());
    println!("  Default provider: {}", stats.default_provider);
    println!("  Load balancing: {}", stats.load_balancing);
    println!(
        "  Fallback: {}",
        if stats.enable_fallback { "enabled" } else { "disabled" }
    );
    println!();

    println!("{} ({})", "Providers:".bold(), stats.connector_count);
    if stats.providers.is_empty() {
        println!("  {}", "(none registered)".dimmed());
        return Ok(());
    }

    let validations = bridge.validate_all();
    for name in &stats.providers {
        let marker = if name == &stats.default_provider {
            " (default)".dimmed().to_string()
        } else {
            String::new()
        };

        match validations.get(name) {
            Some(v) if !v.valid => {
                println!("  {} {}{}", "⚠".yellow(), name.bold(), marker);
                for error in &v.errors {
                    println!("      {}", error.yellow());
                }
            }
            _ => println!("  {} {}{}", "✓".green(), name.bold(), marker),
        }
    }

    Ok(())
}

pub async fn test(config_path: Option<PathBuf>) -> Result<()> {
    let bridge = load_bridge(config_path)?;
    if bridge.get_available_providers().is_empty() {
        anyhow::bail!("No providers configured");
    }

    println!("Testing provider connections...");
    let report = bridge.test_all_connections().await;

    let mut connected = 0;
    for name in bridge.get_available_providers() {
        let Some(status) = report.get(&name) else {
            continue;
        };

        if status.connected {
            connected += 1;
            println!("  {} {}", "✓".green(), name);
        } else {
            let reason = status.error.as_deref().unwrap_or("unreachable");
            println!("  {} {} {}", "✗".red(), name, format!("({})", reason).dimmed());
        }
    }

    if connected == 0 {
        anyhow::bail!("No provider is reachable");
    }

    println!(
        "{}",
        format!("✓ {}/{} providers reachable", connected, report.len()).green()
    );
    Ok(())
}

pub async fn models(provider: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let bridge = load_bridge(config_path)?;

    match provider {
        Some(name) => {
            let connector = bridge
                .connector(&name)
                .with_context(|| format!("Provider '{}' is not available or not configured", name))?;
            let models = connector
                .get_models()
                .await
                .with_context(|| format!("Failed to list models for '{}'", name))?;

            print_models(&name, models.iter().map(|m| m.id.as_str()));
        }
        None => print_all_models(&bridge).await,
    }

    Ok(())
}

async fn print_all_models(bridge: &LLMBridge) {
    let listings = bridge.get_all_models().await;

    for name in bridge.get_available_providers() {
        let ids = listings
            .get(&name)
            .map(|models| models.iter().map(|m| m.id.as_str()).collect::<Vec<_>>())
            .unwrap_or_default();
        print_models(&name, ids.into_iter());
    }
}

fn print_models<'a>(provider: &str, ids: impl Iterator<Item = &'a str>) {
    println!("{}", format!("{}:", provider).bold());

    let mut any = false;
    for id in ids {
        any = true;
        println!("  - {}", id);
    }
    if !any {
        println!("  {}", "(no models reported)".dimmed());
    }
}
