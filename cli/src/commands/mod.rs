// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the LLM Bridge CLI

pub mod config;
pub mod providers;
pub mod query;

pub use self::config::ConfigCommand;
pub use self::query::QueryArgs;

use anyhow::{Context, Result};
use std::path::PathBuf;

use llm_bridge_core::{BridgeConfig, LLMBridge};

/// Load, validate and build the bridge the way every command needs it
pub fn load_bridge(config_path: Option<PathBuf>) -> Result<LLMBridge> {
    let config = BridgeConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    Ok(LLMBridge::new(Some(config)))
}
