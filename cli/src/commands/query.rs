// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Completion commands
//!
//! Commands: query, stream

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

use llm_bridge_core::{QueryOptions, QueryResponse};

use super::load_bridge;

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Prompt text
    #[arg(value_name = "PROMPT")]
    pub prompt: String,

    /// Pin the request to one provider (disables fallback)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Model override
    #[arg(short, long)]
    pub model: Option<String>,

    /// Sampling temperature (0.0 - 2.0)
    #[arg(short, long)]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// System instruction
    #[arg(short, long)]
    pub system: Option<String>,

    /// Print the raw response as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryArgs {
    pub fn to_options(&self) -> QueryOptions {
        QueryOptions {
            prompt: Some(self.prompt.clone()),
            provider: self.provider.clone(),
            model: self.model.clone(),
            system: self.system.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..Default::default()
        }
    }
}

pub async fn query(args: QueryArgs, config_path: Option<PathBuf>) -> Result<()> {
    let bridge = load_bridge(config_path)?;

    let response = bridge
        .query(&args.to_options())
        .await
        .context("Query failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", response.content);
        println!();
        println!("{}", summary(&response).dimmed());
    }

    Ok(())
}

fn summary(response: &QueryResponse) -> String {
    let mut line = format!("{} / {}", response.provider, response.model);
    if let Some(usage) = &response.usage {
        line.push_str(&format!(
            " - {} tokens ({} prompt, {} completion)",
            usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
        ));
    }
    if let Some(original) = &response.original_provider {
        line.push_str(&format!(" - fallback from {}", original));
    }
    line
}

pub async fn stream(args: QueryArgs, config_path: Option<PathBuf>) -> Result<()> {
    let bridge = load_bridge(config_path)?;

    let mut chunks = bridge
        .stream_query(&args.to_options())
        .await
        .context("Failed to open stream")?;

    let mut stdout = std::io::stdout();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.context("Stream interrupted")?;

        if args.json {
            println!("{}", serde_json::to_string(&chunk)?);
            continue;
        }

        print!("{}", chunk.content);
        stdout.flush()?;

        if chunk.done {
            info!(
                "Stream finished ({})",
                chunk.finish_reason.as_deref().unwrap_or("stop")
            );
            println!();
        }
    }

    Ok(())
}
