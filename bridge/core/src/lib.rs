// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `llm-bridge-core` — Resilient LLM Access
//!
//! Sends generation requests to one of several interchangeable LLM backends
//! behind a uniform connector contract, adding retry, failover, load
//! balancing and streaming on top.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `Connector` trait, `ConnectorBase`, request/response types, `BridgeConfig` |
//! | [`infrastructure`] | Infrastructure | OpenAI, Grok and Ollama adapters, `ConnectorFactory` |
//! | [`application`] | Application | `LLMBridge` orchestrator and `ProviderSelector` |
//!
//! ## Key Concepts
//!
//! - **Connector**: one adapter per backend; retries inside itself with exponential backoff.
//! - **Bridge**: owns the connector registry, picks a provider per call and falls
//!   back to the remaining providers when an unpinned query fails.
//! - **Streaming**: no fallback; a stream that fails after partial output yields
//!   the partial chunks and then the error.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use application::{BridgeStats, ConnectionStatus, LLMBridge};
pub use domain::bridge_config::{BridgeConfig, LoadBalancing, ProviderConfig, ProviderKind};
pub use domain::connector::{Connector, ConnectorBase, ErrorReport, RawResponse};
pub use domain::llm::{
    ChatMessage, ChunkStream, ConfigValidation, LLMError, ModelDescriptor, ProviderFailure,
    QueryOptions, QueryResponse, Role, StreamChunk, TokenUsage,
};
pub use domain::retry::RetryPolicy;
pub use infrastructure::llm::{
    ConnectorFactory, DefaultConnectorFactory, GrokAdapter, OllamaAdapter, OpenAIAdapter,
};
