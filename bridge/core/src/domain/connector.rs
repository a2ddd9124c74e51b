// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Connector
//!
//! The capability contract every backend adapter satisfies, plus the shared
//! behaviour adapters embed through [`ConnectorBase`].
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Uniform `query` / `stream_query` / `validate_config` /
//!   `test_connection` / `get_models` surface over heterogeneous backends
//!
//! Every contract method has a default body that fails immediately with
//! [`LLMError::NotImplemented`]. `stream_query` returns the error itself
//! instead of a stream, so a connector that does not override it is caught
//! by a single call without polling anything.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;
use tracing::error;

use super::bridge_config::ProviderConfig;
use super::llm::{
    ChunkStream, ConfigValidation, LLMError, ModelDescriptor, QueryOptions, QueryResponse,
    StreamChunk, TokenUsage,
};
use super::retry::RetryPolicy;

/// Capability interface implemented by each backend adapter
#[async_trait]
pub trait Connector: Send + Sync {
    /// Registered provider name (e.g. "openai", "ollama-local")
    fn provider_name(&self) -> &str;

    /// Perform one logical completion request
    async fn query(&self, _options: &QueryOptions) -> Result<QueryResponse, LLMError> {
        Err(not_implemented(self.provider_name(), "query"))
    }

    /// Open a streaming completion
    async fn stream_query(&self, _options: &QueryOptions) -> Result<ChunkStream, LLMError> {
        Err(not_implemented(self.provider_name(), "stream_query"))
    }

    /// Structural check of the connector's own settings; never does I/O
    fn validate_config(&self) -> Result<ConfigValidation, LLMError> {
        Err(not_implemented(self.provider_name(), "validate_config"))
    }

    /// Minimal round-trip to the backend. Implementations report an
    /// unreachable backend as `Ok(false)`.
    async fn test_connection(&self) -> Result<bool, LLMError> {
        Err(not_implemented(self.provider_name(), "test_connection"))
    }

    /// Models the backend currently exposes
    async fn get_models(&self) -> Result<Vec<ModelDescriptor>, LLMError> {
        Err(not_implemented(self.provider_name(), "get_models"))
    }
}

fn not_implemented(provider: &str, operation: &'static str) -> LLMError {
    LLMError::NotImplemented {
        provider: provider.to_string(),
        operation,
    }
}

/// Backend fields collected by an adapter before normalization.
/// Anything left `None` gets a neutral default.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub model: Option<String>,
    pub content: Option<String>,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<String>,
    pub metadata: Map<String, Value>,
}

/// Structured view of a failure, used for logging and transport mapping.
/// Producing one never consumes the original error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub provider: String,
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Shared state and helpers embedded by every adapter
#[derive(Debug, Clone)]
pub struct ConnectorBase {
    provider: String,
    retry: RetryPolicy,
    timeout: Duration,
}

impl ConnectorBase {
    pub fn new(provider: impl Into<String>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            provider: provider.into(),
            retry,
            timeout,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(
            config.name.clone(),
            RetryPolicy::from_millis(config.retry_attempts, config.retry_delay_ms),
            Duration::from_millis(config.timeout_ms),
        )
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Retry `operation` with the configured attempt count and backoff
    pub async fn with_retry<F, Fut, T>(&self, operation: F) -> Result<T, LLMError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LLMError>>,
    {
        self.retry.execute(operation).await
    }

    /// Retry `operation` with an explicit attempt count
    pub async fn with_retry_attempts<F, Fut, T>(
        &self,
        attempts: u32,
        operation: F,
    ) -> Result<T, LLMError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LLMError>>,
    {
        self.retry.execute_with(attempts, operation).await
    }

    /// Map collected backend fields into the uniform response shape
    pub fn standardize_response(&self, raw: RawResponse) -> QueryResponse {
        QueryResponse {
            provider: self.provider.clone(),
            model: raw.model.unwrap_or_else(|| "unknown".to_string()),
            content: raw.content.unwrap_or_default(),
            usage: raw.usage,
            finish_reason: raw.finish_reason,
            metadata: raw.metadata,
            timestamp: Utc::now(),
            fallback: false,
            original_provider: None,
        }
    }

    /// Build a chunk attributed to this provider
    pub fn chunk(
        &self,
        model: impl Into<String>,
        content: impl Into<String>,
        done: bool,
        finish_reason: Option<String>,
        id: Option<String>,
    ) -> StreamChunk {
        StreamChunk {
            provider: self.provider.clone(),
            model: model.into(),
            content: content.into(),
            done,
            finish_reason,
            id,
        }
    }

    /// Log a failure in structured form and return the report.
    /// The caller still propagates `error`.
    pub fn handle_error(&self, error: &LLMError) -> ErrorReport {
        let (status_text, body) = match error {
            LLMError::Http {
                status_text, body, ..
            } => (Some(status_text.clone()), Some(body.clone())),
            LLMError::Authentication { message, .. } => (None, Some(message.clone())),
            _ => (None, None),
        };

        let report = ErrorReport {
            provider: self.provider.clone(),
            message: error.to_string(),
            code: error.code().to_string(),
            status: error.status(),
            status_text,
            body,
        };

        error!(
            provider = %report.provider,
            code = %report.code,
            status = ?report.status,
            "Connector request failed: {}",
            report.message
        );

        report
    }
}

/// The bare contract: nothing overridden, every operation fails fast
#[async_trait]
impl Connector for ConnectorBase {
    fn provider_name(&self) -> &str {
        &self.provider
    }
}
