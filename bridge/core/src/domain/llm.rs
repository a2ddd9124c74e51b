// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Llm
//!
//! Provider-neutral request, response and streaming types shared by every
//! connector and by the bridge.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Uniform call shape that hides each backend's native format

// LLM Domain Types (Anti-Corruption Layer)
//
// Adapters translate these into their native payloads and back. Nothing in
// this file knows about HTTP or any vendor API.

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::pin::Pin;

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Options for a single generation request
///
/// Exactly one of `prompt` / `messages` carries the input. When both are
/// set, `messages` is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Single-turn prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Full conversation history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,

    /// Pin the request to a registered provider (disables fallback)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Backend-specific model identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Optional system instruction placed before the conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Sampling temperature (backends accept 0.0 - 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Backend-specific passthrough fields merged into the native request
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QueryOptions {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Default::default()
        }
    }

    pub fn messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages: Some(messages),
            ..Default::default()
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Check that the request carries an input
    pub fn validate(&self) -> Result<(), LLMError> {
        let has_messages = self.messages.as_ref().is_some_and(|m| !m.is_empty());
        let has_prompt = self.prompt.is_some();

        if !has_messages && !has_prompt {
            return Err(LLMError::InvalidInput(
                "either prompt or messages must be provided".to_string(),
            ));
        }

        if let Some(max_tokens) = self.max_tokens {
            if max_tokens == 0 {
                return Err(LLMError::InvalidInput(
                    "max_tokens must be a positive integer".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Conversation to send, with the system instruction (if any) first.
    ///
    /// A bare prompt becomes a single user turn.
    pub fn to_messages(&self) -> Result<Vec<ChatMessage>, LLMError> {
        self.validate()?;

        let mut conversation = Vec::new();
        if let Some(system) = &self.system {
            conversation.push(ChatMessage::system(system.clone()));
        }

        if let Some(messages) = self.messages.as_ref().filter(|m| !m.is_empty()) {
            conversation.extend(messages.iter().cloned());
        } else if let Some(prompt) = &self.prompt {
            conversation.push(ChatMessage::user(prompt.clone()));
        }

        Ok(conversation)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Normalized completion returned by every connector
///
/// Built only through `ConnectorBase::standardize_response`, never from a
/// raw backend payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Registered provider name that produced the content
    pub provider: String,

    /// Model reported by the backend ("unknown" when absent)
    pub model: String,

    /// Generated text
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    pub timestamp: DateTime<Utc>,

    /// Set when the response came from a provider other than the one first selected
    #[serde(default)]
    pub fallback: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_provider: Option<String>,
}

/// One incremental piece of a streamed completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub provider: String,
    pub model: String,
    pub content: String,

    /// Terminal flag; the last chunk of a successful stream has `done == true`
    pub done: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Finite, single-pass sequence of chunks. Errors are yielded in place.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, LLMError>> + Send>>;

/// Model exposed by a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// Outcome of a structural configuration check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ConfigValidation {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// A provider that failed during a fallback sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub code: String,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(provider: impl Into<String>, error: &LLMError) -> Self {
        Self {
            provider: provider.into(),
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

fn summarize_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.provider, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("{operation} is not implemented by connector '{provider}'")]
    NotImplemented {
        provider: String,
        operation: &'static str,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("no providers available: provider \"{default_provider}\" is not available or not configured")]
    NoProviders { default_provider: String },

    #[error("provider \"{0}\" is not available or not configured")]
    ProviderUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Authentication failed (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("HTTP {status} {status_text}: {body}")]
    Http {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("all providers failed to respond ({})", summarize_failures(.failures))]
    AllProvidersFailed { failures: Vec<ProviderFailure> },
}

impl LLMError {
    /// Stable machine-readable code for transport layers
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotImplemented { .. } => "NOT_IMPLEMENTED",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::NoProviders { .. } => "NO_PROVIDERS",
            Self::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Authentication { .. } => "AUTHENTICATION_ERROR",
            Self::RateLimit(_) => "RATE_LIMITED",
            Self::ModelNotFound(_) => "MODEL_NOT_FOUND",
            Self::Http { .. } => "HTTP_ERROR",
            Self::InvalidResponse(_) => "INVALID_RESPONSE",
            Self::Stream(_) => "STREAM_ERROR",
            Self::AllProvidersFailed { .. } => "ALL_PROVIDERS_FAILED",
            Self::Provider(_) => "UNKNOWN_ERROR",
        }
    }

    /// HTTP status carried by the underlying transport failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Http { status, .. } => Some(*status),
            Self::RateLimit(_) => Some(429),
            Self::ModelNotFound(_) => Some(404),
            _ => None,
        }
    }

    /// Errors caused by how the bridge or connector is set up rather than by
    /// a backend call
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::NotImplemented { .. }
                | Self::Configuration(_)
                | Self::NoProviders { .. }
                | Self::ProviderUnavailable(_)
                | Self::InvalidInput(_)
        )
    }
}
