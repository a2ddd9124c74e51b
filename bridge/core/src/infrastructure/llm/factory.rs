// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Connector Factory - Provider Config to Adapter Instance
//
// The bridge builds its registry through this seam, so hosts and tests can
// substitute their own connectors without touching selection or fallback.

use std::sync::Arc;

use super::grok::GrokAdapter;
use super::ollama::OllamaAdapter;
use super::openai::OpenAIAdapter;
use crate::domain::bridge_config::{ProviderConfig, ProviderKind};
use crate::domain::connector::Connector;
use crate::domain::llm::LLMError;

/// Builds one connector from one provider entry
pub trait ConnectorFactory: Send + Sync {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn Connector>, LLMError>;
}

/// Dispatches on the provider kind to the built-in adapters
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConnectorFactory;

impl ConnectorFactory for DefaultConnectorFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn Connector>, LLMError> {
        let kind = config.resolved_kind().ok_or_else(|| {
            LLMError::Configuration(format!(
                "Unsupported provider type for '{}'",
                config.name
            ))
        })?;

        let connector: Arc<dyn Connector> = match kind {
            ProviderKind::OpenAI => Arc::new(OpenAIAdapter::from_config(config)?),
            ProviderKind::Grok => Arc::new(GrokAdapter::from_config(config)?),
            ProviderKind::Ollama => Arc::new(OllamaAdapter::from_config(config)?),
        };

        Ok(connector)
    }
}
