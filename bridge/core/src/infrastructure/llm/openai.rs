// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI LLM Provider Adapter
//
// Anti-Corruption Layer for the OpenAI Chat Completions API.
// Also works with OpenAI-compatible APIs (LM Studio, vLLM, etc.) through
// `base_url`.

use async_trait::async_trait;

use super::chat_completions::{build_request, ChatCompletionsClient, ChatDefaults};
use super::http;
use crate::domain::bridge_config::ProviderConfig;
use crate::domain::connector::{Connector, ConnectorBase};
use crate::domain::llm::{
    ChunkStream, ConfigValidation, LLMError, ModelDescriptor, QueryOptions, QueryResponse,
};

pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

pub struct OpenAIAdapter {
    base: ConnectorBase,
    client: ChatCompletionsClient,
    defaults: ChatDefaults,
}

impl OpenAIAdapter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LLMError> {
        Self::from_config(
            &ProviderConfig::new("openai")
                .with_api_key(api_key)
                .with_model(model),
        )
    }

    /// Build from provider settings. A missing API key is accepted here and
    /// reported by `validate_config`; an unresolvable `env:` reference is not.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, LLMError> {
        let base = ConnectorBase::from_config(config);
        let client = ChatCompletionsClient::new(
            config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_BASE_URL.to_string()),
            config.resolve_api_key()?,
            config.organization.clone(),
            base.timeout(),
        )?;

        Ok(Self {
            defaults: ChatDefaults {
                model: config
                    .model
                    .clone()
                    .unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
            base,
            client,
        })
    }

    pub fn default_model(&self) -> &str {
        &self.defaults.model
    }
}

#[async_trait]
impl Connector for OpenAIAdapter {
    fn provider_name(&self) -> &str {
        self.base.provider()
    }

    async fn query(&self, options: &QueryOptions) -> Result<QueryResponse, LLMError> {
        let (body, model) = build_request(options, &self.defaults, false)?;

        let result = self
            .base
            .with_retry(|| self.client.complete(&body, &model))
            .await;

        match result {
            Ok(raw) => Ok(self.base.standardize_response(raw)),
            Err(e) => {
                self.base.handle_error(&e);
                Err(e)
            }
        }
    }

    async fn stream_query(&self, options: &QueryOptions) -> Result<ChunkStream, LLMError> {
        let (body, model) = build_request(options, &self.defaults, true)?;

        self.client
            .stream(&self.base, &body, model)
            .await
            .inspect_err(|e| {
                self.base.handle_error(e);
            })
    }

    fn validate_config(&self) -> Result<ConfigValidation, LLMError> {
        let mut errors = Vec::new();

        if !self.client.has_api_key() {
            errors.push("OpenAI API key is required".to_string());
        }
        http::check_base_url(self.client.base_url(), &mut errors);
        http::check_sampling(
            self.defaults.temperature,
            self.defaults.max_tokens,
            self.base.timeout(),
            &mut errors,
        );

        Ok(ConfigValidation::from_errors(errors))
    }

    async fn test_connection(&self) -> Result<bool, LLMError> {
        Ok(self.client.probe().await)
    }

    async fn get_models(&self) -> Result<Vec<ModelDescriptor>, LLMError> {
        self.client.list_models(self.base.provider()).await
    }
}
