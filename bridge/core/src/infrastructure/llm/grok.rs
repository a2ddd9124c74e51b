// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Grok (xAI) LLM Provider Adapter
//
// xAI serves the OpenAI chat-completions wire shape, so this adapter only
// differs from `OpenAIAdapter` in endpoint, default model and credential
// lookup.

use async_trait::async_trait;

use super::chat_completions::{build_request, ChatCompletionsClient, ChatDefaults};
use super::http;
use crate::domain::bridge_config::ProviderConfig;
use crate::domain::connector::{Connector, ConnectorBase};
use crate::domain::llm::{
    ChunkStream, ConfigValidation, LLMError, ModelDescriptor, QueryOptions, QueryResponse,
};

pub const GROK_DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";
pub const GROK_DEFAULT_MODEL: &str = "grok-2-latest";

pub struct GrokAdapter {
    base: ConnectorBase,
    client: ChatCompletionsClient,
    defaults: ChatDefaults,
}

impl GrokAdapter {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, LLMError> {
        let base = ConnectorBase::from_config(config);
        let client = ChatCompletionsClient::new(
            config
                .base_url
                .clone()
                .unwrap_or_else(|| GROK_DEFAULT_BASE_URL.to_string()),
            config.resolve_api_key()?,
            None,
            base.timeout(),
        )?;

        Ok(Self {
            defaults: ChatDefaults {
                model: config
                    .model
                    .clone()
                    .unwrap_or_else(|| GROK_DEFAULT_MODEL.to_string()),
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
            base,
            client,
        })
    }
}

#[async_trait]
impl Connector for GrokAdapter {
    fn provider_name(&self) -> &str {
        self.base.provider()
    }

    async fn query(&self, options: &QueryOptions) -> Result<QueryResponse, LLMError> {
        let (body, model) = build_request(options, &self.defaults, false)?;

        self.base
            .with_retry(|| self.client.complete(&body, &model))
            .await
            .map(|raw| self.base.standardize_response(raw))
            .inspect_err(|e| {
                self.base.handle_error(e);
            })
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
            errors.push("Grok API key is required (set api_key or XAI_API_KEY)".to_string());
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
