// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Ollama LLM Provider Adapter
//
// Anti-Corruption Layer for Ollama local models
// Supports air-gapped deployments with local LLMs. Streaming responses are
// newline-delimited JSON objects, one per generated fragment.

use async_trait::async_trait;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::http::{self, join_url};
use crate::domain::bridge_config::ProviderConfig;
use crate::domain::connector::{Connector, ConnectorBase, RawResponse};
use crate::domain::llm::{
    ChatMessage, ChunkStream, ConfigValidation, LLMError, ModelDescriptor, QueryOptions,
    QueryResponse, StreamChunk, TokenUsage,
};

pub const OLLAMA_DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const OLLAMA_DEFAULT_MODEL: &str = "llama3.2";

pub struct OllamaAdapter {
    base: ConnectorBase,
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    model: Option<String>,
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    done_reason: Option<String>,
    created_at: Option<String>,
    total_duration: Option<u64>,
    eval_count: Option<u32>,
    prompt_eval_count: Option<u32>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
    size: Option<u64>,
    modified_at: Option<String>,
}

impl OllamaResponse {
    fn usage(&self) -> Option<TokenUsage> {
        if self.prompt_eval_count.is_none() && self.eval_count.is_none() {
            return None;
        }
        Some(TokenUsage::new(
            self.prompt_eval_count.unwrap_or(0),
            self.eval_count.unwrap_or(0),
        ))
    }
}

impl OllamaAdapter {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, LLMError> {
        Self::from_config(
            &ProviderConfig::new("ollama")
                .with_base_url(endpoint)
                .with_model(model),
        )
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, LLMError> {
        let base = ConnectorBase::from_config(config);
        Ok(Self {
            client: http::build_client(base.timeout())?,
            endpoint: config
                .base_url
                .clone()
                .unwrap_or_else(|| OLLAMA_DEFAULT_BASE_URL.to_string()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| OLLAMA_DEFAULT_MODEL.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            base,
        })
    }

    fn build_request(&self, options: &QueryOptions, stream: bool) -> Result<(Value, String), LLMError> {
        let messages = options.to_messages()?;
        let model = options.model.clone().unwrap_or_else(|| self.model.clone());

        let temperature = options.temperature.or(self.temperature);
        let num_predict = options.max_tokens.or(self.max_tokens);
        let request = OllamaRequest {
            model: &model,
            messages: &messages,
            stream,
            options: (temperature.is_some() || num_predict.is_some()).then_some(OllamaOptions {
                temperature,
                num_predict,
            }),
        };

        let mut body = serde_json::to_value(&request)
            .map_err(|e| LLMError::InvalidInput(format!("Failed to encode request: {}", e)))?;
        http::merge_extra(&mut body, &options.extra);

        Ok((body, model))
    }

    async fn chat_once(&self, body: &Value, model: &str) -> Result<RawResponse, LLMError> {
        let url = join_url(&self.endpoint, "api/chat");
        let response = http::send(self.client.post(&url).json(body), self.base.timeout()).await?;
        if !response.status().is_success() {
            return Err(http::error_from_response(response, Some(model)).await);
        }

        let ollama_response: OllamaResponse = http::decode_json(response).await?;
        if let Some(error) = &ollama_response.error {
            return Err(LLMError::Provider(error.clone()));
        }

        let mut metadata = Map::new();
        if let Some(created_at) = &ollama_response.created_at {
            metadata.insert("created_at".to_string(), Value::from(created_at.clone()));
        }
        if let Some(total_duration) = ollama_response.total_duration {
            metadata.insert("total_duration".to_string(), Value::from(total_duration));
        }

        Ok(RawResponse {
            usage: ollama_response.usage(),
            model: ollama_response.model,
            content: ollama_response.message.map(|m| m.content),
            finish_reason: ollama_response.done_reason,
            metadata,
        })
    }

    fn tags_url(&self) -> String {
        join_url(&self.endpoint, "api/tags")
    }
}

/// Translate one NDJSON line into a chunk. `None` means nothing to emit.
fn decode_line(
    base: &ConnectorBase,
    line: &[u8],
    fallback_model: &str,
    id: &str,
) -> Result<Option<StreamChunk>, LLMError> {
    let line = std::str::from_utf8(line)
        .map_err(|e| LLMError::Stream(format!("Invalid UTF-8 in stream: {}", e)))?
        .trim();
    if line.is_empty() {
        return Ok(None);
    }

    let parsed: OllamaResponse = serde_json::from_str(line)
        .map_err(|e| LLMError::Stream(format!("Malformed stream line: {}", e)))?;
    if let Some(error) = parsed.error {
        return Err(LLMError::Stream(error));
    }

    let model = parsed.model.unwrap_or_else(|| fallback_model.to_string());
    let content = parsed.message.map(|m| m.content).unwrap_or_default();

    if parsed.done {
        let reason = parsed.done_reason.unwrap_or_else(|| "stop".to_string());
        return Ok(Some(base.chunk(model, content, true, Some(reason), Some(id.to_string()))));
    }
    if content.is_empty() {
        return Ok(None);
    }
    Ok(Some(base.chunk(model, content, false, None, Some(id.to_string()))))
}

#[async_trait]
impl Connector for OllamaAdapter {
    fn provider_name(&self) -> &str {
        self.base.provider()
    }

    async fn query(&self, options: &QueryOptions) -> Result<QueryResponse, LLMError> {
        let (body, model) = self.build_request(options, false)?;

        self.base
            .with_retry(|| self.chat_once(&body, &model))
            .await
            .map(|raw| self.base.standardize_response(raw))
            .inspect_err(|e| {
                self.base.handle_error(e);
            })
    }

    async fn stream_query(&self, options: &QueryOptions) -> Result<ChunkStream, LLMError> {
        let (body, model) = self.build_request(options, true)?;
        let url = join_url(&self.endpoint, "api/chat");

        let response = http::send_streaming(self.client.post(&url).json(&body), self.base.timeout())
            .await
            .inspect_err(|e| {
                self.base.handle_error(e);
            })?;
        if !response.status().is_success() {
            let err = http::error_from_response(response, Some(&model)).await;
            self.base.handle_error(&err);
            return Err(err);
        }

        // Ollama does not tag its stream lines, so every chunk of one
        // response shares a generated id.
        let id = uuid::Uuid::new_v4().to_string();
        let base = self.base.clone();
        let timeout = self.base.timeout();
        let mut bytes = Box::pin(response.bytes_stream());

        let stream = async_stream::try_stream! {
            let mut buffer = BytesMut::new();
            let mut finished = false;

            'read: while let Some(piece) = http::next_within(&mut bytes, timeout).await? {
                let piece = piece.map_err(|e| LLMError::Stream(e.to_string()))?;
                buffer.extend_from_slice(&piece);

                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line = buffer.split_to(pos + 1);
                    if let Some(chunk) = decode_line(&base, &line, &model, &id)? {
                        let done = chunk.done;
                        yield chunk;
                        if done {
                            finished = true;
                            break 'read;
                        }
                    }
                }
            }

            // A final object without a trailing newline
            if !finished && !buffer.is_empty() {
                if let Some(chunk) = decode_line(&base, &buffer, &model, &id)? {
                    finished = chunk.done;
                    yield chunk;
                }
            }

            if !finished {
                debug!(provider = %base.provider(), "Stream closed without completion signal");
                Err::<(), LLMError>(LLMError::Stream(
                    "stream ended before the backend signalled completion".to_string(),
                ))?;
            }
        };

        Ok(Box::pin(stream))
    }

    fn validate_config(&self) -> Result<ConfigValidation, LLMError> {
        let mut errors = Vec::new();

        if self.model.trim().is_empty() {
            errors.push("Ollama model name cannot be empty".to_string());
        }
        http::check_base_url(&self.endpoint, &mut errors);
        http::check_sampling(self.temperature, self.max_tokens, self.base.timeout(), &mut errors);

        Ok(ConfigValidation::from_errors(errors))
    }

    async fn test_connection(&self) -> Result<bool, LLMError> {
        // Check if Ollama server is running by listing models
        let url = self.tags_url();
        match http::send(self.client.get(&url), self.base.timeout()).await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                debug!("Connection probe to {} failed: {}", url, e);
                Ok(false)
            }
        }
    }

    async fn get_models(&self) -> Result<Vec<ModelDescriptor>, LLMError> {
        let response = http::send(self.client.get(self.tags_url()), self.base.timeout()).await?;
        if !response.status().is_success() {
            return Err(http::error_from_response(response, None).await);
        }

        let tags: OllamaTags = http::decode_json(response).await?;
        Ok(tags
            .models
            .into_iter()
            .map(|m| ModelDescriptor {
                id: m.name,
                provider: self.base.provider().to_string(),
                owned_by: Some("ollama".to_string()),
                created: m
                    .modified_at
                    .and_then(|t| chrono::DateTime::parse_from_rfc3339(&t).ok())
                    .map(|t| t.timestamp()),
                size_bytes: m.size,
            })
            .collect())
    }
}
