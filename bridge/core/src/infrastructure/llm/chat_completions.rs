// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI-style Chat Completions Protocol
//
// Wire format shared by the OpenAI and Grok adapters: bearer auth,
// `POST /chat/completions`, SSE streaming terminated by `data: [DONE]`, and
// `GET /models` for listing and connectivity probes.

use eventsource_stream::Eventsource;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use super::http::{self, join_url};
use crate::domain::connector::{ConnectorBase, RawResponse};
use crate::domain::llm::{
    ChatMessage, ChunkStream, LLMError, ModelDescriptor, QueryOptions, TokenUsage,
};

/// Values used when a request leaves them unset
#[derive(Debug, Clone)]
pub(crate) struct ChatDefaults {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    id: Option<String>,
    model: Option<String>,
    created: Option<i64>,
    system_fingerprint: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    total_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct StreamEvent {
    id: Option<String>,
    model: Option<String>,
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
    owned_by: Option<String>,
    created: Option<i64>,
}

/// Build the native request body for `options`. Returns the body and the
/// model it targets.
pub(crate) fn build_request(
    options: &QueryOptions,
    defaults: &ChatDefaults,
    stream: bool,
) -> Result<(Value, String), LLMError> {
    let messages = options.to_messages()?;
    let model = options
        .model
        .clone()
        .unwrap_or_else(|| defaults.model.clone());

    let request = ChatRequest {
        model: &model,
        messages: &messages,
        stream,
        max_tokens: options.max_tokens.or(defaults.max_tokens),
        temperature: options.temperature.or(defaults.temperature),
    };

    let mut body = serde_json::to_value(&request)
        .map_err(|e| LLMError::InvalidInput(format!("Failed to encode request: {}", e)))?;
    http::merge_extra(&mut body, &options.extra);

    Ok((body, model))
}

/// HTTP client for one chat-completions endpoint
pub(crate) struct ChatCompletionsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    organization: Option<String>,
    timeout: Duration,
}

impl ChatCompletionsClient {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        organization: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LLMError> {
        Ok(Self {
            client: http::build_client(timeout)?,
            base_url,
            api_key,
            organization,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    fn authorize(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(org) = &self.organization {
            request = request.header("OpenAI-Organization", org);
        }
        request
    }

    /// One non-streaming completion
    pub async fn complete(&self, body: &Value, model: &str) -> Result<RawResponse, LLMError> {
        let url = join_url(&self.base_url, "chat/completions");
        let request = self.authorize(self.client.post(&url)).json(body);

        let response = http::send(request, self.timeout).await?;
        if !response.status().is_success() {
            return Err(http::error_from_response(response, Some(model)).await);
        }

        let completion: ChatResponse = http::decode_json(response).await?;

        let mut metadata = Map::new();
        if let Some(id) = completion.id {
            metadata.insert("id".to_string(), Value::from(id));
        }
        if let Some(created) = completion.created {
            metadata.insert("created".to_string(), Value::from(created));
        }
        if let Some(fingerprint) = completion.system_fingerprint {
            metadata.insert("system_fingerprint".to_string(), Value::from(fingerprint));
        }

        let first = completion.choices.into_iter().next();
        let finish_reason = first.as_ref().and_then(|c| c.finish_reason.clone());
        let content = first.and_then(|c| c.message).and_then(|m| m.content);

        Ok(RawResponse {
            model: completion.model,
            content,
            usage: completion.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u
                    .total_tokens
                    .unwrap_or(u.prompt_tokens.saturating_add(u.completion_tokens)),
            }),
            finish_reason,
            metadata,
        })
    }

    /// Open an SSE completion stream. HTTP failures surface here; anything
    /// after the headers arrives as an `Err` item in the stream.
    pub async fn stream(
        &self,
        base: &ConnectorBase,
        body: &Value,
        model: String,
    ) -> Result<ChunkStream, LLMError> {
        let url = join_url(&self.base_url, "chat/completions");
        let request = self
            .authorize(self.client.post(&url))
            .header("Accept", "text/event-stream")
            .json(body);

        let response = http::send_streaming(request, self.timeout).await?;
        if !response.status().is_success() {
            return Err(http::error_from_response(response, Some(&model)).await);
        }

        let base = base.clone();
        let timeout = self.timeout;
        let mut events = Box::pin(response.bytes_stream().eventsource());

        let stream = async_stream::try_stream! {
            let mut finished = false;

            'events: while let Some(event) = http::next_within(&mut events, timeout).await? {
                let event = event.map_err(|e| LLMError::Stream(e.to_string()))?;
                let data = event.data.trim();

                if data.is_empty() {
                    continue;
                }
                if data == "[DONE]" {
                    if !finished {
                        finished = true;
                        yield base.chunk(model.clone(), "", true, Some("stop".to_string()), None);
                    }
                    break;
                }

                let parsed: StreamEvent = serde_json::from_str(data)
                    .map_err(|e| LLMError::Stream(format!("Malformed stream event: {}", e)))?;
                let chunk_model = parsed.model.unwrap_or_else(|| model.clone());

                for choice in parsed.choices {
                    let content = choice.delta.content.unwrap_or_default();
                    if let Some(reason) = choice.finish_reason {
                        finished = true;
                        yield base.chunk(chunk_model.clone(), content, true, Some(reason), parsed.id.clone());
                        break 'events;
                    }
                    if !content.is_empty() {
                        yield base.chunk(chunk_model.clone(), content, false, None, parsed.id.clone());
                    }
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

    pub async fn list_models(&self, provider: &str) -> Result<Vec<ModelDescriptor>, LLMError> {
        let url = join_url(&self.base_url, "models");
        let response = http::send(self.authorize(self.client.get(&url)), self.timeout).await?;
        if !response.status().is_success() {
            return Err(http::error_from_response(response, None).await);
        }

        let list: ModelList = http::decode_json(response).await?;
        Ok(list
            .data
            .into_iter()
            .map(|m| ModelDescriptor {
                id: m.id,
                provider: provider.to_string(),
                owned_by: m.owned_by,
                created: m.created,
                size_bytes: None,
            })
            .collect())
    }

    /// Lightweight `GET /models`; any failure reads as unreachable
    pub async fn probe(&self) -> bool {
        let url = join_url(&self.base_url, "models");
        match http::send(self.authorize(self.client.get(&url)), self.timeout).await {
            Ok(response) => {
                let ok = response.status().is_success();
                if !ok {
                    debug!("Connection probe to {} returned {}", url, response.status());
                }
                ok
            }
            Err(e) => {
                debug!("Connection probe to {} failed: {}", url, e);
                false
            }
        }
    }
}
