// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Shared HTTP plumbing for the adapters: client construction, translation of
// transport failures and non-2xx responses into `LLMError`, and the
// structural checks every adapter's `validate_config` runs.

use futures::{Stream, StreamExt};
use reqwest::{RequestBuilder, Response};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::domain::llm::LLMError;

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, LLMError> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .build()
        .map_err(|e| LLMError::Configuration(format!("Failed to build HTTP client: {}", e)))
}

pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> LLMError {
    if err.is_timeout() {
        LLMError::Timeout(timeout.as_millis() as u64)
    } else if err.is_decode() {
        LLMError::InvalidResponse(err.to_string())
    } else {
        LLMError::Network(err.to_string())
    }
}

/// Send a request whose whole exchange is bounded by `timeout`
pub(crate) async fn send(request: RequestBuilder, timeout: Duration) -> Result<Response, LLMError> {
    request
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| transport_error(e, timeout))
}

/// Send a streaming request. The wait for response headers is bounded by
/// `timeout`; each later body read goes through [`next_within`].
pub(crate) async fn send_streaming(
    request: RequestBuilder,
    timeout: Duration,
) -> Result<Response, LLMError> {
    match tokio::time::timeout(timeout, request.send()).await {
        Ok(result) => result.map_err(|e| transport_error(e, timeout)),
        Err(_) => Err(LLMError::Timeout(timeout.as_millis() as u64)),
    }
}

/// Await the next item of a streaming body, bounded by `timeout`.
/// A backend that goes silent mid-stream surfaces as `LLMError::Timeout`.
pub(crate) async fn next_within<S>(stream: &mut S, timeout: Duration) -> Result<Option<S::Item>, LLMError>
where
    S: Stream + Unpin,
{
    tokio::time::timeout(timeout, stream.next())
        .await
        .map_err(|_| LLMError::Timeout(timeout.as_millis() as u64))
}

/// Translate a non-success response into an error, consuming the body.
///
/// `model` is the model a completion targeted; a 404 on a request without
/// one (model listing) stays a plain HTTP error.
pub(crate) async fn error_from_response(response: Response, model: Option<&str>) -> LLMError {
    let status = response.status();
    let status_text = status.canonical_reason().unwrap_or_default().to_string();
    let body = response.text().await.unwrap_or_default();

    match (status.as_u16(), model) {
        (401 | 403, _) => LLMError::Authentication {
            status: status.as_u16(),
            message: body,
        },
        (404, Some(model)) => LLMError::ModelNotFound(model.to_string()),
        (429, _) => LLMError::RateLimit(body),
        (code, _) => LLMError::Http {
            status: code,
            status_text,
            body,
        },
    }
}

/// Decode a successful JSON response body
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, LLMError> {
    let text = response
        .text()
        .await
        .map_err(|e| LLMError::Network(e.to_string()))?;
    serde_json::from_str(&text)
        .map_err(|e| LLMError::InvalidResponse(format!("Failed to parse response: {}", e)))
}

/// Copy passthrough fields into a request body without clobbering fields the
/// adapter already set
pub(crate) fn merge_extra(body: &mut Value, extra: &Map<String, Value>) {
    if let Value::Object(map) = body {
        for (key, value) in extra {
            map.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

pub(crate) fn check_base_url(base_url: &str, errors: &mut Vec<String>) {
    match url::Url::parse(base_url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        Ok(parsed) => errors.push(format!(
            "base_url must use http or https, got '{}'",
            parsed.scheme()
        )),
        Err(e) => errors.push(format!("base_url '{}' is not a valid URL: {}", base_url, e)),
    }
}

pub(crate) fn check_sampling(
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout: Duration,
    errors: &mut Vec<String>,
) {
    if let Some(t) = temperature {
        if !(0.0..=2.0).contains(&t) {
            errors.push(format!("temperature must be between 0 and 2, got {}", t));
        }
    }
    if max_tokens == Some(0) {
        errors.push("max_tokens must be positive".to_string());
    }
    if timeout.is_zero() {
        errors.push("timeout_ms must be positive".to_string());
    }
}
