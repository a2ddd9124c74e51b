// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Wire-level tests for the backend adapters against a mock HTTP server.
//!
//! Covers request shape, response normalization, SSE and NDJSON streaming,
//! HTTP error mapping, model listing and connectivity probes.

use futures::StreamExt;
use llm_bridge_core::{
    Connector, GrokAdapter, LLMError, OllamaAdapter, OpenAIAdapter, ProviderConfig, QueryOptions,
    StreamChunk,
};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn openai_at(server: &ServerGuard) -> OpenAIAdapter {
    OpenAIAdapter::from_config(
        &ProviderConfig::new("openai")
            .with_api_key("sk-test")
            .with_base_url(server.url())
            .with_retry(1, 0),
    )
    .unwrap()
}

fn ollama_at(server: &ServerGuard) -> OllamaAdapter {
    OllamaAdapter::from_config(
        &ProviderConfig::new("ollama")
            .with_base_url(server.url())
            .with_retry(1, 0),
    )
    .unwrap()
}

/// Accept one connection, answer with `first` as the start of a streaming
/// body and then keep the socket open without sending anything else
async fn stalling_backend(content_type: &'static str, first: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 8192];
        let _ = socket.read(&mut request).await;

        let head = format!("HTTP/1.1 200 OK\r\ncontent-type: {}\r\n\r\n", content_type);
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(first.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    format!("http://{}", addr)
}

fn short_timeout(mut config: ProviderConfig) -> ProviderConfig {
    config.timeout_ms = 200;
    config.with_retry(1, 0)
}

async fn drain(adapter: &dyn Connector, options: &QueryOptions) -> Vec<Result<StreamChunk, LLMError>> {
    let stream = match adapter.stream_query(options).await {
        Ok(stream) => stream,
        Err(e) => panic!("stream did not open: {}", e),
    };
    stream.collect().await
}

#[tokio::test]
async fn test_openai_query_normalizes_response() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o-mini",
            "stream": false,
            "messages": [{"role": "user", "content": "hello"}],
            "top_p": 0.5
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "chatcmpl-1",
                "model": "gpt-4o-mini-2024-07-18",
                "created": 1700000000,
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "Hi there"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let response = openai_at(&server)
        .query(&QueryOptions::prompt("hello").with_extra("top_p", json!(0.5)))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.provider, "openai");
    assert_eq!(response.model, "gpt-4o-mini-2024-07-18");
    assert_eq!(response.content, "Hi there");
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    assert_eq!(response.usage.unwrap().total_tokens, 7);
    assert_eq!(response.metadata["id"], "chatcmpl-1");
    assert!(!response.fallback);
}

#[tokio::test]
async fn test_openai_missing_fields_get_defaults() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": []}"#)
        .create_async()
        .await;

    let response = openai_at(&server)
        .query(&QueryOptions::prompt("hello"))
        .await
        .unwrap();

    assert_eq!(response.model, "unknown");
    assert_eq!(response.content, "");
    assert!(response.usage.is_none());
}

#[tokio::test]
async fn test_http_errors_are_mapped_and_retried() {
    let mut server = Server::new_async().await;
    let unauthorized = server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body(r#"{"error": {"message": "Incorrect API key"}}"#)
        .expect(2)
        .create_async()
        .await;

    let adapter = OpenAIAdapter::from_config(
        &ProviderConfig::new("openai")
            .with_api_key("sk-wrong")
            .with_base_url(server.url())
            .with_retry(2, 0),
    )
    .unwrap();

    let err = adapter.query(&QueryOptions::prompt("x")).await.unwrap_err();

    unauthorized.assert_async().await;
    match err {
        LLMError::Authentication { status, message } => {
            assert_eq!(status, 401);
            assert!(message.contains("Incorrect API key"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_status_mapping() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({"model": "missing-model"})))
        .with_status(404)
        .with_body(r#"{"error":"model 'missing-model' not found"}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({"model": "busy-model"})))
        .with_status(429)
        .with_body("slow down")
        .create_async()
        .await;
    server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({"model": "broken-model"})))
        .with_status(503)
        .with_body("overloaded")
        .create_async()
        .await;

    let adapter = ollama_at(&server);
    let query = |model: &str| QueryOptions::prompt("x").with_model(model);

    let err = adapter.query(&query("missing-model")).await.unwrap_err();
    assert!(matches!(err, LLMError::ModelNotFound(ref m) if m == "missing-model"));

    let err = adapter.query(&query("busy-model")).await.unwrap_err();
    assert!(matches!(err, LLMError::RateLimit(_)));
    assert_eq!(err.code(), "RATE_LIMITED");

    let err = adapter.query(&query("broken-model")).await.unwrap_err();
    match err {
        LLMError::Http {
            status,
            status_text,
            body,
        } => {
            assert_eq!(status, 503);
            assert_eq!(status_text, "Service Unavailable");
            assert_eq!(body, "overloaded");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_openai_sse_stream_skips_empty_deltas() {
    let mut server = Server::new_async().await;
    let body = [
        r#"data: {"id":"c1","model":"gpt-4o-mini","choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#,
        r#"data: {"id":"c1","model":"gpt-4o-mini","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#,
        r#"data: {"id":"c1","model":"gpt-4o-mini","choices":[{"index":0,"delta":{"content":"lo"},"finish_reason":null}]}"#,
        r#"data: {"id":"c1","model":"gpt-4o-mini","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
        "data: [DONE]",
    ]
    .map(|line| format!("{}\n\n", line))
    .concat();

    server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({"stream": true})))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let adapter = openai_at(&server);
    let chunks: Vec<StreamChunk> = drain(&adapter, &QueryOptions::prompt("hi"))
        .await
        .into_iter()
        .map(|c| c.unwrap())
        .collect();

    let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec!["Hel", "lo", ""]);
    assert!(chunks[..2].iter().all(|c| !c.done));

    let last = chunks.last().unwrap();
    assert!(last.done);
    assert_eq!(last.finish_reason.as_deref(), Some("stop"));
    assert_eq!(last.provider, "openai");
    assert_eq!(last.id.as_deref(), Some("c1"));
}

#[tokio::test]
async fn test_truncated_sse_stream_ends_with_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(
            "data: {\"model\":\"gpt-4o-mini\",\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n\n",
        )
        .create_async()
        .await;

    let adapter = openai_at(&server);
    let items = drain(&adapter, &QueryOptions::prompt("hi")).await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap().content, "partial");
    assert!(matches!(items[1], Err(LLMError::Stream(_))));
}

#[tokio::test]
async fn test_stream_http_error_surfaces_before_any_chunk() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let result = openai_at(&server).stream_query(&QueryOptions::prompt("hi")).await;

    assert!(matches!(result, Err(LLMError::Http { status: 500, .. })));
}

#[tokio::test]
async fn test_ollama_query() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({
            "model": "llama3.2",
            "stream": false,
            "options": {"num_predict": 16},
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hello"}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "model": "llama3.2",
                "created_at": "2026-01-01T00:00:00Z",
                "message": {"role": "assistant", "content": "hi"},
                "done": true,
                "done_reason": "stop",
                "prompt_eval_count": 11,
                "eval_count": 3
            })
            .to_string(),
        )
        .create_async()
        .await;

    let response = ollama_at(&server)
        .query(
            &QueryOptions::prompt("hello")
                .with_system("be brief")
                .with_max_tokens(16),
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.provider, "ollama");
    assert_eq!(response.content, "hi");
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    assert_eq!(response.usage.unwrap().total_tokens, 14);
    assert_eq!(response.metadata["created_at"], "2026-01-01T00:00:00Z");
}

#[tokio::test]
async fn test_ollama_ndjson_stream() {
    let mut server = Server::new_async().await;
    let body = [
        json!({"model": "llama3.2", "message": {"role": "assistant", "content": "Hel"}, "done": false}),
        json!({"model": "llama3.2", "message": {"role": "assistant", "content": ""}, "done": false}),
        json!({"model": "llama3.2", "message": {"role": "assistant", "content": "lo"}, "done": false}),
        json!({"model": "llama3.2", "message": {"role": "assistant", "content": ""}, "done": true, "done_reason": "stop"}),
    ]
    .map(|line| format!("{}\n", line))
    .concat();

    server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({"stream": true})))
        .with_status(200)
        .with_header("content-type", "application/x-ndjson")
        .with_body(body)
        .create_async()
        .await;

    let adapter = ollama_at(&server);
    let chunks: Vec<StreamChunk> = drain(&adapter, &QueryOptions::prompt("hi"))
        .await
        .into_iter()
        .map(|c| c.unwrap())
        .collect();

    let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec!["Hel", "lo", ""]);
    assert!(chunks[2].done);
    assert_eq!(chunks[2].finish_reason.as_deref(), Some("stop"));

    // one generated id shared by the whole response
    assert!(chunks[0].id.is_some());
    assert!(chunks.iter().all(|c| c.id == chunks[0].id));
}

#[tokio::test]
async fn test_ollama_stream_error_line() {
    let mut server = Server::new_async().await;
    let body = format!(
        "{}\n{}\n",
        json!({"model": "llama3.2", "message": {"role": "assistant", "content": "par"}, "done": false}),
        json!({"error": "out of memory"})
    );
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let adapter = ollama_at(&server);
    let items = drain(&adapter, &QueryOptions::prompt("hi")).await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap().content, "par");
    match &items[1] {
        Err(LLMError::Stream(message)) => assert_eq!(message, "out of memory"),
        other => panic!("unexpected item: {:?}", other),
    }
}

#[tokio::test]
async fn test_model_listing() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/models")
        .match_header("authorization", "Bearer xai-test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "object": "list",
                "data": [
                    {"id": "grok-2-latest", "object": "model", "owned_by": "xai", "created": 1720000000},
                    {"id": "grok-2-mini", "object": "model", "owned_by": "xai"}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "models": [
                    {"name": "llama3.2:latest", "size": 2019393189u64, "modified_at": "2026-02-01T10:00:00Z"}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let grok = GrokAdapter::from_config(
        &ProviderConfig::new("grok")
            .with_api_key("xai-test")
            .with_base_url(server.url()),
    )
    .unwrap();
    let models = grok.get_models().await.unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].id, "grok-2-latest");
    assert_eq!(models[0].provider, "grok");
    assert_eq!(models[0].owned_by.as_deref(), Some("xai"));
    assert_eq!(models[0].created, Some(1720000000));
    assert!(models[1].created.is_none());

    let models = ollama_at(&server).get_models().await.unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].id, "llama3.2:latest");
    assert_eq!(models[0].size_bytes, Some(2019393189));
    assert!(models[0].created.is_some());
}

#[tokio::test]
async fn test_connection_probes() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/models")
        .with_status(401)
        .create_async()
        .await;
    server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(r#"{"models": []}"#)
        .create_async()
        .await;

    assert!(!openai_at(&server).test_connection().await.unwrap());
    assert!(ollama_at(&server).test_connection().await.unwrap());

    // nothing listens on the discard port
    let unreachable = OllamaAdapter::from_config(
        &ProviderConfig::new("ollama")
            .with_base_url("http://127.0.0.1:9")
            .with_retry(1, 0),
    )
    .unwrap();
    assert!(!unreachable.test_connection().await.unwrap());
}

#[tokio::test]
async fn test_silent_sse_backend_times_out_mid_stream() {
    let url = stalling_backend(
        "text/event-stream",
        "data: {\"id\":\"c1\",\"model\":\"gpt-4o-mini\",\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n",
    )
    .await;
    let adapter = OpenAIAdapter::from_config(&short_timeout(
        ProviderConfig::new("openai").with_api_key("sk-test").with_base_url(url),
    ))
    .unwrap();

    let mut stream = adapter.stream_query(&QueryOptions::prompt("hi")).await.unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.content, "hi");

    let second = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("stream kept waiting past the adapter timeout");
    assert!(matches!(second, Some(Err(LLMError::Timeout(200)))));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_silent_ndjson_backend_times_out_mid_stream() {
    let url = stalling_backend(
        "application/x-ndjson",
        "{\"model\":\"llama3.2\",\"message\":{\"role\":\"assistant\",\"content\":\"hi\"},\"done\":false}\n",
    )
    .await;
    let adapter =
        OllamaAdapter::from_config(&short_timeout(ProviderConfig::new("ollama").with_base_url(url)))
            .unwrap();

    let mut stream = adapter.stream_query(&QueryOptions::prompt("hi")).await.unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.content, "hi");

    let second = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("stream kept waiting past the adapter timeout");
    assert!(matches!(second, Some(Err(LLMError::Timeout(200)))));
}

#[tokio::test]
async fn test_oversized_token_counts_saturate() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "model": "llama3.2",
                "message": {"role": "assistant", "content": "ok"},
                "done": true,
                "prompt_eval_count": u32::MAX,
                "eval_count": 1
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "model": "gpt-4o-mini",
                "choices": [{"message": {"role": "assistant", "content": "ok"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": u32::MAX, "completion_tokens": 7}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let response = ollama_at(&server).query(&QueryOptions::prompt("hi")).await.unwrap();
    assert_eq!(response.usage.unwrap().total_tokens, u32::MAX);

    let response = openai_at(&server).query(&QueryOptions::prompt("hi")).await.unwrap();
    assert_eq!(response.usage.unwrap().total_tokens, u32::MAX);
}

#[tokio::test]
async fn test_grok_query_uses_its_defaults() {
    let mut server = Server::new_async().await;
    let completion = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer xai-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "grok-2-latest",
            "stream": false,
            "messages": [{"role": "user", "content": "hello"}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "g-1",
                "model": "grok-2-latest",
                "choices": [{"message": {"role": "assistant", "content": "hey"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let grok = GrokAdapter::from_config(
        &ProviderConfig::new("grok")
            .with_api_key("xai-test")
            .with_base_url(server.url())
            .with_retry(1, 0),
    )
    .unwrap();
    let response = grok.query(&QueryOptions::prompt("hello")).await.unwrap();

    completion.assert_async().await;
    assert_eq!(response.provider, "grok");
    assert_eq!(response.model, "grok-2-latest");
    assert_eq!(response.content, "hey");
    assert_eq!(response.metadata["id"], "g-1");
    assert_eq!(response.usage.unwrap().total_tokens, 7);
}

#[tokio::test]
async fn test_missing_models_endpoint_is_a_plain_http_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/models")
        .with_status(404)
        .with_body("no such route")
        .create_async()
        .await;
    server
        .mock("GET", "/api/tags")
        .with_status(404)
        .create_async()
        .await;

    let err = openai_at(&server).get_models().await.unwrap_err();
    assert!(matches!(err, LLMError::Http { status: 404, .. }), "{:?}", err);
    assert!(!err.to_string().contains("Model not found"));

    let err = ollama_at(&server).get_models().await.unwrap_err();
    assert!(matches!(err, LLMError::Http { status: 404, .. }), "{:?}", err);
}
