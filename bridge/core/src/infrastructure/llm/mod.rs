// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each adapter translates between the `Connector` contract and one backend's
// HTTP API. OpenAI and Grok share the chat-completions wire client.

mod chat_completions;
mod http;

pub mod factory;
pub mod grok;
pub mod ollama;
pub mod openai;

pub use factory::{ConnectorFactory, DefaultConnectorFactory};
pub use grok::GrokAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAIAdapter;
