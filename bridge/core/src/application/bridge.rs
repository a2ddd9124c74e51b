// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Bridge - Provider Registry, Selection and Failover
//
// Owns one connector per enabled provider and decides which one serves each
// call. The registry is built once at construction and never mutated; the
// selector's round-robin cursor is the only shared mutable state.
//
// Failure handling:
// - empty registry / unknown provider: fail fast, no backend call
// - backend failure on an unpinned query: try the remaining providers in
//   registry order when fallback is enabled
// - streams: never fall back

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::selector::ProviderSelector;
use crate::domain::bridge_config::{BridgeConfig, LoadBalancing};
use crate::domain::connector::Connector;
use crate::domain::llm::{
    ChunkStream, ConfigValidation, LLMError, ModelDescriptor, ProviderFailure, QueryOptions,
    QueryResponse,
};
use crate::infrastructure::llm::{ConnectorFactory, DefaultConnectorFactory};

/// Result of probing one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Read-only snapshot of the bridge's registry and policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeStats {
    pub connector_count: usize,
    pub providers: Vec<String>,
    pub default_provider: String,
    pub load_balancing: LoadBalancing,
    pub enable_fallback: bool,
}

pub struct LLMBridge {
    config: BridgeConfig,
    connectors: HashMap<String, Arc<dyn Connector>>,
    /// Registry order (config order of successfully built connectors)
    order: Vec<String>,
    selector: ProviderSelector,
}

impl LLMBridge {
    /// Build the bridge with the built-in adapters. `None` means no providers.
    pub fn new(config: Option<BridgeConfig>) -> Self {
        Self::with_factory(config, &DefaultConnectorFactory)
    }

    pub fn with_factory(config: Option<BridgeConfig>, factory: &dyn ConnectorFactory) -> Self {
        let mut bridge = Self::empty(config.unwrap_or_default());
        bridge.initialize_connectors(factory);
        bridge
    }

    /// Register already-built connectors in the given order. The config's
    /// provider list is ignored; its selection and fallback settings apply.
    pub fn from_connectors(
        config: Option<BridgeConfig>,
        connectors: Vec<(String, Arc<dyn Connector>)>,
    ) -> Self {
        let mut bridge = Self::empty(config.unwrap_or_default());
        for (name, connector) in connectors {
            bridge.register(name, connector);
        }
        bridge
    }

    fn empty(config: BridgeConfig) -> Self {
        Self {
            config,
            connectors: HashMap::new(),
            order: Vec::new(),
            selector: ProviderSelector::new(),
        }
    }

    fn register(&mut self, name: String, connector: Arc<dyn Connector>) {
        if self.connectors.contains_key(&name) {
            warn!("Provider '{}' registered twice, keeping the first", name);
            return;
        }
        self.order.push(name.clone());
        self.connectors.insert(name, connector);
    }

    fn initialize_connectors(&mut self, factory: &dyn ConnectorFactory) {
        info!("Initializing LLM bridge connectors");

        let providers = self.config.providers.clone();
        for provider_config in &providers {
            if !provider_config.enabled {
                info!("Provider '{}' disabled, skipping", provider_config.name);
                continue;
            }

            match factory.create(provider_config) {
                Ok(connector) => {
                    info!("Initialized provider: {}", provider_config.name);
                    self.register(provider_config.name.clone(), connector);
                }
                Err(e) => {
                    warn!("Failed to initialize provider '{}': {}", provider_config.name, e);
                    // Continue with other providers
                }
            }
        }

        if self.order.is_empty() {
            warn!("No LLM providers configured - queries will fail until one is added");
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Name of the provider an unpinned call would use. Never fails; with an
    /// empty registry this is the configured default.
    pub fn select_provider(&self) -> String {
        self.selector.select(
            &self.order,
            &self.config.default_provider,
            self.config.load_balancing,
        )
    }

    fn resolve(&self, options: &QueryOptions) -> Result<(String, Arc<dyn Connector>), LLMError> {
        if self.order.is_empty() {
            return Err(LLMError::NoProviders {
                default_provider: self.config.default_provider.clone(),
            });
        }

        let name = match &options.provider {
            Some(provider) => provider.clone(),
            None => self.select_provider(),
        };
        let connector = self
            .connectors
            .get(&name)
            .cloned()
            .ok_or_else(|| LLMError::ProviderUnavailable(name.clone()))?;

        Ok((name, connector))
    }

    /// Send one completion request, falling back to other providers when the
    /// selected one fails and the caller did not pin a provider
    pub async fn query(&self, options: &QueryOptions) -> Result<QueryResponse, LLMError> {
        options.validate()?;
        let (name, connector) = self.resolve(options)?;

        debug!("Dispatching query to provider: {}", name);
        match connector.query(options).await {
            Ok(response) => Ok(response),
            Err(e) if self.should_fall_back(options) => {
                warn!("Provider '{}' failed: {}. Trying fallback providers", name, e);
                let failures = vec![ProviderFailure::new(&name, &e)];
                self.fallback_sweep(options, &name, failures).await
            }
            Err(e) => Err(e),
        }
    }

    fn should_fall_back(&self, options: &QueryOptions) -> bool {
        self.config.enable_fallback && options.provider.is_none() && self.order.len() > 1
    }

    /// Try every registered provider except `exclude_provider`, in registry
    /// order, and return the first success annotated as a fallback response
    pub async fn query_with_fallback(
        &self,
        options: &QueryOptions,
        exclude_provider: &str,
    ) -> Result<QueryResponse, LLMError> {
        options.validate()?;
        self.fallback_sweep(options, exclude_provider, Vec::new())
            .await
    }

    async fn fallback_sweep(
        &self,
        options: &QueryOptions,
        exclude_provider: &str,
        mut failures: Vec<ProviderFailure>,
    ) -> Result<QueryResponse, LLMError> {
        for name in self.order.iter().filter(|n| n.as_str() != exclude_provider) {
            let Some(connector) = self.connectors.get(name) else {
                continue;
            };

            info!("Trying fallback provider: {}", name);
            match connector.query(options).await {
                Ok(mut response) => {
                    response.fallback = true;
                    response.original_provider = Some(exclude_provider.to_string());
                    response.provider = name.clone();
                    return Ok(response);
                }
                Err(e) => {
                    warn!("Fallback provider '{}' failed: {}", name, e);
                    failures.push(ProviderFailure::new(name, &e));
                }
            }
        }

        Err(LLMError::AllProvidersFailed { failures })
    }

    /// Open a token stream on the resolved provider. No fallback is attempted,
    /// neither before the first chunk nor mid-stream.
    pub async fn stream_query(&self, options: &QueryOptions) -> Result<ChunkStream, LLMError> {
        options.validate()?;
        let (name, connector) = self.resolve(options)?;

        debug!("Dispatching stream to provider: {}", name);
        connector.stream_query(options).await
    }

    /// Probe every provider concurrently
    pub async fn test_all_connections(&self) -> HashMap<String, ConnectionStatus> {
        let probes = self.order.iter().map(|name| async move {
            let status = match self.connectors[name].test_connection().await {
                Ok(connected) => ConnectionStatus {
                    connected,
                    error: None,
                },
                Err(e) => {
                    warn!("Connection test for '{}' failed: {}", name, e);
                    ConnectionStatus {
                        connected: false,
                        error: Some(e.to_string()),
                    }
                }
            };
            (name.clone(), status)
        });

        join_all(probes).await.into_iter().collect()
    }

    /// List models from every provider concurrently; a failing provider maps
    /// to an empty list
    pub async fn get_all_models(&self) -> HashMap<String, Vec<ModelDescriptor>> {
        let listings = self.order.iter().map(|name| async move {
            let models = self.connectors[name]
                .get_models()
                .await
                .unwrap_or_else(|e| {
                    warn!("Failed to list models for '{}': {}", name, e);
                    Vec::new()
                });
            (name.clone(), models)
        });

        join_all(listings).await.into_iter().collect()
    }

    /// Run every connector's structural config check
    pub fn validate_all(&self) -> HashMap<String, ConfigValidation> {
        self.order
            .iter()
            .map(|name| {
                let validation = self.connectors[name]
                    .validate_config()
                    .unwrap_or_else(|e| ConfigValidation::from_errors(vec![e.to_string()]));
                (name.clone(), validation)
            })
            .collect()
    }

    pub fn get_stats(&self) -> BridgeStats {
        BridgeStats {
            connector_count: self.order.len(),
            providers: self.order.clone(),
            default_provider: self.config.default_provider.clone(),
            load_balancing: self.config.load_balancing,
            enable_fallback: self.config.enable_fallback,
        }
    }

    /// Registered provider names in registry order
    pub fn get_available_providers(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.connectors.contains_key(name)
    }

    pub fn connector(&self, name: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bridge_config::ProviderConfig;

    #[test]
    fn test_none_config_has_no_providers() {
        let bridge = LLMBridge::new(None);

        assert!(bridge.get_available_providers().is_empty());
        assert_eq!(bridge.select_provider(), "openai");
        assert_eq!(bridge.get_stats().connector_count, 0);
    }

    #[test]
    fn test_disabled_and_unknown_providers_are_skipped() {
        let config = BridgeConfig {
            providers: vec![
                ProviderConfig::new("ollama"),
                ProviderConfig::new("grok").with_api_key("xai-test").disabled(),
                ProviderConfig::new("mystery"),
                ProviderConfig::new("openai").with_api_key("env:LLM_BRIDGE_UNSET_TEST_VAR_42"),
            ],
            ..Default::default()
        };

        let bridge = LLMBridge::new(Some(config));

        assert_eq!(bridge.get_available_providers(), vec!["ollama"]);
        assert!(bridge.has_provider("ollama"));
        assert!(!bridge.has_provider("grok"));
        assert!(!bridge.has_provider("openai"));
    }

    #[test]
    fn test_stats_reflect_config() {
        let config = BridgeConfig {
            providers: vec![ProviderConfig::new("ollama"), ProviderConfig::new("ollama-2")],
            default_provider: "ollama-2".to_string(),
            load_balancing: LoadBalancing::RoundRobin,
            enable_fallback: false,
        };

        let stats = LLMBridge::new(Some(config)).get_stats();
        assert_eq!(stats.connector_count, 2);
        assert_eq!(stats.providers, vec!["ollama", "ollama-2"]);
        assert_eq!(stats.default_provider, "ollama-2");
        assert_eq!(stats.load_balancing, LoadBalancing::RoundRobin);
        assert!(!stats.enable_fallback);
    }
}
