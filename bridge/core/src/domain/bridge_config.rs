// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Bridge Configuration Types
//
// Defines the configuration schema consumed by the LLM bridge:
// - Per-provider connector settings (credentials, endpoint, retry, timeout)
// - Provider selection strategy (load balancing)
// - Cross-provider fallback switch
//
// The bridge itself only ever receives a built `BridgeConfig`. Loading from
// YAML, discovery and environment overrides live here for the CLI and other
// hosts.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use super::llm::LLMError;
use super::retry::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY_MS};

/// Environment variable pointing at an explicit config file
pub const CONFIG_PATH_ENV: &str = "LLM_BRIDGE_CONFIG_PATH";

/// Backend family an adapter speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(alias = "xai")]
    Grok,
    Ollama,
}

impl ProviderKind {
    /// Infer the kind from a provider name such as "openai" or "ollama-local"
    pub fn from_name(name: &str) -> Option<Self> {
        let prefix = name.split(['-', '_']).next().unwrap_or(name);
        match prefix.to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "grok" | "xai" => Some(Self::Grok),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAI => write!(f, "openai"),
            Self::Grok => write!(f, "grok"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

/// Provider selection policy when a request does not pin a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalancing {
    RoundRobin,
    Random,
    #[default]
    Default,
}

impl fmt::Display for LoadBalancing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoundRobin => write!(f, "round-robin"),
            Self::Random => write!(f, "random"),
            Self::Default => write!(f, "default"),
        }
    }
}

impl std::str::FromStr for LoadBalancing {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "round-robin" | "round_robin" | "roundrobin" => Ok(Self::RoundRobin),
            "random" => Ok(Self::Random),
            "default" => Ok(Self::Default),
            other => Err(LLMError::Configuration(format!(
                "unknown load balancing strategy '{}'",
                other
            ))),
        }
    }
}

/// Settings for one connector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider name (e.g., "openai", "ollama-local")
    pub name: String,

    /// Adapter type; inferred from `name` when omitted
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ProviderKind>,

    /// Whether this provider is registered at startup
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// API endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Organization header (OpenAI only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    /// Model used when a request does not name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Default sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Default completion budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Invocations per logical request (0 = exactly one, no retry)
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base delay for exponential backoff in milliseconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            enabled: true,
            api_key: None,
            base_url: None,
            organization: None,
            model: None,
            temperature: None,
            max_tokens: None,
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay(),
            timeout_ms: default_timeout(),
        }
    }

    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_retry(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay_ms = delay_ms;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Explicit kind, or the one implied by the provider name
    pub fn resolved_kind(&self) -> Option<ProviderKind> {
        self.kind.or_else(|| ProviderKind::from_name(&self.name))
    }

    /// Resolve the API key, following "env:VAR_NAME" references
    pub fn resolve_api_key(&self) -> Result<Option<String>, LLMError> {
        match &self.api_key {
            Some(k) if k.starts_with("env:") => {
                let var_name = &k["env:".len()..];
                std::env::var(var_name).map(Some).map_err(|_| {
                    LLMError::Configuration(format!(
                        "environment variable not set: {} (provider '{}')",
                        var_name, self.name
                    ))
                })
            }
            Some(k) if k.is_empty() => Ok(None),
            Some(k) => Ok(Some(k.clone())),
            None => Ok(None),
        }
    }
}

/// Top-level bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Connector settings; list order is registry order
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Provider used by the `default` strategy and reported when none is registered
    #[serde(default = "default_provider")]
    pub default_provider: String,

    #[serde(default)]
    pub load_balancing: LoadBalancing,

    /// Retry a failed unpinned query on the remaining providers
    #[serde(default = "default_true")]
    pub enable_fallback: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            providers: vec![],
            default_provider: default_provider(),
            load_balancing: LoadBalancing::default(),
            enable_fallback: true,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. LLM_BRIDGE_CONFIG_PATH environment variable
    /// 2. ./llm-bridge.yaml (working directory)
    /// 3. ~/.llm-bridge/config.yaml (user home)
    /// 4. /etc/llm-bridge/config.yaml (system, Unix) or C:\ProgramData\LLMBridge\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./llm-bridge.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".llm-bridge").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/llm-bridge/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\LLMBridge\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using empty defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides read through `lookup`
    ///
    /// Bridge-level keys replace configured values. Credential and host
    /// variables only fill in settings the file leaves empty, and are stored
    /// as "env:VAR_NAME" references so secrets never land in the config.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("LLM_BRIDGE_DEFAULT_PROVIDER") {
            tracing::info!("Environment override: LLM_BRIDGE_DEFAULT_PROVIDER={}", val);
            self.default_provider = val;
        }

        if let Some(val) = lookup("LLM_BRIDGE_LOAD_BALANCING") {
            match val.parse::<LoadBalancing>() {
                Ok(strategy) => {
                    tracing::info!("Environment override: LLM_BRIDGE_LOAD_BALANCING={}", strategy);
                    self.load_balancing = strategy;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for LLM_BRIDGE_LOAD_BALANCING: '{}'. Expected round-robin/random/default. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("LLM_BRIDGE_ENABLE_FALLBACK") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => {
                    tracing::info!("Environment override: LLM_BRIDGE_ENABLE_FALLBACK=true");
                    self.enable_fallback = true;
                }
                "false" | "0" | "no" | "off" => {
                    tracing::info!("Environment override: LLM_BRIDGE_ENABLE_FALLBACK=false");
                    self.enable_fallback = false;
                }
                _ => tracing::warn!(
                    "Invalid value for LLM_BRIDGE_ENABLE_FALLBACK: '{}'. Expected true/false. Ignoring.",
                    val
                ),
            }
        }

        for provider in &mut self.providers {
            match provider.resolved_kind() {
                Some(ProviderKind::OpenAI) if provider.api_key.is_none() => {
                    if lookup("OPENAI_API_KEY").is_some() {
                        provider.api_key = Some("env:OPENAI_API_KEY".to_string());
                    }
                }
                Some(ProviderKind::Grok) if provider.api_key.is_none() => {
                    if lookup("XAI_API_KEY").is_some() {
                        provider.api_key = Some("env:XAI_API_KEY".to_string());
                    } else if lookup("GROK_API_KEY").is_some() {
                        provider.api_key = Some("env:GROK_API_KEY".to_string());
                    }
                }
                Some(ProviderKind::Ollama) if provider.base_url.is_none() => {
                    if let Some(host) = lookup("OLLAMA_HOST") {
                        tracing::info!("Environment override: OLLAMA_HOST={} ({})", host, provider.name);
                        provider.base_url = Some(host);
                    }
                }
                _ => {}
            }
        }
    }

    /// Providers that will be registered, in registry order
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled)
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.default_provider.is_empty() {
            anyhow::bail!("default_provider cannot be empty");
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.name.is_empty() {
                anyhow::bail!("Provider name cannot be empty");
            }

            if !seen.insert(provider.name.as_str()) {
                anyhow::bail!("Duplicate provider name: {}", provider.name);
            }

            if provider.resolved_kind().is_none() {
                anyhow::bail!(
                    "Cannot determine provider type for '{}'; set `type` to openai, grok or ollama",
                    provider.name
                );
            }

            if provider.timeout_ms == 0 {
                anyhow::bail!("timeout_ms must be positive for provider: {}", provider.name);
            }

            if let Some(temperature) = provider.temperature {
                if !(0.0..=2.0).contains(&temperature) {
                    anyhow::bail!(
                        "temperature must be between 0 and 2 for provider: {}",
                        provider.name
                    );
                }
            }

            if provider.max_tokens == Some(0) {
                anyhow::bail!("max_tokens must be positive for provider: {}", provider.name);
            }
        }

        if self.enabled_providers().next().is_some()
            && !self.enabled_providers().any(|p| p.name == self.default_provider)
        {
            tracing::warn!(
                "Default provider '{}' is not among the enabled providers",
                self.default_provider
            );
        }

        Ok(())
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_retry_attempts() -> u32 {
    DEFAULT_RETRY_ATTEMPTS
}

fn default_retry_delay() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_timeout() -> u64 {
    60_000
}
