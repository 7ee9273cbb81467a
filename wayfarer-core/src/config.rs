//! Configuration types for Wayfarer

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, WayfarerError};

/// Main configuration for a Wayfarer run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WayfarerConfig {
    /// Language model configuration
    pub llm: LLMProviderConfig,

    /// Search backend configuration
    pub search: SearchConfig,

    /// Routing backend configuration
    pub routing: RoutingConfig,

    /// On-disk response cache
    pub cache: CacheConfig,

    /// Prompt template overrides
    pub prompts: PromptConfig,

    /// Pipeline tuning
    pub pipeline: PipelineConfig,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMProviderConfig {
    /// Provider type
    pub provider: LLMBackend,

    /// Model name (empty means provider default)
    pub model: String,

    /// API key (if needed, prefer env vars)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL (for custom endpoints, e.g., Ollama)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Upper bound on a single model invocation
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: usize,
}

impl Default for LLMProviderConfig {
    fn default() -> Self {
        Self {
            provider: LLMBackend::ClaudeCli,
            model: String::new(),
            api_key: None,
            base_url: None,
            timeout: Duration::from_secs(120),
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

/// LLM backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LLMBackend {
    /// Canned responses, no network
    Mock,
    /// The `claude` command-line tool in print mode
    ClaudeCli,
    /// Anthropic messages API
    Anthropic,
    /// Local Ollama server
    Ollama,
}

impl std::str::FromStr for LLMBackend {
    type Err = WayfarerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(LLMBackend::Mock),
            "claude" | "claude_cli" | "claude-cli" => Ok(LLMBackend::ClaudeCli),
            "anthropic" => Ok(LLMBackend::Anthropic),
            "ollama" => Ok(LLMBackend::Ollama),
            other => Err(WayfarerError::Configuration(format!(
                "Invalid LLM provider: {}",
                other
            ))),
        }
    }
}

/// Brave search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Subscription token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// API root, without trailing slash
    pub base_url: String,

    /// Results requested per query
    pub result_count: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.search.brave.com/res/v1".to_string(),
            result_count: 5,
        }
    }
}

/// OpenRouteService configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Driving directions endpoint
    pub directions_url: String,

    /// Geocoding endpoint
    pub geocode_url: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            directions_url: "https://api.openrouteservice.org/v2/directions/driving-car"
                .to_string(),
            geocode_url: "https://api.openrouteservice.org/geocode/search".to_string(),
        }
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable on-disk caching of route and search responses
    pub enabled: bool,

    /// Directory holding the cache files
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("cache"),
        }
    }
}

impl CacheConfig {
    /// Path of a named cache file, or `None` when caching is disabled
    pub fn file(&self, name: &str) -> Option<PathBuf> {
        self.enabled.then(|| self.dir.join(name))
    }
}

/// Prompt template configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptConfig {
    /// Directory of `<name>.md` files overriding the built-in templates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// Pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// How long a unit waits on its input before re-checking its stop signal
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Search results shown to the model on the refinement call
    pub search_result_limit: usize,

    /// Optional upper bound on waiting for the collector. Unset means wait
    /// until every step is collected or the arbiter has shut down.
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub collect_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            search_result_limit: 5,
            collect_timeout: None,
        }
    }
}

impl WayfarerConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. Configuration file (wayfarer.toml, then WAYFARER_CONFIG_PATH)
    /// 3. `WAYFARER_` environment variables, nested keys split on `__`
    /// 4. Legacy keys (ORS_API_KEY, BRAVE_SEARCH_API_KEY, LLM_API_KEY, LLM_PROVIDER)
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(WayfarerConfig::default()))
            .merge(Toml::file("wayfarer.toml"));

        if let Ok(path) = std::env::var("WAYFARER_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("WAYFARER_").split("__"));

        let mut config: WayfarerConfig = figment.extract().map_err(|e| {
            WayfarerError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let mut config: WayfarerConfig =
            Figment::from(Serialized::defaults(WayfarerConfig::default()))
                .merge(Toml::file(path))
                .extract()
                .map_err(|e| {
                    WayfarerError::Configuration(format!(
                        "Failed to load configuration file: {}",
                        e
                    ))
                })?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Fill unset keys from the plain environment variable names.
    fn apply_env_overrides(&mut self) -> Result<()> {
        if self.routing.api_key.is_none() {
            self.routing.api_key = non_empty_var("ORS_API_KEY");
        }
        if self.search.api_key.is_none() {
            self.search.api_key = non_empty_var("BRAVE_SEARCH_API_KEY");
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = non_empty_var("LLM_API_KEY");
        }
        if let Some(provider) = non_empty_var("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.poll_interval.is_zero() {
            return Err(WayfarerError::Configuration(
                "pipeline.poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.llm.timeout.is_zero() {
            return Err(WayfarerError::Configuration(
                "llm.timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
