use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Translator backend configuration for OpenAI-compatible APIs.
///
/// Works with AkashML, DeepSeek, Hyperbolic, OpenAI, llama.cpp and any other
/// endpoint that speaks `/chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl TranslatorConfig {
    /// Create a new translator config
    pub fn new(
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            api_key,
            model: model.into(),
        }
    }

    /// The API key, if one is set and not blank
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Provider::default().translator_config(None)
    }
}

/// Hosted providers with known endpoints and default models
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Akashml,
    Deepseek,
    Hyperbolic,
}

impl Provider {
    pub const ALL: [Self; 3] = [Self::Akashml, Self::Deepseek, Self::Hyperbolic];

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Akashml => "AkashML",
            Self::Deepseek => "DeepSeek",
            Self::Hyperbolic => "Hyperbolic",
        }
    }

    pub const fn api_base(self) -> &'static str {
        match self {
            Self::Akashml => "https://api.akashml.com/v1",
            Self::Deepseek => "https://api.deepseek.com",
            Self::Hyperbolic => "https://api.hyperbolic.xyz/v1",
        }
    }

    pub const fn model(self) -> &'static str {
        match self {
            Self::Akashml => "Qwen/Qwen3-30B-A3B",
            Self::Deepseek => "deepseek-chat",
            Self::Hyperbolic => "openai/gpt-oss-20b",
        }
    }

    /// Environment variable holding this provider's API key
    pub const fn key_env(self) -> &'static str {
        match self {
            Self::Akashml => "AKASHML_API_KEY",
            Self::Deepseek => "DEEPSEEK_API_KEY",
            Self::Hyperbolic => "HYPERBOLIC_API_KEY",
        }
    }

    pub fn translator_config(self, api_key: Option<String>) -> TranslatorConfig {
        TranslatorConfig::new(self.api_base(), api_key, self.model())
    }

    /// The provider whose endpoint is `api_base`, ignoring a trailing slash
    pub fn from_api_base(api_base: &str) -> Option<Self> {
        let base = api_base.trim().trim_end_matches('/');
        Self::ALL.into_iter().find(|p| p.api_base().eq_ignore_ascii_case(base))
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Tunables for one translation run: pool size, retry policy, chunk bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Size of the concurrent worker pool
    pub max_workers: usize,
    /// Retry attempts after the first
    pub max_retries: u32,
    /// Wait before each retry, in seconds
    pub retry_delay_secs: u64,
    /// Upper bound for a chunk, in characters
    pub chunk_size: usize,
    /// Chunks shorter than this are merged into a neighbour
    pub min_chunk_size: usize,
    /// Per-call bound on the remote request, in seconds
    pub api_timeout_secs: u64,
    /// Log previews of source and translated text
    pub log_content: bool,
}

impl RunConfig {
    /// Single-file profile: one large chunk at a time.
    pub const fn job() -> Self {
        Self {
            max_workers: 1,
            max_retries: 6,
            retry_delay_secs: 120,
            chunk_size: 50_000,
            min_chunk_size: 30_000,
            api_timeout_secs: 60,
            log_content: false,
        }
    }

    /// Directory profile: many small chunks in parallel.
    pub const fn batch() -> Self {
        Self {
            max_workers: 8,
            max_retries: 6,
            retry_delay_secs: 120,
            chunk_size: 3000,
            min_chunk_size: 1000,
            api_timeout_secs: 60,
            log_content: false,
        }
    }

    pub const fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub const fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(Error::invalid("max_workers", "must be at least 1"));
        }
        if self.chunk_size == 0 {
            return Err(Error::invalid("chunk_size", "must be at least 1"));
        }
        if self.min_chunk_size > self.chunk_size {
            return Err(Error::invalid(
                "min_chunk_size",
                format!(
                    "{} exceeds chunk_size {}",
                    self.min_chunk_size, self.chunk_size
                ),
            ));
        }
        if self.api_timeout_secs == 0 {
            return Err(Error::invalid("api_timeout_secs", "must be at least 1"));
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::batch()
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable memory cache
    #[serde(default = "default_true")]
    pub memory_enabled: bool,

    /// Maximum memory cache entries
    #[serde(default = "default_memory_max_entries")]
    pub memory_max_entries: u64,

    /// Memory cache TTL in seconds (0 = no expiry)
    #[serde(default)]
    pub memory_ttl_seconds: u64,

    /// Enable disk cache
    #[serde(default = "default_true")]
    pub disk_enabled: bool,

    /// Disk cache directory (defaults to ~/.cache/doc-translator)
    pub disk_path: Option<PathBuf>,
}

const fn default_true() -> bool {
    true
}

const fn default_memory_max_entries() -> u64 {
    1000
}

impl CacheConfig {
    pub const fn disabled() -> Self {
        Self {
            memory_enabled: false,
            memory_max_entries: 0,
            memory_ttl_seconds: 0,
            disk_enabled: false,
            disk_path: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_enabled: true,
            memory_max_entries: default_memory_max_entries(),
            memory_ttl_seconds: 0,
            disk_enabled: true,
            disk_path: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Translator backend configuration
    #[serde(default)]
    pub translator: TranslatorConfig,

    /// Worker pool, retry and chunking settings
    #[serde(default)]
    pub run: RunConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Write translations here instead of beside the source file
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))?;
        config.run.validate()?;
        Ok(config)
    }

    /// Load from default locations (~/.config/doc-translator/config.toml, ./config.toml)
    pub fn load() -> Self {
        // Try user config
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("doc-translator").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // Try local config
        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./config.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./config.toml: {}", e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }
}
