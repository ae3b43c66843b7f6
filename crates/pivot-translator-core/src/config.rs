use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::language::LanguageEntry;

/// Default pivot language code
pub const DEFAULT_PIVOT_LANG: &str = "eng_Latn";

/// One installed model as declared in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub source: String,
    pub target: String,
    /// Opaque model identifier passed to the backend
    pub handle: String,
}

impl ModelEntry {
    pub fn new(source: impl Into<String>, target: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            handle: handle.into(),
        }
    }
}

/// IndicTrans2 covers English <-> Hindi/Urdu, OPUS-MT covers English <-> Chinese.
pub fn default_models() -> Vec<ModelEntry> {
    const EN_INDIC: &str = "ai4bharat/indictrans2-en-indic-dist-200M";
    const INDIC_EN: &str = "ai4bharat/indictrans2-indic-en-dist-200M";

    vec![
        ModelEntry::new("eng_Latn", "hin_Deva", EN_INDIC),
        ModelEntry::new("hin_Deva", "eng_Latn", INDIC_EN),
        ModelEntry::new("eng_Latn", "urd_Arab", EN_INDIC),
        ModelEntry::new("urd_Arab", "eng_Latn", INDIC_EN),
        ModelEntry::new("eng_Latn", "zho_Hans", "Helsinki-NLP/opus-mt-en-zh"),
        ModelEntry::new("zho_Hans", "eng_Latn", "Helsinki-NLP/opus-mt-zh-en"),
    ]
}

fn default_pivot() -> String {
    DEFAULT_PIVOT_LANG.to_string()
}

/// Inference backend configuration for OpenAI-compatible servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl BackendConfig {
    pub fn new(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key,
            ..Default::default()
        }
    }
}

fn default_api_base() -> String {
    "http://localhost:8080/v1".to_string()
}

const fn default_retry_count() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

const fn default_timeout_secs() -> u64 {
    60
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Loaded-model cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelCacheConfig {
    /// Upper bound on live model instances; `None` keeps every model loaded
    #[serde(default)]
    pub max_loaded: Option<usize>,
}

/// Batch driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Units translated concurrently within one batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

const fn default_concurrency() -> usize {
    1
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

/// Translation result cache configuration
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
    #[serde(default)]
    pub disk_enabled: bool,

    /// Disk cache directory (defaults to $XDG_CACHE_HOME/pivot-translator)
    pub disk_path: Option<PathBuf>,
}

const fn default_true() -> bool {
    true
}

const fn default_memory_max_entries() -> u64 {
    10_000
}

impl CacheConfig {
    /// Both layers off
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
            disk_enabled: false,
            disk_path: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Intermediate language for two-step routes
    #[serde(default = "default_pivot")]
    pub pivot: String,

    /// Installed models
    #[serde(default = "default_models")]
    pub models: Vec<ModelEntry>,

    /// Languages added on top of the built-in table
    #[serde(default)]
    pub languages: Vec<LanguageEntry>,

    /// Inference backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Loaded-model cache configuration
    #[serde(default)]
    pub model_cache: ModelCacheConfig,

    /// Batch driver configuration
    #[serde(default)]
    pub batch: BatchConfig,

    /// Translation result cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pivot: default_pivot(),
            models: default_models(),
            languages: Vec::new(),
            backend: BackendConfig::default(),
            model_cache: ModelCacheConfig::default(),
            batch: BatchConfig::default(),
            cache: CacheConfig::default(),
        }
    }
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
        toml::from_str(content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))
    }

    /// Load from default locations (~/.config/pivot-translator/config.toml, ./config.toml)
    pub fn load() -> Self {
        // Try user config
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("pivot-translator").join("config.toml");
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

        // Return defaults
        tracing::debug!("No config file found, using defaults");
        Self::default()
    }

    /// Check field values that serde cannot express.
    ///
    /// Language and pair checks happen when the directory is built.
    pub fn validate(&self) -> Result<()> {
        if self.batch.concurrency == 0 {
            return Err(Error::ConfigInvalid {
                field: "batch.concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.model_cache.max_loaded == Some(0) {
            return Err(Error::ConfigInvalid {
                field: "model_cache.max_loaded".to_string(),
                reason: "must be at least 1 when set".to_string(),
            });
        }

        if let Some(entry) = self.models.iter().find(|m| m.handle.trim().is_empty()) {
            return Err(Error::ConfigInvalid {
                field: "models.handle".to_string(),
                reason: format!("empty handle for {} -> {}", entry.source, entry.target),
            });
        }

        Ok(())
    }
}
