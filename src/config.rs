use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SomnusConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub chat: ChatConfig,
    pub model: ModelConfig,
    pub pubmed: PubMedConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// `"memory"` (process-local, non-durable) or `"sqlite"`.
    pub backend: String,
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of trailing messages sent to the model as context.
    pub history_window: usize,
    /// Confidence reported when the model does not supply one.
    pub default_confidence: f64,
    /// When true, an unknown conversation id is rejected with NotFound
    /// instead of creating a fresh conversation under that id.
    pub strict_conversation_ids: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// API key; falls back to the ANTHROPIC_API_KEY environment variable.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PubMedConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub enabled: bool,
    pub retention_days: u32,
    /// Label attached to interactions until a real classifier is plugged in.
    pub default_topic: String,
}

impl Default for SomnusConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            chat: ChatConfig::default(),
            model: ModelConfig::default(),
            pubmed: PubMedConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_somnus_dir()
            .join("somnus.db")
            .to_string_lossy()
            .into_owned();
        Self {
            backend: "memory".into(),
            db_path,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_window: 10,
            default_confidence: 0.8,
            strict_conversation_ids: false,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".into(),
            model: "claude-3-5-sonnet-latest".into(),
            max_tokens: 4096,
            temperature: 0.7,
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".into(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: 90,
            default_topic: "sleep_science".into(),
        }
    }
}

/// Returns `~/.somnus/`
pub fn default_somnus_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".somnus")
}

/// Returns the default config file path: `~/.somnus/config.toml`
pub fn default_config_path() -> PathBuf {
    default_somnus_dir().join("config.toml")
}

impl SomnusConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            SomnusConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (SOMNUS_DB, SOMNUS_BACKEND, SOMNUS_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SOMNUS_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("SOMNUS_BACKEND") {
            self.storage.backend = val;
        }
        if let Ok(val) = std::env::var("SOMNUS_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Resolve the model API key from config or the environment.
    pub fn resolved_model_api_key(&self) -> Option<String> {
        if let Some(key) = &self.model.api_key {
            let trimmed = key.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
