//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. An explicit path (`--config`)
//! 2. `$MAILTRIAGE_CONFIG` (environment variable)
//! 3. `~/.config/mailtriage/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailtriage\config.toml` (Windows)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::parser::body::DEFAULT_BODY_CAP;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Where unread mail is fetched from.
    pub source: SourceConfig,
    /// Body extraction settings.
    pub extract: ExtractConfig,
    /// Reply generation backend.
    pub generation: GenerationConfig,
    /// Draft persistence.
    pub drafts: DraftsConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Mailbox format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Mbox,
    Maildir,
}

/// Mailbox settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Mailbox format.
    pub kind: SourceKind,
    /// Path to the MBOX file or Maildir directory.
    pub path: Option<PathBuf>,
    /// Maximum number of unread messages per fetch cycle.
    pub fetch_limit: usize,
}

/// Body extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Preview cap in characters.
    pub body_cap: usize,
}

/// Generation backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Template replies only.
    None,
    /// Local HTTP completion endpoint.
    Http,
}

/// Reply generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub backend: BackendKind,
    /// Completion endpoint URL.
    pub endpoint: String,
    /// Model name sent to the endpoint.
    pub model: String,
    /// Upper bound on generated tokens.
    pub max_length: usize,
    /// Sampling temperature.
    pub temperature: f32,
    /// Top-k sampling cutoff.
    pub top_k: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Generated replies shorter than this (in characters) are rejected.
    pub min_reply_len: usize,
}

/// Draft persistence settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftsConfig {
    /// Override path of the drafts JSON file.
    pub path: Option<PathBuf>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Mbox,
            path: None,
            fetch_limit: 30,
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            body_cap: DEFAULT_BODY_CAP,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::None,
            endpoint: "http://127.0.0.1:11434/api/generate".to_string(),
            model: "tinyllama".to_string(),
            max_length: 150,
            temperature: 0.8,
            top_k: 50,
            timeout_secs: 60,
            min_reply_len: 10,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config(explicit: Option<&Path>) -> Config {
    let path = explicit.map(Path::to_path_buf).or_else(config_file_path);
    if let Some(path) = path {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config, explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(config_file_path)
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(path)
}

pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILTRIAGE_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailtriage").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailtriage")
}

/// Return the drafts file path.
pub fn drafts_path(config: &Config) -> PathBuf {
    if let Some(ref path) = config.drafts.path {
        return path.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailtriage")
        .join("email_drafts.json")
}
