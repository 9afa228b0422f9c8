//! Configuration management for ocrpick.
//!
//! Two layers, following the usual split: `Settings` is the resolved
//! runtime configuration with defaults, `Config` is the serde view of
//! the config file (TOML, YAML, or JSON by extension). Backends live in
//! the config file so `ocrpick backend add` persists across sessions.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::BackendConfig;

/// Default config file name (TOML preferred).
pub const DEFAULT_CONFIG_FILENAME: &str = "ocrpick.toml";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the OCR relay service.
    pub service_url: String,
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Request timeout in seconds. Covers the whole streamed response;
    /// raise it for large documents on slow models.
    pub request_timeout: u64,
    /// Cap on files accepted into one batch.
    pub max_batch_files: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_url: "http://127.0.0.1:8000".to_string(),
            user_agent: format!("ocrpick/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: 600,
            max_batch_files: crate::batch::DEFAULT_MAX_FILES,
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// OCR relay service base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    /// User agent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Cap on files per batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_batch_files: Option<usize>,
    /// Configured OCR backends, in submission order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backends: Vec<BackendConfig>,
    /// Path this config was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    /// Supports TOML, YAML, and JSON based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

        let mut config: Config = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            "json" => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
            _ => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Persist the config back to where it was loaded from (or the
    /// default location), in the format the extension implies.
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = self
            .source_path
            .clone()
            .unwrap_or_else(Self::default_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let serialized = match ext {
            "yaml" | "yml" => serde_yaml::to_string(self)?,
            "json" => serde_json::to_string_pretty(self)?,
            _ => toml::to_string_pretty(self)?,
        };
        std::fs::write(&path, serialized)?;
        Ok(path)
    }

    /// Default config location: `<config dir>/ocrpick/ocrpick.toml`,
    /// falling back to the current directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("ocrpick"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_CONFIG_FILENAME)
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref url) = self.service_url {
            settings.service_url = url.clone();
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(max) = self.max_batch_files {
            settings.max_batch_files = max;
        }
    }

    /// Backends to submit with, honoring the environment fallback: when
    /// nothing is configured but `OCRPICK_API_ENDPOINT` is set, a single
    /// default backend is synthesized from the environment.
    pub fn effective_backends(&self) -> Vec<BackendConfig> {
        if !self.backends.is_empty() {
            return self.backends.clone();
        }
        match std::env::var("OCRPICK_API_ENDPOINT") {
            Ok(endpoint) if !endpoint.is_empty() => {
                tracing::debug!("using default backend from environment");
                vec![BackendConfig {
                    id: "backend-default".to_string(),
                    name: "Default API".to_string(),
                    endpoint,
                    api_key: std::env::var("OCRPICK_API_KEY").unwrap_or_default(),
                    model: std::env::var("OCRPICK_MODEL")
                        .unwrap_or_else(|_| "gpt-4o".to_string()),
                    provider: "openai".to_string(),
                }]
            }
            _ => Vec::new(),
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides the default location).
    pub config_path: Option<PathBuf>,
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = match options.config_path {
        Some(ref path) => {
            let expanded = shellexpand::tilde(&path.to_string_lossy().into_owned()).into_owned();
            Config::load_from_path(Path::new(&expanded))
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!("{}", e);
                    Config::default()
                })
        }
        None => {
            let path = Config::default_path();
            if path.exists() {
                Config::load_from_path(&path).await.unwrap_or_else(|e| {
                    tracing::warn!("{}", e);
                    Config::default()
                })
            } else {
                let mut config = Config::default();
                config.source_path = Some(path);
                config
            }
        }
    };

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings);

    // OCRPICK_SERVICE_URL environment variable takes highest precedence
    if let Some(url) = std::env::var("OCRPICK_SERVICE_URL")
        .ok()
        .filter(|s| !s.is_empty())
    {
        tracing::debug!("Using OCRPICK_SERVICE_URL from environment: {}", url);
        settings.service_url = url;
    }

    (settings, config)
}
