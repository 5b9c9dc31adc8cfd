use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const API_KEY_ENV: &str = "CLAWDTALK_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://clawdtalk.com/v1";
pub const DEFAULT_STATE_FILE: &str = ".missions_state.json";

/// Persisted defaults. Flags and environment variables always win over
/// anything stored here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid JSON in config {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let payload = serde_json::to_string_pretty(self)?;
        fs::write(path, payload)
            .with_context(|| format!("Failed to write config {}", path.display()))
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("missionsctl")
        .join("config.json")
}

/// Effective settings after merging flags/env, the config file and defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub state_file: PathBuf,
}

impl Settings {
    pub fn resolve(
        cfg: &Config,
        base_url: Option<String>,
        api_key: Option<String>,
        state_file: Option<PathBuf>,
    ) -> Self {
        Self {
            base_url: base_url
                .or_else(|| cfg.base_url.clone())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: api_key
                .filter(|k| !k.trim().is_empty())
                .or_else(|| cfg.api_key.clone()),
            state_file: state_file
                .or_else(|| cfg.state_file.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
        }
    }
}
