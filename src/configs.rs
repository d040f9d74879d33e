use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{errors::AssistantError, languages::Language};

/// Environment variables consulted, in order, when `llm.api_key` is unset.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub predictor: PredictorConfig,
    pub session: SessionConfig,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PredictorConfig {
    pub debounce_ms: u64,
    pub min_chars: usize,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct SessionConfig {
    pub source_language: Language,
    pub target_language: Language,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta/openai".into(),
            api_key: None,
            model: "gemini-3-flash-preview".into(),
            timeout_secs: 30,
        }
    }
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 600,
            min_chars: 3,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            source_language: Language::English,
            target_language: Language::Tamil,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).context("Invalid configuration")?;
        anyhow::ensure!(
            config.llm.timeout_secs > 0,
            "Invalid configuration: llm.timeout_secs must be at least 1"
        );
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config '{}'", path.display()))?;
        Self::from_toml_str(&config_str)
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured key first, then [`API_KEY_VARS`]. Blank values are ignored.
    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Result<String, AssistantError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            tracing::info!("using API key from configuration");
            return Ok(key.to_string());
        }

        for name in API_KEY_VARS {
            if let Some(key) = lookup(name).filter(|k| !k.trim().is_empty()) {
                tracing::info!(var = name, "using API key from environment");
                return Ok(key);
            }
        }

        Err(AssistantError::Configuration(format!(
            "API key is missing. Set llm.api_key or one of {}",
            API_KEY_VARS.join(", ")
        )))
    }
}

impl PredictorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
