//! Configuration (layered: code > env > config file).

use std::fmt;
use std::path::{Path, PathBuf};

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ConvertError;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4-5";
pub const DEFAULT_MAX_TOKENS: u32 = 8000;
pub const DEFAULT_REFERER: &str = "https://script2extension.app";
pub const DEFAULT_TITLE: &str = "script2extension";

/// Limits for the agent tool loop.
#[derive(Debug, Clone, Copy, Builder, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum number of model turns per conversion.
    #[builder(default = 12)]
    pub max_turns: usize,
    /// Fix rounds allowed before a failing check ends the loop.
    #[builder(default = 2)]
    pub max_fix_rounds: usize,
    /// Stream the first turn when a preview sink is supplied.
    #[builder(default = true)]
    pub stream_first_turn: bool,
    /// End the loop as soon as a tool batch leaves a passing check. When off,
    /// the model keeps its turn after a pass and the loop ends once it goes
    /// quiet.
    #[builder(default = true)]
    pub stop_on_pass: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Remote model and transport configuration.
///
/// Resolution order: explicit setters, then environment variables, then the
/// TOML config file.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConverterConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub referer: Option<String>,
    pub title: Option<String>,
    pub agent: AgentSettings,
}

impl fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("referer", &self.referer)
            .field("title", &self.title)
            .field("agent", &self.agent)
            .finish()
    }
}

const API_KEY_VARS: [&str; 2] = ["OPENROUTER_API_KEY", "OPENAI_API_KEY"];

impl ConverterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from environment variables (and `.env` if present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::new();
        config.merge_env();
        config
    }

    /// Overlay values found in the environment on top of this config.
    pub fn merge_env(&mut self) {
        if let Some(key) = API_KEY_VARS.iter().find_map(|var| non_empty_env(var)) {
            self.api_key = Some(key);
        }
        if let Some(url) = non_empty_env("SCRIPT2EXT_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Some(model) = non_empty_env("SCRIPT2EXT_MODEL") {
            self.model = Some(model);
        }
        if let Some(max) = non_empty_env("SCRIPT2EXT_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            self.max_tokens = Some(max);
        }
    }

    /// Parse a TOML config document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConvertError> {
        toml::from_str(text).map_err(|e| ConvertError::Configuration(format!("invalid config: {e}")))
    }

    /// Load a TOML config file.
    pub fn load_file(path: &Path) -> Result<Self, ConvertError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Config file, then environment on top. A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConvertError> {
        let _ = dotenvy::dotenv();
        let path = path.map(Path::to_path_buf).or_else(default_config_path);
        let mut config = match path {
            Some(p) if p.exists() => Self::load_file(&p)?,
            _ => Self::new(),
        };
        config.merge_env();
        Ok(config)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_agent_settings(mut self, settings: AgentSettings) -> Self {
        self.agent = settings;
        self
    }

    /// The API key, or a configuration error naming the variables to set.
    pub fn require_api_key(&self) -> Result<&str, ConvertError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConvertError::Authentication("Missing OPENROUTER_API_KEY".into()))
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn referer(&self) -> &str {
        self.referer.as_deref().unwrap_or(DEFAULT_REFERER)
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }
}

/// `<config dir>/script2ext/config.toml`, when a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("app", "script2extension", "script2ext")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}
