use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Environment variables
// ---------------------------------------------------------------------------

/// Credential for the low-latency (Groq) provider.
pub const ENV_GROQ_API_KEY: &str = "GROQ_API_KEY";
/// Credential for the stable (Hugging Face) provider.
pub const ENV_HF_API_KEY: &str = "HF_API_KEY";
/// Accepted alias for [`ENV_HF_API_KEY`].
pub const ENV_HUGGINGFACE_API_KEY: &str = "HUGGINGFACE_API_KEY";

// ---------------------------------------------------------------------------
// ConfigOrigin
// ---------------------------------------------------------------------------

/// Where a loaded [`AfyaConfig`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    Loaded(PathBuf),
    CreatedDefault(PathBuf),
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded(path) => write!(f, "Loaded config from {}", path.display()),
            Self::CreatedDefault(path) => write!(f, "Created default config at {}", path.display()),
        }
    }
}

// ---------------------------------------------------------------------------
// AfyaConfig
// ---------------------------------------------------------------------------

/// Dashboard configuration stored at `~/.afya/config.json`.
///
/// API keys are **never** written to the JSON file. They come from the
/// environment via [`AfyaConfig::apply_env`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AfyaConfig {
    #[serde(skip)]
    pub groq_api_key: Option<String>,
    #[serde(skip)]
    pub huggingface_api_key: Option<String>,

    // Fast provider
    pub groq_model: String,
    pub groq_base_url: String,
    pub groq_timeout_secs: u64,

    // Stable provider
    pub huggingface_model: String,
    pub huggingface_base_url: String,
    pub huggingface_timeout_secs: u64,

    // Generation
    pub max_tokens: u32,
    pub temperature: f32,

    // Routing
    pub fallback_reset_secs: u64,

    // General
    pub log_level: String,
}

impl Default for AfyaConfig {
    fn default() -> Self {
        Self {
            groq_api_key: None,
            huggingface_api_key: None,
            groq_model: "llama3-8b-8192".into(),
            groq_base_url: "https://api.groq.com/openai/v1".into(),
            groq_timeout_secs: 60,
            huggingface_model: "mistralai/Mixtral-8x7B-Instruct-v0.1".into(),
            huggingface_base_url: "https://router.huggingface.co/v1".into(),
            huggingface_timeout_secs: 120,
            max_tokens: 2000,
            temperature: 0.1,
            fallback_reset_secs: 300,
            log_level: "info".into(),
        }
    }
}

impl AfyaConfig {
    /// Returns the base config directory: `~/.afya/`
    pub fn base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".afya"))
    }

    /// Returns the config file path: `~/.afya/config.json`
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.json"))
    }

    /// Returns the logs directory: `~/.afya/logs/`
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("logs"))
    }

    /// Ensures all required directories exist.
    pub fn ensure_dirs() -> Result<()> {
        for dir in [Self::base_dir()?, Self::logs_dir()?] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            }
        }
        Ok(())
    }

    /// Loads config from disk (creating a default file if missing), then
    /// fills credentials from the process environment.
    ///
    /// Returns where the config came from so the caller can report it once
    /// logging is up.
    pub fn load() -> Result<(Self, ConfigOrigin)> {
        Self::ensure_dirs()?;
        let path = Self::config_path()?;
        let (mut config, origin) = Self::load_with_origin(&path)?;
        config.apply_env();
        Ok((config, origin))
    }

    /// Load config from a specific file path. Credentials are left empty.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        Self::load_with_origin(path).map(|(config, _)| config)
    }

    /// Like [`load_from_path`](Self::load_from_path), also reporting whether
    /// the file existed or was created with defaults.
    pub fn load_with_origin(path: &Path) -> Result<(Self, ConfigOrigin)> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let config: Self =
                serde_json::from_str(&content).with_context(|| "Failed to parse config.json")?;
            Ok((config, ConfigOrigin::Loaded(path.to_path_buf())))
        } else {
            let config = Self::default();
            config.save_to_path(path)?;
            Ok((config, ConfigOrigin::CreatedDefault(path.to_path_buf())))
        }
    }

    /// Save config to a specific file path (API keys are excluded).
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Read provider credentials from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Read provider credentials through `lookup`. Empty values are treated
    /// as absent.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        self.groq_api_key = non_empty(ENV_GROQ_API_KEY);
        self.huggingface_api_key =
            non_empty(ENV_HF_API_KEY).or_else(|| non_empty(ENV_HUGGINGFACE_API_KEY));
    }

    /// Whether at least one network provider has a credential.
    pub fn has_any_credential(&self) -> bool {
        [&self.groq_api_key, &self.huggingface_api_key]
            .iter()
            .any(|k| k.as_ref().is_some_and(|v| !v.is_empty()))
    }
}
