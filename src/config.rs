use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub markdown: MarkdownConfig,
    #[serde(default)]
    pub timings: TimingConfig,
    #[serde(default)]
    pub site: SiteConfig,
}

/// What the shell does with input that matches no built-in command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissPolicy {
    /// Forward the original text to the assistant as a prompt
    #[default]
    Assistant,
    /// Print a "command not found" error with edit-distance suggestions
    Suggest,
}

impl std::str::FromStr for MissPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "assistant" | "ai" => Ok(MissPolicy::Assistant),
            "suggest" | "strict" => Ok(MissPolicy::Suggest),
            other => Err(format!("unknown miss policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Model identifier sent to the generate-content endpoints
    #[serde(default = "default_model")]
    pub model: String,

    /// Versioned REST root of the model vendor
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Upper bound for every network step of a request (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub miss_policy: MissPolicy,
}

fn default_model() -> String {
    "gemini-2.5-flash-preview-05-20".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl AssistantConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            miss_policy: MissPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownConfig {
    /// Minimum gap between two full re-renders of a streaming line
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// Used when no preference has been stored yet
    #[serde(default = "default_true")]
    pub default_enabled: bool,
}

fn default_throttle_ms() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

impl MarkdownConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
            default_enabled: true,
        }
    }
}

/// Delays of the staged UI feedback, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_open_post_ms")]
    pub open_post_ms: u64,
    #[serde(default = "default_navigate_ms")]
    pub navigate_ms: u64,
    #[serde(default = "default_reboot_ms")]
    pub reboot_ms: u64,
    #[serde(default = "default_shutdown_ms")]
    pub shutdown_ms: u64,
    #[serde(default = "default_sudo_ms")]
    pub sudo_ms: u64,
    #[serde(default = "default_banner_fade_ms")]
    pub banner_fade_ms: u64,
    #[serde(default = "default_typewriter_ms")]
    pub typewriter_ms: u64,
}

fn default_open_post_ms() -> u64 {
    500
}

fn default_navigate_ms() -> u64 {
    800
}

fn default_reboot_ms() -> u64 {
    1500
}

fn default_shutdown_ms() -> u64 {
    2000
}

fn default_sudo_ms() -> u64 {
    2000
}

fn default_banner_fade_ms() -> u64 {
    300
}

fn default_typewriter_ms() -> u64 {
    30
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            open_post_ms: default_open_post_ms(),
            navigate_ms: default_navigate_ms(),
            reboot_ms: default_reboot_ms(),
            shutdown_ms: default_shutdown_ms(),
            sudo_ms: default_sudo_ms(),
            banner_fade_ms: default_banner_fade_ms(),
            typewriter_ms: default_typewriter_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// JSON file holding the generated site content
    #[serde(default)]
    pub content_path: Option<PathBuf>,

    /// Where preferences and the credential are persisted
    #[serde(default)]
    pub storage_path: Option<PathBuf>,

    /// Program used to open post URLs (e.g. "xdg-open")
    #[serde(default)]
    pub browser_command: Option<String>,

    /// Origin that relative post URLs are resolved against
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &std::path::Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        toml::from_str(&content).context("Failed to parse config file")
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &std::path::Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("terminus").join("config.toml"))
    }

    /// Directory for the key-value store and the log file
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().context("Could not determine data directory")?;
        Ok(data_dir.join("terminus"))
    }

    pub fn storage_path(&self) -> Result<PathBuf> {
        match &self.site.storage_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("storage.json")),
        }
    }

    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("terminus.log"))
    }
}
