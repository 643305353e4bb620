use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `bot.token`
pub const TOKEN_ENV: &str = "BOT_TOKEN";
/// Environment variable that overrides `storage.output_dir`
pub const OUTPUT_DIR_ENV: &str = "OUTPUT_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    /// Telegram user ids allowed to talk to the bot; empty means anyone
    #[serde(default)]
    pub allowed_users: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_create_missing_dirs")]
    pub create_missing_dirs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadsConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_no_peers_check_secs")]
    pub no_peers_check_secs: u64,
}

// Default value functions
fn default_poll_timeout_secs() -> u64 {
    30
}
fn default_output_dir() -> String {
    "downloads".to_string()
}
fn default_create_missing_dirs() -> bool {
    true
}
fn default_max_concurrent() -> usize {
    4
}
fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_idle_timeout_secs() -> u64 {
    120
}
fn default_no_peers_check_secs() -> u64 {
    60
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            poll_timeout_secs: default_poll_timeout_secs(),
            allowed_users: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            create_missing_dirs: default_create_missing_dirs(),
        }
    }
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            connect_timeout_secs: default_connect_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            no_peers_check_secs: default_no_peers_check_secs(),
        }
    }
}

impl Config {
    /// Apply `BOT_TOKEN` / `OUTPUT_DIR` style overrides. `lookup` is
    /// `std::env::var` in production.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.bot.token = token.trim().to_string();
        }
        if let Some(dir) = lookup(OUTPUT_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.storage.output_dir = dir.trim().to_string();
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.output_dir)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.bot.poll_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.downloads.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.downloads.idle_timeout_secs)
    }

    pub fn no_peers_check(&self) -> Duration {
        Duration::from_secs(self.downloads.no_peers_check_secs)
    }

    pub fn is_user_allowed(&self, user_id: i64) -> bool {
        self.bot.allowed_users.is_empty() || self.bot.allowed_users.contains(&user_id)
    }
}

pub struct ConfigManager {
    config_dir: PathBuf,
    config_file: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Load the config from the platform config directory, creating a
    /// default file on first run, then apply environment overrides.
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("", "", "mediabot")
            .context("Failed to determine config directory")?;

        Self::from_path(project_dirs.config_dir().join("config.toml"))
    }

    /// Same as [`ConfigManager::new`] but for an explicit config file
    pub fn from_path(config_file: impl Into<PathBuf>) -> Result<Self> {
        let mut manager = Self::load_without_env(config_file)?;
        manager
            .config
            .apply_env_overrides(|key| std::env::var(key).ok());
        Ok(manager)
    }

    /// Load a config file as written on disk, ignoring the environment
    pub fn load_without_env(config_file: impl Into<PathBuf>) -> Result<Self> {
        let config_file = config_file.into();
        let config_dir = config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        // Create config directory if it doesn't exist
        if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;
        }

        let config = if config_file.exists() {
            Self::load_config(&config_file)?
        } else {
            let default_config = Config::default();
            Self::save_config(&config_file, &default_config)?;
            default_config
        };

        Ok(Self {
            config_dir,
            config_file,
            config,
        })
    }

    /// Get a reference to the current config
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the current config
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get the config file path
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Load config from file
    fn load_config(config_file: &Path) -> Result<Config> {
        let content = fs::read_to_string(config_file)
            .with_context(|| format!("Failed to read config file: {:?}", config_file))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_file))?;

        Ok(config)
    }

    /// Save config to file
    fn save_config(config_file: &Path, config: &Config) -> Result<()> {
        let content = toml::to_string_pretty(config).context("Failed to serialize config")?;

        fs::write(config_file, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_file))?;

        Ok(())
    }

    /// Write a default config next to the real one, or to `target`
    pub fn create_sample_config(&self, target: Option<&Path>) -> Result<PathBuf> {
        let sample_file = target
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config_dir.join("config.sample.toml"));
        Self::save_config(&sample_file, &Config::default())?;
        Ok(sample_file)
    }

    /// Check the settings every command needs. `require_token` is set for
    /// commands that talk to Telegram.
    pub fn validate(&self, require_token: bool) -> Result<()> {
        if require_token && self.config.bot.token.trim().is_empty() {
            anyhow::bail!(
                "bot token is missing: set bot.token in {:?} or the {} environment variable",
                self.config_file,
                TOKEN_ENV
            );
        }

        if self.config.storage.output_dir.trim().is_empty() {
            anyhow::bail!("storage.output_dir cannot be empty");
        }

        if self.config.downloads.max_concurrent == 0 {
            anyhow::bail!("downloads.max_concurrent must be greater than 0");
        }

        if self.config.downloads.connect_timeout_secs == 0
            || self.config.downloads.idle_timeout_secs == 0
        {
            anyhow::bail!("download timeouts must be greater than 0");
        }

        if self.config.downloads.no_peers_check_secs == 0 {
            anyhow::bail!("downloads.no_peers_check_secs must be greater than 0");
        }

        if self.config.bot.poll_timeout_secs == 0 {
            anyhow::bail!("bot.poll_timeout_secs must be greater than 0");
        }

        Ok(())
    }
}
