use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Cli;

/// How to treat a chat whose number WhatsApp Web explicitly rejects.
///
/// The invalid-number banner is deterministic, so `FailFast` records the
/// failure after a single attempt. `Retry` burns the full retry budget on it
/// anyway, which is what some operators prefer when the banner occasionally
/// shows up for numbers that are actually reachable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidNumberPolicy {
    #[default]
    FailFast,
    Retry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Contacts spreadsheet (.xlsx, .xls or .csv)
    pub contacts_file: PathBuf,
    /// Image attached to every message
    pub image_file: PathBuf,
    /// Caption template file; `{name}` is replaced per contact
    pub caption_file: PathBuf,
    /// Per-contact outcome log, truncated at run start
    pub feedback_file: PathBuf,
    /// WebDriver endpoint (chromedriver)
    pub webdriver_url: String,
    pub home_url: String,
    /// Ceiling for the manual QR authentication poll
    pub auth_wait_secs: u64,
    /// Ceiling for the per-chat composer readiness poll
    pub chat_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Retries per contact on top of the first attempt
    pub max_retries: u32,
    pub retry_pause_secs: u64,
    pub contact_pause_secs: u64,
    pub invalid_number_policy: InvalidNumberPolicy,
    /// Global hotkey that stops the run at the next contact boundary
    pub stop_shortcut: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            contacts_file: PathBuf::from("data.xlsx"),
            image_file: PathBuf::from("image.png"),
            caption_file: PathBuf::from("WHATSDRAFT.txt"),
            feedback_file: PathBuf::from("feedback.txt"),
            webdriver_url: "http://localhost:9515".to_string(),
            home_url: "https://web.whatsapp.com/".to_string(),
            auth_wait_secs: 45,
            chat_timeout_secs: 45,
            poll_interval_ms: 1000,
            max_retries: 3,
            retry_pause_secs: 5,
            contact_pause_secs: 2,
            invalid_number_policy: InvalidNumberPolicy::default(),
            stop_shortcut: "CTRL+E".to_string(),
        }
    }
}

impl Config {
    /// Loads the configuration from `path` (must exist when given) or from
    /// the default location, falling back to defaults when no file is
    /// present. The file is JSONC, so comments and trailing commas are fine.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_config_path(), false),
        };

        if !path.exists() {
            if required {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let value = jsonc_parser::parse_to_serde_value(&text, &Default::default())
            .with_context(|| format!("Failed to parse config file {}", path.display()))?
            .unwrap_or(serde_json::Value::Object(Default::default()));
        let config = serde_json::from_value(value)
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(config)
    }

    /// Command-line flags win over config-file values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(path) = &cli.contacts {
            self.contacts_file = path.clone();
        }
        if let Some(path) = &cli.image {
            self.image_file = path.clone();
        }
        if let Some(path) = &cli.caption {
            self.caption_file = path.clone();
        }
        if let Some(path) = &cli.feedback {
            self.feedback_file = path.clone();
        }
        if let Some(url) = &cli.webdriver_url {
            self.webdriver_url = url.clone();
        }
        if let Some(retries) = cli.max_retries {
            self.max_retries = retries;
        }
        if let Some(secs) = cli.auth_wait_secs {
            self.auth_wait_secs = secs;
        }
        if let Some(shortcut) = &cli.stop_shortcut {
            self.stop_shortcut = shortcut.clone();
        }
        if cli.retry_invalid {
            self.invalid_number_policy = InvalidNumberPolicy::Retry;
        }
    }

    pub fn auth_wait(&self) -> Duration {
        Duration::from_secs(self.auth_wait_secs)
    }

    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.chat_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(100))
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_secs(self.retry_pause_secs)
    }

    pub fn contact_pause(&self) -> Duration {
        Duration::from_secs(self.contact_pause_secs)
    }
}

fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "wablast")
        .map(|dirs| dirs.config_dir().join("config.jsonc"))
        .unwrap_or_else(|| PathBuf::from("config.jsonc"))
}
