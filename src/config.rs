//! Configuration for newsboard, read from `.newsboard/newsboard.toml`.
//!
//! Layered file → environment → CLI. Environment variables (also picked up
//! from a `.env` file) override file values; CLI flags override both.
//!
//! # Configuration File Format
//!
//! ```toml
//! [backend]
//! url = "https://project.example.co"
//! api_key = "public-anon-key"
//! request_timeout_secs = 30
//!
//! [session]
//! user_id = "0d5c..."
//! email = "editor@example.com"
//!
//! [webhooks]
//! promotion_url = "https://automation.example.com/webhook/rewrite"
//! review_complete_url = "https://automation.example.com/webhook/publish"
//! max_attempts = 1
//! backoff_ms = 500
//!
//! [realtime]
//! poll_interval_secs = 5
//!
//! [server]
//! port = 3180
//! dev_mode = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use newsboard_common::{Session, UserIdentity};
use serde::{Deserialize, Serialize};

use crate::board::{RestConfig, RetryPolicy};
use crate::errors::BoardError;

pub const CONFIG_DIR: &str = ".newsboard";
pub const CONFIG_FILE: &str = "newsboard.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSection {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// User access token; requests fall back to the api key when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            access_token: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhooksSection {
    #[serde(default)]
    pub promotion_url: Option<String>,
    #[serde(default)]
    pub review_complete_url: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    1
}

fn default_backoff_ms() -> u64 {
    500
}

impl Default for WebhooksSection {
    fn default() -> Self {
        Self {
            promotion_url: None,
            review_complete_url: None,
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSection {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Default for RealtimeSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_port() -> u16 {
    3180
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            dev_mode: false,
        }
    }
}

/// The complete newsboard.toml configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsboardConfig {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub webhooks: WebhooksSection,
    #[serde(default)]
    pub realtime: RealtimeSection,
    #[serde(default)]
    pub server: ServerSection,
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub dev_mode: bool,
    pub user_id: Option<String>,
}

impl NewsboardConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse newsboard.toml")
    }

    /// Default config path under `project_dir`.
    pub fn default_path(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load from `path` if it exists, else defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content =
            toml::to_string_pretty(self).context("Failed to serialize newsboard.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay values from `lookup`. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("NEWSBOARD_BACKEND_URL") {
            self.backend.url = Some(v);
        }
        if let Some(v) = get("NEWSBOARD_API_KEY") {
            self.backend.api_key = Some(v);
        }
        if let Some(v) = get("NEWSBOARD_ACCESS_TOKEN") {
            self.backend.access_token = Some(v);
        }
        if let Some(v) = get("NEWSBOARD_USER_ID") {
            self.session.user_id = Some(v);
        }
        if let Some(v) = get("NEWSBOARD_USER_EMAIL") {
            self.session.email = Some(v);
        }
        if let Some(v) = get("NEWSBOARD_PROMOTION_WEBHOOK") {
            self.webhooks.promotion_url = Some(v);
        }
        if let Some(v) = get("NEWSBOARD_REVIEW_WEBHOOK") {
            self.webhooks.review_complete_url = Some(v);
        }
    }

    pub fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if cli.dev_mode {
            self.server.dev_mode = true;
        }
        if let Some(user_id) = &cli.user_id {
            self.session.user_id = Some(user_id.clone());
        }
    }

    /// Session for the configured user, anonymous when none is set.
    pub fn session(&self) -> Session {
        match &self.session.user_id {
            Some(id) => Session::authenticated(UserIdentity {
                id: id.clone(),
                email: self.session.email.clone(),
            }),
            None => Session::anonymous(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.webhooks.max_attempts.max(1),
            base_delay: Duration::from_millis(self.webhooks.backoff_ms),
            ..RetryPolicy::default()
        }
    }

    /// Connection settings for the hosted backend.
    pub fn rest_config(&self) -> Result<RestConfig, BoardError> {
        let base_url = self
            .backend
            .url
            .clone()
            .ok_or_else(|| BoardError::Config("backend.url is not set".into()))?;
        let api_key = self
            .backend
            .api_key
            .clone()
            .ok_or_else(|| BoardError::Config("backend.api_key is not set".into()))?;
        Ok(RestConfig {
            base_url,
            api_key,
            access_token: self.backend.access_token.clone(),
            request_timeout: self.request_timeout(),
            poll_interval: Duration::from_secs(self.realtime.poll_interval_secs.max(1)),
        })
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.backend.url.is_none() {
            warnings.push("backend.url is not set; only --seed runs will work".to_string());
        }
        if self.session.user_id.is_none() {
            warnings.push("session.user_id is not set; the board is read-only".to_string());
        }
        if self.webhooks.promotion_url.is_none() {
            warnings.push("webhooks.promotion_url is not set".to_string());
        }
        if self.webhooks.review_complete_url.is_none() {
            warnings.push("webhooks.review_complete_url is not set".to_string());
        }
        if self.backend.request_timeout_secs == 0 {
            warnings.push("backend.request_timeout_secs must be greater than 0".to_string());
        }
        warnings
    }
}
