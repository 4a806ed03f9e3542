//! Client and session configuration.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_STORAGE_KEY: &str = "apiTabs";
pub const DEFAULT_MAX_TABS: usize = 10;
pub const DEFAULT_DATA_DIR: &str = ".testrunner";

/// How to reach the execution backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Bearer credential attached to every call when present.
    pub token: Option<String>,
    pub timeout: Duration,
    /// Extra attempts after a failed connection. Requests that reached the
    /// backend are never resent.
    pub retries: u32,
    /// Delay before retry `n` is `n * retry_delay`.
    pub retry_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(30),
            retries: 0,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Tab store settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    max_tabs: usize,
    pub storage_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tabs: DEFAULT_MAX_TABS,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

impl SessionConfig {
    /// Tab limit, never below 1.
    pub fn max_tabs(&self) -> usize {
        self.max_tabs
    }

    pub fn with_max_tabs(mut self, max_tabs: usize) -> Self {
        self.max_tabs = max_tabs.max(1);
        self
    }
}

/// Data directory used by file-backed storage when none is given.
pub fn default_data_dir() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(DEFAULT_DATA_DIR)
}
