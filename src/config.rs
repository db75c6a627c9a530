use std::env;
use std::time::Duration;

use anyhow::Context;

use crate::layout::LayoutConfig;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_MOVE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SHELL_BIND: &str = "127.0.0.1:4020";

#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    pub base_url: String,
    pub bearer_token: Option<String>,
    /// How long a move may stay pending before it is rolled back.
    pub move_timeout: Duration,
    pub request_timeout: Duration,
    pub shell_bind: String,
    pub layout: LayoutConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            bearer_token: None,
            move_timeout: DEFAULT_MOVE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            shell_bind: DEFAULT_SHELL_BIND.to_string(),
            layout: LayoutConfig::default(),
        }
    }
}

impl EditorConfig {
    /// Reads `DOCSYNC_*` variables; unset variables keep their defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(base_url) = non_empty(lookup("DOCSYNC_API_BASE_URL")) {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        config.bearer_token = non_empty(lookup("DOCSYNC_API_TOKEN"));
        if let Some(value) = non_empty(lookup("DOCSYNC_MOVE_TIMEOUT_MS")) {
            config.move_timeout = parse_millis("DOCSYNC_MOVE_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = non_empty(lookup("DOCSYNC_REQUEST_TIMEOUT_MS")) {
            config.request_timeout = parse_millis("DOCSYNC_REQUEST_TIMEOUT_MS", &value)?;
        }
        if let Some(bind) = non_empty(lookup("DOCSYNC_SHELL_BIND")) {
            config.shell_bind = bind;
        }

        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_millis(name: &str, value: &str) -> anyhow::Result<Duration> {
    let millis = value
        .parse::<u64>()
        .with_context(|| format!("invalid {} '{}'", name, value))?;
    anyhow::ensure!(millis > 0, "{} must be greater than zero", name);
    Ok(Duration::from_millis(millis))
}
