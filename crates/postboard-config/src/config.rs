//! Configuration management for the client.

use crate::{CoreError, CoreResult, LogFormat, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default Supabase URL (can be overridden at compile time via SUPABASE_URL env var).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("SUPABASE_URL") {
    Some(url) => url,
    None => "your_supabase_project_url_here",
};

/// Default Supabase anon key (can be overridden at compile time via SUPABASE_ANON_KEY env var).
pub const DEFAULT_SUPABASE_ANON_KEY: &str = match option_env!("SUPABASE_ANON_KEY") {
    Some(key) => key,
    None => "your_supabase_anon_key_here",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Refresh the access token this many seconds before it expires.
pub const DEFAULT_REFRESH_MARGIN_SECS: u64 = 60;

const PLACEHOLDER_URL: &str = "your_supabase_project_url_here";
const PLACEHOLDER_ANON_KEY: &str = "your_supabase_anon_key_here";

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Supabase project URL.
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Supabase anon API key (public, safe to ship in the client).
    #[serde(default = "default_supabase_anon_key")]
    pub supabase_anon_key: String,
    /// Seconds before expiry at which the background refresher renews the token.
    #[serde(default = "default_refresh_margin_secs")]
    pub refresh_margin_secs: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_anon_key() -> String {
    DEFAULT_SUPABASE_ANON_KEY.to_string()
}

fn default_refresh_margin_secs() -> u64 {
    DEFAULT_REFRESH_MARGIN_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            supabase_url: default_supabase_url(),
            supabase_anon_key: default_supabase_anon_key(),
            refresh_margin_secs: DEFAULT_REFRESH_MARGIN_SECS,
        }
    }
}

impl Config {
    /// Load configuration from the config file (if present), then apply
    /// environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Override fields from environment-style variables.
    ///
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(level) = lookup("POSTBOARD_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = lookup("POSTBOARD_SUPABASE_URL") {
            self.supabase_url = url.trim_end_matches('/').to_string();
        }
        if let Some(key) = lookup("POSTBOARD_SUPABASE_ANON_KEY") {
            self.supabase_anon_key = key;
        }
    }

    /// Check that the Supabase settings are present and not placeholders.
    pub fn validate(&self) -> CoreResult<()> {
        let url_missing = self.supabase_url.trim().is_empty() || self.supabase_url == PLACEHOLDER_URL;
        let key_missing =
            self.supabase_anon_key.trim().is_empty() || self.supabase_anon_key == PLACEHOLDER_ANON_KEY;

        if url_missing || key_missing {
            return Err(CoreError::Config(format!(
                "Missing or invalid Supabase settings. Set POSTBOARD_SUPABASE_URL and \
                 POSTBOARD_SUPABASE_ANON_KEY (Project URL and anon key from the Supabase \
                 dashboard under Settings > API). Current values: URL: {}, KEY: {}",
                if url_missing { "NOT SET" } else { self.supabase_url.as_str() },
                mask_key(&self.supabase_anon_key, key_missing),
            )));
        }

        self.supabase_url()?;
        Ok(())
    }

    /// Get the Supabase URL as a parsed URL.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(CoreError::from)
    }
}

fn mask_key(key: &str, missing: bool) -> String {
    if missing {
        return "NOT SET".to_string();
    }
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("***{}", tail)
}
