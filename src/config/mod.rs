//! Configuration management.
//!
//! Settings come from an optional TOML file plus `EQ_FETCH_*` environment
//! variables (nested keys use `__`, e.g. `EQ_FETCH_HTTP__TIMEOUT_SECS=90`).
//!
//! ```toml
//! [endpoints]
//! bibliography_url = "https://www.isc.ac.uk/cgi-bin/bibsearch.pl"
//! hypocenter_url = "https://www.isc.ac.uk/cgi-bin/web-db-run"
//!
//! [http]
//! timeout_secs = 60
//!
//! [retry]
//! max_retries = 2
//! initial_delay_ms = 500
//!
//! [search]
//! max_concurrent = 4
//! split_step_days = 7
//! malformed_policy = "skip"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::parse::MalformedPolicy;
use crate::query::{Endpoint, BIBLIOGRAPHY_URL, EVENT_BIBLIOGRAPHY_URL, HYPOCENTER_URL};
use crate::search::{SearchOptions, SplitStrategy};
use crate::utils::{default_user_agent, RetryConfig};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "EQ_FETCH";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Provider URLs
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Transport retry settings
    #[serde(default)]
    pub retry: RetrySettings,

    /// Search controller settings
    #[serde(default)]
    pub search: SearchSettings,
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Controller options derived from these settings
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            retry: self.retry.to_retry_config(),
            timeout: self.http.timeout(),
            max_concurrent: self.search.max_concurrent.max(1),
            split: match self.search.split_step_days {
                Some(days) if days > 0 => SplitStrategy::Step { days },
                _ => SplitStrategy::Bisect,
            },
            malformed: self.search.malformed_policy,
        }
    }
}

/// Base URLs of the ISC forms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_bibliography_url")]
    pub bibliography_url: String,

    #[serde(default = "default_hypocenter_url")]
    pub hypocenter_url: String,

    #[serde(default = "default_event_bibliography_url")]
    pub event_bibliography_url: String,
}

impl EndpointConfig {
    /// Every endpoint rooted at another host, e.g. a mirror or a test server
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            bibliography_url: format!("{}/cgi-bin/bibsearch.pl", base),
            hypocenter_url: format!("{}/cgi-bin/web-db-run", base),
            event_bibliography_url: format!("{}/cgi-bin/FormatBibprint.pl", base),
        }
    }

    pub fn url_for(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Bibliography => &self.bibliography_url,
            Endpoint::Hypocenter => &self.hypocenter_url,
            Endpoint::EventBibliography => &self.event_bibliography_url,
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            bibliography_url: default_bibliography_url(),
            hypocenter_url: default_hypocenter_url(),
            event_bibliography_url: default_event_bibliography_url(),
        }
    }
}

fn default_bibliography_url() -> String {
    BIBLIOGRAPHY_URL.to_string()
}

fn default_hypocenter_url() -> String {
    HYPOCENTER_URL.to_string()
}

fn default_event_bibliography_url() -> String {
    EVENT_BIBLIOGRAPHY_URL.to_string()
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent_string")]
    pub user_agent: String,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent_string(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_user_agent_string() -> String {
    default_user_agent().to_string()
}

/// Retry configuration for transient transport failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter,
            ..RetryConfig::default()
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: true,
        }
    }
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

/// Search controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Sub-range fetches allowed in flight at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Split overflowing ranges into chunks of this many days instead of
    /// bisecting them
    #[serde(default)]
    pub split_step_days: Option<u32>,

    #[serde(default)]
    pub malformed_policy: MalformedPolicy,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            split_step_days: None,
            malformed_policy: MalformedPolicy::default(),
        }
    }
}

fn default_max_concurrent() -> usize {
    4
}

/// Load configuration from a file, with environment overrides
pub fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    settings.try_deserialize()
}

/// Configuration from environment variables and defaults only
pub fn get_config() -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    settings.try_deserialize()
}

/// Look for `eq-fetch.toml` in the working directory, then
/// `<config dir>/eq-fetch/config.toml`
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("eq-fetch.toml");
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("eq-fetch").join("config.toml"))
        .filter(|path| path.is_file())
}
