//! Run configuration loaded from YAML.
//!
//! Every field has a default, so a partial file (or no file at all) yields a
//! usable configuration.
//!
//! ```yaml
//! app:
//!   site: https://mangapoisk.io
//!   request_timeout: 25
//!   concurrency: 6
//!   retry: { attempts: 3, base_delay: 1.0, max_delay: 8.0 }
//! download:
//!   retry: { attempts: 4, base_delay: 1.0, max_delay: 8.0 }
//! network:
//!   headers:
//!     user_agent: Mozilla/5.0
//!   cookie_file: config/cookies.json
//! layout:
//!   volume_prefix: "Volume "
//!   chapter_prefix: "Chapter "
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::net::RetryPolicy;

/// Location probed when no configuration path is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Upper bound for every timeout and delay, in seconds.
pub const MAX_SECONDS: f64 = 86_400.0;

/// Converts validated seconds to a `Duration`; out-of-range values saturate
/// to `[0, MAX_SECONDS]` and NaN becomes zero.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.clamp(0.0, MAX_SECONDS)).unwrap_or_default()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub download: DownloadConfig,
    pub network: NetworkConfig,
    pub layout: LayoutConfig,
}

impl Config {
    /// Reads and validates a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::filesystem(path, e))?;
        let config = Self::from_yaml(&raw)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Loads `path` if given, else [`DEFAULT_CONFIG_PATH`] if it exists,
    /// else the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parses and validates configuration from YAML text.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Config = if raw.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.app.concurrency == 0 {
            return Err(Error::config("app.concurrency must be at least 1"));
        }
        let timeout = self.app.request_timeout;
        if !timeout.is_finite() || timeout <= 0.0 || timeout > MAX_SECONDS {
            return Err(Error::config(format!(
                "app.request_timeout must be in (0, {}] seconds",
                MAX_SECONDS
            )));
        }
        self.app.retry.validate("app.retry")?;
        self.download.retry.validate("download.retry")?;
        url::Url::parse(&self.app.site)
            .map_err(|e| Error::config(format!("app.site is not a URL: {}", e)))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the site
    pub site: String,

    /// Per-request timeout in seconds
    pub request_timeout: f64,

    /// Fetch client retry budget
    pub retry: RetryConfig,

    /// Parallel page downloads per chapter
    pub concurrency: usize,

    /// Root of the local library
    pub downloads_dir: PathBuf,

    /// Directory for run log files
    pub log_dir: PathBuf,
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        seconds(self.request_timeout)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            site: "https://mangapoisk.io".to_string(),
            request_timeout: 25.0,
            retry: RetryConfig::fetch(),
            concurrency: 6,
            downloads_dir: PathBuf::from("Downloads"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Per-page retry budget
    pub retry: RetryConfig,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::download(),
        }
    }
}

/// Attempt budget with delays in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub base_delay: f64,
    pub max_delay: f64,
}

impl RetryConfig {
    pub fn fetch() -> Self {
        Self {
            attempts: 3,
            base_delay: 1.0,
            max_delay: 8.0,
        }
    }

    pub fn download() -> Self {
        Self {
            attempts: 4,
            ..Self::fetch()
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.attempts,
            seconds(self.base_delay),
            seconds(self.max_delay),
        )
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.attempts == 0 {
            return Err(Error::config(format!("{}.attempts must be at least 1", name)));
        }
        let finite = self.base_delay.is_finite() && self.max_delay.is_finite();
        if !finite
            || self.base_delay < 0.0
            || self.base_delay > self.max_delay
            || self.max_delay > MAX_SECONDS
        {
            return Err(Error::config(format!(
                "{} delays must satisfy 0 <= base_delay <= max_delay <= {}",
                name, MAX_SECONDS
            )));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::fetch()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Default request headers; keys like `user_agent` are normalized
    pub headers: BTreeMap<String, String>,

    /// JSON file holding a list of cookie seeds
    pub cookie_file: Option<PathBuf>,

    /// Inline cookie seeds
    pub cookies: Vec<CookieSeed>,
}

impl NetworkConfig {
    /// The inline cookies followed by those of the cookie file.
    ///
    /// A missing or unreadable cookie file is logged and ignored.
    pub fn load_cookies(&self) -> Vec<CookieSeed> {
        let mut cookies = self.cookies.clone();
        let Some(path) = &self.cookie_file else {
            return cookies;
        };
        if !path.exists() {
            debug!(path = %path.display(), "cookie file not found");
            return cookies;
        }
        match read_cookie_file(path) {
            Ok(seeds) => cookies.extend(seeds),
            Err(e) => warn!(path = %path.display(), error = %e, "ignoring cookie file"),
        }
        cookies
    }
}

fn read_cookie_file(path: &Path) -> Result<Vec<CookieSeed>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// A cookie to preload into the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieSeed {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
}

/// Directory naming of the local library.
///
/// Chapters land in `<downloads>/<slug>/<volume_prefix><NN>/<chapter_prefix><label>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub volume_prefix: String,
    pub chapter_prefix: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            volume_prefix: "Volume ".to_string(),
            chapter_prefix: "Chapter ".to_string(),
        }
    }
}
