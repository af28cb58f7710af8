use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_API_URL: &str = "https://api.clickup.com/api/v2";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;

const ENV_DB: &str = "CLICKUPDW_DB";
const ENV_API_URL: &str = "CLICKUP_API_URL";
const ENV_REQUEST_TIMEOUT_SECS: &str = "CLICKUP_REQUEST_TIMEOUT_SECS";
const ENV_BIND: &str = "CLICKUPDW_BIND";
const ENV_DEFAULT_DAYS: &str = "CLICKUPDW_DEFAULT_DAYS";

/// Runtime configuration, resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file. `None` means `~/.clickupdw/clickupdw.db`.
    pub db_path: Option<PathBuf>,
    pub api_url: String,
    pub request_timeout: Duration,
    pub bind: String,
    /// Look-back window for the HTTP trigger surface when `days` is omitted.
    pub default_days: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            api_url: DEFAULT_API_URL.to_owned(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            bind: DEFAULT_BIND.to_owned(),
            default_days: DEFAULT_LOOKBACK_DAYS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let timeout_secs = get(ENV_REQUEST_TIMEOUT_SECS)
            .map(|raw| parse_positive::<u64>(ENV_REQUEST_TIMEOUT_SECS, &raw))
            .transpose()?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let default_days = get(ENV_DEFAULT_DAYS)
            .map(|raw| parse_positive::<u32>(ENV_DEFAULT_DAYS, &raw))
            .transpose()?
            .unwrap_or(DEFAULT_LOOKBACK_DAYS);

        Ok(Self {
            db_path: get(ENV_DB).map(PathBuf::from),
            api_url: get(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_owned()),
            request_timeout: Duration::from_secs(timeout_secs),
            bind: get(ENV_BIND).unwrap_or_else(|| DEFAULT_BIND.to_owned()),
            default_days,
        })
    }

    /// The database path, falling back to the home directory default.
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.db_path {
            return Ok(path.clone());
        }
        let dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
            .join(".clickupdw");
        std::fs::create_dir_all(&dir).map_err(|e| Error::Config(e.to_string()))?;
        Ok(dir.join("clickupdw.db"))
    }
}

fn parse_positive<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr + PartialEq + Default,
{
    match raw.parse::<T>() {
        Ok(value) if value != T::default() => Ok(value),
        _ => Err(Error::Config(format!(
            "{key} must be a non-zero integer, got '{raw}'"
        ))),
    }
}
