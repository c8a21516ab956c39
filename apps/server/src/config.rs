use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context};

use quotewarden_core::constants::{
    DEFAULT_HARD_LIMIT_SECS, DEFAULT_MARKET, DEFAULT_MAX_SYMBOLS_PER_RUN,
    DEFAULT_PROVIDER_ORDER, DEFAULT_PROVIDER_TIMEOUT_SECS, DEFAULT_SAFETY_BUFFER_SECS,
    DEFAULT_STALENESS_MINUTES,
};
use quotewarden_core::refresh::BatchSettings;
use quotewarden_core::EngineSettings;
use quotewarden_market_data::BackoffProfile;

/// Prefix of every environment variable the server reads.
pub const ENV_PREFIX: &str = "QW_";

pub struct Config {
    pub listen_addr: SocketAddr,
    pub db_path: String,
    /// `text` or `json`
    pub log_format: String,
    /// Raw credential bundle (`QW_CREDENTIALS`)
    pub credentials_json: Option<String>,
    /// Credential bundle file (`QW_CREDENTIALS_FILE`)
    pub credentials_file: Option<PathBuf>,
    pub engine: EngineSettings,
    pub batch: BatchSettings,
    pub safety_buffer_seconds: f64,
    /// Used when a request carries no `hardLimitSeconds`
    pub default_hard_limit_seconds: f64,
    pub market: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; unset and blank values take defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, key))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let listen_addr = parse_or(get("LISTEN_ADDR"), "LISTEN_ADDR", "0.0.0.0:8088".parse()?)?;
        let db_path = get("DB_PATH").unwrap_or_else(|| "./quotewarden.db".into());
        let log_format = get("LOG_FORMAT").unwrap_or_else(|| "text".into());

        let provider_order = match get("PROVIDER_ORDER") {
            Some(raw) => split_ids(&raw),
            None => DEFAULT_PROVIDER_ORDER.iter().map(|s| s.to_string()).collect(),
        };
        if provider_order.is_empty() {
            return Err(anyhow!("{}PROVIDER_ORDER names no provider", ENV_PREFIX));
        }
        let disabled_providers: HashSet<String> = get("DISABLED_PROVIDERS")
            .map(|raw| split_ids(&raw).into_iter().collect())
            .unwrap_or_default();
        let backoff_profile = match get("BACKOFF_PROFILE") {
            Some(raw) => BackoffProfile::from_str(&raw).map_err(|e| anyhow!(e))?,
            None => BackoffProfile::default(),
        };
        let provider_timeout_secs = parse_or(
            get("PROVIDER_TIMEOUT_SECONDS"),
            "PROVIDER_TIMEOUT_SECONDS",
            DEFAULT_PROVIDER_TIMEOUT_SECS,
        )?;

        let staleness_minutes = parse_or(
            get("STALENESS_MINUTES"),
            "STALENESS_MINUTES",
            DEFAULT_STALENESS_MINUTES,
        )?;
        let staleness = chrono::Duration::try_minutes(staleness_minutes)
            .filter(|d| *d >= chrono::Duration::zero())
            .ok_or_else(|| {
                anyhow!(
                    "{}STALENESS_MINUTES out of range: {}",
                    ENV_PREFIX,
                    staleness_minutes
                )
            })?;
        let max_symbols_per_run = parse_or(
            get("MAX_SYMBOLS_PER_RUN"),
            "MAX_SYMBOLS_PER_RUN",
            DEFAULT_MAX_SYMBOLS_PER_RUN,
        )?;
        let workers: usize = parse_or(get("WORKERS"), "WORKERS", 1)?;

        let safety_buffer_seconds = seconds_or(
            get("SAFETY_BUFFER_SECONDS"),
            "SAFETY_BUFFER_SECONDS",
            DEFAULT_SAFETY_BUFFER_SECS as f64,
        )?;
        let default_hard_limit_seconds = seconds_or(
            get("DEFAULT_HARD_LIMIT_SECONDS"),
            "DEFAULT_HARD_LIMIT_SECONDS",
            DEFAULT_HARD_LIMIT_SECS as f64,
        )?;

        Ok(Self {
            listen_addr,
            db_path,
            log_format,
            credentials_json: get("CREDENTIALS"),
            credentials_file: get("CREDENTIALS_FILE").map(PathBuf::from),
            engine: EngineSettings {
                provider_order,
                disabled_providers,
                backoff_profile,
                provider_timeout: Duration::from_secs(provider_timeout_secs),
            },
            batch: BatchSettings {
                staleness,
                max_symbols_per_run,
                workers: workers.max(1),
            },
            safety_buffer_seconds,
            default_hard_limit_seconds,
            market: get("MARKET").unwrap_or_else(|| DEFAULT_MARKET.to_string()),
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .parse()
            .with_context(|| format!("Invalid {}{}: '{}'", ENV_PREFIX, key, value)),
        None => Ok(default),
    }
}

/// A second count that fits a `Duration`.
fn seconds_or(raw: Option<String>, key: &str, default: f64) -> anyhow::Result<f64> {
    let value: f64 = parse_or(raw, key, default)?;
    if !value.is_finite() || Duration::try_from_secs_f64(value).is_err() {
        return Err(anyhow!("{}{} out of range: {}", ENV_PREFIX, key, value));
    }
    Ok(value)
}

fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
