use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::services::StorePolicy;

#[derive(Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: Option<String>,
    pub hmac_secret_key: Option<String>,
    pub max_webhook_age_seconds: i64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout: Duration,
    pub store_timeout: Duration,
    pub store_max_retries: u32,
    pub store_retry_backoff: Duration,
    pub webhook_rate_limit: RateLimitSpec,
    pub api_rate_limit: RateLimitSpec,
    pub monitoring_api_key: Option<String>,
    pub log_request_body: bool,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_port: 3000,
            database_url: None,
            hmac_secret_key: None,
            max_webhook_age_seconds: 300,
            db_max_connections: 10,
            db_min_connections: 2,
            db_acquire_timeout: Duration::from_millis(5000),
            store_timeout: Duration::from_millis(5000),
            store_max_retries: 2,
            store_retry_backoff: Duration::from_millis(50),
            webhook_rate_limit: RateLimitSpec::per(30, RateWindow::Minute),
            api_rate_limit: RateLimitSpec::per(30, RateWindow::Minute),
            monitoring_api_key: None,
            log_request_body: false,
            log_format: LogFormat::Pretty,
        }
    }
}

// Secrets and credentials never reach log output.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_port", &self.server_port)
            .field(
                "database_url",
                &self.database_url.as_deref().map(mask_password),
            )
            .field("hmac_secret_key", &self.hmac_secret_key.as_ref().map(|_| "****"))
            .field("max_webhook_age_seconds", &self.max_webhook_age_seconds)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout", &self.db_acquire_timeout)
            .field("store_timeout", &self.store_timeout)
            .field("store_max_retries", &self.store_max_retries)
            .field("store_retry_backoff", &self.store_retry_backoff)
            .field("webhook_rate_limit", &self.webhook_rate_limit.to_string())
            .field("api_rate_limit", &self.api_rate_limit.to_string())
            .field(
                "monitoring_api_key",
                &self.monitoring_api_key.as_ref().map(|_| "****"),
            )
            .field("log_request_body", &self.log_request_body)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unset and blank values fall
    /// back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Config::default();

        let database_url = get("DATABASE_URL");
        if let Some(url) = &database_url {
            validate_database_url(url)?;
        }

        let config = Config {
            server_port: parse_or(&get, "SERVER_PORT", defaults.server_port)?,
            database_url,
            hmac_secret_key: get("HMAC_SECRET_KEY"),
            max_webhook_age_seconds: parse_or(
                &get,
                "MAX_WEBHOOK_AGE_SECONDS",
                defaults.max_webhook_age_seconds,
            )?,
            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            db_min_connections: parse_or(&get, "DB_MIN_CONNECTIONS", defaults.db_min_connections)?,
            db_acquire_timeout: Duration::from_millis(parse_or(&get, "DB_ACQUIRE_TIMEOUT_MS", 5000)?),
            store_timeout: Duration::from_millis(parse_or(&get, "STORE_TIMEOUT_MS", 5000)?),
            store_max_retries: parse_or(&get, "STORE_MAX_RETRIES", defaults.store_max_retries)?,
            store_retry_backoff: Duration::from_millis(parse_or(&get, "STORE_RETRY_BACKOFF_MS", 50)?),
            webhook_rate_limit: parse_or(&get, "WEBHOOK_RATE_LIMIT", defaults.webhook_rate_limit)?,
            api_rate_limit: parse_or(&get, "API_RATE_LIMIT", defaults.api_rate_limit)?,
            monitoring_api_key: get("MONITORING_API_KEY"),
            log_request_body: parse_or(&get, "LOG_REQUEST_BODY", false)?,
            log_format: parse_or(&get, "LOG_FORMAT", defaults.log_format)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_port == 0 {
            bail!("SERVER_PORT must be greater than 0");
        }
        check_range("MAX_WEBHOOK_AGE_SECONDS", self.max_webhook_age_seconds, 1, 3600)?;
        check_range("DB_MAX_CONNECTIONS", self.db_max_connections, 1, 100)?;
        check_range(
            "DB_MIN_CONNECTIONS",
            self.db_min_connections,
            0,
            self.db_max_connections,
        )?;
        check_range("DB_ACQUIRE_TIMEOUT_MS", millis(self.db_acquire_timeout), 100, 60_000)?;
        check_range("STORE_TIMEOUT_MS", millis(self.store_timeout), 100, 60_000)?;
        check_range("STORE_MAX_RETRIES", self.store_max_retries, 0, 5)?;
        check_range("STORE_RETRY_BACKOFF_MS", millis(self.store_retry_backoff), 1, 10_000)?;
        Ok(())
    }

    /// Fails when no database is configured; only in-memory serving may skip it.
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set (or run `serve --in-memory`)")
    }

    pub fn store_policy(&self) -> StorePolicy {
        StorePolicy::new(
            self.store_timeout,
            self.store_max_retries,
            self.store_retry_backoff,
        )
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value: {}", key, e)),
        None => Ok(default),
    }
}

fn check_range<T>(key: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + fmt::Display,
{
    if value < min || value > max {
        bail!("{} must be between {} and {}, got {}", key, min, max, value);
    }
    Ok(())
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis().try_into().unwrap_or(u64::MAX)
}

pub fn validate_database_url(url: &str) -> Result<()> {
    if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
        bail!("DATABASE_URL must start with postgres:// or postgresql://");
    }
    url::Url::parse(url).context("DATABASE_URL is not a valid URL")?;
    Ok(())
}

/// Replaces the password in a connection URL with `****`.
pub fn mask_password(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("****"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<unparseable url>".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateWindow {
    Second,
    Minute,
    Hour,
    Day,
}

impl RateWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateWindow::Second => "second",
            RateWindow::Minute => "minute",
            RateWindow::Hour => "hour",
            RateWindow::Day => "day",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            RateWindow::Second => Duration::from_secs(1),
            RateWindow::Minute => Duration::from_secs(60),
            RateWindow::Hour => Duration::from_secs(60 * 60),
            RateWindow::Day => Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// A quota such as `30/minute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSpec {
    pub requests: u32,
    pub window: RateWindow,
}

impl RateLimitSpec {
    pub fn per(requests: u32, window: RateWindow) -> Self {
        Self { requests, window }
    }
}

impl fmt::Display for RateLimitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.requests, self.window.as_str())
    }
}

impl FromStr for RateLimitSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (count, window) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| format!("expected <n>/<window>, got '{}'", s))?;

        let requests: u32 = count
            .trim()
            .parse()
            .map_err(|_| format!("'{}' is not a request count", count.trim()))?;
        if requests == 0 {
            return Err("request count must be at least 1".to_string());
        }

        let window = match window.trim().to_ascii_lowercase().as_str() {
            "second" | "s" => RateWindow::Second,
            "minute" | "m" => RateWindow::Minute,
            "hour" | "h" => RateWindow::Hour,
            "day" | "d" => RateWindow::Day,
            other => return Err(format!("unknown window '{}'", other)),
        };

        Ok(Self { requests, window })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}
