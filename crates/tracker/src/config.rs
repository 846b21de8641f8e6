use std::time::Duration;

/// Errors raised while loading [`TrackerConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable was set to a value that does not parse.
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Tracker configuration loaded from environment variables.
///
/// All fields have defaults suitable for a backend running locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Base URL of the REST endpoints.
    pub api_url: String,
    /// WebSocket endpoint of the push channel.
    pub events_url: String,
    /// Period of the status poll (default: 5s).
    pub poll_interval: Duration,
    /// Bound on a single status or results request (default: 30s).
    pub request_timeout: Duration,
    /// Bound on waiting for background tasks at teardown (default: 5s).
    pub shutdown_timeout: Duration,
}

const DEFAULT_API_URL: &str = "http://localhost:3000/api";
const DEFAULT_EVENTS_URL: &str = "ws://localhost:3000/events";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            events_url: DEFAULT_EVENTS_URL.into(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        }
    }
}

impl TrackerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                      |
    /// |-------------------------|------------------------------|
    /// | `AUDITWATCH_API_URL`    | `http://localhost:3000/api`  |
    /// | `AUDITWATCH_EVENTS_URL` | `ws://localhost:3000/events` |
    /// | `POLL_INTERVAL_SECS`    | `5`                          |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                         |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `5`                          |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through
    /// `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("AUDITWATCH_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into());
        let events_url =
            lookup("AUDITWATCH_EVENTS_URL").unwrap_or_else(|| DEFAULT_EVENTS_URL.into());

        let poll_interval = secs(&lookup, "POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let request_timeout = secs(
            &lookup,
            "REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        let shutdown_timeout = secs(
            &lookup,
            "SHUTDOWN_TIMEOUT_SECS",
            DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        )?;

        Ok(Self {
            api_url,
            events_url,
            poll_interval,
            request_timeout,
            shutdown_timeout,
        })
    }
}

/// Parse a positive number of seconds.
fn secs(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(Duration::from_secs(default));
    };
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(Duration::from_secs(n)),
        _ => Err(ConfigError::Invalid { var, value }),
    }
}
