use std::str::FromStr;

use crate::auth::jwt::JwtConfig;

/// Server configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed by CORS.
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-flight webhook processing.
    pub shutdown_timeout_secs: u64,
    /// Domain events a slow subscriber may fall behind before losing some.
    pub event_bus_capacity: usize,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from the environment.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    /// | `EVENT_BUS_CAPACITY`    | `1024`                  |
    ///
    /// See [`JwtConfig::from_env`] for the token settings.
    ///
    /// # Panics
    ///
    /// Panics on a value that does not parse.
    pub fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0".to_string()),
            port: env_or("PORT", 3000),
            cors_origins: parse_origins(
                &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
            ),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30),
            event_bus_capacity: env_or(
                "EVENT_BUS_CAPACITY",
                campus_events::bus::DEFAULT_CAPACITY,
            ),
            jwt: JwtConfig::from_env(),
        }
    }
}

/// Read and parse `key`, falling back to `default` when unset.
pub(crate) fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => default,
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
