use std::time::Duration;

/// Runtime configuration, read from the environment by the binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Pool size. In-memory databases must use 1 so every query sees the
    /// same database.
    pub database_max_connections: u32,
    pub port: u16,
    /// How long a session may stay DISCONNECTED before it is aborted.
    pub disconnect_timeout: Duration,
    /// Store failures tolerated by a firing watchdog before it gives up.
    pub watchdog_max_retries: u32,
    pub watchdog_retry_delay: Duration,
    /// Per-request timeout for collaborator HTTP calls.
    pub collaborator_timeout: Duration,
    /// Attempts per collaborator call (1 = no retry).
    pub collaborator_attempts: u32,
    pub stat_url: Option<String>,
    pub chat_url: Option<String>,
    pub notification_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:arena.db?mode=rwc".to_string(),
            database_max_connections: 5,
            port: 8080,
            disconnect_timeout: Duration::from_secs(60),
            watchdog_max_retries: 3,
            watchdog_retry_delay: Duration::from_secs(1),
            collaborator_timeout: Duration::from_millis(3000),
            collaborator_attempts: 2,
            stat_url: None,
            chat_url: None,
            notification_url: None,
        }
    }
}

impl Config {
    /// Configuration for tests: in-memory database, short timers.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            database_max_connections: 1,
            disconnect_timeout: Duration::from_millis(200),
            watchdog_retry_delay: Duration::from_millis(20),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);
        let database_max_connections = if database_url.contains(":memory:") {
            1
        } else {
            parse(&lookup, "ARENA_DB_MAX_CONNECTIONS")?.unwrap_or(defaults.database_max_connections)
        };

        Ok(Self {
            database_url,
            database_max_connections,
            port: parse(&lookup, "PORT")?.unwrap_or(defaults.port),
            disconnect_timeout: parse(&lookup, "ARENA_DISCONNECT_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.disconnect_timeout),
            watchdog_max_retries: parse(&lookup, "ARENA_WATCHDOG_MAX_RETRIES")?
                .unwrap_or(defaults.watchdog_max_retries),
            watchdog_retry_delay: defaults.watchdog_retry_delay,
            collaborator_timeout: parse(&lookup, "ARENA_COLLABORATOR_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.collaborator_timeout),
            collaborator_attempts: parse(&lookup, "ARENA_COLLABORATOR_ATTEMPTS")?
                .unwrap_or(defaults.collaborator_attempts),
            stat_url: lookup("ARENA_STAT_URL"),
            chat_url: lookup("ARENA_CHAT_URL"),
            notification_url: lookup("ARENA_NOTIFICATION_URL"),
        })
    }
}

fn parse<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.disconnect_timeout, Duration::from_secs(60));
        assert_eq!(cfg.watchdog_max_retries, 3);
        assert!(cfg.stat_url.is_none());
    }

    #[test]
    fn env_values_override_defaults() {
        let cfg = Config::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("ARENA_DISCONNECT_TIMEOUT_SECS", "5"),
            ("ARENA_CHAT_URL", "http://chat:8000"),
        ]))
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.disconnect_timeout, Duration::from_secs(5));
        assert_eq!(cfg.chat_url.as_deref(), Some("http://chat:8000"));
    }

    #[test]
    fn memory_database_forces_single_connection() {
        let cfg = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("ARENA_DB_MAX_CONNECTIONS", "8"),
        ]))
        .unwrap();
        assert_eq!(cfg.database_max_connections, 1);
    }

    #[test]
    fn malformed_number_is_rejected() {
        let err = Config::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert_eq!(err.to_string(), "invalid value \"eighty\" for PORT");
    }
}
