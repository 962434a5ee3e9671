//! Environment-driven tunables for the engine and its HTTP client.
//!
//! One env var per field, parse-or-fall-back-to-default, scoped down to
//! what a client library actually needs: no server/database sections, just
//! connect timeout, inter-chunk request timeout, cache root override, and
//! log level/format.

use std::env;
use std::time::Duration;

/// Process-wide tunables. Read once via [`AppConfig::from_env`]; library
/// consumers may also build one directly for tests.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// TCP connect timeout for the HTTP transport. Defaults to 10 seconds.
    pub connect_timeout: Duration,

    /// Default inter-chunk request timeout (also the conflict-retry sleep).
    /// Defaults to 0.
    pub request_timeout: Duration,

    /// Override for the cache/staging root directory. Defaults to the OS
    /// temp dir.
    pub cache_root: Option<String>,

    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_millis(0),
            cache_root: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Loads configuration from `TUS_*` environment variables, falling back
    /// to [`AppConfig::default`] for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(ms) = env::var("TUS_CONNECT_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.connect_timeout = Duration::from_millis(ms);
            }
        }
        if let Ok(ms) = env::var("TUS_REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.request_timeout = Duration::from_millis(ms);
            }
        }
        if let Ok(root) = env::var("TUS_CACHE_ROOT") {
            config.cache_root = Some(root);
        }
        if let Ok(level) = env::var("TUS_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Ok(format) = env::var("TUS_LOG_FORMAT") {
            config.log_format = match format.as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            };
        }

        config
    }

    /// Resolves the cache root, falling back to the OS temp directory.
    pub fn resolved_cache_root(&self) -> std::path::PathBuf {
        match &self.cache_root {
            Some(root) => std::path::PathBuf::from(root),
            None => std::env::temp_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_stable() {
        let config = AppConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_millis(0));
        assert!(config.cache_root.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn unparseable_env_falls_back_to_default() {
        // SAFETY: test-only mutation of process env, not read concurrently here.
        unsafe {
            env::set_var("TUS_CONNECT_TIMEOUT_MS", "not-a-number");
        }
        let config = AppConfig::from_env();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        unsafe {
            env::remove_var("TUS_CONNECT_TIMEOUT_MS");
        }
    }
}
