//! Configuration module for InsightX Tracker.
//!
//! This module handles parsing configuration from environment variables.
//! Configuration is read once at startup and never revalidated.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `INSIGHTX_API_BASE_URL` | No | `http://127.0.0.1:8000/api/insightx` | API root for the ingestion endpoints |
//! | `INSIGHTX_USER_ID` | No | `1` | User identifier attached to every event |
//! | `INSIGHTX_STATE_DIR` | No | `~/.insightx` | Directory holding the persisted session slot |
//! | `INSIGHTX_LANDING_ROUTE` | No | `/` | Route hosting the chat affordance and channel capture |
//! | `INSIGHTX_REQUEST_TIMEOUT_SECS` | No | 30 | Per-request HTTP timeout |
//!
//! # Example
//!
//! ```no_run
//! use insightx_tracker::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("API base: {}", config.api_base_url);
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use directories::BaseDirs;
use url::Url;
use thiserror::Error;

use crate::types::UserId;

/// Default API root, matching the dashboard's development backend.
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api/insightx";

/// Default user identifier.
const DEFAULT_USER_ID: i64 = 1;

/// Default state directory name relative to home.
const DEFAULT_STATE_DIR: &str = ".insightx";

/// Default landing route.
pub const DEFAULT_LANDING_ROUTE: &str = "/";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,
}

/// Configuration for the InsightX Tracker.
#[derive(Debug, Clone)]
pub struct Config {
    /// API root, without a trailing slash (e.g., `https://api.insightx.app/api/insightx`).
    pub api_base_url: String,

    /// User identifier supplied by the hosting page.
    pub user_id: UserId,

    /// Directory containing the persisted session slot.
    pub state_dir: PathBuf,

    /// Route that hosts the chat affordance and acquisition-channel capture.
    pub landing_route: String,

    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - `INSIGHTX_API_BASE_URL` is not an absolute http(s) URL
    /// - `INSIGHTX_LANDING_ROUTE` does not start with `/`
    /// - `INSIGHTX_REQUEST_TIMEOUT_SECS` is not a positive integer
    /// - The home directory cannot be determined (needed for the default state dir)
    pub fn from_env() -> Result<Self, ConfigError> {
        // Optional: INSIGHTX_API_BASE_URL (default: local development backend)
        let api_base_url = match env::var("INSIGHTX_API_BASE_URL") {
            Ok(val) => parse_base_url(&val)?,
            Err(_) => DEFAULT_API_BASE_URL.to_string(),
        };

        // Optional: INSIGHTX_USER_ID (default: 1)
        let user_id = env::var("INSIGHTX_USER_ID")
            .ok()
            .map(|val| UserId::parse(val.trim()))
            .filter(|id| !id.is_blank())
            .unwrap_or(UserId::Numeric(DEFAULT_USER_ID));

        // Optional: INSIGHTX_STATE_DIR (default: ~/.insightx)
        let state_dir = match env::var("INSIGHTX_STATE_DIR") {
            Ok(val) => PathBuf::from(val),
            Err(_) => {
                let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
                base_dirs.home_dir().join(DEFAULT_STATE_DIR)
            }
        };

        // Optional: INSIGHTX_LANDING_ROUTE (default: "/")
        let landing_route = match env::var("INSIGHTX_LANDING_ROUTE") {
            Ok(val) => {
                let route = val.trim().to_string();
                if !route.starts_with('/') {
                    return Err(ConfigError::InvalidValue {
                        key: "INSIGHTX_LANDING_ROUTE".to_string(),
                        message: format!("route must start with '/', got '{val}'"),
                    });
                }
                route
            }
            Err(_) => DEFAULT_LANDING_ROUTE.to_string(),
        };

        // Optional: INSIGHTX_REQUEST_TIMEOUT_SECS (default: 30, must be > 0)
        let timeout_secs = match env::var("INSIGHTX_REQUEST_TIMEOUT_SECS") {
            Ok(val) => {
                let secs = val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                    key: "INSIGHTX_REQUEST_TIMEOUT_SECS".to_string(),
                    message: format!("expected positive integer, got '{val}'"),
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "INSIGHTX_REQUEST_TIMEOUT_SECS".to_string(),
                        message: "timeout must be at least 1 second".to_string(),
                    });
                }
                secs
            }
            Err(_) => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        Ok(Self {
            api_base_url,
            user_id,
            state_dir,
            landing_route,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Validates an API root and strips trailing slashes.
fn parse_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| ConfigError::InvalidValue {
        key: "INSIGHTX_API_BASE_URL".to_string(),
        message: format!("{e}: '{raw}'"),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            key: "INSIGHTX_API_BASE_URL".to_string(),
            message: format!("expected http or https URL, got scheme '{}'", url.scheme()),
        });
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tokio_test::assert_ok;

    /// Helper to run tests with isolated environment variables.
    /// Clears all INSIGHTX_* vars before the test and restores them after.
    fn with_clean_env<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let saved_vars: Vec<(String, String)> = env::vars()
            .filter(|(k, _)| k.starts_with("INSIGHTX_"))
            .collect();

        for (key, _) in &saved_vars {
            env::remove_var(key);
        }

        let result = f();

        for (key, _) in env::vars().filter(|(k, _)| k.starts_with("INSIGHTX_")) {
            env::remove_var(key);
        }
        for (key, value) in saved_vars {
            env::set_var(key, value);
        }

        result
    }

    #[test]
    #[serial]
    fn test_defaults() {
        with_clean_env(|| {
            env::set_var("INSIGHTX_STATE_DIR", "/tmp/insightx-test");

            let config = assert_ok!(Config::from_env());

            assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
            assert_eq!(config.user_id, UserId::Numeric(1));
            assert_eq!(config.landing_route, "/");
            assert_eq!(
                config.request_timeout,
                Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
            );
        });
    }

    #[test]
    #[serial]
    fn test_default_state_dir_under_home() {
        with_clean_env(|| {
            let config = Config::from_env().expect("should parse default config");
            assert!(config.state_dir.ends_with(DEFAULT_STATE_DIR));
        });
    }

    #[test]
    #[serial]
    fn test_full_config() {
        with_clean_env(|| {
            env::set_var("INSIGHTX_API_BASE_URL", "https://api.insightx.app/api/insightx/");
            env::set_var("INSIGHTX_USER_ID", "42");
            env::set_var("INSIGHTX_STATE_DIR", "/custom/state");
            env::set_var("INSIGHTX_LANDING_ROUTE", "/dashboard");
            env::set_var("INSIGHTX_REQUEST_TIMEOUT_SECS", "5");

            let config = Config::from_env().expect("should parse full config");

            assert_eq!(config.api_base_url, "https://api.insightx.app/api/insightx");
            assert_eq!(config.user_id, UserId::Numeric(42));
            assert_eq!(config.state_dir, PathBuf::from("/custom/state"));
            assert_eq!(config.landing_route, "/dashboard");
            assert_eq!(config.request_timeout, Duration::from_secs(5));
        });
    }

    #[test]
    #[serial]
    fn test_text_user_id() {
        with_clean_env(|| {
            env::set_var("INSIGHTX_STATE_DIR", "/tmp/insightx-test");
            env::set_var("INSIGHTX_USER_ID", "user-abc");

            let config = Config::from_env().expect("should accept text user id");
            assert_eq!(config.user_id, UserId::Text("user-abc".to_string()));
        });
    }

    #[test]
    #[serial]
    fn test_zero_padded_user_id_kept_verbatim() {
        with_clean_env(|| {
            env::set_var("INSIGHTX_STATE_DIR", "/tmp/insightx-test");
            env::set_var("INSIGHTX_USER_ID", "007");

            let config = Config::from_env().expect("should accept padded user id");
            assert_eq!(config.user_id, UserId::Text("007".to_string()));
            assert_eq!(config.user_id.to_string(), "007");
        });
    }

    #[test]
    #[serial]
    fn test_blank_user_id_falls_back_to_default() {
        with_clean_env(|| {
            env::set_var("INSIGHTX_STATE_DIR", "/tmp/insightx-test");
            env::set_var("INSIGHTX_USER_ID", "   ");

            let config = Config::from_env().expect("should parse config");
            assert_eq!(config.user_id, UserId::Numeric(1));
        });
    }

    #[test]
    #[serial]
    fn test_invalid_base_url_rejected() {
        with_clean_env(|| {
            env::set_var("INSIGHTX_STATE_DIR", "/tmp/insightx-test");
            env::set_var("INSIGHTX_API_BASE_URL", "not a url");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, .. } if key == "INSIGHTX_API_BASE_URL"
            ));
        });
    }

    #[test]
    #[serial]
    fn test_non_http_base_url_rejected() {
        with_clean_env(|| {
            env::set_var("INSIGHTX_STATE_DIR", "/tmp/insightx-test");
            env::set_var("INSIGHTX_API_BASE_URL", "ftp://files.example.com");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, ref message }
                    if key == "INSIGHTX_API_BASE_URL" && message.contains("http or https")
            ));
        });
    }

    #[test]
    #[serial]
    fn test_landing_route_must_be_absolute() {
        with_clean_env(|| {
            env::set_var("INSIGHTX_STATE_DIR", "/tmp/insightx-test");
            env::set_var("INSIGHTX_LANDING_ROUTE", "home");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, .. } if key == "INSIGHTX_LANDING_ROUTE"
            ));
        });
    }

    #[test]
    #[serial]
    fn test_zero_timeout_rejected() {
        with_clean_env(|| {
            env::set_var("INSIGHTX_STATE_DIR", "/tmp/insightx-test");
            env::set_var("INSIGHTX_REQUEST_TIMEOUT_SECS", "0");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, ref message }
                    if key == "INSIGHTX_REQUEST_TIMEOUT_SECS" && message.contains("at least 1")
            ));
        });
    }

    #[test]
    #[serial]
    fn test_non_numeric_timeout_rejected() {
        with_clean_env(|| {
            env::set_var("INSIGHTX_STATE_DIR", "/tmp/insightx-test");
            env::set_var("INSIGHTX_REQUEST_TIMEOUT_SECS", "soon");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, .. } if key == "INSIGHTX_REQUEST_TIMEOUT_SECS"
            ));
        });
    }

    #[test]
    fn test_parse_base_url_trims_multiple_slashes() {
        let url = parse_base_url("http://localhost:8000/api///").expect("valid url");
        assert_eq!(url, "http://localhost:8000/api");
    }
}
