//! # Flight Settings
//!
//! Runtime settings for the transport and the controller defaults, layered
//! from built-in values, an optional JSON5 file, a `.env` file and `FLIGHT_*`
//! environment variables. Later layers win field by field.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix shared by every environment variable the settings read.
pub const ENV_PREFIX: &str = "FLIGHT_";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1/";
const DEFAULT_LOGIN_PAGE: &str = "/";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Why settings could not be loaded.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON5 for [`FlightSettings`].
    #[error("Failed to parse {path}: {message}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// An environment variable holds a value of the wrong shape.
    #[error("Environment variable {name} has an invalid value: {value}")]
    InvalidEnv {
        /// Variable name, prefix included.
        name: String,
        /// The rejected value.
        value: String,
    },
}

/// Settings for the transport and the default reactions of the controller.
///
/// Every field is optional so that partial sources can be layered with
/// [`FlightSettings::merge`]; the accessors supply the built-in fallbacks.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlightSettings {
    /// Base URL relative request paths are joined onto.
    pub base_url: Option<String>,
    /// Bearer token sent with every request.
    pub auth_token: Option<String>,
    /// Where the default permission-denied action points the user.
    pub login_page: Option<String>,
    /// Transport-level request timeout, in milliseconds.
    pub request_timeout_ms: Option<u64>,
    /// Directory for log files; stdout only when unset.
    pub log_dir: Option<PathBuf>,
    /// Default tracing filter, overridden by `RUST_LOG`.
    pub log_level: Option<String>,
}

impl FlightSettings {
    /// The built-in layer every other source is merged over.
    pub fn defaults() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            login_page: Some(DEFAULT_LOGIN_PAGE.to_string()),
            log_level: Some(DEFAULT_LOG_LEVEL.to_string()),
            ..Default::default()
        }
    }

    /// Merge two settings, where `other` overrides `self` for `Some` values.
    pub fn merge(self, other: FlightSettings) -> FlightSettings {
        FlightSettings {
            base_url: other.base_url.or(self.base_url),
            auth_token: other.auth_token.or(self.auth_token),
            login_page: other.login_page.or(self.login_page),
            request_timeout_ms: other.request_timeout_ms.or(self.request_timeout_ms),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
        }
    }

    /// Reads a JSON5 settings file.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json5::from_str(&text).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Reads `FLIGHT_*` variables from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_vars(std::env::vars())
    }

    /// Reads `FLIGHT_*` entries from an arbitrary variable list.
    pub fn from_vars<I>(vars: I) -> Result<Self, SettingsError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter_map(|(k, v)| k.strip_prefix(ENV_PREFIX).map(|name| (name.to_string(), v)))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();

        let request_timeout_ms = match vars.get("REQUEST_TIMEOUT_MS") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| SettingsError::InvalidEnv {
                name: format!("{}REQUEST_TIMEOUT_MS", ENV_PREFIX),
                value: raw.clone(),
            })?),
            None => None,
        };

        Ok(Self {
            base_url: vars.get("BASE_URL").cloned(),
            auth_token: vars.get("AUTH_TOKEN").cloned(),
            login_page: vars.get("LOGIN_PAGE").cloned(),
            request_timeout_ms,
            log_dir: vars.get("LOG_DIR").map(PathBuf::from),
            log_level: vars.get("LOG_LEVEL").cloned(),
        })
    }

    /// Base URL, falling back to the built-in default.
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Login page, falling back to `/`.
    pub fn login_page(&self) -> &str {
        self.login_page.as_deref().unwrap_or(DEFAULT_LOGIN_PAGE)
    }

    /// Log level, falling back to `info`.
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Request timeout as a [`Duration`], if configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// Loads settings: defaults, then `path` (when given and present), then environment.
///
/// A `.env` file in the working directory is loaded into the environment first.
/// A missing settings file is not an error; an unreadable or malformed one is.
pub fn load_settings(path: Option<&Path>) -> Result<FlightSettings, SettingsError> {
    // 1. Load defaults
    let mut current = FlightSettings::defaults();

    // 2. Load from the settings file if present
    if let Some(path) = path {
        if path.exists() {
            current = current.merge(FlightSettings::from_file(path)?);
        } else {
            tracing::info!(path = %path.display(), "settings file not found, using defaults and environment");
        }
    }

    // 3. Override with environment variables
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!("failed to load .env file: {}", e);
        }
    }
    current = current.merge(FlightSettings::from_env()?);

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_merge_prefers_other() {
        let base = FlightSettings::defaults();
        let over = FlightSettings {
            login_page: Some("/login".into()),
            ..Default::default()
        };
        let merged = base.merge(over);
        assert_eq!(merged.login_page(), "/login");
        assert_eq!(merged.base_url(), DEFAULT_BASE_URL);
        assert_eq!(merged.log_level(), "info");
    }

    #[test]
    fn test_from_file_reads_json5() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "{{ // comments are allowed\n baseUrl: 'http://api.local/', requestTimeoutMs: 2500, }}"
        )
        .unwrap();

        let settings = FlightSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.base_url(), "http://api.local/");
        assert_eq!(settings.request_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(settings.login_page, None);
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ baseUrl: ").unwrap();
        let err = FlightSettings::from_file(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));

        let missing = FlightSettings::from_file(Path::new("/definitely/not/here.json5")).unwrap_err();
        assert!(matches!(missing, SettingsError::Io { .. }));
    }

    #[test]
    fn test_from_vars_reads_prefixed_entries() {
        let settings = FlightSettings::from_vars(vars(&[
            ("FLIGHT_BASE_URL", "https://example.org/api/"),
            ("FLIGHT_LOGIN_PAGE", "/signin"),
            ("FLIGHT_REQUEST_TIMEOUT_MS", " 750 "),
            ("FLIGHT_LOG_LEVEL", ""),
            ("UNRELATED", "x"),
        ]))
        .unwrap();

        assert_eq!(settings.base_url.as_deref(), Some("https://example.org/api/"));
        assert_eq!(settings.login_page.as_deref(), Some("/signin"));
        assert_eq!(settings.request_timeout_ms, Some(750));
        assert_eq!(settings.log_level, None);
    }

    #[test]
    fn test_from_vars_rejects_bad_timeout() {
        let err = FlightSettings::from_vars(vars(&[("FLIGHT_REQUEST_TIMEOUT_MS", "soon")])).unwrap_err();
        match &err {
            SettingsError::InvalidEnv { name, value } => {
                assert_eq!(name, "FLIGHT_REQUEST_TIMEOUT_MS");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(
            err.to_string(),
            "Environment variable FLIGHT_REQUEST_TIMEOUT_MS has an invalid value: soon"
        );
    }

    #[test]
    fn test_load_settings_layers_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flight.json5");
        fs::write(&path, "{ loginPage: '/from-file' }").unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        // The environment may override, but the defaults are always filled.
        assert!(!settings.base_url().is_empty());
        if std::env::var("FLIGHT_LOGIN_PAGE").is_err() {
            assert_eq!(settings.login_page(), "/from-file");
        }
    }
}
