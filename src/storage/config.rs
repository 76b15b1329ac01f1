//! Tracker configuration.
//!
//! Loads the optional config file from:
//! - Linux: `~/.config/cmdrdata/config.toml`
//! - macOS: `~/Library/Application Support/ai.cmdrdata.cmdrdata/config.toml`
//! - Windows: `%APPDATA%/cmdrdata/cmdrdata/config/config.toml`
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. Explicit values (wrapper builder or CLI flags)
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `CMDRDATA_API_KEY`: Tracking API key
//! - `CMDRDATA_ENDPOINT`: Tracking endpoint URL
//! - `CMDRDATA_TIMEOUT`: Request timeout in seconds
//! - `CMDRDATA_MAX_RETRIES`: Delivery retries after the first attempt
//! - `CMDRDATA_DISABLE_TRACKING`: Disable tracking (1, true, yes, on)
//! - `CMDRDATA_CONFIG`: Override config file path

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::core::retry::RetryPolicy;
use crate::core::tracker::DeliverySettings;
use crate::error::{CmdrDataError, Result};

// =============================================================================
// Environment Variable Names
// =============================================================================

pub const ENV_API_KEY: &str = "CMDRDATA_API_KEY";
pub const ENV_ENDPOINT: &str = "CMDRDATA_ENDPOINT";
pub const ENV_TIMEOUT: &str = "CMDRDATA_TIMEOUT";
pub const ENV_MAX_RETRIES: &str = "CMDRDATA_MAX_RETRIES";
pub const ENV_DISABLE_TRACKING: &str = "CMDRDATA_DISABLE_TRACKING";
pub const ENV_CONFIG: &str = "CMDRDATA_CONFIG";

/// Default tracking endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.cmdrdata.ai/api/events";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const MIN_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_RETRIES_LIMIT: u32 = 10;

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Values set explicitly by the wrapper builder or CLI flags.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub disable_tracking: Option<bool>,
    /// Config file to read instead of `CMDRDATA_CONFIG` or the platform default.
    pub config_path: Option<PathBuf>,
}

/// Fully resolved tracker configuration.
#[derive(Clone)]
pub struct TrackerConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub disable_tracking: bool,
    /// Source of each setting, for `cmdrdata config`.
    pub sources: ConfigSources,
}

/// Tracks the source of each configuration value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigSources {
    pub api_key: ConfigSource,
    pub endpoint: ConfigSource,
    pub timeout: ConfigSource,
    pub max_retries: ConfigSource,
    pub disable_tracking: ConfigSource,
}

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Builder call or CLI flag.
    Explicit,
    Env,
    ConfigFile,
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit"),
            Self::Env => write!(f, "environment variable"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            disable_tracking: false,
            sources: ConfigSources::default(),
        }
    }
}

impl std::fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerConfig")
            .field(
                "api_key",
                &crate::core::fingerprint::describe(self.api_key.as_deref()),
            )
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("disable_tracking", &self.disable_tracking)
            .field("sources", &self.sources)
            .finish()
    }
}

impl TrackerConfig {
    /// Resolve configuration from explicit values, environment and config file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file exists but cannot be read or parsed
    /// - An environment variable holds an unparseable value
    /// - Any resolved value is out of range
    ///
    /// Only resolved values are range-checked, so an explicit or env value
    /// shadows a bad one in the file. A missing API key is not an error
    /// here; see [`Self::delivery_settings`].
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let file = Self::load_file(overrides.config_path.as_deref())?;
        let tracking = file.tracking;

        let mut sources = ConfigSources::default();

        let api_key = pick(
            overrides.api_key.clone(),
            env_string(ENV_API_KEY),
            tracking.api_key,
            &mut sources.api_key,
        );
        let endpoint = pick(
            overrides.endpoint.clone(),
            env_string(ENV_ENDPOINT),
            tracking.endpoint,
            &mut sources.endpoint,
        )
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let timeout = pick(
            overrides.timeout,
            env_parsed::<u64>(ENV_TIMEOUT)?.map(Duration::from_secs),
            tracking.timeout_seconds.map(Duration::from_secs),
            &mut sources.timeout,
        )
        .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let max_retries = pick(
            overrides.max_retries,
            env_parsed::<u32>(ENV_MAX_RETRIES)?,
            tracking.max_retries,
            &mut sources.max_retries,
        )
        .unwrap_or(DEFAULT_MAX_RETRIES);
        let disable_tracking = pick(
            overrides.disable_tracking,
            env_flag(ENV_DISABLE_TRACKING),
            tracking.disabled,
            &mut sources.disable_tracking,
        )
        .unwrap_or(false);

        let config = Self {
            api_key,
            endpoint,
            timeout,
            max_retries,
            disable_tracking,
            sources,
        };
        config.validate()?;

        tracing::debug!(config = ?config, "Resolved tracker configuration");
        Ok(config)
    }

    /// Config file: explicit path, then `CMDRDATA_CONFIG`, then platform default.
    fn load_file(explicit: Option<&Path>) -> Result<Config> {
        if let Some(path) = explicit {
            return Config::load_from(path);
        }
        match env_string(ENV_CONFIG) {
            Some(path) => Config::load_from(Path::new(&path)),
            None => Config::load(),
        }
    }

    /// Check ranges of resolved values.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEndpoint` or `ConfigInvalid`.
    pub fn validate(&self) -> Result<()> {
        validate_endpoint(&self.endpoint)?;
        validate_timeout(self.timeout)?;
        validate_max_retries(self.max_retries)
    }

    /// Whether events will actually be sent.
    #[must_use]
    pub const fn is_tracking_enabled(&self) -> bool {
        !self.disable_tracking
    }

    /// Retry policy for delivery.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_retries(self.max_retries)
    }

    /// Settings for an HTTP reporter.
    ///
    /// # Errors
    ///
    /// Returns `MissingApiKey` when no key was resolved.
    pub fn delivery_settings(&self) -> Result<DeliverySettings> {
        let api_key = self
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(CmdrDataError::MissingApiKey)?;
        Ok(DeliverySettings {
            endpoint: self.endpoint.clone(),
            api_key,
            timeout: self.timeout,
            retry: self.retry_policy(),
        })
    }
}

/// First present value by precedence, recording where it came from.
fn pick<T>(
    explicit: Option<T>,
    env: Option<T>,
    file: Option<T>,
    source: &mut ConfigSource,
) -> Option<T> {
    if explicit.is_some() {
        *source = ConfigSource::Explicit;
        return explicit;
    }
    if env.is_some() {
        *source = ConfigSource::Env;
        return env;
    }
    if file.is_some() {
        *source = ConfigSource::ConfigFile;
        return file;
    }
    *source = ConfigSource::Default;
    None
}

fn env_string(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parsed<T: std::str::FromStr>(var: &str) -> Result<Option<T>> {
    env_string(var)
        .map(|value| {
            value.parse::<T>().map_err(|_| CmdrDataError::ConfigInvalid {
                key: var.to_string(),
                message: format!("'{value}' is not a valid number"),
            })
        })
        .transpose()
}

/// Truthy values are 1/true/yes/on; any other non-empty value is false.
fn env_flag(var: &str) -> Option<bool> {
    env_string(var).map(|value| is_truthy(&value))
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(())
    } else {
        Err(CmdrDataError::InvalidEndpoint(endpoint.to_string()))
    }
}

fn validate_timeout(timeout: Duration) -> Result<()> {
    if !(MIN_TIMEOUT..=MAX_TIMEOUT).contains(&timeout) {
        return Err(CmdrDataError::ConfigInvalid {
            key: "timeout".to_string(),
            message: format!(
                "must be between {} and {} seconds, got {timeout:?}",
                MIN_TIMEOUT.as_secs(),
                MAX_TIMEOUT.as_secs()
            ),
        });
    }
    Ok(())
}

fn validate_max_retries(max_retries: u32) -> Result<()> {
    if max_retries > MAX_RETRIES_LIMIT {
        return Err(CmdrDataError::ConfigInvalid {
            key: "max_retries".to_string(),
            message: format!("must be at most {MAX_RETRIES_LIMIT}"),
        });
    }
    Ok(())
}

// =============================================================================
// Config File
// =============================================================================

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracking: TrackingSection,
}

/// `[tracking]` table. Absent keys fall through to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSection {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    pub disabled: Option<bool>,
}

impl Config {
    /// Load configuration from the default config file path.
    ///
    /// Returns default config if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific path.
    ///
    /// Returns default config if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(?path, "Loading config file");
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CmdrDataError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| CmdrDataError::ConfigInvalid {
            key: "config".to_string(),
            message: format!("failed to serialize: {e}"),
        })?;

        fs::write(path, content)?;
        tracing::debug!(?path, "Config file saved");
        Ok(())
    }

    /// Default config file path.
    #[must_use]
    pub fn config_path() -> PathBuf {
        AppPaths::new().config_file()
    }

    /// Validate values present in the file.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<()> {
        let tracking = &self.tracking;
        if let Some(endpoint) = &tracking.endpoint {
            validate_endpoint(endpoint)?;
        }
        if let Some(seconds) = tracking.timeout_seconds {
            validate_timeout(Duration::from_secs(seconds))?;
        }
        if let Some(retries) = tracking.max_retries {
            validate_max_retries(retries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ALL_ENV: [&str; 6] = [
        ENV_API_KEY,
        ENV_ENDPOINT,
        ENV_TIMEOUT,
        ENV_MAX_RETRIES,
        ENV_DISABLE_TRACKING,
        ENV_CONFIG,
    ];

    /// Run `f` with exactly `vars` set among the tracker variables.
    #[allow(unsafe_code)]
    fn with_env(vars: &[(&str, &str)], f: impl FnOnce()) {
        let _guard = crate::test_utils::env_lock();
        let prior: Vec<_> = ALL_ENV.iter().map(|k| (*k, std::env::var(k).ok())).collect();
        for key in ALL_ENV {
            unsafe { std::env::remove_var(key) };
        }
        for (key, value) in vars {
            unsafe { std::env::set_var(key, value) };
        }
        f();
        for (key, value) in prior {
            match value {
                Some(v) => unsafe { std::env::set_var(key, v) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }

    fn no_file() -> ConfigOverrides {
        ConfigOverrides {
            config_path: Some(PathBuf::from("/nonexistent/cmdrdata/config.toml")),
            ..ConfigOverrides::default()
        }
    }

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{content}").unwrap();
        file
    }

    #[test]
    fn defaults_when_nothing_set() {
        with_env(&[], || {
            let config = TrackerConfig::resolve(&no_file()).unwrap();
            assert_eq!(config.api_key, None);
            assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
            assert_eq!(config.timeout, Duration::from_secs(5));
            assert_eq!(config.max_retries, 3);
            assert!(config.is_tracking_enabled());
            assert_eq!(config.sources, ConfigSources::default());
        });
    }

    #[test]
    fn env_api_key_is_used() {
        with_env(&[(ENV_API_KEY, "env-key")], || {
            let config = TrackerConfig::resolve(&no_file()).unwrap();
            assert_eq!(config.api_key.as_deref(), Some("env-key"));
            assert_eq!(config.sources.api_key, ConfigSource::Env);
        });
    }

    #[test]
    fn explicit_key_beats_env() {
        with_env(&[(ENV_API_KEY, "env-key")], || {
            let overrides = ConfigOverrides {
                api_key: Some("explicit-key".into()),
                ..no_file()
            };
            let config = TrackerConfig::resolve(&overrides).unwrap();
            assert_eq!(config.api_key.as_deref(), Some("explicit-key"));
            assert_eq!(config.sources.api_key, ConfigSource::Explicit);
        });
    }

    #[test]
    fn env_beats_file() {
        let file = config_file(
            r#"
[tracking]
api_key = "file-key"
endpoint = "https://file.example/api/events"
timeout_seconds = 30
"#,
        );
        with_env(&[(ENV_TIMEOUT, "7")], || {
            let overrides = ConfigOverrides {
                config_path: Some(file.path().to_path_buf()),
                ..ConfigOverrides::default()
            };
            let config = TrackerConfig::resolve(&overrides).unwrap();
            assert_eq!(config.api_key.as_deref(), Some("file-key"));
            assert_eq!(config.sources.api_key, ConfigSource::ConfigFile);
            assert_eq!(config.endpoint, "https://file.example/api/events");
            assert_eq!(config.timeout, Duration::from_secs(7));
            assert_eq!(config.sources.timeout, ConfigSource::Env);
        });
    }

    #[test]
    fn config_env_var_selects_file() {
        let file = config_file("[tracking]\nmax_retries = 1\n");
        let path = file.path().to_string_lossy().to_string();
        with_env(&[(ENV_CONFIG, &path)], || {
            let config = TrackerConfig::resolve(&ConfigOverrides::default()).unwrap();
            assert_eq!(config.max_retries, 1);
            assert_eq!(config.sources.max_retries, ConfigSource::ConfigFile);
        });
    }

    #[test]
    fn disable_tracking_flag_values() {
        for (value, expected) in [("1", true), ("TRUE", true), ("on", true), ("no", false)] {
            with_env(&[(ENV_DISABLE_TRACKING, value)], || {
                let config = TrackerConfig::resolve(&no_file()).unwrap();
                assert_eq!(config.disable_tracking, expected, "value {value}");
            });
        }
    }

    #[test]
    fn invalid_env_number_is_config_error() {
        with_env(&[(ENV_MAX_RETRIES, "lots")], || {
            let err = TrackerConfig::resolve(&no_file()).unwrap_err();
            assert!(matches!(err, CmdrDataError::ConfigInvalid { ref key, .. } if key == ENV_MAX_RETRIES));
        });
    }

    #[test]
    fn invalid_endpoint_rejected() {
        with_env(&[(ENV_ENDPOINT, "ftp://example.com")], || {
            let err = TrackerConfig::resolve(&no_file()).unwrap_err();
            assert!(matches!(err, CmdrDataError::InvalidEndpoint(_)));
        });
    }

    #[test]
    fn explicit_endpoint_shadows_bad_file_endpoint() {
        let file = config_file("[tracking]\nendpoint = \"not-a-url\"\n");
        with_env(&[], || {
            let overrides = ConfigOverrides {
                endpoint: Some("https://explicit.example/api/events".into()),
                config_path: Some(file.path().to_path_buf()),
                ..ConfigOverrides::default()
            };
            let config = TrackerConfig::resolve(&overrides).unwrap();
            assert_eq!(config.endpoint, "https://explicit.example/api/events");

            let overrides = ConfigOverrides {
                config_path: Some(file.path().to_path_buf()),
                ..ConfigOverrides::default()
            };
            assert!(matches!(
                TrackerConfig::resolve(&overrides),
                Err(CmdrDataError::InvalidEndpoint(_))
            ));
        });
    }

    #[test]
    fn timeout_and_retry_bounds() {
        let mut config = TrackerConfig::default();
        config.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.timeout = Duration::from_secs(121);
        assert!(config.validate().is_err());
        config.timeout = Duration::from_millis(500);
        assert!(matches!(
            config.validate(),
            Err(CmdrDataError::ConfigInvalid { .. })
        ));
        config.timeout = Duration::from_secs(120);
        assert!(config.validate().is_ok());
        config.max_retries = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn delivery_settings_require_key() {
        let config = TrackerConfig::default();
        assert!(matches!(
            config.delivery_settings(),
            Err(CmdrDataError::MissingApiKey)
        ));

        let config = TrackerConfig {
            api_key: Some("k".into()),
            max_retries: 5,
            ..TrackerConfig::default()
        };
        let settings = config.delivery_settings().unwrap();
        assert_eq!(settings.api_key, "k");
        assert_eq!(settings.retry.max_retries, 5);
    }

    #[test]
    fn debug_output_hides_key() {
        let config = TrackerConfig {
            api_key: Some("super-secret".into()),
            ..TrackerConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("sha256:"));
    }

    #[test]
    fn load_missing_file_returns_default() {
        let config = Config::load_from(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert!(config.tracking.api_key.is_none());
    }

    #[test]
    fn load_invalid_toml_returns_parse_error() {
        let file = config_file("this is not valid toml {{{{");
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, CmdrDataError::ConfigParse { .. }));
    }

    #[test]
    fn file_validation_catches_bad_values() {
        let file = config_file("[tracking]\ntimeout_seconds = 0\n");
        let config = Config::load_from(file.path()).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn roundtrip_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.tracking.endpoint = Some("http://localhost:8080/api/events".into());
        config.tracking.disabled = Some(true);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(
            loaded.tracking.endpoint.as_deref(),
            Some("http://localhost:8080/api/events")
        );
        assert_eq!(loaded.tracking.disabled, Some(true));
    }
}
