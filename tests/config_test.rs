//! Integration tests for configuration resolution.
//!
//! Precedence is explicit > environment > config file > default; each
//! test pins the environment with [`EnvGuard`] and uses a temp config file.

mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use cmdrdata::storage::{
    Config, ConfigOverrides, ConfigSource, DEFAULT_ENDPOINT, TrackerConfig, TrackingSection,
};
use cmdrdata::test_utils::{RecordingReporter, make_test_config_toml};
use cmdrdata::{CmdrData, CmdrDataError, ExitCode};

use common::EnvGuard;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn defaults_apply_without_any_configuration() {
    let _env = EnvGuard::clean();
    let config = TrackerConfig::resolve(&ConfigOverrides::default()).unwrap();

    assert_eq!(config.api_key, None);
    assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    assert_eq!(config.timeout, Duration::from_secs(5));
    assert_eq!(config.max_retries, 3);
    assert!(config.is_tracking_enabled());
    assert_eq!(config.sources.endpoint, ConfigSource::Default);
}

#[test]
fn config_file_supplies_key_and_endpoint() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, &make_test_config_toml("https://collector.example/api/events"));
    let _env = EnvGuard::clean();

    let config = TrackerConfig::resolve(&ConfigOverrides {
        config_path: Some(path),
        ..ConfigOverrides::default()
    })
    .unwrap();

    assert_eq!(config.api_key.as_deref(), Some("file-key"));
    assert_eq!(config.endpoint, "https://collector.example/api/events");
    assert_eq!(config.timeout, Duration::from_secs(2));
    assert_eq!(config.max_retries, 0);
    assert_eq!(config.sources.api_key, ConfigSource::ConfigFile);
}

#[test]
fn env_overrides_file_and_explicit_overrides_env() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, &make_test_config_toml("https://file.example/events"));
    let _env = EnvGuard::set(&[
        ("CMDRDATA_API_KEY", "env-key"),
        ("CMDRDATA_ENDPOINT", "https://env.example/events"),
        ("CMDRDATA_MAX_RETRIES", "5"),
    ]);

    let config = TrackerConfig::resolve(&ConfigOverrides {
        endpoint: Some("https://explicit.example/events".into()),
        config_path: Some(path),
        ..ConfigOverrides::default()
    })
    .unwrap();

    assert_eq!(config.api_key.as_deref(), Some("env-key"));
    assert_eq!(config.sources.api_key, ConfigSource::Env);
    assert_eq!(config.endpoint, "https://explicit.example/events");
    assert_eq!(config.sources.endpoint, ConfigSource::Explicit);
    assert_eq!(config.max_retries, 5);
    // Only the file sets the timeout.
    assert_eq!(config.timeout, Duration::from_secs(2));
    assert_eq!(config.sources.timeout, ConfigSource::ConfigFile);
}

#[test]
fn config_env_var_points_at_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, &make_test_config_toml("https://file.example/events"));
    let path = path.to_string_lossy().into_owned();
    let _env = EnvGuard::set(&[("CMDRDATA_CONFIG", path.as_str())]);

    let config = TrackerConfig::resolve(&ConfigOverrides::default()).unwrap();
    assert_eq!(config.endpoint, "https://file.example/events");
}

#[test]
fn file_can_disable_tracking() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[tracking]\ndisabled = true\n");
    let recorder = Arc::new(RecordingReporter::new());

    let client = {
        let _env = EnvGuard::clean();
        CmdrData::builder(())
            .config_path(path)
            .reporter(recorder.clone())
            .build()
            .unwrap()
    };

    assert!(!client.is_tracking_enabled());
    client.record(
        "generate",
        cmdrdata::CallOptions::new(),
        &cmdrdata::test_utils::fixtures::openai_chat_completion(),
    );
    assert!(recorder.is_empty());
}

#[test]
fn corrupted_file_fails_build() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[tracking\napi_key = ");
    let _env = EnvGuard::clean();

    let err = CmdrData::builder(()).config_path(path).build().unwrap_err();
    assert!(matches!(err, CmdrDataError::ConfigParse { .. }));
    assert_eq!(err.exit_code(), ExitCode::ConfigError);
}

#[test]
fn invalid_env_values_are_rejected() {
    let _env = EnvGuard::set(&[("CMDRDATA_TIMEOUT", "soon")]);
    let err = TrackerConfig::resolve(&ConfigOverrides::default()).unwrap_err();
    assert!(
        matches!(&err, CmdrDataError::ConfigInvalid { key, .. } if key == "CMDRDATA_TIMEOUT"),
        "got {err:?}"
    );
}

#[test]
fn invalid_endpoint_is_rejected() {
    let _env = EnvGuard::set(&[("CMDRDATA_ENDPOINT", "not a url")]);
    let err = TrackerConfig::resolve(&ConfigOverrides::default()).unwrap_err();
    assert!(matches!(err, CmdrDataError::InvalidEndpoint(_)), "got {err:?}");
}

#[test]
fn saved_config_loads_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let config = Config {
        tracking: TrackingSection {
            api_key: Some("saved-key".into()),
            endpoint: Some("https://saved.example/events".into()),
            timeout_seconds: Some(9),
            max_retries: None,
            disabled: None,
        },
    };
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.tracking.api_key.as_deref(), Some("saved-key"));
    assert_eq!(loaded.tracking.timeout_seconds, Some(9));
}

#[test]
fn resolved_config_debug_hides_api_key() {
    let _env = EnvGuard::set(&[("CMDRDATA_API_KEY", "tk-live-supersecret")]);
    let config = TrackerConfig::resolve(&ConfigOverrides::default()).unwrap();
    let debug = format!("{config:?}");
    assert!(!debug.contains("supersecret"));
}

#[test]
fn sub_second_builder_timeout_is_rejected() {
    let _env = EnvGuard::clean();
    let err = CmdrData::builder(())
        .timeout(Duration::from_millis(500))
        .reporter(Arc::new(RecordingReporter::new()))
        .build()
        .unwrap_err();
    assert!(
        matches!(&err, CmdrDataError::ConfigInvalid { key, .. } if key == "timeout"),
        "got {err:?}"
    );
}

#[test]
fn env_endpoint_shadows_bad_file_endpoint() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[tracking]\nendpoint = \"collector.internal\"\n");
    let _env = EnvGuard::set(&[("CMDRDATA_ENDPOINT", "https://env.example/events")]);

    let config = TrackerConfig::resolve(&ConfigOverrides {
        config_path: Some(path),
        ..ConfigOverrides::default()
    })
    .unwrap();
    assert_eq!(config.endpoint, "https://env.example/events");
}
