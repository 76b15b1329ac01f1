//! Configuration file and platform paths.

pub mod config;
pub mod paths;

pub use config::{
    Config, ConfigOverrides, ConfigSource, ConfigSources, DEFAULT_ENDPOINT, ENV_API_KEY,
    ENV_CONFIG, ENV_DISABLE_TRACKING, ENV_ENDPOINT, ENV_MAX_RETRIES, ENV_TIMEOUT, TrackerConfig,
    TrackingSection,
};
pub use paths::AppPaths;
