//! Shared helpers for integration tests.
//!
//! # Modules
//!
//! - `log_capture`: capture `tracing` events emitted on the test thread

#![allow(dead_code)]

pub mod log_capture;

use std::sync::MutexGuard;

/// Every variable the tracker reads.
pub const TRACKER_ENV: [&str; 6] = [
    "CMDRDATA_API_KEY",
    "CMDRDATA_ENDPOINT",
    "CMDRDATA_TIMEOUT",
    "CMDRDATA_MAX_RETRIES",
    "CMDRDATA_DISABLE_TRACKING",
    "CMDRDATA_CONFIG",
];

/// Config path that never exists, keeping tests off the user's real config.
pub const NO_CONFIG: &str = "/nonexistent/cmdrdata-tests/config.toml";

/// Holds the process env lock and restores variables on drop.
pub struct EnvGuard {
    _lock: MutexGuard<'static, ()>,
    prior: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    /// Clear all tracker variables, then apply `vars`.
    #[allow(unsafe_code)]
    pub fn set(vars: &[(&str, &str)]) -> Self {
        let lock = cmdrdata::test_utils::env_lock();
        let prior = TRACKER_ENV
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();

        unsafe {
            for key in TRACKER_ENV {
                std::env::remove_var(key);
            }
            std::env::set_var("CMDRDATA_CONFIG", NO_CONFIG);
            for (key, value) in vars {
                std::env::set_var(key, value);
            }
        }

        Self { _lock: lock, prior }
    }

    /// Clean tracker environment.
    pub fn clean() -> Self {
        Self::set(&[])
    }
}

impl Drop for EnvGuard {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        for (key, value) in self.prior.drain(..) {
            unsafe {
                match value {
                    Some(val) => std::env::set_var(&key, val),
                    None => std::env::remove_var(&key),
                }
            }
        }
    }
}
