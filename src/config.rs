use std::{env, path::PathBuf};

use log::LevelFilter;

const DATA_DIR_VAR: &str = "STEP_COUNTER_DATA_DIR";
const DEBUG_VAR: &str = "STEP_COUNTER_DEBUG";
const PERMISSION_VAR: &str = "STEP_COUNTER_ACTIVITY_PERMISSION";

pub const DEFAULT_DATA_DIR: &str = "./step-counter-data";
pub const DATABASE_FILE: &str = "step_counter.sqlite3";

/// Process-level configuration for the stdio host. User settings live in the
/// database instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub data_dir: PathBuf,
    pub debug: bool,
    pub activity_permission: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            debug: false,
            activity_permission: true,
        }
    }
}

impl HostConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: lookup(DATA_DIR_VAR)
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            debug: lookup(DEBUG_VAR)
                .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true"))
                .unwrap_or(defaults.debug),
            activity_permission: lookup(PERMISSION_VAR)
                .map(|value| !value.trim().eq_ignore_ascii_case("denied"))
                .unwrap_or(defaults.activity_permission),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.debug {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}
