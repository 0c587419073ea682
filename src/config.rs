use std::path::PathBuf;
use std::time::Duration;

use log::warn;

use crate::audio::FocusMode;
use crate::service::ServiceOptions;

const DATA_DIR_VAR: &str = "STRIDE_DATA_DIR";
const DEBUG_VAR: &str = "STRIDE_DEBUG";
const FOCUS_VAR: &str = "STRIDE_FOCUS";

const DEBUG_TICK: Duration = Duration::from_millis(100);

/// Startup configuration read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    /// Shortens every "second" so a workout can be checked by hand quickly.
    pub debug: bool,
    pub focus_mode: FocusMode,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup(DATA_DIR_VAR)
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                lookup("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".stride")
            });

        let debug = lookup(DEBUG_VAR).is_some_and(|value| {
            matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
        });

        let focus_mode = match lookup(FOCUS_VAR) {
            Some(value) => FocusMode::parse(&value).unwrap_or_else(|| {
                warn!("Unknown {FOCUS_VAR} '{value}'; using device focus");
                FocusMode::Device
            }),
            None => FocusMode::Device,
        };

        Self {
            data_dir,
            debug,
            focus_mode,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("stride.sqlite3")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    pub fn service_options(&self) -> ServiceOptions {
        let defaults = ServiceOptions::default();
        if self.debug {
            ServiceOptions {
                tick_period: DEBUG_TICK,
                completion_grace: defaults.completion_grace / 10,
            }
        } else {
            defaults
        }
    }
}
