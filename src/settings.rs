use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

use crate::audio::ToneKind;

/// Feedback preferences, captured once when a workout starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkoutSettings {
    pub sound_enabled: bool,
    pub vibrate_enabled: bool,
    pub tts_enabled: bool,
    pub volume: f32,
    pub tone: ToneKind,
}

impl Default for WorkoutSettings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            vibrate_enabled: true,
            tts_enabled: true,
            volume: 0.8,
            tone: ToneKind::Beep,
        }
    }
}

impl WorkoutSettings {
    pub fn normalized(mut self) -> Self {
        self.volume = if self.volume.is_finite() {
            self.volume.clamp(0.0, 1.0)
        } else {
            Self::default().volume
        };
        self
    }

    /// The tone actually played; sound off means silence.
    pub fn effective_tone(&self) -> ToneKind {
        if self.sound_enabled {
            self.tone
        } else {
            ToneKind::Silent
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserSettings {
    workout: WorkoutSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings at {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn workout(&self) -> WorkoutSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .workout
            .clone()
            .normalized()
    }

    pub fn update_workout(&self, settings: WorkoutSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.workout = settings.normalized();
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("stride-settings-{}", uuid::Uuid::new_v4()));
        dir.join(name)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let store = SettingsStore::new(scratch("settings.json")).unwrap();
        assert_eq!(store.workout(), WorkoutSettings::default());
    }

    #[test]
    fn updates_persist_across_reopen() {
        let path = scratch("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        let settings = WorkoutSettings {
            tts_enabled: false,
            volume: 0.3,
            tone: ToneKind::Whistle,
            ..WorkoutSettings::default()
        };
        store.update_workout(settings.clone()).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.workout(), settings);
    }

    #[test]
    fn garbage_and_out_of_range_values_are_tamed() {
        let path = scratch("settings.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();
        let store = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(store.workout(), WorkoutSettings::default());

        fs::write(&path, r#"{"workout":{"volume":4.0,"tone":"chime"}}"#).unwrap();
        let store = SettingsStore::new(path).unwrap();
        let workout = store.workout();
        assert_eq!(workout.volume, 1.0);
        assert_eq!(workout.tone, ToneKind::Chime);
        assert!(workout.sound_enabled);
    }

    #[test]
    fn sound_off_silences_the_tone() {
        let settings = WorkoutSettings {
            sound_enabled: false,
            ..WorkoutSettings::default()
        };
        assert_eq!(settings.effective_tone(), ToneKind::Silent);
    }
}
