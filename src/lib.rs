pub mod audio;
pub mod config;
pub mod db;
pub mod models;
pub mod service;
pub mod settings;
pub mod speech;
pub mod timer;

pub use config::AppConfig;
pub use db::{CompletionRecorder, Database};
pub use models::{Interval, Run, RunProgress};
pub use service::{
    CallInterruptionGuard, CallState, DesktopDevices, DeviceProvider, ObserverBinding,
    RunRequest, RunStateListener, RunTrackingService, ServiceOptions, ServiceSnapshot,
};
pub use settings::{SettingsStore, WorkoutSettings};
pub use timer::{IntervalTimer, TimerListener, TimerStatus};
