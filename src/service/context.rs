use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::Run;
use crate::settings::WorkoutSettings;
use crate::timer::TimerSnapshot;

/// Everything the UI hands over when a workout begins.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub run: Run,
    /// Position of `run` in the catalog, reported back on completion.
    pub run_index: usize,
    pub settings: WorkoutSettings,
}

#[derive(Debug, Clone)]
pub struct ServiceRunContext {
    pub session_id: Uuid,
    pub run: Run,
    pub run_index: usize,
    pub settings: WorkoutSettings,
    pub started_at: DateTime<Utc>,
    pub running: bool,
    pub completed: bool,
}

impl ServiceRunContext {
    pub fn new(request: RunRequest) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            run: request.run,
            run_index: request.run_index,
            settings: request.settings.normalized(),
            started_at: Utc::now(),
            running: false,
            completed: false,
        }
    }
}

/// What a newly attached observer needs to redraw without replaying events.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub session_id: Uuid,
    pub run_name: String,
    pub run_index: usize,
    pub running: bool,
    pub completed: bool,
    pub timer: TimerSnapshot,
}
