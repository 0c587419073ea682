use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunProgress {
    pub run_index: usize,
    pub completion_count: u32,
    pub last_completed_at: Option<DateTime<Utc>>,
}

impl RunProgress {
    pub fn untouched(run_index: usize) -> Self {
        Self {
            run_index,
            completion_count: 0,
            last_completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completion_count > 0
    }
}
