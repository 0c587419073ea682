use serde::{Deserialize, Serialize};

pub const WALK_TITLE: &str = "Walk";
pub const JOG_TITLE: &str = "Jog";
pub const WARM_UP_TITLE: &str = "Warm up";
pub const COOL_DOWN_TITLE: &str = "Cool down";

/// One timed phase of a workout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    /// Length in whole seconds, always > 0.
    pub duration: u32,
    pub title: String,
}

impl Interval {
    pub fn new(duration: u32, title: impl Into<String>) -> Self {
        Self {
            duration,
            title: title.into(),
        }
    }

    pub fn walk(duration: u32) -> Self {
        Self::new(duration, WALK_TITLE)
    }

    pub fn jog(duration: u32) -> Self {
        Self::new(duration, JOG_TITLE)
    }

    /// The walk phase gets its own cue pattern; every other phase shares one.
    pub fn is_walk(&self) -> bool {
        self.title.eq_ignore_ascii_case(WALK_TITLE)
    }
}
