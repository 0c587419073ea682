use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::Interval;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub name: String,
    pub description: String,
    intervals: Vec<Interval>,
    /// Maintained by progress tracking, never by the tracking core.
    pub completed: bool,
}

impl Run {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        intervals: Vec<Interval>,
    ) -> Result<Self> {
        if intervals.is_empty() {
            bail!("a run needs at least one interval");
        }
        if let Some(bad) = intervals.iter().find(|interval| interval.duration == 0) {
            bail!("interval '{}' has zero duration", bad.title);
        }
        if intervals
            .iter()
            .try_fold(0u32, |total, interval| total.checked_add(interval.duration))
            .is_none()
        {
            bail!("total run duration is too long");
        }

        Ok(Self {
            name: name.into(),
            description: description.into(),
            intervals,
            completed: false,
        })
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Saturates for runs deserialized without validation.
    pub fn total_duration(&self) -> u32 {
        self.intervals
            .iter()
            .fold(0u32, |total, interval| total.saturating_add(interval.duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_runs() {
        assert!(Run::new("Empty", "", Vec::new()).is_err());
    }

    #[test]
    fn rejects_runs_too_long_to_count() {
        let intervals = vec![Interval::jog(u32::MAX), Interval::walk(1)];
        assert!(Run::new("Endless", "", intervals).is_err());
    }

    #[test]
    fn unvalidated_runs_saturate_their_total() {
        let run: Run = serde_json::from_str(
            r#"{"name":"Endless","description":"","completed":false,
                "intervals":[{"duration":4294967295,"title":"Jog"},{"duration":5,"title":"Walk"}]}"#,
        )
        .unwrap();
        assert_eq!(run.total_duration(), u32::MAX);
    }

    #[test]
    fn rejects_zero_length_intervals() {
        let intervals = vec![Interval::jog(60), Interval::walk(0)];
        assert!(Run::new("Broken", "", intervals).is_err());
    }

    #[test]
    fn total_duration_sums_intervals() {
        let run = Run::new("Short", "", vec![Interval::jog(5), Interval::walk(3)]).unwrap();
        assert_eq!(run.total_duration(), 8);
        assert!(!run.completed);
    }
}
