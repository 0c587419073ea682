use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::models::Interval;

/// Runs at or below this length never get a halfway announcement.
pub const HALFWAY_MIN_TOTAL_SECS: u32 = 120;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    Tick {
        interval_remaining: String,
        total_remaining: String,
    },
    IntervalChanged {
        index: usize,
        interval: Interval,
    },
    Halfway,
    Finished,
}

/// Formats whole seconds as zero-padded `MM:SS`.
pub fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Counters for one pass over a sequence of intervals.
///
/// Purely synchronous: every transition returns the events it produced and
/// the caller decides how to deliver them.
#[derive(Debug, Clone)]
pub struct TimerState {
    intervals: Vec<Interval>,
    total_duration: u32,
    halfway_point: u32,
    status: TimerStatus,
    current_index: usize,
    interval_elapsed: u32,
    /// Position within the whole run. Skips move it to the next interval boundary.
    total_elapsed: u32,
    halfway_announced: bool,
}

impl TimerState {
    pub fn new(intervals: Vec<Interval>) -> Result<Self> {
        if intervals.is_empty() {
            bail!("interval timer needs at least one interval");
        }
        if intervals.iter().any(|interval| interval.duration == 0) {
            bail!("interval durations must be positive");
        }

        let Some(total_duration) = intervals
            .iter()
            .try_fold(0u32, |total, interval| total.checked_add(interval.duration))
        else {
            bail!("total run duration is too long");
        };

        Ok(Self {
            intervals,
            total_duration,
            halfway_point: total_duration / 2,
            status: TimerStatus::Idle,
            current_index: 0,
            interval_elapsed: 0,
            total_elapsed: 0,
            halfway_announced: false,
        })
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn is_finished(&self) -> bool {
        self.status == TimerStatus::Finished
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_interval(&self) -> &Interval {
        &self.intervals[self.current_index]
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn total_duration(&self) -> u32 {
        self.total_duration
    }

    pub fn total_elapsed(&self) -> u32 {
        self.total_elapsed
    }

    pub fn halfway_announced(&self) -> bool {
        self.halfway_announced
    }

    pub fn interval_remaining_secs(&self) -> u32 {
        if self.is_finished() {
            return 0;
        }
        self.current_interval()
            .duration
            .saturating_sub(self.interval_elapsed)
    }

    pub fn total_remaining_secs(&self) -> u32 {
        self.total_duration.saturating_sub(self.total_elapsed)
    }

    pub fn interval_remaining(&self) -> String {
        format_clock(self.interval_remaining_secs())
    }

    pub fn total_remaining(&self) -> String {
        format_clock(self.total_remaining_secs())
    }

    /// Returns false when already running or finished.
    pub fn start(&mut self) -> bool {
        match self.status {
            TimerStatus::Idle | TimerStatus::Paused => {
                self.status = TimerStatus::Running;
                true
            }
            TimerStatus::Running | TimerStatus::Finished => false,
        }
    }

    /// Returns false unless the timer was running.
    pub fn pause(&mut self) -> bool {
        if self.status == TimerStatus::Running {
            self.status = TimerStatus::Paused;
            true
        } else {
            false
        }
    }

    /// Advances one second. Ignored unless running.
    pub fn tick(&mut self) -> Vec<TimerEvent> {
        if self.status != TimerStatus::Running {
            return Vec::new();
        }

        self.interval_elapsed += 1;
        self.total_elapsed += 1;

        let mut events = if self.interval_elapsed >= self.current_interval().duration {
            self.advance()
        } else {
            vec![TimerEvent::Tick {
                interval_remaining: self.interval_remaining(),
                total_remaining: self.total_remaining(),
            }]
        };

        if !self.is_finished() && self.crossed_halfway() {
            self.halfway_announced = true;
            events.push(TimerEvent::Halfway);
        }

        events
    }

    /// Ends the current interval now. Does nothing once finished.
    pub fn skip(&mut self) -> Vec<TimerEvent> {
        if self.is_finished() {
            return Vec::new();
        }
        self.advance()
    }

    fn crossed_halfway(&self) -> bool {
        self.total_duration > HALFWAY_MIN_TOTAL_SECS
            && !self.halfway_announced
            && self.total_elapsed >= self.halfway_point
    }

    fn advance(&mut self) -> Vec<TimerEvent> {
        let left_in_interval = self
            .current_interval()
            .duration
            .saturating_sub(self.interval_elapsed);
        self.total_elapsed = (self.total_elapsed + left_in_interval).min(self.total_duration);
        self.interval_elapsed = 0;

        if self.current_index + 1 < self.intervals.len() {
            self.current_index += 1;
            vec![TimerEvent::IntervalChanged {
                index: self.current_index,
                interval: self.current_interval().clone(),
            }]
        } else {
            self.status = TimerStatus::Finished;
            self.total_elapsed = self.total_duration;
            vec![TimerEvent::Finished]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(durations: &[u32]) -> TimerState {
        let intervals = durations
            .iter()
            .enumerate()
            .map(|(i, &d)| Interval::new(d, if i % 2 == 0 { "Jog" } else { "Walk" }))
            .collect();
        TimerState::new(intervals).unwrap()
    }

    fn run_ticks(state: &mut TimerState, ticks: u32) -> Vec<(u32, TimerEvent)> {
        let mut out = Vec::new();
        for second in 1..=ticks {
            for event in state.tick() {
                out.push((second, event));
            }
        }
        out
    }

    #[test]
    fn formats_clock_with_zero_padding() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(9), "00:09");
        assert_eq!(format_clock(90), "01:30");
        assert_eq!(format_clock(35 * 60), "35:00");
    }

    #[test]
    fn total_remaining_at_construction_is_sum_of_durations() {
        let timer = state(&[300, 60, 90, 300]);
        assert_eq!(timer.total_remaining(), "12:30");
        assert_eq!(timer.interval_remaining(), "05:00");
        assert_eq!(timer.status(), TimerStatus::Idle);
    }

    #[test]
    fn rejects_empty_sequences() {
        assert!(TimerState::new(Vec::new()).is_err());
    }

    #[test]
    fn rejects_totals_that_overflow() {
        let intervals = vec![Interval::jog(u32::MAX - 1), Interval::walk(2)];
        assert!(TimerState::new(intervals).is_err());
        assert!(TimerState::new(vec![Interval::jog(u32::MAX)]).is_ok());
    }

    #[test]
    fn ticks_are_ignored_unless_running() {
        let mut timer = state(&[10]);
        assert!(timer.tick().is_empty());
        timer.start();
        timer.tick();
        timer.pause();
        assert!(timer.tick().is_empty());
        assert_eq!(timer.interval_remaining(), "00:09");
        assert_eq!(timer.total_remaining(), "00:09");
    }

    #[test]
    fn each_tick_removes_exactly_one_second() {
        let mut timer = state(&[30, 30]);
        timer.start();
        for expected in (25..30).rev() {
            match timer.tick().as_slice() {
                [TimerEvent::Tick { interval_remaining, total_remaining }] => {
                    assert_eq!(interval_remaining, &format_clock(expected));
                    assert_eq!(total_remaining, &format_clock(expected + 30));
                }
                other => panic!("unexpected events {other:?}"),
            }
        }
    }

    #[test]
    fn start_and_pause_are_idempotent() {
        let mut timer = state(&[10]);
        assert!(!timer.pause());
        assert!(timer.start());
        assert!(!timer.start());
        assert!(timer.pause());
        assert!(!timer.pause());
        assert_eq!(timer.status(), TimerStatus::Paused);
    }

    #[test]
    fn interval_completion_replaces_the_tick_event() {
        let mut timer = state(&[2, 3]);
        timer.start();
        let events = run_ticks(&mut timer, 2);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].1, TimerEvent::Tick { .. }));
        assert_eq!(
            events[1],
            (
                2,
                TimerEvent::IntervalChanged {
                    index: 1,
                    interval: Interval::new(3, "Walk"),
                }
            )
        );
        assert_eq!(timer.interval_remaining(), "00:03");
    }

    #[test]
    fn skipping_every_interval_finishes_once() {
        let mut timer = state(&[10, 20, 30]);
        assert!(matches!(timer.skip()[..], [TimerEvent::IntervalChanged { index: 1, .. }]));
        assert!(matches!(timer.skip()[..], [TimerEvent::IntervalChanged { index: 2, .. }]));
        assert_eq!(timer.skip(), vec![TimerEvent::Finished]);
        assert!(timer.is_finished());
        assert!(timer.skip().is_empty());
        assert!(!timer.start());
        assert_eq!(timer.total_remaining(), "00:00");
        assert_eq!(timer.interval_remaining(), "00:00");
    }

    #[test]
    fn skip_moves_total_to_the_next_boundary() {
        let mut timer = state(&[10, 20]);
        timer.start();
        run_ticks(&mut timer, 4);
        timer.skip();
        assert_eq!(timer.total_remaining(), "00:20");
        assert_eq!(timer.interval_remaining(), "00:20");
    }

    #[test]
    fn halfway_fires_once_at_the_midpoint_of_long_runs() {
        let mut timer = state(&[90, 90]);
        timer.start();
        let events = run_ticks(&mut timer, 180);
        let halfway: Vec<u32> = events
            .iter()
            .filter(|(_, e)| *e == TimerEvent::Halfway)
            .map(|(second, _)| *second)
            .collect();
        assert_eq!(halfway, vec![90]);
        assert_eq!(events.last().unwrap().1, TimerEvent::Finished);
    }

    #[test]
    fn short_runs_never_announce_halfway() {
        let mut timer = state(&[30, 30]);
        timer.start();
        let events = run_ticks(&mut timer, 60);
        assert!(events.iter().all(|(_, e)| *e != TimerEvent::Halfway));
        assert!(!timer.halfway_announced());
    }

    #[test]
    fn exactly_two_minutes_is_still_too_short_for_halfway() {
        let mut timer = state(&[60, 60]);
        timer.start();
        let events = run_ticks(&mut timer, 120);
        assert!(events.iter().all(|(_, e)| *e != TimerEvent::Halfway));
    }

    #[test]
    fn halfway_does_not_refire_across_pause() {
        let mut timer = state(&[100, 100]);
        timer.start();
        let mut count = run_ticks(&mut timer, 150)
            .iter()
            .filter(|(_, e)| *e == TimerEvent::Halfway)
            .count();
        timer.pause();
        timer.start();
        count += run_ticks(&mut timer, 50)
            .iter()
            .filter(|(_, e)| *e == TimerEvent::Halfway)
            .count();
        assert_eq!(count, 1);
        assert!(timer.is_finished());
    }
}
