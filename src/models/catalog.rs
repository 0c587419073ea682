//! The nine-week Couch to 5K program: three workouts per week, each framed
//! by a five minute warm up and cool down walk.

use anyhow::Result;

use super::interval::{COOL_DOWN_TITLE, WARM_UP_TITLE};
use super::{Interval, Run};

pub const WEEKS: usize = 9;
pub const RUNS_PER_WEEK: usize = 3;
pub const PROGRAM_LEN: usize = WEEKS * RUNS_PER_WEEK;

const WARM_UP_SECS: u32 = 5 * 60;
const COOL_DOWN_SECS: u32 = 5 * 60;

const fn min(minutes: u32) -> u32 {
    minutes * 60
}

/// Main block of a workout as (jog, walk) pairs; a zero walk ends the block.
fn main_block(week: usize, day: usize) -> Vec<(u32, u32)> {
    match (week, day) {
        (1, _) => vec![(60, 90); 8],
        (2, _) => vec![(90, 120); 6],
        (3, _) => vec![(90, 90), (min(3), min(3)), (90, 90), (min(3), 0)],
        (4, _) => vec![
            (min(3), 90),
            (min(5), 150),
            (min(3), 90),
            (min(5), 0),
        ],
        (5, 1) => vec![(min(5), min(3)), (min(5), min(3)), (min(5), 0)],
        (5, 2) => vec![(min(8), min(5)), (min(8), 0)],
        (5, _) => vec![(min(20), 0)],
        (6, 1) => vec![(min(5), min(3)), (min(8), min(3)), (min(5), 0)],
        (6, 2) => vec![(min(10), min(3)), (min(10), 0)],
        (6, _) => vec![(min(22), 0)],
        (7, _) => vec![(min(25), 0)],
        (8, _) => vec![(min(28), 0)],
        _ => vec![(min(30), 0)],
    }
}

fn describe(block: &[(u32, u32)]) -> String {
    let jog: u32 = block.iter().map(|(jog, _)| jog).sum();
    let walk: u32 = block.iter().map(|(_, walk)| walk).sum();
    if walk == 0 {
        format!("Jog {} minutes without stopping", jog / 60)
    } else {
        format!(
            "{} jog/walk sets: {} minutes jogging, {} minutes walking",
            block.len(),
            jog / 60,
            walk / 60
        )
    }
}

pub fn workout(week: usize, day: usize) -> Result<Run> {
    let block = main_block(week, day);
    let mut intervals = vec![Interval::new(WARM_UP_SECS, WARM_UP_TITLE)];
    for &(jog, walk) in &block {
        intervals.push(Interval::jog(jog));
        if walk > 0 {
            intervals.push(Interval::walk(walk));
        }
    }
    intervals.push(Interval::new(COOL_DOWN_SECS, COOL_DOWN_TITLE));

    Run::new(
        format!("Week {week} Day {day}"),
        describe(&block),
        intervals,
    )
}

pub fn program() -> Result<Vec<Run>> {
    let mut runs = Vec::with_capacity(PROGRAM_LEN);
    for week in 1..=WEEKS {
        for day in 1..=RUNS_PER_WEEK {
            runs.push(workout(week, day)?);
        }
    }
    Ok(runs)
}
