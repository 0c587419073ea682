pub mod controller;
pub mod state;

pub use controller::{IntervalTimer, TimerListener, TimerSnapshot};
pub use state::{format_clock, TimerEvent, TimerState, TimerStatus};
