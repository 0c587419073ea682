use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;
use tokio::{
    runtime::Handle,
    sync::mpsc::{self, UnboundedSender},
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;

use crate::models::Interval;

use super::{TimerEvent, TimerState, TimerStatus};

/// Receives timer events in the order they were produced, on the timer's
/// dispatch task. Implementations must not block.
pub trait TimerListener: Send + Sync {
    fn on_tick(&self, interval_remaining: &str, total_remaining: &str);
    fn on_interval_changed(&self, index: usize, interval: &Interval);
    fn on_halfway(&self);
    fn on_finished(&self);
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub status: TimerStatus,
    pub interval_index: usize,
    pub interval: Interval,
    pub interval_remaining: String,
    pub total_remaining: String,
    pub halfway_announced: bool,
}

struct TimerInner {
    state: TimerState,
    ticker: Option<CancellationToken>,
    /// Bumped on every re-arm so a superseded ticker can never tick.
    generation: u64,
}

struct TimerShared {
    inner: Mutex<TimerInner>,
    events: UnboundedSender<TimerEvent>,
}

impl TimerShared {
    fn lock(&self) -> MutexGuard<'_, TimerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Events are queued while the state lock is held, which keeps delivery
    /// order identical to transition order across the ticker and callers.
    fn publish(&self, events: Vec<TimerEvent>) {
        for event in events {
            if self.events.send(event).is_err() {
                debug!("Timer listener gone; dropping event");
            }
        }
    }

    fn tick(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation || !inner.state.is_running() {
            return false;
        }
        let events = inner.state.tick();
        self.publish(events);
        if inner.state.is_finished() {
            inner.ticker = None;
            return false;
        }
        true
    }
}

/// Drives a [`TimerState`] with a one-second ticker on the tokio runtime it
/// was created in.
pub struct IntervalTimer {
    shared: Arc<TimerShared>,
    runtime: Handle,
    tick_period: Duration,
}

impl IntervalTimer {
    pub fn new(intervals: Vec<Interval>, listener: Arc<dyn TimerListener>) -> Result<Self> {
        Self::with_tick_period(intervals, listener, Duration::from_secs(1))
    }

    pub fn with_tick_period(
        intervals: Vec<Interval>,
        listener: Arc<dyn TimerListener>,
        tick_period: Duration,
    ) -> Result<Self> {
        let runtime = Handle::try_current().context("interval timer needs a tokio runtime")?;
        Self::spawn_on(runtime, intervals, listener, tick_period)
    }

    /// Ticks and dispatches on `runtime`; callable from threads outside it.
    pub fn spawn_on(
        runtime: Handle,
        intervals: Vec<Interval>,
        listener: Arc<dyn TimerListener>,
        tick_period: Duration,
    ) -> Result<Self> {
        let state = TimerState::new(intervals)?;
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<TimerEvent>();

        runtime.spawn(async move {
            while let Some(event) = events_rx.recv().await {
                dispatch(listener.as_ref(), event);
            }
        });

        Ok(Self {
            shared: Arc::new(TimerShared {
                inner: Mutex::new(TimerInner {
                    state,
                    ticker: None,
                    generation: 0,
                }),
                events: events_tx,
            }),
            runtime,
            tick_period,
        })
    }

    pub fn start(&self) {
        let mut inner = self.shared.lock();
        if !inner.state.start() {
            debug!("Timer start ignored in {:?}", inner.state.status());
            return;
        }
        info!(
            "Timer running at interval {} with {} left",
            inner.state.current_index(),
            inner.state.total_remaining()
        );
        self.arm(&mut inner);
    }

    pub fn pause(&self) {
        let mut inner = self.shared.lock();
        if !inner.state.pause() {
            debug!("Timer pause ignored in {:?}", inner.state.status());
            return;
        }
        Self::disarm(&mut inner);
        info!("Timer paused with {} left", inner.state.total_remaining());
    }

    pub fn skip(&self) {
        let mut inner = self.shared.lock();
        let events = inner.state.skip();
        if events.is_empty() {
            debug!("Timer skip ignored after finish");
            return;
        }
        self.shared.publish(events);

        if inner.state.is_finished() {
            Self::disarm(&mut inner);
        } else if inner.state.is_running() {
            // The new interval gets a full first second.
            self.arm(&mut inner);
        }
    }

    /// Stops ticking for good. Counters stay readable.
    pub fn shutdown(&self) {
        let mut inner = self.shared.lock();
        inner.state.pause();
        Self::disarm(&mut inner);
    }

    pub fn status(&self) -> TimerStatus {
        self.shared.lock().state.status()
    }

    pub fn interval_remaining(&self) -> String {
        self.shared.lock().state.interval_remaining()
    }

    pub fn total_remaining(&self) -> String {
        self.shared.lock().state.total_remaining()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let inner = self.shared.lock();
        let state = &inner.state;
        TimerSnapshot {
            status: state.status(),
            interval_index: state.current_index(),
            interval: state.current_interval().clone(),
            interval_remaining: state.interval_remaining(),
            total_remaining: state.total_remaining(),
            halfway_announced: state.halfway_announced(),
        }
    }

    fn arm(&self, inner: &mut TimerInner) {
        Self::disarm(inner);
        inner.generation = inner.generation.wrapping_add(1);

        let generation = inner.generation;
        let token = CancellationToken::new();
        inner.ticker = Some(token.clone());

        let shared: Weak<TimerShared> = Arc::downgrade(&self.shared);
        let period = self.tick_period;

        self.runtime.spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                if !shared.tick(generation) {
                    break;
                }
            }
        });
    }

    fn disarm(inner: &mut TimerInner) {
        if let Some(token) = inner.ticker.take() {
            token.cancel();
        }
    }
}

impl Drop for IntervalTimer {
    fn drop(&mut self) {
        Self::disarm(&mut self.shared.lock());
    }
}

fn dispatch(listener: &dyn TimerListener, event: TimerEvent) {
    match event {
        TimerEvent::Tick {
            interval_remaining,
            total_remaining,
        } => listener.on_tick(&interval_remaining, &total_remaining),
        TimerEvent::IntervalChanged { index, interval } => {
            listener.on_interval_changed(index, &interval)
        }
        TimerEvent::Halfway => listener.on_halfway(),
        TimerEvent::Finished => listener.on_finished(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Seen {
        Tick(String, String),
        Changed(usize),
        Halfway,
        Finished,
    }

    struct Recorder {
        origin: Instant,
        seen: Mutex<Vec<(u64, Seen)>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                origin: Instant::now(),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn push(&self, seen: Seen) {
            let at = self.origin.elapsed().as_secs();
            self.seen.lock().unwrap().push((at, seen));
        }

        fn events(&self) -> Vec<(u64, Seen)> {
            self.seen.lock().unwrap().clone()
        }

        fn count(&self, wanted: &Seen) -> usize {
            self.events().iter().filter(|(_, s)| s == wanted).count()
        }
    }

    impl TimerListener for Recorder {
        fn on_tick(&self, interval_remaining: &str, total_remaining: &str) {
            self.push(Seen::Tick(interval_remaining.into(), total_remaining.into()));
        }

        fn on_interval_changed(&self, index: usize, _interval: &Interval) {
            self.push(Seen::Changed(index));
        }

        fn on_halfway(&self) {
            self.push(Seen::Halfway);
        }

        fn on_finished(&self) {
            self.push(Seen::Finished);
        }
    }

    fn intervals(durations: &[u32]) -> Vec<Interval> {
        durations.iter().map(|&d| Interval::jog(d)).collect()
    }

    async fn settle() {
        time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn three_interval_run_changes_on_schedule_and_finishes() {
        let recorder = Recorder::new();
        let timer = IntervalTimer::new(intervals(&[5, 3, 2]), recorder.clone()).unwrap();

        timer.start();
        time::sleep(Duration::from_secs(11)).await;
        settle().await;

        let events = recorder.events();
        let changes: Vec<_> = events
            .iter()
            .filter(|(_, s)| matches!(s, Seen::Changed(_)))
            .cloned()
            .collect();
        assert_eq!(changes, vec![(5, Seen::Changed(1)), (8, Seen::Changed(2))]);

        let finishes: Vec<_> = events.iter().filter(|(_, s)| *s == Seen::Finished).collect();
        assert_eq!(finishes.len(), 1);
        assert!(finishes[0].0 >= 10);
        assert_eq!(events.last().unwrap().1, Seen::Finished);
        assert_eq!(timer.status(), TimerStatus::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_count_down_one_second_at_a_time() {
        let recorder = Recorder::new();
        let timer = IntervalTimer::new(intervals(&[10, 10]), recorder.clone()).unwrap();

        timer.start();
        time::sleep(Duration::from_millis(3500)).await;
        settle().await;

        let ticks: Vec<_> = recorder.events().into_iter().map(|(_, s)| s).collect();
        assert_eq!(
            ticks,
            vec![
                Seen::Tick("00:09".into(), "00:19".into()),
                Seen::Tick("00:08".into(), "00:18".into()),
                Seen::Tick("00:07".into(), "00:17".into()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn paused_timer_keeps_its_remaining_time() {
        let recorder = Recorder::new();
        let timer = IntervalTimer::new(intervals(&[60]), recorder.clone()).unwrap();

        timer.start();
        time::sleep(Duration::from_millis(4500)).await;
        timer.pause();
        let frozen = timer.total_remaining();
        assert_eq!(frozen, "00:56");

        time::sleep(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(timer.total_remaining(), frozen);
        assert_eq!(recorder.events().len(), 4);

        timer.start();
        time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(timer.total_remaining(), "00:54");
    }

    #[tokio::test(start_paused = true)]
    async fn pause_before_start_is_harmless() {
        let recorder = Recorder::new();
        let timer = IntervalTimer::new(intervals(&[5]), recorder.clone()).unwrap();

        timer.pause();
        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert!(recorder.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_start_does_not_double_tick() {
        let recorder = Recorder::new();
        let timer = IntervalTimer::new(intervals(&[30]), recorder.clone()).unwrap();

        timer.start();
        timer.start();
        timer.start();
        time::sleep(Duration::from_millis(5500)).await;
        assert_eq!(timer.total_remaining(), "00:25");
    }

    #[tokio::test(start_paused = true)]
    async fn skipping_past_the_end_finishes_exactly_once() {
        let recorder = Recorder::new();
        let timer = IntervalTimer::new(intervals(&[30, 30, 30]), recorder.clone()).unwrap();

        timer.start();
        for _ in 0..5 {
            timer.skip();
        }
        time::sleep(Duration::from_secs(5)).await;
        settle().await;

        assert_eq!(recorder.count(&Seen::Finished), 1);
        assert_eq!(
            recorder.events().into_iter().map(|(_, s)| s).collect::<Vec<_>>(),
            vec![Seen::Changed(1), Seen::Changed(2), Seen::Finished]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn skip_rearms_the_ticker_for_the_next_interval() {
        let recorder = Recorder::new();
        let timer = IntervalTimer::new(intervals(&[30, 20]), recorder.clone()).unwrap();

        timer.start();
        time::sleep(Duration::from_millis(2500)).await;
        timer.skip();
        time::sleep(Duration::from_millis(1500)).await;
        settle().await;

        let seen: Vec<_> = recorder.events().into_iter().map(|(_, s)| s).collect();
        assert_eq!(seen[2], Seen::Changed(1));
        assert_eq!(seen[3], Seen::Tick("00:19".into(), "00:19".into()));
        assert_eq!(seen.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_while_paused_stays_paused() {
        let recorder = Recorder::new();
        let timer = IntervalTimer::new(intervals(&[30, 20]), recorder.clone()).unwrap();

        timer.start();
        timer.pause();
        timer.skip();
        time::sleep(Duration::from_secs(3)).await;
        settle().await;

        assert_eq!(timer.status(), TimerStatus::Paused);
        assert_eq!(timer.snapshot().interval_index, 1);
        assert_eq!(timer.interval_remaining(), "00:20");
        assert_eq!(recorder.events(), vec![(0, Seen::Changed(1))]);
    }

    #[tokio::test(start_paused = true)]
    async fn halfway_fires_once_for_long_runs() {
        let recorder = Recorder::new();
        let timer = IntervalTimer::new(intervals(&[90, 90]), recorder.clone()).unwrap();

        timer.start();
        time::sleep(Duration::from_secs(200)).await;
        settle().await;

        let halfway: Vec<_> = recorder
            .events()
            .into_iter()
            .filter(|(_, s)| *s == Seen::Halfway)
            .collect();
        assert_eq!(halfway, vec![(90, Seen::Halfway)]);
    }

    #[tokio::test(start_paused = true)]
    async fn short_runs_stay_quiet_at_halfway() {
        let recorder = Recorder::new();
        let timer = IntervalTimer::new(intervals(&[30, 30]), recorder.clone()).unwrap();

        timer.start();
        time::sleep(Duration::from_secs(70)).await;
        settle().await;

        assert_eq!(recorder.count(&Seen::Halfway), 0);
        assert_eq!(recorder.count(&Seen::Finished), 1);
    }
}
