//! Long-lived owner of the active workout.
//!
//! UI screens come and go; the service keeps the timer and every cue emitter
//! alive between them. Screens attach with [`RunTrackingService::bind`] and
//! read [`RunTrackingService::snapshot`] to catch up on anything they missed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::{debug, info, warn};
use tokio::{runtime::Handle, time};
use uuid::Uuid;

use crate::audio::{AudioFocusArbiter, ToneEmitter, VibrationEmitter, VibrationPattern};
use crate::db::CompletionRecorder;
use crate::models::Interval;
use crate::speech::SpeechAnnouncer;
use crate::timer::{IntervalTimer, TimerListener, TimerStatus};

use super::{
    DeviceProvider, ListenerRegistry, ObserverBinding, RunRequest, RunStateListener,
    ServiceRunContext, ServiceSnapshot, UiDispatcher,
};

/// Repetitions of the tone at the start of a non-walk interval.
pub const ACTIVE_REPEATS: u32 = 2;
pub const COMPLETION_REPEATS: u32 = 3;

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub tick_period: Duration,
    /// How long the completion cue may play before audio is torn down.
    pub completion_grace: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
            completion_grace: Duration::from_secs(5),
        }
    }
}

struct Cues {
    arbiter: Arc<AudioFocusArbiter>,
    tone: ToneEmitter,
    vibration: VibrationEmitter,
    speech: SpeechAnnouncer,
}

impl Cues {
    fn interval(&self, interval: &Interval) {
        if interval.is_walk() {
            self.tone.play_once();
            self.vibration.play(VibrationPattern::WALK);
        } else {
            self.tone.play_repeated(ACTIVE_REPEATS);
            self.vibration.play(VibrationPattern::ACTIVE);
        }
    }

    fn release(self) {
        self.tone.release();
        self.vibration.stop();
        self.speech.release();
        self.arbiter.release_all();
    }
}

struct ActiveWorkout {
    context: ServiceRunContext,
    timer: IntervalTimer,
    /// Dropped after completion or stop; the context stays for late observers.
    cues: Option<Cues>,
}

struct ServiceShared {
    devices: Arc<dyn DeviceProvider>,
    recorder: Option<Arc<dyn CompletionRecorder>>,
    listeners: Arc<ListenerRegistry>,
    ui: UiDispatcher,
    runtime: Handle,
    options: ServiceOptions,
    active: Mutex<Option<ActiveWorkout>>,
}

/// Routes timer callbacks for one session back into the service.
struct TimerBridge {
    service: Weak<ServiceShared>,
    session: Uuid,
}

impl TimerListener for TimerBridge {
    fn on_tick(&self, interval_remaining: &str, total_remaining: &str) {
        if let Some(service) = self.service.upgrade() {
            service.handle_tick(self.session, interval_remaining, total_remaining);
        }
    }

    fn on_interval_changed(&self, index: usize, interval: &Interval) {
        if let Some(service) = self.service.upgrade() {
            service.handle_interval_changed(self.session, index, interval);
        }
    }

    fn on_halfway(&self) {
        if let Some(service) = self.service.upgrade() {
            service.handle_halfway(self.session);
        }
    }

    fn on_finished(&self) {
        if let Some(service) = self.service.upgrade() {
            ServiceShared::handle_finished(&service, self.session);
        }
    }
}

impl ServiceShared {
    fn lock(&self) -> MutexGuard<'_, Option<ActiveWorkout>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notify: impl Fn(&dyn RunStateListener) + Send + 'static) {
        self.ui.notify(&self.listeners, notify);
    }

    fn notify_running(&self, running: bool) {
        self.notify(move |listener| listener.on_run_state_changed(running));
    }

    /// Runs `f` on the active workout if it still belongs to `session`.
    fn with_session<T>(&self, session: Uuid, f: impl FnOnce(&mut ActiveWorkout) -> T) -> Option<T> {
        let mut guard = self.lock();
        match guard.as_mut() {
            Some(active) if active.context.session_id == session => Some(f(active)),
            _ => {
                debug!("Dropping timer event from stale session {session}");
                None
            }
        }
    }

    fn handle_tick(&self, session: Uuid, interval_remaining: &str, total_remaining: &str) {
        if self.with_session(session, |_| ()).is_none() {
            return;
        }
        let interval_remaining = interval_remaining.to_string();
        let total_remaining = total_remaining.to_string();
        self.notify(move |listener| listener.on_tick(&interval_remaining, &total_remaining));
    }

    fn handle_interval_changed(&self, session: Uuid, index: usize, interval: &Interval) {
        let applied = self.with_session(session, |active| {
            if let Some(cues) = &active.cues {
                // A stale utterance must not keep focus into the new interval.
                cues.speech.stop();
                cues.speech.announce_interval(interval);
                cues.interval(interval);
            }
        });
        if applied.is_none() {
            return;
        }

        info!("Interval {index}: {} ({}s)", interval.title, interval.duration);
        let interval = interval.clone();
        self.notify(move |listener| listener.on_interval_changed(index, &interval));
    }

    fn handle_halfway(&self, session: Uuid) {
        let applied = self.with_session(session, |active| {
            if let Some(cues) = &active.cues {
                cues.speech.announce_halfway();
                cues.tone.play_once();
                cues.vibration.play(VibrationPattern::HALFWAY);
            }
        });
        if applied.is_some() {
            self.notify(|listener| listener.on_halfway());
        }
    }

    fn handle_finished(self: &Arc<Self>, session: Uuid) {
        let run_index = self.with_session(session, |active| {
            active.context.completed = true;
            active.context.running = false;
            active.timer.shutdown();
            if let Some(cues) = &active.cues {
                cues.speech.stop();
                cues.speech.announce_completion();
                cues.tone.play_repeated(COMPLETION_REPEATS);
                cues.vibration.play(VibrationPattern::COMPLETE);
            }
            active.context.run_index
        });
        let Some(run_index) = run_index else {
            return;
        };

        info!("Workout {run_index} completed");
        self.notify(|listener| listener.on_run_completed());
        self.notify_running(false);

        if let Some(recorder) = &self.recorder {
            recorder.record_completion(run_index, Utc::now());
        }

        let service = Arc::downgrade(self);
        let grace = self.options.completion_grace;
        self.runtime.spawn(async move {
            time::sleep(grace).await;
            if let Some(service) = service.upgrade() {
                service.release_cues(session);
            }
        });
    }

    fn release_cues(&self, session: Uuid) {
        let cues = self
            .with_session(session, |active| active.cues.take())
            .flatten();
        if let Some(cues) = cues {
            debug!("Releasing audio for session {session}");
            cues.release();
        }
    }
}

#[derive(Clone)]
pub struct RunTrackingService {
    shared: Arc<ServiceShared>,
}

impl RunTrackingService {
    /// Must be called inside a tokio runtime; commands may later arrive from any thread.
    pub fn new(
        devices: Arc<dyn DeviceProvider>,
        recorder: Option<Arc<dyn CompletionRecorder>>,
        options: ServiceOptions,
    ) -> Result<Self> {
        let runtime = Handle::try_current().context("tracking service needs a tokio runtime")?;
        let ui = UiDispatcher::spawn()?;

        Ok(Self {
            shared: Arc::new(ServiceShared {
                devices,
                recorder,
                listeners: ListenerRegistry::new(),
                ui,
                runtime,
                options,
                active: Mutex::new(None),
            }),
        })
    }

    pub fn ui(&self) -> &UiDispatcher {
        &self.shared.ui
    }

    pub fn bind(&self, listener: Arc<dyn RunStateListener>) -> ObserverBinding {
        ObserverBinding::attach(&self.shared.listeners, listener)
    }

    pub fn observer_count(&self) -> usize {
        self.shared.listeners.len()
    }

    /// Sets up a workout without starting it. A missing request, or a workout
    /// still in progress, is refused and the service stays as it was.
    pub fn begin(&self, request: Option<RunRequest>) -> Result<Uuid> {
        let Some(request) = request else {
            warn!("Tracking requested without a run; declining");
            self.shared
                .notify(|listener| listener.on_session_declined("no run selected"));
            bail!("no run supplied to the tracking service");
        };

        let mut guard = self.shared.lock();
        if let Some(active) = guard.as_mut() {
            if !active.context.completed {
                bail!("workout '{}' is already in progress", active.context.run.name);
            }
            if let Some(cues) = active.cues.take() {
                cues.release();
            }
        }

        let context = ServiceRunContext::new(request);
        let session = context.session_id;

        let bridge = Arc::new(TimerBridge {
            service: Arc::downgrade(&self.shared),
            session,
        });
        let timer = match IntervalTimer::spawn_on(
            self.shared.runtime.clone(),
            context.run.intervals().to_vec(),
            bridge,
            self.shared.options.tick_period,
        ) {
            Ok(timer) => timer,
            Err(err) => {
                let reason = format!("{err:#}");
                self.shared
                    .notify(move |listener| listener.on_session_declined(&reason));
                return Err(err.context("failed to build interval timer"));
            }
        };

        let cues = self.build_cues(&context);
        info!(
            "Workout '{}' ready ({} intervals, {}s)",
            context.run.name,
            context.run.intervals().len(),
            context.run.total_duration()
        );

        *guard = Some(ActiveWorkout {
            context,
            timer,
            cues: Some(cues),
        });
        Ok(session)
    }

    fn build_cues(&self, context: &ServiceRunContext) -> Cues {
        let devices = &self.shared.devices;
        let settings = &context.settings;

        let arbiter = AudioFocusArbiter::new(devices.focus_backend());
        let tone = ToneEmitter::new(
            devices.cue_player(),
            arbiter.clone(),
            settings.effective_tone(),
            settings.volume,
        );
        let vibration = VibrationEmitter::new(devices.vibrator(), settings.vibrate_enabled);
        let engine = if settings.tts_enabled {
            devices.speech_engine()
        } else {
            None
        };
        let speech = SpeechAnnouncer::new(engine, arbiter.clone(), settings.tts_enabled, settings.volume);

        Cues {
            arbiter,
            tone,
            vibration,
            speech,
        }
    }

    /// Safe to call repeatedly and from external triggers such as a call guard.
    pub fn start(&self) {
        let mut guard = self.shared.lock();
        let Some(active) = guard.as_mut() else {
            debug!("Start ignored; no workout");
            return;
        };
        if active.context.completed {
            debug!("Start ignored; workout already completed");
            return;
        }

        let fresh = active.timer.status() == TimerStatus::Idle;
        active.timer.start();

        if fresh {
            let first = active.timer.snapshot().interval;
            if let Some(cues) = &active.cues {
                cues.speech.announce_interval(&first);
                cues.interval(&first);
            }
        }

        if !active.context.running {
            active.context.running = true;
            self.shared.notify_running(true);
        }
    }

    pub fn pause(&self) {
        let mut guard = self.shared.lock();
        let Some(active) = guard.as_mut() else {
            debug!("Pause ignored; no workout");
            return;
        };

        active.timer.pause();
        if active.context.running {
            active.context.running = false;
            self.shared.notify_running(false);
        }
    }

    pub fn toggle(&self) {
        if self.is_running() {
            self.pause();
        } else {
            self.start();
        }
    }

    pub fn skip(&self) {
        let mut guard = self.shared.lock();
        let Some(active) = guard.as_mut() else {
            debug!("Skip ignored; no workout");
            return;
        };

        active.timer.skip();
        // Completion cues and notifications follow when the finish event is dispatched.
        if active.timer.status() == TimerStatus::Finished {
            active.context.running = false;
            active.context.completed = true;
        }
    }

    /// Ends the workout now: no more ticks, cues cut, focus released once.
    pub fn stop(&self) {
        let Some(active) = self.shared.lock().take() else {
            return;
        };

        active.timer.shutdown();
        if let Some(cues) = active.cues {
            cues.release();
        }
        info!("Workout '{}' stopped", active.context.run.name);
        if active.context.running {
            self.shared.notify_running(false);
        }
    }

    /// Leaves the workout. A completed one keeps its completion cue for the
    /// grace period first; anything else is stopped at once.
    pub async fn close(&self) {
        if self.is_completed() {
            time::sleep(self.shared.options.completion_grace).await;
        }
        self.stop();
    }

    pub fn is_active(&self) -> bool {
        self.shared.lock().is_some()
    }

    pub fn is_running(&self) -> bool {
        self.shared
            .lock()
            .as_ref()
            .is_some_and(|active| active.context.running)
    }

    pub fn is_completed(&self) -> bool {
        self.shared
            .lock()
            .as_ref()
            .is_some_and(|active| active.context.completed)
    }

    pub fn interval_remaining(&self) -> Option<String> {
        self.shared
            .lock()
            .as_ref()
            .map(|active| active.timer.interval_remaining())
    }

    pub fn total_remaining(&self) -> Option<String> {
        self.shared
            .lock()
            .as_ref()
            .map(|active| active.timer.total_remaining())
    }

    pub fn current_interval(&self) -> Option<(usize, Interval)> {
        self.shared.lock().as_ref().map(|active| {
            let timer = active.timer.snapshot();
            (timer.interval_index, timer.interval)
        })
    }

    pub fn snapshot(&self) -> Option<ServiceSnapshot> {
        self.shared.lock().as_ref().map(|active| ServiceSnapshot {
            session_id: active.context.session_id,
            run_name: active.context.run.name.clone(),
            run_index: active.context.run_index,
            running: active.context.running,
            completed: active.context.completed,
            timer: active.timer.snapshot(),
        })
    }
}
