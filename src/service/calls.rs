//! Pauses a running workout while the phone is in use.

use log::info;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::RunTrackingService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallState {
    #[default]
    Idle,
    Ringing,
    OffHook,
}

/// Watches call state for the lifetime of the guard.
pub struct CallInterruptionGuard {
    cancel: CancellationToken,
}

impl CallInterruptionGuard {
    /// Must be called inside a tokio runtime.
    pub fn spawn(service: RunTrackingService, mut calls: watch::Receiver<CallState>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            // Only a workout this guard paused is resumed.
            let mut paused_by_call = false;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = calls.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }

                let state = *calls.borrow_and_update();
                match state {
                    CallState::Ringing | CallState::OffHook => {
                        if service.is_running() {
                            info!("Call in progress; pausing workout");
                            service.pause();
                            paused_by_call = true;
                        }
                    }
                    CallState::Idle => {
                        if paused_by_call {
                            info!("Call ended; resuming workout");
                            paused_by_call = false;
                            service.start();
                        }
                    }
                }
            }
        });

        Self { cancel }
    }
}

impl Drop for CallInterruptionGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Interval, Run};
    use crate::service::tracker::tests::FakeDevices;
    use crate::service::{RunRequest, ServiceOptions};
    use crate::settings::WorkoutSettings;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time;

    fn service() -> RunTrackingService {
        let service = RunTrackingService::new(
            Arc::new(FakeDevices::default()),
            None,
            ServiceOptions::default(),
        )
        .unwrap();
        let run = Run::new("Calls", "", vec![Interval::jog(600)]).unwrap();
        service
            .begin(Some(RunRequest {
                run,
                run_index: 0,
                settings: WorkoutSettings::default(),
            }))
            .unwrap();
        service
    }

    async fn settle() {
        time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn call_pauses_and_hang_up_resumes() {
        let service = service();
        service.start();
        let (calls, rx) = watch::channel(CallState::Idle);
        let _guard = CallInterruptionGuard::spawn(service.clone(), rx);

        calls.send(CallState::Ringing).unwrap();
        settle().await;
        assert!(!service.is_running());

        calls.send(CallState::OffHook).unwrap();
        settle().await;
        assert!(!service.is_running());

        calls.send(CallState::Idle).unwrap();
        settle().await;
        assert!(service.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn workout_paused_by_the_user_stays_paused() {
        let service = service();
        service.start();
        service.pause();
        let (calls, rx) = watch::channel(CallState::Idle);
        let _guard = CallInterruptionGuard::spawn(service.clone(), rx);

        calls.send(CallState::Ringing).unwrap();
        settle().await;
        calls.send(CallState::Idle).unwrap();
        settle().await;
        assert!(!service.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_guard_stops_watching() {
        let service = service();
        service.start();
        let (calls, rx) = watch::channel(CallState::Idle);
        let guard = CallInterruptionGuard::spawn(service.clone(), rx);
        drop(guard);
        settle().await;

        calls.send(CallState::Ringing).ok();
        settle().await;
        assert!(service.is_running());
    }
}
