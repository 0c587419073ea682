use std::sync::Arc;

use log::warn;
use tokio::runtime::Handle;

use crate::audio::{
    CuePlayer, DeviceFocusManager, FocusBackend, FocusMode, LogVibrator, RodioCuePlayer,
    Vibrator,
};
use crate::speech::{ProcessSpeechEngine, SpeechEngine};

/// Builds the platform pieces for one workout.
pub trait DeviceProvider: Send + Sync {
    fn focus_backend(&self) -> Box<dyn FocusBackend>;
    fn cue_player(&self) -> Arc<dyn CuePlayer>;
    fn vibrator(&self) -> Arc<dyn Vibrator>;
    /// `None` when no speech engine could be initialized.
    fn speech_engine(&self) -> Option<Arc<dyn SpeechEngine>>;
}

pub struct DesktopDevices {
    focus_mode: FocusMode,
    device_focus: DeviceFocusManager,
    runtime: Handle,
}

impl DesktopDevices {
    pub fn new(focus_mode: FocusMode, runtime: Handle) -> Self {
        Self {
            focus_mode,
            device_focus: DeviceFocusManager::new(),
            runtime,
        }
    }

    pub fn device_focus(&self) -> &DeviceFocusManager {
        &self.device_focus
    }
}

impl DeviceProvider for DesktopDevices {
    fn focus_backend(&self) -> Box<dyn FocusBackend> {
        self.focus_mode.backend(&self.device_focus)
    }

    fn cue_player(&self) -> Arc<dyn CuePlayer> {
        Arc::new(RodioCuePlayer::new())
    }

    fn vibrator(&self) -> Arc<dyn Vibrator> {
        Arc::new(LogVibrator)
    }

    fn speech_engine(&self) -> Option<Arc<dyn SpeechEngine>> {
        match ProcessSpeechEngine::probe(&self.runtime) {
            Ok(engine) => Some(Arc::new(engine)),
            Err(err) => {
                warn!("Spoken cues disabled: {err:#}");
                None
            }
        }
    }
}
