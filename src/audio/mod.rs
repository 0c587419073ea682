pub mod focus;
pub mod player;
pub mod tone;
pub mod tones;
pub mod vibration;

pub use focus::{
    AudioFocusArbiter, DeviceFocus, DeviceFocusManager, FocusBackend, FocusGain,
    FocusGrant, FocusLossListener, FocusMode, FocusRevocation, FocusState, UnmanagedFocus,
};
pub use player::{CuePlayer, RodioCuePlayer, SilentCuePlayer};
pub use tone::ToneEmitter;
pub use tones::ToneKind;
pub use vibration::{LogVibrator, VibrationEmitter, VibrationPattern, Vibrator};
