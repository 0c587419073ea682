use std::sync::Arc;

use log::debug;

/// Alternating off/on durations in milliseconds, starting with a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VibrationPattern(pub &'static [u64]);

impl VibrationPattern {
    pub const WALK: Self = Self(&[0, 600]);
    pub const ACTIVE: Self = Self(&[0, 250, 150, 250]);
    pub const HALFWAY: Self = Self(&[0, 150, 100, 150]);
    pub const COMPLETE: Self = Self(&[0, 500, 200, 500, 200, 500]);

    pub fn total_ms(self) -> u64 {
        self.0.iter().sum()
    }
}

pub trait Vibrator: Send + Sync {
    fn vibrate(&self, pattern: VibrationPattern);
    fn cancel(&self);
}

/// Stand-in for devices without a vibration motor.
pub struct LogVibrator;

impl Vibrator for LogVibrator {
    fn vibrate(&self, pattern: VibrationPattern) {
        debug!("Vibrate {:?} ({} ms)", pattern.0, pattern.total_ms());
    }

    fn cancel(&self) {}
}

pub struct VibrationEmitter {
    vibrator: Arc<dyn Vibrator>,
    enabled: bool,
}

impl VibrationEmitter {
    pub fn new(vibrator: Arc<dyn Vibrator>, enabled: bool) -> Self {
        Self { vibrator, enabled }
    }

    pub fn play(&self, pattern: VibrationPattern) {
        if self.enabled {
            self.vibrator.vibrate(pattern);
        }
    }

    pub fn stop(&self) {
        if self.enabled {
            self.vibrator.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<VibrationPattern>>);

    impl Vibrator for Recording {
        fn vibrate(&self, pattern: VibrationPattern) {
            self.0.lock().unwrap().push(pattern);
        }

        fn cancel(&self) {}
    }

    #[test]
    fn disabled_emitter_stays_still() {
        let motor = Arc::new(Recording::default());
        let emitter = VibrationEmitter::new(motor.clone(), false);
        emitter.play(VibrationPattern::WALK);
        assert!(motor.0.lock().unwrap().is_empty());
    }

    #[test]
    fn walk_and_active_patterns_differ() {
        assert_ne!(VibrationPattern::WALK, VibrationPattern::ACTIVE);
        assert_eq!(VibrationPattern::COMPLETE.total_ms(), 1900);
    }
}
