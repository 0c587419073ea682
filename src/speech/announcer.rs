use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, warn};
use uuid::Uuid;

use crate::audio::{AudioFocusArbiter, FocusGrant, FocusLossListener};
use crate::models::Interval;

use super::{spoken_duration, SpeechEngine, UtteranceObserver};

pub const HALFWAY_PHRASE: &str = "You are halfway there";
pub const COMPLETION_PHRASE: &str = "Workout complete. Well done!";

pub fn interval_phrase(interval: &Interval) -> String {
    format!("{} for {}", interval.title, spoken_duration(interval.duration))
}

#[derive(Default)]
struct SpeechBook {
    /// Utterances holding one arbiter reference each, by grant.
    focused: HashMap<Uuid, FocusGrant>,
    released: bool,
}

struct AnnouncerShared {
    arbiter: Arc<AudioFocusArbiter>,
    engine: Option<Arc<dyn SpeechEngine>>,
    book: Mutex<SpeechBook>,
}

impl AnnouncerShared {
    fn book(&self) -> MutexGuard<'_, SpeechBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, id: Uuid) {
        let owed = self.book().focused.remove(&id).is_some();
        if owed {
            self.arbiter.abandon_focus();
        }
    }
}

impl UtteranceObserver for AnnouncerShared {
    fn on_start(&self, id: Uuid) {
        // Requested under the book lock so a revocation cannot slip in
        // between the grant and its bookkeeping.
        let granted = {
            let mut book = self.book();
            if book.released {
                return;
            }
            let granted = self.arbiter.request_focus_grant();
            if let Some(grant) = granted {
                book.focused.insert(id, grant);
            }
            granted.is_some()
        };
        if !granted {
            warn!("Speaking without audio focus");
        }
    }

    fn on_done(&self, id: Uuid) {
        self.settle(id);
    }

    fn on_error(&self, id: Uuid) {
        self.settle(id);
    }
}

impl FocusLossListener for AnnouncerShared {
    fn on_focus_lost(&self, grant: FocusGrant) {
        self.book().focused.retain(|_, held| *held != grant);
        if let Some(engine) = &self.engine {
            engine.stop();
        }
    }
}

/// Spoken coaching cues. Without an engine, or with speech disabled, every
/// announcement is a silent no-op.
pub struct SpeechAnnouncer {
    shared: Arc<AnnouncerShared>,
    enabled: bool,
    volume: f32,
}

impl SpeechAnnouncer {
    pub fn new(
        engine: Option<Arc<dyn SpeechEngine>>,
        arbiter: Arc<AudioFocusArbiter>,
        enabled: bool,
        volume: f32,
    ) -> Self {
        let shared = Arc::new(AnnouncerShared {
            arbiter,
            engine,
            book: Mutex::new(SpeechBook::default()),
        });

        if let Some(engine) = &shared.engine {
            let observer: Weak<dyn UtteranceObserver> =
                Arc::downgrade(&shared) as Weak<dyn UtteranceObserver>;
            engine.set_observer(observer);
        }
        let listener: Weak<dyn FocusLossListener> =
            Arc::downgrade(&shared) as Weak<dyn FocusLossListener>;
        shared.arbiter.add_loss_listener(listener);

        Self {
            shared,
            enabled,
            volume: volume.clamp(0.0, 1.0),
        }
    }

    pub fn is_available(&self) -> bool {
        self.enabled && self.shared.engine.is_some() && !self.shared.book().released
    }

    pub fn announce(&self, text: &str) {
        if !self.is_available() {
            return;
        }
        let Some(engine) = &self.shared.engine else {
            return;
        };

        let id = Uuid::new_v4();
        debug!("Announcing '{text}'");
        if let Err(err) = engine.speak(id, text, self.volume) {
            warn!("Speech unavailable: {err:#}");
        }
    }

    pub fn announce_interval(&self, interval: &Interval) {
        self.announce(&interval_phrase(interval));
    }

    pub fn announce_halfway(&self) {
        self.announce(HALFWAY_PHRASE);
    }

    pub fn announce_completion(&self) {
        self.announce(COMPLETION_PHRASE);
    }

    /// Cancels speech now and hands back focus for every cut utterance, so a
    /// late completion callback cannot release focus a newer cue is using.
    pub fn stop(&self) {
        if let Some(engine) = &self.shared.engine {
            engine.stop();
        }
        let owed: Vec<_> = self.shared.book().focused.drain().collect();
        for _ in owed {
            self.shared.arbiter.abandon_focus();
        }
    }

    pub fn release(&self) {
        {
            let mut book = self.shared.book();
            if book.released {
                return;
            }
            book.released = true;
        }
        self.stop();
        if let Some(engine) = &self.shared.engine {
            engine.shutdown();
        }
    }
}
