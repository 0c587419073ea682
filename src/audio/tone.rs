use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, warn};

use super::{AudioFocusArbiter, CuePlayer, FocusGrant, FocusLossListener, ToneKind};

#[derive(Default)]
struct BurstBook {
    next_id: u64,
    /// Bursts that still owe the arbiter one abandon, by the grant they hold.
    focused: HashMap<u64, FocusGrant>,
    released: bool,
}

struct ToneShared {
    player: Arc<dyn CuePlayer>,
    arbiter: Arc<AudioFocusArbiter>,
    book: Mutex<BurstBook>,
}

impl ToneShared {
    fn book(&self) -> MutexGuard<'_, BurstBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, burst: u64) {
        let owed = self.book().focused.remove(&burst).is_some();
        if owed {
            self.arbiter.abandon_focus();
        }
    }

    fn abandon_outstanding(&self) {
        let owed: Vec<_> = self.book().focused.drain().collect();
        for _ in owed {
            self.arbiter.abandon_focus();
        }
    }
}

impl FocusLossListener for ToneShared {
    fn on_focus_lost(&self, grant: FocusGrant) {
        // The platform already dropped that grant; nothing left to abandon.
        self.book().focused.retain(|_, held| *held != grant);
        self.player.stop();
    }
}

/// Short cue bursts of the configured tone, paired with audio focus.
pub struct ToneEmitter {
    shared: Arc<ToneShared>,
    tone: ToneKind,
    volume: f32,
}

impl ToneEmitter {
    pub fn new(
        player: Arc<dyn CuePlayer>,
        arbiter: Arc<AudioFocusArbiter>,
        tone: ToneKind,
        volume: f32,
    ) -> Self {
        let shared = Arc::new(ToneShared {
            player,
            arbiter,
            book: Mutex::new(BurstBook::default()),
        });
        let listener: Weak<dyn FocusLossListener> =
            Arc::downgrade(&shared) as Weak<dyn FocusLossListener>;
        shared.arbiter.add_loss_listener(listener);

        Self {
            shared,
            tone,
            volume: volume.clamp(0.0, 1.0),
        }
    }

    pub fn tone(&self) -> ToneKind {
        self.tone
    }

    pub fn play_once(&self) {
        self.play_repeated(1);
    }

    /// Plays the tone `repeats` times back to back under a single focus request.
    pub fn play_repeated(&self, repeats: u32) {
        if self.tone.is_silent() || repeats == 0 {
            return;
        }
        if self.shared.book().released {
            debug!("Tone emitter released; ignoring cue");
            return;
        }

        // The burst is recorded before a revocation can reach the book.
        let (burst, granted) = {
            let mut book = self.shared.book();
            let burst = book.next_id;
            book.next_id = book.next_id.wrapping_add(1);
            let granted = self.shared.arbiter.request_focus_grant();
            if let Some(grant) = granted {
                book.focused.insert(burst, grant);
            }
            (burst, granted.is_some())
        };
        if !granted {
            warn!("Playing {} cue without audio focus", self.tone.id());
        }

        let shared = Arc::downgrade(&self.shared);
        let done = Box::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.finish(burst);
            }
        });

        if let Err(err) = self
            .shared
            .player
            .play(self.tone, repeats, self.volume, done)
        {
            warn!("Failed to play {} cue: {err:#}", self.tone.id());
            self.shared.finish(burst);
        }
    }

    /// Cuts in-flight bursts and hands back their focus.
    pub fn stop(&self) {
        self.shared.player.stop();
        self.shared.abandon_outstanding();
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
        self.shared.player.release();
    }
}
