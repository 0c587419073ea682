//! Reference-counted access to the device's audio focus.
//!
//! Tone bursts and spoken cues overlap freely. Each of them pairs one
//! [`AudioFocusArbiter::request_focus`] with one
//! [`AudioFocusArbiter::abandon_focus`]; the platform only sees the first
//! request and the last abandon.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Identifies one platform grant. References taken under an older grant
/// were dropped when that grant was revoked.
pub type FocusGrant = u64;

/// Notified when the platform takes focus away involuntarily.
pub trait FocusLossListener: Send + Sync {
    fn on_focus_lost(&self, grant: FocusGrant);
}

/// Platform side of audio focus. One implementation per platform flavour,
/// chosen at startup.
pub trait FocusBackend: Send + Sync {
    /// Requests transient focus that lets other audio duck.
    fn request_transient(&self, revocation: FocusRevocation) -> bool;
    fn abandon(&self);
}

/// Handed to the backend with each grant; fire it when the grant is revoked.
#[derive(Clone)]
pub struct FocusRevocation {
    arbiter: Weak<AudioFocusArbiter>,
    grant: FocusGrant,
}

impl FocusRevocation {
    pub fn revoke(&self) {
        if let Some(arbiter) = self.arbiter.upgrade() {
            arbiter.on_revoked(self.grant);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusState {
    pub held: bool,
    pub ref_count: u32,
}

struct ArbiterInner {
    state: FocusState,
    /// Identifies the current platform grant; stale revocations carry an older id.
    grant: FocusGrant,
    loss_listeners: Vec<Weak<dyn FocusLossListener>>,
}

pub struct AudioFocusArbiter {
    backend: Box<dyn FocusBackend>,
    inner: Mutex<ArbiterInner>,
    me: Weak<AudioFocusArbiter>,
}

impl AudioFocusArbiter {
    pub fn new(backend: Box<dyn FocusBackend>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            backend,
            inner: Mutex::new(ArbiterInner {
                state: FocusState::default(),
                grant: 0,
                loss_listeners: Vec::new(),
            }),
            me: me.clone(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ArbiterInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> FocusState {
        self.lock().state
    }

    pub fn add_loss_listener(&self, listener: Weak<dyn FocusLossListener>) {
        let mut inner = self.lock();
        inner.loss_listeners.retain(|existing| existing.strong_count() > 0);
        inner.loss_listeners.push(listener);
    }

    /// Returns whether focus is held afterwards. Denial leaves the state untouched.
    pub fn request_focus(&self) -> bool {
        self.request_focus_grant().is_some()
    }

    /// Like [`Self::request_focus`], returning the grant the new reference
    /// belongs to.
    pub fn request_focus_grant(&self) -> Option<FocusGrant> {
        let mut inner = self.lock();
        if inner.state.held {
            inner.state.ref_count += 1;
            debug!("Audio focus shared, ref count {}", inner.state.ref_count);
            return Some(inner.grant);
        }

        let grant = inner.grant.wrapping_add(1);
        let revocation = FocusRevocation {
            arbiter: self.me.clone(),
            grant,
        };
        if !self.backend.request_transient(revocation) {
            warn!("Audio focus request denied");
            return None;
        }

        inner.grant = grant;
        inner.state = FocusState {
            held: true,
            ref_count: 1,
        };
        debug!("Audio focus acquired");
        Some(grant)
    }

    pub fn abandon_focus(&self) {
        let mut inner = self.lock();
        if inner.state.ref_count == 0 {
            warn!("Audio focus abandoned without a matching request; ignoring");
            return;
        }

        inner.state.ref_count -= 1;
        if inner.state.ref_count == 0 {
            inner.state.held = false;
            self.backend.abandon();
            debug!("Audio focus released");
        } else {
            debug!("Audio focus still shared, ref count {}", inner.state.ref_count);
        }
    }

    /// Drops every outstanding reference and releases the platform grant once.
    pub fn release_all(&self) {
        let mut inner = self.lock();
        if !inner.state.held {
            return;
        }
        if inner.state.ref_count > 0 {
            info!(
                "Force releasing audio focus with {} outstanding references",
                inner.state.ref_count
            );
        }
        inner.state = FocusState::default();
        self.backend.abandon();
    }

    fn on_revoked(&self, grant: FocusGrant) {
        let listeners = {
            let mut inner = self.lock();
            if !inner.state.held || inner.grant != grant {
                debug!("Ignoring stale audio focus revocation");
                return;
            }
            inner.state = FocusState::default();
            inner
                .loss_listeners
                .iter()
                .filter_map(Weak::upgrade)
                .collect::<Vec<_>>()
        };

        warn!("Audio focus revoked by the platform");
        for listener in listeners {
            listener.on_focus_lost(grant);
        }
    }
}

/// Which [`FocusBackend`] to build at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FocusMode {
    /// Arbitrate against the shared device focus stack.
    #[default]
    Device,
    /// The platform has no focus arbitration; every request is granted.
    Unmanaged,
}

impl FocusMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "device" => Some(Self::Device),
            "unmanaged" => Some(Self::Unmanaged),
            _ => None,
        }
    }

    pub fn backend(self, device: &DeviceFocusManager) -> Box<dyn FocusBackend> {
        match self {
            FocusMode::Device => Box::new(device.client("stride")),
            FocusMode::Unmanaged => Box::new(UnmanagedFocus),
        }
    }
}

pub struct UnmanagedFocus;

impl FocusBackend for UnmanagedFocus {
    fn request_transient(&self, _revocation: FocusRevocation) -> bool {
        true
    }

    fn abandon(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusGain {
    /// Short cue that tolerates ducking; coexists with other transient holders.
    TransientMayDuck,
    /// Long-lived playback; everyone else loses focus.
    Permanent,
    /// A phone call: everyone else loses focus and new requests are refused.
    Exclusive,
}

struct Holder {
    client: String,
    gain: FocusGain,
    on_loss: Option<Box<dyn Fn() + Send + Sync>>,
}

/// The device-wide focus stack shared by every audio client on the device.
#[derive(Clone, Default)]
pub struct DeviceFocusManager {
    holders: Arc<Mutex<Vec<Holder>>>,
}

impl DeviceFocusManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(&self, name: impl Into<String>) -> DeviceFocus {
        DeviceFocus {
            manager: self.clone(),
            name: name.into(),
        }
    }

    pub fn holders(&self) -> Vec<String> {
        self.lock().iter().map(|holder| holder.client.clone()).collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Holder>> {
        self.holders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn request(
        &self,
        client: &str,
        gain: FocusGain,
        on_loss: Option<Box<dyn Fn() + Send + Sync>>,
    ) -> bool {
        let revoked = {
            let mut holders = self.lock();
            let blocked = holders
                .iter()
                .any(|holder| holder.client != client && holder.gain == FocusGain::Exclusive);
            if blocked {
                return false;
            }

            holders.retain(|holder| holder.client != client);
            let revoked: Vec<Holder> = if gain == FocusGain::TransientMayDuck {
                Vec::new()
            } else {
                std::mem::take(&mut *holders)
            };
            holders.push(Holder {
                client: client.to_string(),
                gain,
                on_loss,
            });
            revoked
        };

        // Loss callbacks run outside the lock; they may re-enter the manager.
        for holder in revoked {
            if let Some(on_loss) = holder.on_loss {
                on_loss();
            }
        }
        true
    }

    pub fn abandon(&self, client: &str) {
        self.lock().retain(|holder| holder.client != client);
    }
}

/// An audio client of a [`DeviceFocusManager`].
pub struct DeviceFocus {
    manager: DeviceFocusManager,
    name: String,
}

impl FocusBackend for DeviceFocus {
    fn request_transient(&self, revocation: FocusRevocation) -> bool {
        self.manager.request(
            &self.name,
            FocusGain::TransientMayDuck,
            Some(Box::new(move || revocation.revoke())),
        )
    }

    fn abandon(&self) {
        self.manager.abandon(&self.name);
    }
}
