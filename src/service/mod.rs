pub mod calls;
pub mod context;
pub mod devices;
pub mod dispatch;
pub mod listeners;
pub mod tracker;

pub use calls::{CallInterruptionGuard, CallState};
pub use context::{RunRequest, ServiceRunContext, ServiceSnapshot};
pub use devices::{DesktopDevices, DeviceProvider};
pub use dispatch::UiDispatcher;
pub use listeners::{ListenerRegistry, ObserverBinding, ObserverId, RunStateListener};
pub use tracker::{RunTrackingService, ServiceOptions, ACTIVE_REPEATS, COMPLETION_REPEATS};
