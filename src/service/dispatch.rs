use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex, PoisonError,
};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use log::{debug, error};

use super::listeners::{ListenerRegistry, RunStateListener};

type UiTask = Box<dyn FnOnce() + Send + 'static>;

enum UiCommand {
    Run(UiTask),
    Shutdown,
}

struct DispatcherInner {
    sender: Sender<UiCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DispatcherInner {
    fn drop(&mut self) {
        let mut guard = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = guard.take() {
            let _ = self.sender.send(UiCommand::Shutdown);
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join UI thread: {join_err:?}");
            }
        }
    }
}

/// The single thread UI observers are notified on.
#[derive(Clone)]
pub struct UiDispatcher {
    inner: Arc<DispatcherInner>,
}

impl UiDispatcher {
    pub fn spawn() -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<UiCommand>();

        let worker = thread::Builder::new()
            .name("stride-ui".into())
            .spawn(move || {
                while let Ok(command) = receiver.recv() {
                    match command {
                        UiCommand::Run(task) => task(),
                        UiCommand::Shutdown => break,
                    }
                }
                debug!("UI thread shutting down");
            })
            .context("failed to spawn UI dispatch thread")?;

        Ok(Self {
            inner: Arc::new(DispatcherInner {
                sender,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        if self.inner.sender.send(UiCommand::Run(Box::new(task))).is_err() {
            debug!("UI thread gone; dropping notification");
        }
    }

    /// Notifies the listeners registered when the task runs on the UI thread.
    /// An observer that unbinds before delivery is skipped.
    pub fn notify(
        &self,
        registry: &Arc<ListenerRegistry>,
        notify: impl Fn(&dyn RunStateListener) + Send + 'static,
    ) {
        if registry.is_empty() {
            return;
        }
        let registry = Arc::downgrade(registry);
        self.post(move || {
            let Some(registry) = registry.upgrade() else {
                return;
            };
            for listener in registry.snapshot() {
                notify(listener.as_ref());
            }
        });
    }

    /// Blocks until everything posted so far has run.
    pub fn flush(&self) {
        let (done_tx, done_rx) = mpsc::channel();
        self.post(move || {
            let _ = done_tx.send(());
        });
        let _ = done_rx.recv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::listeners::ObserverBinding;
    use std::sync::Mutex;

    #[test]
    fn tasks_run_in_post_order_on_one_thread() {
        let ui = UiDispatcher::spawn().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..50 {
            let seen = seen.clone();
            ui.post(move || {
                seen.lock()
                    .unwrap()
                    .push((i, thread::current().name().map(str::to_string)));
            });
        }
        ui.flush();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 50);
        assert!(seen.iter().enumerate().all(|(i, (n, _))| i == *n));
        assert!(seen.iter().all(|(_, name)| name.as_deref() == Some("stride-ui")));
    }

    #[test]
    fn listener_may_unregister_itself_during_notification() {
        struct SelfRemoving {
            registry: Arc<ListenerRegistry>,
            id: Mutex<Option<u64>>,
            calls: Mutex<usize>,
        }

        impl RunStateListener for SelfRemoving {
            fn on_halfway(&self) {
                *self.calls.lock().unwrap() += 1;
                if let Some(id) = self.id.lock().unwrap().take() {
                    self.registry.unregister(id);
                }
            }
        }

        let ui = UiDispatcher::spawn().unwrap();
        let registry = ListenerRegistry::new();
        let listener = Arc::new(SelfRemoving {
            registry: registry.clone(),
            id: Mutex::new(None),
            calls: Mutex::new(0),
        });
        let id = registry.register(listener.clone());
        *listener.id.lock().unwrap() = Some(id);

        ui.notify(&registry, |l| l.on_halfway());
        ui.notify(&registry, |l| l.on_halfway());
        ui.flush();

        assert_eq!(*listener.calls.lock().unwrap(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn observer_unbound_before_delivery_is_skipped() {
        #[derive(Default)]
        struct Counter(Mutex<usize>);

        impl RunStateListener for Counter {
            fn on_halfway(&self) {
                *self.0.lock().unwrap() += 1;
            }
        }

        let ui = UiDispatcher::spawn().unwrap();
        let registry = ListenerRegistry::new();
        let counter = Arc::new(Counter::default());
        let binding = ObserverBinding::attach(&registry, counter.clone());

        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        ui.post(move || {
            let _ = release_rx.recv();
        });
        ui.notify(&registry, |l| l.on_halfway());
        binding.unbind();
        release_tx.send(()).unwrap();
        ui.flush();

        assert_eq!(*counter.0.lock().unwrap(), 0);
    }
}
