//! Text-to-speech backends.
//!
//! Linux and macOS have no in-process TTS we can rely on, so utterances are
//! handed to the first speech binary found on `PATH`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use tokio::{process::Command, runtime::Handle, sync::mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Progress reports for queued utterances. Exactly one of `on_done` or
/// `on_error` follows every utterance, whether or not `on_start` ran.
pub trait UtteranceObserver: Send + Sync {
    fn on_start(&self, id: Uuid);
    fn on_done(&self, id: Uuid);
    fn on_error(&self, id: Uuid);
}

pub trait SpeechEngine: Send + Sync {
    fn set_observer(&self, observer: Weak<dyn UtteranceObserver>);
    /// Queues `text` behind any utterance already speaking.
    fn speak(&self, id: Uuid, text: &str, volume: f32) -> Result<()>;
    /// Cancels the current utterance and flushes the queue.
    fn stop(&self);
    fn shutdown(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Voice {
    EspeakNg,
    Espeak,
    SpdSay,
    Say,
}

impl Voice {
    const CANDIDATES: [(Voice, &'static str); 4] = [
        (Voice::EspeakNg, "espeak-ng"),
        (Voice::Espeak, "espeak"),
        (Voice::SpdSay, "spd-say"),
        (Voice::Say, "say"),
    ];

    fn command(self, bin: &Path, text: &str, volume: f32) -> Command {
        let volume = volume.clamp(0.0, 1.0);
        let mut cmd = Command::new(bin);
        match self {
            Voice::EspeakNg | Voice::Espeak => {
                cmd.arg("-a").arg(((volume * 200.0) as u32).to_string());
            }
            Voice::SpdSay => {
                // Wait for the utterance so completion is observable.
                cmd.arg("-w")
                    .arg("-i")
                    .arg(((volume * 200.0) as i32 - 100).to_string());
            }
            Voice::Say => {}
        }
        cmd.arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

struct Job {
    id: Uuid,
    text: String,
    volume: f32,
    cancel: CancellationToken,
}

struct EngineInner {
    observer: Option<Weak<dyn UtteranceObserver>>,
    /// Shared by every job queued since the last `stop`.
    epoch: CancellationToken,
    jobs: Option<mpsc::UnboundedSender<Job>>,
}

/// Speaks through an external binary, one utterance at a time.
pub struct ProcessSpeechEngine {
    inner: Arc<Mutex<EngineInner>>,
}

fn lock(inner: &Mutex<EngineInner>) -> MutexGuard<'_, EngineInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

fn current_observer(inner: &Mutex<EngineInner>) -> Option<Arc<dyn UtteranceObserver>> {
    lock(inner).observer.as_ref().and_then(Weak::upgrade)
}

impl ProcessSpeechEngine {
    /// Fails when no speech binary is installed.
    pub fn probe(runtime: &Handle) -> Result<Self> {
        let (voice, bin) = Voice::CANDIDATES
            .iter()
            .find_map(|(voice, name)| find_on_path(name).map(|bin| (*voice, bin)))
            .ok_or_else(|| anyhow!("no speech binary (espeak-ng, espeak, spd-say, say) on PATH"))?;
        Self::with_binary(runtime, voice, bin)
    }

    fn with_binary(runtime: &Handle, voice: Voice, bin: PathBuf) -> Result<Self> {
        let (jobs_tx, mut jobs_rx) = mpsc::unbounded_channel::<Job>();
        let inner = Arc::new(Mutex::new(EngineInner {
            observer: None,
            epoch: CancellationToken::new(),
            jobs: Some(jobs_tx),
        }));

        info!("Speech engine using {}", bin.display());

        let worker_inner = Arc::downgrade(&inner);
        runtime.spawn(async move {
            while let Some(job) = jobs_rx.recv().await {
                let Some(inner) = worker_inner.upgrade() else {
                    break;
                };
                let observer = current_observer(&inner);
                drop(inner);

                if job.cancel.is_cancelled() {
                    if let Some(observer) = observer {
                        observer.on_error(job.id);
                    }
                    continue;
                }

                if let Some(observer) = &observer {
                    observer.on_start(job.id);
                }
                let finished = speak_one(voice, &bin, &job).await;
                if let Some(observer) = &observer {
                    match finished {
                        Ok(()) => observer.on_done(job.id),
                        Err(err) => {
                            debug!("Utterance {} ended early: {err:#}", job.id);
                            observer.on_error(job.id);
                        }
                    }
                }
            }
            debug!("Speech worker exiting");
        });

        Ok(Self { inner })
    }
}

async fn speak_one(voice: Voice, bin: &Path, job: &Job) -> Result<()> {
    let mut child = voice
        .command(bin, &job.text, job.volume)
        .spawn()
        .with_context(|| format!("failed to launch {}", bin.display()))?;

    tokio::select! {
        status = child.wait() => {
            let status = status.context("speech process failed")?;
            if !status.success() {
                bail!("speech process exited with {status}");
            }
            Ok(())
        }
        _ = job.cancel.cancelled() => {
            let _ = child.kill().await;
            bail!("utterance cancelled")
        }
    }
}

impl SpeechEngine for ProcessSpeechEngine {
    fn set_observer(&self, observer: Weak<dyn UtteranceObserver>) {
        lock(&self.inner).observer = Some(observer);
    }

    fn speak(&self, id: Uuid, text: &str, volume: f32) -> Result<()> {
        let guard = lock(&self.inner);
        let jobs = guard
            .jobs
            .as_ref()
            .ok_or_else(|| anyhow!("speech engine has been shut down"))?;
        jobs.send(Job {
            id,
            text: text.to_string(),
            volume,
            cancel: guard.epoch.clone(),
        })
        .map_err(|_| anyhow!("speech worker has exited"))
    }

    fn stop(&self) {
        let mut guard = lock(&self.inner);
        guard.epoch.cancel();
        guard.epoch = CancellationToken::new();
    }

    fn shutdown(&self) {
        let mut guard = lock(&self.inner);
        guard.epoch.cancel();
        if guard.jobs.take().is_some() {
            info!("Speech engine shut down");
        } else {
            warn!("Speech engine already shut down");
        }
    }
}
