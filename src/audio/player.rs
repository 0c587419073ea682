use std::sync::{
    mpsc::{self, Sender},
    Mutex, PoisonError,
};
use std::thread;

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use rodio::{source::EmptyCallback, OutputStream, Sink};

use super::ToneKind;

pub type CueDone = Box<dyn FnOnce() + Send + 'static>;

/// Plays cue bursts without blocking the caller.
///
/// `done` runs once the burst has finished playing. It is dropped without
/// running when the burst is cut short by [`CuePlayer::stop`].
pub trait CuePlayer: Send + Sync {
    fn play(&self, tone: ToneKind, repeats: u32, volume: f32, done: CueDone) -> Result<()>;
    fn stop(&self);
    fn release(&self);
}

enum CueCommand {
    Play {
        tone: ToneKind,
        repeats: u32,
        volume: f32,
        done: CueDone,
    },
    Stop,
    Shutdown,
}

/// Rodio output on a dedicated thread; the output stream is not `Send`.
pub struct RodioCuePlayer {
    tx: Mutex<Option<Sender<CueCommand>>>,
}

impl RodioCuePlayer {
    pub fn new() -> Self {
        Self { tx: Mutex::new(None) }
    }

    fn ensure_thread(&self) -> Result<Sender<CueCommand>> {
        let mut guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<CueCommand>();

        thread::Builder::new()
            .name("cue-player".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> Result<()> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .context("failed to open audio output stream")?;
                        let new_sink =
                            Sink::try_new(&handle).context("failed to create audio sink")?;
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        CueCommand::Play {
                            tone,
                            repeats,
                            volume,
                            done,
                        } => {
                            if let Err(err) = ensure_sink(&mut _stream, &mut sink) {
                                warn!("Cue playback unavailable: {err:#}");
                                done();
                                continue;
                            }
                            if let Some(ref s) = sink {
                                s.set_volume(volume.clamp(0.0, 1.0));
                                for _ in 0..repeats {
                                    s.append(tone.source());
                                }
                                let done = Mutex::new(Some(done));
                                s.append(EmptyCallback::<f32>::new(Box::new(move || {
                                    let finished = done
                                        .lock()
                                        .unwrap_or_else(PoisonError::into_inner)
                                        .take();
                                    if let Some(finished) = finished {
                                        finished();
                                    }
                                })));
                                s.play();
                            }
                        }
                        CueCommand::Stop => {
                            if let Some(s_old) = sink.take() {
                                s_old.stop();
                            }
                            _stream = None;
                        }
                        CueCommand::Shutdown => break,
                    }
                }

                debug!("Cue player thread exiting");
            })
            .context("failed to spawn cue player thread")?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

impl Default for RodioCuePlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl CuePlayer for RodioCuePlayer {
    fn play(&self, tone: ToneKind, repeats: u32, volume: f32, done: CueDone) -> Result<()> {
        let tx = self.ensure_thread()?;
        tx.send(CueCommand::Play {
            tone,
            repeats,
            volume,
            done,
        })
        .map_err(|_| anyhow!("cue player thread has exited"))
    }

    fn stop(&self) {
        if let Some(tx) = self.tx.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            let _ = tx.send(CueCommand::Stop);
        }
    }

    fn release(&self) {
        if let Some(tx) = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = tx.send(CueCommand::Stop);
            let _ = tx.send(CueCommand::Shutdown);
        }
    }
}

/// Used when sound is disabled or no output device exists.
pub struct SilentCuePlayer;

impl CuePlayer for SilentCuePlayer {
    fn play(&self, _tone: ToneKind, _repeats: u32, _volume: f32, done: CueDone) -> Result<()> {
        done();
        Ok(())
    }

    fn stop(&self) {}

    fn release(&self) {}
}
