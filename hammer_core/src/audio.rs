//! Audio abstraction.
//!
//! Sound is fire-and-forget: the game pushes power levels and cues into an
//! [`AudioSink`] and never reads anything back. [`AudioContext`] is the
//! explicit handle passed to the game. It starts suspended (autoplay rules)
//! and only forwards sound once resumed by a user interaction.

use std::{sync::Arc, time::Duration};

use tokio::task::AbortHandle;
use tracing::{debug, warn};

/// Discrete sound triggers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioCue {
    ThrowReleased { power: f32 },
    Landed { impact_speed: f32 },
    Reset,
}

/// Backend that actually produces sound.
pub trait AudioSink: Send + Sync {
    /// Continuous charge level while the player is powering up, `[0, 1]`.
    fn set_power_level(&self, level: f32);
    fn trigger(&self, cue: AudioCue);
    /// Silences the charge tone.
    fn stop_charge(&self);
    /// Releases the backend.
    fn close(&self) -> anyhow::Result<()>;
}

/// Silent backend.
#[derive(Default)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn set_power_level(&self, _level: f32) {}
    fn trigger(&self, _cue: AudioCue) {}
    fn stop_charge(&self) {}
    fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Backend that logs every call; used by the headless client.
#[derive(Default)]
pub struct TracingAudio;

impl AudioSink for TracingAudio {
    fn set_power_level(&self, level: f32) {
        tracing::trace!(level, "audio: power level");
    }

    fn trigger(&self, cue: AudioCue) {
        debug!(?cue, "audio: cue");
    }

    fn stop_charge(&self) {
        debug!("audio: charge stopped");
    }

    fn close(&self) -> anyhow::Result<()> {
        debug!("audio: closed");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioState {
    /// Created but not yet allowed to play.
    Suspended,
    Running,
    Closed,
}

/// Owned audio handle.
pub struct AudioContext {
    sink: Arc<dyn AudioSink>,
    state: AudioState,
    pending_stop: Option<AbortHandle>,
}

impl AudioContext {
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self {
            sink,
            state: AudioState::Suspended,
            pending_stop: None,
        }
    }

    /// A context that never makes a sound.
    pub fn silent() -> Self {
        Self::new(Arc::new(NullAudio))
    }

    pub fn state(&self) -> AudioState {
        self.state
    }

    /// Unlocks playback. Call on the first user interaction.
    pub fn resume(&mut self) -> bool {
        if self.state != AudioState::Suspended {
            return false;
        }
        self.state = AudioState::Running;
        debug!("Audio context resumed");
        true
    }

    pub fn power_level(&self, level: f32) {
        if self.state == AudioState::Running {
            self.sink.set_power_level(level.clamp(0.0, 1.0));
        }
    }

    pub fn cue(&self, cue: AudioCue) {
        if self.state == AudioState::Running {
            self.sink.trigger(cue);
        }
    }

    /// Stops the charge tone after `delay`.
    ///
    /// The stop runs as a task owned by this context: a newer request or
    /// [`AudioContext::close`] cancels it. Outside a tokio runtime the tone
    /// stops immediately.
    pub fn schedule_charge_stop(&mut self, delay: Duration) {
        if self.state != AudioState::Running {
            return;
        }
        self.cancel_pending();
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                let sink = Arc::clone(&self.sink);
                let task = rt.spawn(async move {
                    tokio::time::sleep(delay).await;
                    sink.stop_charge();
                });
                self.pending_stop = Some(task.abort_handle());
            }
            Err(_) => self.sink.stop_charge(),
        }
    }

    /// Whether a deferred stop is still waiting to run.
    pub fn has_pending_stop(&self) -> bool {
        self.pending_stop
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending_stop.take() {
            handle.abort();
        }
    }

    /// Best-effort teardown. Safe to call more than once.
    pub fn close(&mut self) {
        if self.state == AudioState::Closed {
            return;
        }
        self.cancel_pending();
        self.state = AudioState::Closed;
        if let Err(e) = self.sink.close() {
            warn!(error = %e, "Audio backend failed to close");
        }
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        self.close();
    }
}
