//! Session implementation.
//!
//! The session is the single owner of the game. One `tick` per display
//! refresh:
//! - reads the newest face result (idle only; never waits for the tracker),
//! - advances the game,
//! - pushes transforms to the scene,
//! - reports phase-boundary events.
//!
//! The face tracker runs on its own task and only shares the face slot.

use std::time::Duration;

use anyhow::Context;
use hammer_core::{
    audio::AudioContext,
    config::GameConfig,
    event::GameEvent,
    game::{FrameReport, GamePhase, HammerGame, ThrowResult},
    power::{PowerScore, ThrowPower},
    render::SceneSink,
    tracking::{
        face_slot, FaceDetector, FaceSlot, FaceTracker, FrameSource, TrackerHandle,
        TrackerStatus,
    },
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::input::Command;

/// High-level game session.
pub struct GameSession {
    pub game: HammerGame,
    faces: FaceSlot,
    tracker: Option<TrackerHandle>,
    scene: Box<dyn SceneSink + Send>,
    frame: u64,
    last_tracker_status: Option<TrackerStatus>,
    /// Results of this session, newest last. Not persisted.
    pub results: Vec<ThrowResult>,
}

impl GameSession {
    /// Builds a session around an already-wired face slot.
    pub fn new(
        cfg: &GameConfig,
        audio: AudioContext,
        faces: FaceSlot,
        tracker: Option<TrackerHandle>,
        scene: Box<dyn SceneSink + Send>,
    ) -> anyhow::Result<Self> {
        cfg.validate().context("validate game config")?;
        Ok(Self {
            game: HammerGame::new(cfg, audio),
            faces,
            tracker,
            scene,
            frame: 0,
            last_tracker_status: None,
            results: Vec::new(),
        })
    }

    /// Starts face tracking on `source`/`detector` and builds the session.
    ///
    /// Must run inside a tokio runtime.
    pub fn start<S, D>(
        cfg: &GameConfig,
        audio: AudioContext,
        source: S,
        detector: D,
        scene: Box<dyn SceneSink + Send>,
    ) -> anyhow::Result<Self>
    where
        S: FrameSource + 'static,
        D: FaceDetector + 'static,
    {
        cfg.validate().context("validate game config")?;
        let (publisher, faces) = face_slot();
        let tracker = FaceTracker::spawn(source, detector, cfg.detector.clone(), publisher);
        Self::new(cfg, audio, faces, Some(tracker), scene)
    }

    pub fn phase(&self) -> GamePhase {
        self.game.phase()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn tracker_status(&self) -> Option<TrackerStatus> {
        self.tracker.as_ref().map(TrackerHandle::status)
    }

    /// Runs one frame.
    pub fn tick(&mut self, dt: f32) -> FrameReport {
        let latest = if self.game.phase() == GamePhase::Idle {
            self.faces.latest()
        } else {
            None
        };
        let report = self.game.frame(dt, latest.as_deref());
        self.game.present(self.scene.as_mut());
        self.frame += 1;

        self.watch_tracker();
        for event in self.game.drain_events() {
            self.on_event(event);
        }
        report
    }

    fn watch_tracker(&mut self) {
        let status = self.tracker_status();
        if status == self.last_tracker_status {
            return;
        }
        self.last_tracker_status = status;
        match status {
            Some(TrackerStatus::Unavailable) => {
                warn!("Face tracking unavailable, throws will use minimum power")
            }
            Some(status) => debug!(?status, "Face tracker status"),
            None => {}
        }
    }

    fn on_event(&mut self, event: GameEvent) {
        match event {
            GameEvent::PhaseChanged { from, to } => {
                info!(%from, %to, frame = self.frame, "Phase changed");
            }
            GameEvent::ThrowReleased { power } => {
                info!(power = power.value(), "Released");
            }
            GameEvent::Launched => debug!("Hammer launched"),
            GameEvent::Landed { impact_speed } => {
                debug!(impact_speed, "Hammer landed");
            }
            GameEvent::Finished(result) => {
                info!(
                    distance = result.distance,
                    power = result.power.value(),
                    bounces = result.bounces,
                    "Result"
                );
                self.results.push(result);
            }
            GameEvent::ReleaseRejected { reason } => {
                warn!(%reason, "Release rejected");
            }
        }
    }

    /// Executes a console command. Any command counts as a user interaction
    /// and unlocks audio.
    pub fn exec(&mut self, cmd: Command) -> Vec<String> {
        self.game.audio_mut().resume();
        match cmd {
            Command::Throw(power) => {
                let outcome = match power {
                    Some(p) => self.game.release_with_power(p),
                    None => self.game.release(),
                };
                match outcome {
                    Ok(Some(p)) => vec![format!("Throwing with power {:.1}", p.value())],
                    Ok(None) => vec![format!("Cannot throw while {}", self.game.phase())],
                    Err(e) => vec![format!("Throw rejected: {e}")],
                }
            }
            Command::Power(score) => {
                let power = ThrowPower::from_score(PowerScore::new(score), self.game.power_range());
                self.exec(Command::Throw(Some(power.value())))
            }
            Command::Reset => {
                if self.game.reset() {
                    vec!["Ready".to_string()]
                } else {
                    vec![format!("Nothing to reset while {}", self.game.phase())]
                }
            }
            Command::Status => self.status_lines(),
            Command::Results => match serde_json::to_string_pretty(&self.results) {
                Ok(json) => json.lines().map(str::to_string).collect(),
                Err(e) => vec![format!("Cannot encode results: {e}")],
            },
            Command::Quit => vec!["Bye".to_string()],
        }
    }

    pub fn status_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        out.push(format!("Phase: {}", self.game.phase()));
        out.push(format!("Frame: {}", self.frame));
        out.push(format!(
            "Tracker: {}",
            self.tracker_status()
                .map_or("none".to_string(), |s| format!("{s:?}"))
        ));
        match self.game.phase() {
            GamePhase::Idle => out.push(format!(
                "Power: score {:.2} -> {:.1}",
                self.game.current_score().value(),
                self.game.preview_power().value()
            )),
            GamePhase::Throwing => {
                let p = self.game.projectile().position;
                out.push(format!("Hammer: x={:.1} z={:.1}", p.x, p.z));
            }
            GamePhase::Result => {
                if let Some(r) = self.game.result() {
                    out.push(format!(
                        "Distance: {:.2} m (power {:.1}, {} bounces)",
                        r.distance,
                        r.power.value(),
                        r.bounces
                    ));
                }
            }
        }
        if let Some(best) = self
            .results
            .iter()
            .map(|r| r.distance)
            .max_by(|a, b| a.total_cmp(b))
        {
            out.push(format!("Best: {best:.2} m over {} throws", self.results.len()));
        }
        out
    }

    /// Runs the session for a number of frames at `fps`.
    pub async fn run_for_frames(&mut self, frames: u32, fps: u32) -> anyhow::Result<()> {
        anyhow::ensure!(fps > 0, "fps must be positive");
        let dt = Duration::from_secs_f32(1.0 / fps as f32);
        let mut next = Instant::now();

        for _ in 0..frames {
            next += dt;
            self.tick(dt.as_secs_f32());
            tokio::time::sleep_until(next).await;
        }
        Ok(())
    }

    /// Stops tracking and closes audio. Never fails; problems are logged.
    pub async fn shutdown(&mut self) {
        if self.game.abort() {
            info!("Round abandoned at shutdown");
        }
        if let Some(tracker) = self.tracker.take() {
            tracker.stop().await;
        }
        self.game.shutdown();
        info!(frames = self.frame, throws = self.results.len(), "Session closed");
    }
}

#[cfg(test)]
mod tests {
    use hammer_core::{
        face::{synthetic_face, FaceFrame},
        render::NullScene,
    };

    use super::*;

    fn session() -> (GameSession, hammer_core::tracking::FacePublisher) {
        let cfg = GameConfig {
            score_smoothing: 0.0,
            ..Default::default()
        };
        let (publisher, faces) = face_slot();
        let session = GameSession::new(
            &cfg,
            AudioContext::silent(),
            faces,
            None,
            Box::new(NullScene),
        )
        .unwrap();
        (session, publisher)
    }

    #[test]
    fn tick_reads_newest_face() {
        let (mut s, publisher) = session();
        publisher.publish(FaceFrame {
            sequence: 1,
            faces: vec![synthetic_face(0.5, 0.0, 0.0)],
        });
        publisher.publish(FaceFrame {
            sequence: 2,
            faces: vec![synthetic_face(0.5, 0.0875, 0.0375)],
        });
        let report = s.tick(1.0 / 60.0);
        assert!((report.score.unwrap().power.value() - 0.5).abs() < 1e-4);
        assert_eq!(s.frame_count(), 1);
    }

    #[test]
    fn commands_drive_the_round() {
        let (mut s, _publisher) = session();
        assert_eq!(s.exec(Command::Reset), vec!["Nothing to reset while idle"]);
        assert_eq!(s.exec(Command::Throw(Some(-5.0))).len(), 1);
        assert_eq!(s.phase(), GamePhase::Idle);

        let out = s.exec(Command::Throw(Some(20.0)));
        assert_eq!(out, vec!["Throwing with power 20.0"]);
        assert_eq!(s.exec(Command::Throw(None)), vec!["Cannot throw while throwing"]);

        let mut frames = 0;
        while s.phase() != GamePhase::Result {
            s.tick(1.0 / 60.0);
            frames += 1;
            assert!(frames < 2000);
        }
        assert_eq!(s.results.len(), 1);
        let json = s.exec(Command::Results).join("\n");
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["bounces"], serde_json::json!(s.results[0].bounces));
        assert!(s.status_lines().iter().any(|l| l.starts_with("Distance:")));
        assert_eq!(s.exec(Command::Reset), vec!["Ready"]);
        assert_eq!(s.phase(), GamePhase::Idle);
    }

    #[test]
    fn power_command_maps_score_into_range() {
        let (mut s, _publisher) = session();
        assert_eq!(s.exec(Command::Power(0.6)), vec!["Throwing with power 25.0"]);
        assert_eq!(s.phase(), GamePhase::Throwing);
    }
}
