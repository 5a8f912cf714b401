//! Game state machine.
//!
//! `HammerGame` owns every piece of per-round state and is advanced by one
//! `frame` call per display refresh. Each frame runs, in order:
//!
//! 1. face capture (idle only),
//! 2. physics (throwing, once the hammer has left the hands),
//! 3. animation and camera,
//! 4. phase transitions.
//!
//! Phases: `Idle` → `Throwing` (release) → `Result` (projectile at rest)
//! → `Idle` (reset). Triggers that do not match the current phase are
//! ignored.

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    animation::{AnimationSignal, CharacterAnimator},
    audio::{AudioContext, AudioCue},
    camera::CameraRig,
    config::{GameConfig, PowerRange},
    event::{EventBus, GameEvent},
    face::{FaceFrame, FaceScore, LandmarkScorer},
    math::{Quat, Vec3},
    physics::{PhysicsError, ProjectileSimulator, ProjectileState},
    power::{AutoRelease, PowerError, PowerMeter, PowerScore, ThrowPower},
    render::SceneSink,
};

/// How long the charge tone lingers after release.
const CHARGE_FADE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Capturing the face score.
    Idle,
    /// Wind-up and flight.
    Throwing,
    /// Hammer at rest, waiting for reset.
    Result,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GamePhase::Idle => write!(f, "idle"),
            GamePhase::Throwing => write!(f, "throwing"),
            GamePhase::Result => write!(f, "result"),
        }
    }
}

/// Summary of a finished throw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrowResult {
    pub power: ThrowPower,
    /// Face score the power was committed from.
    pub score: PowerScore,
    /// Horizontal distance from the launch point, metres.
    pub distance: f32,
    pub bounces: u32,
    pub flight_secs: f32,
    pub landing: Vec3,
    pub finished_at: DateTime<Utc>,
}

/// Why a release was refused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameError {
    Power(PowerError),
    Physics(PhysicsError),
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameError::Power(e) => write!(f, "release rejected: {e}"),
            GameError::Physics(e) => write!(f, "release rejected: {e}"),
        }
    }
}

impl std::error::Error for GameError {}

impl From<PowerError> for GameError {
    fn from(e: PowerError) -> Self {
        GameError::Power(e)
    }
}

impl From<PhysicsError> for GameError {
    fn from(e: PhysicsError) -> Self {
        GameError::Physics(e)
    }
}

/// Per-frame outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub phase: GamePhase,
    /// Score computed this frame; `None` outside the idle phase.
    pub score: Option<FaceScore>,
    pub transition: Option<(GamePhase, GamePhase)>,
}

#[derive(Debug, Clone, Copy)]
struct ActiveThrow {
    power: ThrowPower,
    score: PowerScore,
    launched: bool,
    landed: bool,
}

pub struct HammerGame {
    release_angle_deg: f32,
    scorer: LandmarkScorer,
    meter: PowerMeter,
    auto_release: AutoRelease,
    sim: ProjectileSimulator,
    animator: CharacterAnimator,
    camera: CameraRig,
    audio: AudioContext,
    events: EventBus,
    phase: GamePhase,
    last_score: FaceScore,
    throw: Option<ActiveThrow>,
    result: Option<ThrowResult>,
}

impl HammerGame {
    pub fn new(cfg: &GameConfig, audio: AudioContext) -> Self {
        Self {
            release_angle_deg: cfg.release_angle_deg,
            scorer: LandmarkScorer::from_config(cfg),
            meter: PowerMeter::new(cfg.power_range, cfg.score_smoothing),
            auto_release: AutoRelease::new(cfg.auto_release.clone()),
            sim: ProjectileSimulator::new(cfg.physics_config()),
            animator: CharacterAnimator::new(cfg.animation.clone()),
            camera: CameraRig::new(cfg.camera.clone()),
            audio,
            events: EventBus::default(),
            phase: GamePhase::Idle,
            last_score: FaceScore::NONE,
            throw: None,
            result: None,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Smoothed capture score.
    pub fn current_score(&self) -> PowerScore {
        self.meter.current()
    }

    /// Raw score of the last captured frame.
    pub fn last_face_score(&self) -> &FaceScore {
        &self.last_score
    }

    /// Power a release would commit right now.
    pub fn preview_power(&self) -> ThrowPower {
        self.meter.preview()
    }

    pub fn power_range(&self) -> PowerRange {
        self.meter.range()
    }

    pub fn locked_power(&self) -> Option<ThrowPower> {
        self.throw.map(|t| t.power)
    }

    pub fn projectile(&self) -> &ProjectileState {
        self.sim.state()
    }

    pub fn simulator(&self) -> &ProjectileSimulator {
        &self.sim
    }

    pub fn animator(&self) -> &CharacterAnimator {
        &self.animator
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    pub fn result(&self) -> Option<&ThrowResult> {
        self.result.as_ref()
    }

    pub fn audio_mut(&mut self) -> &mut AudioContext {
        &mut self.audio
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain::<GameEvent>()
    }

    /// Advances one display frame.
    pub fn frame(&mut self, dt: f32, face: Option<&FaceFrame>) -> FrameReport {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let before = self.phase;
        let mut score = None;

        // Capture.
        if self.phase == GamePhase::Idle {
            score = Some(self.capture(dt, face));
        }

        // Physics.
        if self.phase == GamePhase::Throwing {
            self.step_physics(dt);
        }

        // Animation and camera.
        if self.phase != GamePhase::Idle {
            let signal = self.animator.update(dt, self.sim.is_at_rest());
            if signal == Some(AnimationSignal::Release) {
                self.launch();
            }
        }
        let focus = (self.phase == GamePhase::Throwing).then(|| self.hammer_position());
        self.camera.update(dt, focus);

        // Transitions.
        if self.phase == GamePhase::Throwing && self.sim.is_at_rest() {
            self.finish();
        }

        FrameReport {
            phase: self.phase,
            score,
            transition: (before != self.phase).then_some((before, self.phase)),
        }
    }

    fn capture(&mut self, dt: f32, face: Option<&FaceFrame>) -> FaceScore {
        let score = self.scorer.score(face);
        self.meter.update(score.power, dt);
        self.audio.power_level(self.meter.current().value());
        self.last_score = score;

        if self.auto_release.observe(self.meter.current(), dt) {
            debug!(score = self.meter.current().value(), "Sustained power, auto release");
            if let Err(e) = self.release() {
                debug!(error = %e, "Auto release rejected");
            }
        }
        score
    }

    fn step_physics(&mut self, dt: f32) {
        let Some(active) = self.throw.as_mut() else {
            return;
        };
        if !active.launched {
            return;
        }
        let report = self.sim.step(dt);
        if let Some(impact_speed) = report.first_contact_speed {
            if !active.landed {
                active.landed = true;
                self.audio.cue(AudioCue::Landed { impact_speed });
                self.events.push(GameEvent::Landed { impact_speed });
            }
        }
    }

    /// Commits the current meter power. Ignored outside `Idle`.
    pub fn release(&mut self) -> Result<Option<ThrowPower>, GameError> {
        if self.phase != GamePhase::Idle {
            debug!(phase = %self.phase, "Release ignored");
            return Ok(None);
        }
        let power = self.meter.preview();
        self.commit(power).map(Some)
    }

    /// Commits an externally chosen power. Ignored outside `Idle`.
    ///
    /// The power must lie in the configured range.
    pub fn release_with_power(&mut self, power: f32) -> Result<Option<ThrowPower>, GameError> {
        if self.phase != GamePhase::Idle {
            debug!(phase = %self.phase, "Release ignored");
            return Ok(None);
        }
        let power =
            ThrowPower::within(power, self.meter.range()).map_err(|e| self.reject(e.into()))?;
        self.commit(power).map(Some)
    }

    fn commit(&mut self, power: ThrowPower) -> Result<ThrowPower, GameError> {
        ProjectileSimulator::check_launch(power.value(), self.release_angle_deg)
            .map_err(|e| self.reject(e.into()))?;

        let score = self.meter.current();
        self.meter.lock_at(power);
        self.auto_release.reset();
        self.animator.begin_windup();
        self.camera.follow();
        self.audio.cue(AudioCue::ThrowReleased {
            power: power.value(),
        });
        self.audio.schedule_charge_stop(CHARGE_FADE);
        self.throw = Some(ActiveThrow {
            power,
            score,
            launched: false,
            landed: false,
        });
        info!(power = power.value(), score = score.value(), "Throw released");
        self.events.push(GameEvent::ThrowReleased { power });
        self.set_phase(GamePhase::Throwing);
        Ok(power)
    }

    fn reject(&mut self, e: GameError) -> GameError {
        warn!(error = %e, "Release rejected, staying idle");
        self.events.push(GameEvent::ReleaseRejected {
            reason: e.to_string(),
        });
        e
    }

    fn launch(&mut self) {
        let Some(active) = self.throw.as_mut() else {
            return;
        };
        if active.launched {
            return;
        }
        match self.sim.start(active.power.value(), self.release_angle_deg) {
            Ok(()) => {
                active.launched = true;
                self.events.push(GameEvent::Launched);
            }
            Err(e) => {
                // Inputs were validated at release; only a stale simulator gets here.
                warn!(error = %e, "Launch failed, abandoning throw");
                self.abort();
            }
        }
    }

    fn finish(&mut self) {
        let Some(active) = self.throw else {
            return;
        };
        let state = *self.sim.state();
        let result = ThrowResult {
            power: active.power,
            score: active.score,
            distance: self.sim.distance(),
            bounces: state.bounces,
            flight_secs: state.flight_secs,
            landing: state.position,
            finished_at: Utc::now(),
        };
        info!(
            distance = result.distance,
            power = result.power.value(),
            bounces = result.bounces,
            "Throw finished"
        );
        self.camera.show_result(state.position);
        self.result = Some(result.clone());
        self.events.push(GameEvent::Finished(result));
        self.set_phase(GamePhase::Result);
    }

    /// Leaves the result screen. Ignored outside `Result`.
    pub fn reset(&mut self) -> bool {
        if self.phase != GamePhase::Result {
            debug!(phase = %self.phase, "Reset ignored");
            return false;
        }
        self.clear_round();
        self.audio.cue(AudioCue::Reset);
        self.set_phase(GamePhase::Idle);
        true
    }

    /// Drops any round in progress and returns to idle, for teardown.
    ///
    /// Unlike [`HammerGame::reset`] this works from every phase and emits no
    /// result. The simulator is cleared synchronously.
    pub fn abort(&mut self) -> bool {
        if self.phase == GamePhase::Idle {
            return false;
        }
        self.clear_round();
        self.set_phase(GamePhase::Idle);
        true
    }

    fn clear_round(&mut self) {
        self.sim.reset();
        self.meter.rearm();
        self.auto_release.reset();
        self.animator.reset();
        self.camera.reset();
        self.throw = None;
        self.result = None;
        self.last_score = FaceScore::NONE;
    }

    fn set_phase(&mut self, to: GamePhase) {
        let from = self.phase;
        if from == to {
            return;
        }
        self.phase = to;
        debug!(%from, %to, "Phase changed");
        self.events.push(GameEvent::PhaseChanged { from, to });
    }

    /// Hammer head position: in the hands until launch, then simulated.
    pub fn hammer_position(&self) -> Vec3 {
        match self.throw {
            Some(ActiveThrow { launched: true, .. }) => self.sim.state().position,
            _ => self.animator.hammer_anchor(self.sim.config().launch_point),
        }
    }

    /// Pushes this frame's transforms to the scene.
    pub fn present(&self, scene: &mut dyn SceneSink) {
        let orientation = match self.throw {
            Some(ActiveThrow { launched: true, .. }) => self.sim.state().angular.orientation(),
            _ => Quat::IDENTITY,
        };
        scene.set_projectile(self.hammer_position(), orientation);
        scene.set_character_pose(&self.animator.pose());
        scene.set_camera(self.camera.position(), self.camera.look_at());
    }

    /// Closes audio. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.abort();
        self.audio.close();
    }
}
