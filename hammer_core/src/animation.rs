//! Character animation.
//!
//! The thrower's pose runs on its own timer: a fixed-length wind-up spin,
//! a release signal at the end of it, a follow-through, and a resting pose
//! once the hammer has come to rest.

use std::f32::consts::{FRAC_PI_2, TAU};

use serde::{Deserialize, Serialize};

use crate::math::{damp_factor, Vec3};

const HOLD_ARM: f32 = 0.2;
const WINDUP_LEAN: f32 = -0.3;
const FOLLOW_LEAN: f32 = 0.2;
const REST_EASE_RATE: f32 = 4.0;

/// Animation timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnimationConfig {
    pub windup_secs: f32,
    /// Full turns during the wind-up. Whole numbers release on the +X axis.
    pub windup_turns: f32,
    pub follow_through_secs: f32,
    /// Radius of the hammer's orbit while winding up.
    pub orbit_radius: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            windup_secs: 1.2,
            windup_turns: 3.0,
            follow_through_secs: 0.6,
            orbit_radius: 1.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PosePhase {
    Ready,
    WindUp,
    FollowThrough,
    Resting,
}

/// Joint-level pose handed to the scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CharacterPose {
    pub phase: PosePhase,
    /// Body rotation about Z, radians, unwrapped.
    pub body_yaw: f32,
    /// 0 = arms tucked, 1 = fully extended.
    pub arm_extension: f32,
    /// Torso pitch, radians. Negative leans back.
    pub lean: f32,
}

impl CharacterPose {
    pub const READY: Self = Self {
        phase: PosePhase::Ready,
        body_yaw: 0.0,
        arm_extension: HOLD_ARM,
        lean: 0.0,
    };
}

/// Emitted by the animator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationSignal {
    /// The wind-up finished; the hammer leaves the hands now.
    Release,
}

#[derive(Debug, Clone)]
pub struct CharacterAnimator {
    cfg: AnimationConfig,
    phase: PosePhase,
    timer: f32,
    pose: CharacterPose,
}

impl CharacterAnimator {
    pub fn new(cfg: AnimationConfig) -> Self {
        Self {
            cfg,
            phase: PosePhase::Ready,
            timer: 0.0,
            pose: CharacterPose::READY,
        }
    }

    pub fn phase(&self) -> PosePhase {
        self.phase
    }

    pub fn pose(&self) -> CharacterPose {
        self.pose
    }

    /// Progress through the wind-up, `[0, 1]`.
    pub fn windup_progress(&self) -> f32 {
        match self.phase {
            PosePhase::Ready => 0.0,
            PosePhase::WindUp => (self.timer / self.cfg.windup_secs.max(f32::EPSILON)).min(1.0),
            PosePhase::FollowThrough | PosePhase::Resting => 1.0,
        }
    }

    /// Starts the wind-up from the ready pose. Ignored in any other phase.
    pub fn begin_windup(&mut self) -> bool {
        if self.phase != PosePhase::Ready {
            return false;
        }
        self.phase = PosePhase::WindUp;
        self.timer = 0.0;
        true
    }

    /// Advances the pose. `projectile_at_rest` moves follow-through to rest.
    pub fn update(&mut self, dt: f32, projectile_at_rest: bool) -> Option<AnimationSignal> {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let mut signal = None;
        match self.phase {
            PosePhase::Ready => {}
            PosePhase::WindUp => {
                self.timer += dt;
                if self.timer >= self.cfg.windup_secs {
                    // Carry the overshoot into the follow-through.
                    self.timer -= self.cfg.windup_secs;
                    self.phase = PosePhase::FollowThrough;
                    signal = Some(AnimationSignal::Release);
                }
            }
            PosePhase::FollowThrough => {
                self.timer += dt;
            }
            PosePhase::Resting => {}
        }
        if self.phase == PosePhase::FollowThrough
            && projectile_at_rest
            && self.timer >= self.cfg.follow_through_secs
        {
            self.phase = PosePhase::Resting;
        }
        self.pose = self.compute_pose(dt);
        signal
    }

    fn compute_pose(&self, dt: f32) -> CharacterPose {
        let spin = self.cfg.windup_turns * TAU;
        match self.phase {
            PosePhase::Ready => CharacterPose::READY,
            PosePhase::WindUp => {
                let p = self.windup_progress();
                CharacterPose {
                    phase: PosePhase::WindUp,
                    // Ease-in: the spin accelerates toward release.
                    body_yaw: spin * p * p,
                    arm_extension: HOLD_ARM + (1.0 - HOLD_ARM) * p,
                    lean: WINDUP_LEAN * p,
                }
            }
            PosePhase::FollowThrough => {
                let q = (self.timer / self.cfg.follow_through_secs.max(f32::EPSILON)).min(1.0);
                CharacterPose {
                    phase: PosePhase::FollowThrough,
                    body_yaw: spin + FRAC_PI_2 * q,
                    arm_extension: 1.0 - 0.5 * q,
                    lean: WINDUP_LEAN + (FOLLOW_LEAN - WINDUP_LEAN) * q,
                }
            }
            PosePhase::Resting => {
                let k = damp_factor(REST_EASE_RATE, dt);
                CharacterPose {
                    phase: PosePhase::Resting,
                    body_yaw: self.pose.body_yaw,
                    arm_extension: self.pose.arm_extension * (1.0 - k),
                    lean: self.pose.lean * (1.0 - k),
                }
            }
        }
    }

    /// Where the hammer head sits while it is still in the thrower's hands.
    ///
    /// The orbit is centred so that a whole-turn wind-up ends on `launch_point`.
    pub fn hammer_anchor(&self, launch_point: Vec3) -> Vec3 {
        let r = self.cfg.orbit_radius;
        let center = launch_point - Vec3::new(r, 0.0, 0.0);
        let (sin, cos) = self.pose.body_yaw.sin_cos();
        center + Vec3::new(r * cos, r * sin, 0.0)
    }

    pub fn reset(&mut self) {
        self.phase = PosePhase::Ready;
        self.timer = 0.0;
        self.pose = CharacterPose::READY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animator() -> CharacterAnimator {
        CharacterAnimator::new(AnimationConfig::default())
    }

    #[test]
    fn release_fires_once_after_windup() {
        let mut anim = animator();
        assert!(anim.begin_windup());
        let mut releases = 0;
        for _ in 0..200 {
            if anim.update(1.0 / 60.0, false) == Some(AnimationSignal::Release) {
                releases += 1;
            }
        }
        assert_eq!(releases, 1);
        assert_eq!(anim.phase(), PosePhase::FollowThrough);
    }

    #[test]
    fn windup_length_is_timer_driven() {
        let mut anim = animator();
        anim.begin_windup();
        assert_eq!(anim.update(1.0, false), None);
        assert_eq!(anim.phase(), PosePhase::WindUp);
        assert_eq!(anim.update(0.25, false), Some(AnimationSignal::Release));
    }

    #[test]
    fn spin_accelerates() {
        let mut anim = animator();
        anim.begin_windup();
        anim.update(0.3, false);
        let early = anim.pose().body_yaw;
        anim.update(0.3, false);
        let mid = anim.pose().body_yaw;
        assert!(mid - early > early);
    }

    #[test]
    fn resting_only_after_projectile_rests() {
        let mut anim = animator();
        anim.begin_windup();
        anim.update(1.2, false);
        anim.update(5.0, false);
        assert_eq!(anim.phase(), PosePhase::FollowThrough);
        anim.update(0.016, true);
        assert_eq!(anim.phase(), PosePhase::Resting);
        let lean = anim.pose().lean;
        anim.update(0.1, true);
        assert!(anim.pose().lean.abs() < lean.abs());
    }

    #[test]
    fn windup_ends_on_launch_point() {
        let mut anim = animator();
        let launch = Vec3::new(0.0, 0.0, 1.5);
        assert!(anim.hammer_anchor(launch).distance(launch) < 1e-5);
        anim.begin_windup();
        anim.update(0.6, false);
        assert!(anim.hammer_anchor(launch).distance(launch) > 0.1);
        anim.update(0.6, false);
        assert!(anim.hammer_anchor(launch).distance(launch) < 1e-3);
    }

    #[test]
    fn begin_windup_only_from_ready() {
        let mut anim = animator();
        anim.begin_windup();
        assert!(!anim.begin_windup());
        anim.reset();
        assert_eq!(anim.pose(), CharacterPose::READY);
        assert!(anim.begin_windup());
    }
}
