//! Configuration system.
//!
//! Loads game calibration from JSON strings/files. Every key is optional and
//! falls back to the tuned defaults below.

use std::path::Path;

use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};

use crate::{
    animation::AnimationConfig, camera::CameraConfig, math::Vec3, physics::PhysicsConfig,
    power::AutoReleaseConfig, tracking::DetectorConfig,
};

/// A `[start, max]` calibration window for an openness ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Window {
    pub start: f32,
    pub max: f32,
}

impl Window {
    pub const fn new(start: f32, max: f32) -> Self {
        Self { start, max }
    }
}

impl From<[f32; 2]> for Window {
    fn from([start, max]: [f32; 2]) -> Self {
        Self { start, max }
    }
}

impl From<Window> for [f32; 2] {
    fn from(w: Window) -> Self {
        [w.start, w.max]
    }
}

/// Output range of the throw power, `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct PowerRange {
    pub min: f32,
    pub max: f32,
}

impl PowerRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f32 {
        self.max - self.min
    }
}

impl From<[f32; 2]> for PowerRange {
    fn from([min, max]: [f32; 2]) -> Self {
        Self { min, max }
    }
}

impl From<PowerRange> for [f32; 2] {
    fn from(r: PowerRange) -> Self {
        [r.min, r.max]
    }
}

/// Projectile tuning that is not part of the headline calibration set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhysicsTuning {
    /// Release height above the ground plane.
    pub launch_height: f32,
    /// Horizontal velocity kept per ground contact.
    pub ground_friction: f32,
    /// Hammer spin while airborne, rad/s.
    pub spin_rate: f32,
    pub max_substep: f32,
    pub max_substeps_per_frame: u32,
    pub max_bounces: u32,
    pub max_flight_secs: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            launch_height: 1.5,
            ground_friction: 0.6,
            spin_rate: 12.0,
            max_substep: 1.0 / 120.0,
            max_substeps_per_frame: 64,
            max_bounces: 16,
            max_flight_secs: 30.0,
        }
    }
}

/// Root game configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    #[serde(default = "default_mouth_window")]
    pub mouth_window: Window,
    #[serde(default = "default_eye_window")]
    pub eye_window: Window,
    #[serde(default = "default_mouth_weight")]
    pub mouth_weight: f32,
    #[serde(default = "default_eye_weight")]
    pub eye_weight: f32,
    #[serde(default = "default_power_range")]
    pub power_range: PowerRange,
    #[serde(default = "default_release_angle_deg")]
    pub release_angle_deg: f32,
    /// Gravitational acceleration magnitude, m/s².
    #[serde(default = "default_gravity")]
    pub gravity: f32,
    /// Fraction of vertical speed kept per bounce.
    #[serde(default = "default_bounce_damping")]
    pub bounce_damping: f32,
    /// Post-bounce vertical speed below which the projectile settles.
    #[serde(default = "default_rest_threshold")]
    pub rest_threshold: f32,
    /// Exponential smoothing rate of the power meter, 1/s. 0 disables.
    #[serde(default = "default_score_smoothing")]
    pub score_smoothing: f32,
    #[serde(default)]
    pub auto_release: AutoReleaseConfig,
    #[serde(default)]
    pub physics: PhysicsTuning,
    #[serde(default)]
    pub animation: AnimationConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
}

fn default_mouth_window() -> Window {
    Window::new(0.05, 0.30)
}

fn default_eye_window() -> Window {
    Window::new(0.05, 0.10)
}

fn default_mouth_weight() -> f32 {
    0.7
}

fn default_eye_weight() -> f32 {
    0.3
}

fn default_power_range() -> PowerRange {
    PowerRange::new(10.0, 35.0)
}

fn default_release_angle_deg() -> f32 {
    40.0
}

fn default_gravity() -> f32 {
    9.81
}

fn default_bounce_damping() -> f32 {
    0.4
}

fn default_rest_threshold() -> f32 {
    1.0
}

fn default_score_smoothing() -> f32 {
    8.0
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            mouth_window: default_mouth_window(),
            eye_window: default_eye_window(),
            mouth_weight: default_mouth_weight(),
            eye_weight: default_eye_weight(),
            power_range: default_power_range(),
            release_angle_deg: default_release_angle_deg(),
            gravity: default_gravity(),
            bounce_damping: default_bounce_damping(),
            rest_threshold: default_rest_threshold(),
            score_smoothing: default_score_smoothing(),
            auto_release: AutoReleaseConfig::default(),
            physics: PhysicsTuning::default(),
            animation: AnimationConfig::default(),
            camera: CameraConfig::default(),
            detector: DetectorConfig::default(),
        }
    }
}

impl GameConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads, parses, and validates a JSON config file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg = Self::from_json_str(&text)
            .with_context(|| format!("parse config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects calibrations the scorer or simulator cannot honor.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, w) in [("mouthWindow", self.mouth_window), ("eyeWindow", self.eye_window)] {
            ensure!(
                w.start.is_finite() && w.max.is_finite() && w.start < w.max,
                "{name} must satisfy start < max, got [{}, {}]",
                w.start,
                w.max
            );
        }
        ensure!(
            self.mouth_weight >= 0.0 && self.eye_weight >= 0.0,
            "score weights must be non-negative"
        );
        ensure!(
            (self.mouth_weight + self.eye_weight - 1.0).abs() < 1e-4,
            "mouthWeight + eyeWeight must equal 1, got {}",
            self.mouth_weight + self.eye_weight
        );
        ensure!(
            self.power_range.min.is_finite()
                && self.power_range.max.is_finite()
                && self.power_range.min >= 0.0
                && self.power_range.min < self.power_range.max,
            "powerRange must satisfy 0 <= min < max"
        );
        ensure!(
            self.release_angle_deg > 0.0 && self.release_angle_deg < 90.0,
            "releaseAngleDeg must be inside (0, 90)"
        );
        ensure!(
            self.gravity.is_finite() && self.gravity > 0.0,
            "gravity must be positive"
        );
        ensure!(
            self.bounce_damping > 0.0 && self.bounce_damping < 1.0,
            "bounceDamping must be inside (0, 1)"
        );
        ensure!(
            self.rest_threshold.is_finite() && self.rest_threshold > 0.0,
            "restThreshold must be positive"
        );
        ensure!(
            self.score_smoothing.is_finite() && self.score_smoothing >= 0.0,
            "scoreSmoothing must be >= 0"
        );
        ensure!(
            self.physics.ground_friction >= 0.0 && self.physics.ground_friction <= 1.0,
            "physics.groundFriction must be inside [0, 1]"
        );
        ensure!(
            self.physics.max_substep > 0.0 && self.physics.max_substeps_per_frame > 0,
            "physics sub-step limits must be positive"
        );
        ensure!(
            self.physics.launch_height >= 0.0,
            "physics.launchHeight must be >= 0"
        );
        ensure!(
            self.detector.max_faces >= 1 && self.detector.frame_skip >= 1,
            "detector.maxFaces and detector.frameSkip must be >= 1"
        );
        Ok(())
    }

    /// Builds the simulator parameters from the flat calibration set.
    pub fn physics_config(&self) -> PhysicsConfig {
        PhysicsConfig {
            gravity: Vec3::new(0.0, 0.0, -self.gravity),
            launch_point: Vec3::new(0.0, 0.0, self.physics.launch_height),
            ground_height: 0.0,
            bounce_damping: self.bounce_damping,
            ground_friction: self.physics.ground_friction,
            rest_threshold: self.rest_threshold,
            spin_rate: self.physics.spin_rate,
            max_substep: self.physics.max_substep,
            max_substeps_per_frame: self.physics.max_substeps_per_frame,
            max_bounces: self.physics.max_bounces,
            max_flight_secs: self.physics.max_flight_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        GameConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_json_uses_defaults() {
        let cfg = GameConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg.mouth_window, Window::new(0.05, 0.30));
        assert_eq!(cfg.eye_window, Window::new(0.05, 0.10));
        assert_eq!(cfg.power_range, PowerRange::new(10.0, 35.0));
        assert_eq!(cfg.release_angle_deg, 40.0);
        assert_eq!(cfg.detector.max_faces, 1);
    }

    #[test]
    fn camel_case_keys_override() {
        let cfg = GameConfig::from_json_str(
            r#"{
                "mouthWindow": [0.1, 0.4],
                "powerRange": [5, 50],
                "releaseAngleDeg": 42.5,
                "bounceDamping": 0.3,
                "physics": { "launchHeight": 2.0 }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.mouth_window, Window::new(0.1, 0.4));
        assert_eq!(cfg.power_range, PowerRange::new(5.0, 50.0));
        assert_eq!(cfg.release_angle_deg, 42.5);
        assert_eq!(cfg.bounce_damping, 0.3);
        assert_eq!(cfg.physics_config().launch_point.z, 2.0);
        assert_eq!(cfg.physics.ground_friction, 0.6);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let cfg = GameConfig {
            eye_window: Window::new(0.2, 0.1),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn damping_of_one_is_rejected() {
        let cfg = GameConfig {
            bounce_damping: 1.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn gravity_points_down() {
        let cfg = GameConfig::default();
        assert_eq!(cfg.physics_config().gravity, Vec3::new(0.0, 0.0, -9.81));
    }
}
