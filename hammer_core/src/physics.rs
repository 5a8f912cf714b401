//! Projectile physics.
//!
//! A single-projectile simulator for the hammer. Each sub-step advances with
//! exact constant-acceleration kinematics and solves for ground contact
//! inside the sub-step, so a large frame delta cannot carry the projectile
//! through the ground plane.
//!
//! Lifecycle: `Idle` → `start` → `Flying` → (bounces) → `AtRest`.
//! `reset` is the only way out of `AtRest`.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::math::{Quat, Vec3};

/// Upper bound on contacts resolved inside one sub-step.
const MAX_CONTACTS_PER_SUBSTEP: u32 = 8;

/// Physics parameters.
#[derive(Debug, Clone, Copy)]
pub struct PhysicsConfig {
    pub gravity: Vec3,
    pub launch_point: Vec3,
    pub ground_height: f32,
    /// Fraction of vertical speed kept (and reflected) per bounce.
    pub bounce_damping: f32,
    /// Fraction of horizontal speed and spin kept per bounce.
    pub ground_friction: f32,
    /// Post-bounce vertical speed below which the projectile settles.
    pub rest_threshold: f32,
    /// Airborne spin about the lateral axis, rad/s.
    pub spin_rate: f32,
    pub max_substep: f32,
    pub max_substeps_per_frame: u32,
    pub max_bounces: u32,
    pub max_flight_secs: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, 0.0, -9.81),
            launch_point: Vec3::new(0.0, 0.0, 1.5),
            ground_height: 0.0,
            bounce_damping: 0.4,
            ground_friction: 0.6,
            rest_threshold: 1.0,
            spin_rate: 12.0,
            max_substep: 1.0 / 120.0,
            max_substeps_per_frame: 64,
            max_bounces: 16,
            max_flight_secs: 30.0,
        }
    }
}

/// Simulator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimPhase {
    Idle,
    Flying,
    AtRest,
}

/// Spin about the lateral (Y) axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AngularState {
    pub angle_rad: f32,
    pub rate_rad_per_sec: f32,
}

impl AngularState {
    pub fn orientation(&self) -> Quat {
        Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), self.angle_rad)
    }
}

/// Projectile kinematic state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub angular: AngularState,
    pub at_rest: bool,
    pub bounces: u32,
    pub flight_secs: f32,
}

impl ProjectileState {
    fn at_launch(launch_point: Vec3) -> Self {
        Self {
            position: launch_point,
            velocity: Vec3::ZERO,
            angular: AngularState::default(),
            at_rest: false,
            bounces: 0,
            flight_secs: 0.0,
        }
    }
}

/// What happened during one `step`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepReport {
    pub substeps: u32,
    pub contacts: u32,
    /// Impact speed of the first ground contact of the whole flight, if it
    /// happened during this step.
    pub first_contact_speed: Option<f32>,
    pub came_to_rest: bool,
}

/// Simulator errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhysicsError {
    InvalidPower(f32),
    InvalidAngle(f32),
    /// `start` called while a projectile is already launched.
    AlreadyLaunched,
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicsError::InvalidPower(p) => write!(f, "invalid throw power {p}"),
            PhysicsError::InvalidAngle(a) => write!(f, "invalid release angle {a}°"),
            PhysicsError::AlreadyLaunched => write!(f, "projectile already launched"),
        }
    }
}

impl std::error::Error for PhysicsError {}

/// Single-projectile simulator.
#[derive(Debug, Clone)]
pub struct ProjectileSimulator {
    cfg: PhysicsConfig,
    state: ProjectileState,
    phase: SimPhase,
}

impl ProjectileSimulator {
    pub fn new(cfg: PhysicsConfig) -> Self {
        Self {
            state: ProjectileState::at_launch(cfg.launch_point),
            cfg,
            phase: SimPhase::Idle,
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.cfg
    }

    pub fn state(&self) -> &ProjectileState {
        &self.state
    }

    pub fn phase(&self) -> SimPhase {
        self.phase
    }

    pub fn is_at_rest(&self) -> bool {
        self.phase == SimPhase::AtRest
    }

    /// Horizontal distance travelled from the launch point.
    pub fn distance(&self) -> f32 {
        (self.state.position - self.cfg.launch_point).horizontal_length()
    }

    /// Validates launch inputs without changing state.
    pub fn check_launch(power: f32, release_angle_deg: f32) -> Result<(), PhysicsError> {
        if !power.is_finite() || power < 0.0 {
            return Err(PhysicsError::InvalidPower(power));
        }
        if !release_angle_deg.is_finite() || !(0.0..90.0).contains(&release_angle_deg) {
            return Err(PhysicsError::InvalidAngle(release_angle_deg));
        }
        Ok(())
    }

    /// Launches from the fixed launch point along +X.
    pub fn start(&mut self, power: f32, release_angle_deg: f32) -> Result<(), PhysicsError> {
        if self.phase != SimPhase::Idle {
            return Err(PhysicsError::AlreadyLaunched);
        }
        Self::check_launch(power, release_angle_deg)?;

        let (sin, cos) = release_angle_deg.to_radians().sin_cos();
        self.state = ProjectileState::at_launch(self.cfg.launch_point);
        self.state.velocity = Vec3::new(power * cos, 0.0, power * sin);
        self.state.angular.rate_rad_per_sec = self.cfg.spin_rate;
        self.phase = SimPhase::Flying;
        debug!(power, release_angle_deg, "Projectile launched");
        Ok(())
    }

    /// Advances by `dt_sec` of wall time. No-op unless flying.
    pub fn step(&mut self, dt_sec: f32) -> StepReport {
        let mut report = StepReport::default();
        if self.phase != SimPhase::Flying || !dt_sec.is_finite() || dt_sec <= 0.0 {
            return report;
        }

        let wanted = (dt_sec / self.cfg.max_substep).ceil().max(1.0);
        let substeps = (wanted as u32).min(self.cfg.max_substeps_per_frame.max(1));
        if (wanted as u32) > substeps {
            debug!(dt_sec, substeps, "Sub-step cap reached, widening sub-step");
        }
        let h = dt_sec / substeps as f32;

        for _ in 0..substeps {
            report.substeps += 1;
            self.substep(h, &mut report);
            if self.phase != SimPhase::Flying {
                break;
            }
            if self.state.flight_secs >= self.cfg.max_flight_secs {
                warn!(
                    flight_secs = self.state.flight_secs,
                    bounces = self.state.bounces,
                    "Flight time limit hit, forcing rest"
                );
                self.settle(&mut report);
                break;
            }
        }
        report
    }

    fn substep(&mut self, h: f32, report: &mut StepReport) {
        let mut remaining = h;
        let mut contacts = 0;
        while remaining > 0.0 && self.phase == SimPhase::Flying {
            match self.time_to_ground(remaining) {
                Some(t_hit) => {
                    self.advance(t_hit);
                    self.state.position.z = self.cfg.ground_height;
                    remaining -= t_hit;
                    self.bounce(report);
                    contacts += 1;
                    if contacts >= MAX_CONTACTS_PER_SUBSTEP && self.phase == SimPhase::Flying {
                        warn!(
                            contacts,
                            remaining,
                            bounces = self.state.bounces,
                            "Contact limit hit, forcing rest"
                        );
                        self.settle(report);
                        break;
                    }
                }
                None => {
                    self.advance(remaining);
                    remaining = 0.0;
                }
            }
        }
        // Rounding can leave the height a hair under the plane.
        if self.state.position.z < self.cfg.ground_height {
            self.state.position.z = self.cfg.ground_height;
        }
    }

    /// Earliest time in `[0, within]` at which the projectile reaches the
    /// ground while descending.
    fn time_to_ground(&self, within: f32) -> Option<f32> {
        let d = (self.state.position.z - self.cfg.ground_height).max(0.0);
        let vz = self.state.velocity.z;
        let a = 0.5 * self.cfg.gravity.z;

        let t = if a.abs() < f32::EPSILON {
            if vz >= 0.0 {
                return None;
            }
            -d / vz
        } else {
            // d + vz t + a t² = 0, taking the root where the height is falling.
            let disc = vz * vz - 4.0 * a * d;
            if disc < 0.0 {
                return None;
            }
            let root = (-vz - disc.sqrt()) / (2.0 * a);
            if a > 0.0 {
                // Gravity pointing up: only a descent that starts now can hit.
                let other = (-vz + disc.sqrt()) / (2.0 * a);
                let earliest = root.min(other);
                if earliest < 0.0 {
                    return None;
                }
                earliest
            } else {
                root
            }
        };

        (t.is_finite() && t >= 0.0 && t <= within).then_some(t)
    }

    fn advance(&mut self, t: f32) {
        let g = self.cfg.gravity;
        let s = &mut self.state;
        s.position += s.velocity * t + g * (0.5 * t * t);
        s.velocity += g * t;
        s.angular.angle_rad += s.angular.rate_rad_per_sec * t;
        s.flight_secs += t;
    }

    fn bounce(&mut self, report: &mut StepReport) {
        let impact = self.state.velocity.length();
        if self.state.bounces == 0 {
            report.first_contact_speed = Some(impact);
        }
        report.contacts += 1;

        let s = &mut self.state;
        s.bounces += 1;
        s.velocity.z = -s.velocity.z * self.cfg.bounce_damping;
        s.velocity.x *= self.cfg.ground_friction;
        s.velocity.y *= self.cfg.ground_friction;
        s.angular.rate_rad_per_sec *= self.cfg.ground_friction;
        debug!(
            bounce = s.bounces,
            x = s.position.x,
            rebound = s.velocity.z,
            "Ground contact"
        );

        if s.velocity.z < self.cfg.rest_threshold {
            self.settle(report);
        } else if s.bounces >= self.cfg.max_bounces {
            warn!(bounces = s.bounces, "Bounce limit hit, forcing rest");
            self.settle(report);
        }
    }

    fn settle(&mut self, report: &mut StepReport) {
        self.state.velocity = Vec3::ZERO;
        self.state.angular.rate_rad_per_sec = 0.0;
        self.state.at_rest = true;
        self.phase = SimPhase::AtRest;
        report.came_to_rest = true;
        debug!(
            distance = self.distance(),
            bounces = self.state.bounces,
            flight_secs = self.state.flight_secs,
            "Projectile at rest"
        );
    }

    /// Returns to the initial launch state.
    pub fn reset(&mut self) {
        self.state = ProjectileState::at_launch(self.cfg.launch_point);
        self.phase = SimPhase::Idle;
    }
}
