//! Camera rig.
//!
//! The camera never jumps while playing: position and look-at both ease
//! toward a per-mode target. Only [`CameraRig::reset`] snaps.

use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// Camera placement and easing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraConfig {
    /// Where the camera sits while the player is charging.
    pub player_position: Vec3,
    pub player_look_at: Vec3,
    /// Offset from the projectile while following it.
    pub follow_offset: Vec3,
    /// Farthest the camera may trail the projectile.
    pub max_follow_distance: f32,
    pub follow_rate: f32,
    /// Offset from the landing point for the result shot.
    pub result_offset: Vec3,
    pub result_rate: f32,
    pub look_rate: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            player_position: Vec3::new(-4.0, -5.0, 2.5),
            player_look_at: Vec3::new(0.0, 0.0, 1.2),
            follow_offset: Vec3::new(-6.0, -8.0, 4.0),
            max_follow_distance: 14.0,
            follow_rate: 3.0,
            result_offset: Vec3::new(0.0, -12.0, 5.0),
            result_rate: 1.5,
            look_rate: 6.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraMode {
    PlayerView,
    Follow,
    ResultView,
}

#[derive(Debug, Clone)]
pub struct CameraRig {
    cfg: CameraConfig,
    mode: CameraMode,
    /// Desired camera position for the current mode.
    target: Vec3,
    position: Vec3,
    look_target: Vec3,
    look_at: Vec3,
    /// Landing point used by the result view.
    anchor: Vec3,
}

impl CameraRig {
    pub fn new(cfg: CameraConfig) -> Self {
        Self {
            mode: CameraMode::PlayerView,
            target: cfg.player_position,
            position: cfg.player_position,
            look_target: cfg.player_look_at,
            look_at: cfg.player_look_at,
            anchor: Vec3::ZERO,
            cfg,
        }
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn look_at(&self) -> Vec3 {
        self.look_at
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Starts following a moving focus point.
    pub fn follow(&mut self) {
        self.mode = CameraMode::Follow;
    }

    /// Switches to the result shot framing `landing`.
    pub fn show_result(&mut self, landing: Vec3) {
        self.mode = CameraMode::ResultView;
        self.anchor = landing;
    }

    /// Eases toward the current mode's target. `focus` is the point to keep
    /// framed in follow mode; it is ignored by the other modes.
    pub fn update(&mut self, dt: f32, focus: Option<Vec3>) {
        let rate = match self.mode {
            CameraMode::PlayerView => {
                self.target = self.cfg.player_position;
                self.look_target = self.cfg.player_look_at;
                self.cfg.follow_rate
            }
            CameraMode::Follow => {
                if let Some(focus) = focus {
                    self.target = focus + self.cfg.follow_offset;
                    self.look_target = focus;
                }
                self.cfg.follow_rate
            }
            CameraMode::ResultView => {
                self.target = self.anchor + self.cfg.result_offset;
                self.look_target = self.anchor;
                self.cfg.result_rate
            }
        };

        self.position = self.position.damp_toward(self.target, rate, dt);
        self.look_at = self.look_at.damp_toward(self.look_target, self.cfg.look_rate, dt);

        if let (CameraMode::Follow, Some(focus)) = (self.mode, focus) {
            self.clamp_to(focus);
        }
    }

    fn clamp_to(&mut self, focus: Vec3) {
        let offset = self.position - focus;
        let max = self.cfg.max_follow_distance;
        if offset.length() > max {
            self.position = focus + offset.normalize_or_zero() * max;
        }
    }

    /// Snaps back to the player view.
    pub fn reset(&mut self) {
        self.mode = CameraMode::PlayerView;
        self.target = self.cfg.player_position;
        self.position = self.cfg.player_position;
        self.look_target = self.cfg.player_look_at;
        self.look_at = self.cfg.player_look_at;
        self.anchor = Vec3::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_eases_without_snapping() {
        let mut rig = CameraRig::new(CameraConfig::default());
        let start = rig.position();
        rig.follow();
        let focus = Vec3::new(2.0, 0.0, 3.0);
        rig.update(1.0 / 60.0, Some(focus));
        let moved = rig.position().distance(start);
        let gap = start.distance(focus + CameraConfig::default().follow_offset);
        assert!(moved > 0.0);
        assert!(moved < gap * 0.1);
    }

    #[test]
    fn follow_distance_is_clamped() {
        let cfg = CameraConfig::default();
        let mut rig = CameraRig::new(cfg.clone());
        rig.follow();
        let focus = Vec3::new(120.0, 0.0, 2.0);
        rig.update(1.0 / 60.0, Some(focus));
        assert!(rig.position().distance(focus) <= cfg.max_follow_distance + 1e-3);
    }

    #[test]
    fn result_view_converges_on_landing() {
        let cfg = CameraConfig::default();
        let mut rig = CameraRig::new(cfg.clone());
        let landing = Vec3::new(54.0, 0.0, 0.0);
        rig.show_result(landing);
        for _ in 0..600 {
            rig.update(1.0 / 60.0, None);
        }
        assert!(rig.position().distance(landing + cfg.result_offset) < 0.01);
        assert!(rig.look_at().distance(landing) < 0.01);
        assert_eq!(rig.mode(), CameraMode::ResultView);
    }

    #[test]
    fn reset_snaps_to_player_view() {
        let cfg = CameraConfig::default();
        let mut rig = CameraRig::new(cfg.clone());
        rig.show_result(Vec3::new(40.0, 0.0, 0.0));
        rig.update(0.5, None);
        rig.reset();
        assert_eq!(rig.mode(), CameraMode::PlayerView);
        assert_eq!(rig.position(), cfg.player_position);
        assert_eq!(rig.look_at(), cfg.player_look_at);
    }
}
