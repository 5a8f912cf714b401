//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend. The scene
//! (ground, lights, meshes) is built elsewhere; the game only moves the
//! handful of objects it owns through this trait.

use crate::{
    animation::CharacterPose,
    math::{Quat, Vec3},
};

/// Per-frame transforms for the objects the game drives.
pub trait SceneSink {
    fn set_projectile(&mut self, position: Vec3, orientation: Quat);
    fn set_character_pose(&mut self, pose: &CharacterPose);
    fn set_camera(&mut self, position: Vec3, look_at: Vec3);
}

/// A no-op scene useful for headless runs and tests.
#[derive(Default)]
pub struct NullScene;

impl SceneSink for NullScene {
    fn set_projectile(&mut self, _position: Vec3, _orientation: Quat) {}
    fn set_character_pose(&mut self, _pose: &CharacterPose) {}
    fn set_camera(&mut self, _position: Vec3, _look_at: Vec3) {}
}

/// Keeps the last transforms it was given.
#[derive(Debug, Default, Clone)]
pub struct SceneSnapshot {
    pub projectile: Option<(Vec3, Quat)>,
    pub pose: Option<CharacterPose>,
    pub camera: Option<(Vec3, Vec3)>,
    pub frames: u64,
}

impl SceneSink for SceneSnapshot {
    fn set_projectile(&mut self, position: Vec3, orientation: Quat) {
        self.projectile = Some((position, orientation));
    }

    fn set_character_pose(&mut self, pose: &CharacterPose) {
        self.pose = Some(*pose);
    }

    fn set_camera(&mut self, position: Vec3, look_at: Vec3) {
        self.camera = Some((position, look_at));
        self.frames += 1;
    }
}
