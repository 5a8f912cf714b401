//! `hammer_core`
//!
//! Core libraries for the face-powered hammer throw.
//!
//! Design goals:
//! - Deterministic, frame-rate independent simulation.
//! - One owner for all mutable game state; the only cross-task data is the
//!   single-slot face handoff.
//! - Traits at the collaborator seams (camera, detector, audio, scene).
//! - No `unsafe`.

pub mod animation;
pub mod audio;
pub mod camera;
pub mod config;
pub mod event;
pub mod face;
pub mod game;
pub mod math;
pub mod physics;
pub mod power;
pub mod render;
pub mod tracking;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::audio::{AudioContext, AudioCue, AudioSink};
    pub use crate::config::*;
    pub use crate::event::*;
    pub use crate::face::{FaceFrame, FaceScore, LandmarkScorer, LandmarkSet};
    pub use crate::game::*;
    pub use crate::math::*;
    pub use crate::power::{PowerScore, ThrowPower};
    pub use crate::render::SceneSink;
    pub use crate::tracking::{face_slot, FaceSlot, TrackerStatus};
}
