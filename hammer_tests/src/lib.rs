//! Shared fixtures for the integration tests.
//!
//! - `ExpressionDial`: a detector whose face the test sets directly
//! - `PacedSource`: a frame source that can end, fail, or run until stopped
//! - `RecordingAudio` / `SharedScene`: observable collaborators

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use bytes::Bytes;
use hammer_client::GameSession;
use hammer_core::{
    animation::CharacterPose,
    audio::{AudioCue, AudioSink},
    face::{synthetic_face, LandmarkSet},
    game::GamePhase,
    math::{Quat, Vec3},
    render::{SceneSink, SceneSnapshot},
    tracking::{DetectorConfig, FaceDetector, FrameSource, VideoFrame},
};

/// Face height used by every fixture face.
pub const FACE_HEIGHT: f32 = 0.5;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Expression the dial currently shows. Ratios are relative to face height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expression {
    Absent,
    Face { mouth_ratio: f32, eye_ratio: f32 },
}

impl Expression {
    pub const NEUTRAL: Self = Self::Face {
        mouth_ratio: 0.02,
        eye_ratio: 0.04,
    };
    /// Both features halfway through their default windows.
    pub const HALF: Self = Self::Face {
        mouth_ratio: 0.175,
        eye_ratio: 0.075,
    };
    pub const SCREAM: Self = Self::Face {
        mouth_ratio: 0.4,
        eye_ratio: 0.12,
    };
}

/// Detector returning whatever the test dialed in.
#[derive(Clone)]
pub struct ExpressionDial {
    current: Arc<Mutex<Expression>>,
    pub detections: Arc<Mutex<u64>>,
    pub closed: Arc<Mutex<bool>>,
}

impl ExpressionDial {
    pub fn new(initial: Expression) -> Self {
        Self {
            current: Arc::new(Mutex::new(initial)),
            detections: Arc::new(Mutex::new(0)),
            closed: Arc::new(Mutex::new(false)),
        }
    }

    pub fn set(&self, expression: Expression) {
        *lock(&self.current) = expression;
    }

    pub fn detections(&self) -> u64 {
        *lock(&self.detections)
    }

    pub fn is_closed(&self) -> bool {
        *lock(&self.closed)
    }
}

#[async_trait]
impl FaceDetector for ExpressionDial {
    async fn configure(&mut self, _cfg: &DetectorConfig) -> anyhow::Result<()> {
        Ok(())
    }

    async fn detect(&mut self, _frame: &VideoFrame) -> anyhow::Result<Vec<LandmarkSet>> {
        *lock(&self.detections) += 1;
        Ok(match *lock(&self.current) {
            Expression::Absent => Vec::new(),
            Expression::Face {
                mouth_ratio,
                eye_ratio,
            } => vec![synthetic_face(
                FACE_HEIGHT,
                mouth_ratio * FACE_HEIGHT,
                eye_ratio * FACE_HEIGHT,
            )],
        })
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        *lock(&self.closed) = true;
        Ok(())
    }
}

/// How a `PacedSource` behaves once its frames run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEnd {
    /// Keep producing frames until stopped.
    Endless,
    /// End the stream after this many frames.
    After(u64),
    /// Fail after this many frames.
    FailAfter(u64),
    /// Refuse to open.
    Unavailable,
}

/// Frame source emitting blank frames every `period`.
pub struct PacedSource {
    period: Duration,
    end: SourceEnd,
    sequence: u64,
    pub closed: Arc<Mutex<bool>>,
}

impl PacedSource {
    pub fn new(period: Duration, end: SourceEnd) -> Self {
        Self {
            period,
            end,
            sequence: 0,
            closed: Arc::new(Mutex::new(false)),
        }
    }
}

#[async_trait]
impl FrameSource for PacedSource {
    async fn open(&mut self) -> anyhow::Result<()> {
        if self.end == SourceEnd::Unavailable {
            bail!("permission denied");
        }
        Ok(())
    }

    async fn next_frame(&mut self) -> anyhow::Result<Option<VideoFrame>> {
        match self.end {
            SourceEnd::After(n) if self.sequence >= n => return Ok(None),
            SourceEnd::FailAfter(n) if self.sequence >= n => bail!("device lost"),
            _ => {}
        }
        tokio::time::sleep(self.period).await;
        self.sequence += 1;
        Ok(Some(VideoFrame {
            sequence: self.sequence,
            width: 2,
            height: 2,
            data: Bytes::from_static(&[0u8; 16]),
        }))
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        *lock(&self.closed) = true;
        Ok(())
    }
}

/// Audio backend that records calls in order.
#[derive(Default)]
pub struct RecordingAudio {
    calls: Mutex<Vec<String>>,
}

impl RecordingAudio {
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, call: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: impl Into<String>) {
        lock(&self.calls).push(call.into());
    }
}

impl AudioSink for RecordingAudio {
    fn set_power_level(&self, _level: f32) {
        self.record("level");
    }

    fn trigger(&self, cue: AudioCue) {
        self.record(match cue {
            AudioCue::ThrowReleased { .. } => "released",
            AudioCue::Landed { .. } => "landed",
            AudioCue::Reset => "reset",
        });
    }

    fn stop_charge(&self) {
        self.record("stop");
    }

    fn close(&self) -> anyhow::Result<()> {
        self.record("close");
        Ok(())
    }
}

/// Scene the test can inspect while the session owns it.
#[derive(Clone, Default)]
pub struct SharedScene(pub Arc<Mutex<SceneSnapshot>>);

impl SharedScene {
    pub fn snapshot(&self) -> SceneSnapshot {
        lock(&self.0).clone()
    }
}

impl SceneSink for SharedScene {
    fn set_projectile(&mut self, position: Vec3, orientation: Quat) {
        lock(&self.0).set_projectile(position, orientation);
    }

    fn set_character_pose(&mut self, pose: &CharacterPose) {
        lock(&self.0).set_character_pose(pose);
    }

    fn set_camera(&mut self, position: Vec3, look_at: Vec3) {
        lock(&self.0).set_camera(position, look_at);
    }
}

/// Ticks until the session reaches `phase`. Returns the frames taken.
pub fn tick_until(
    session: &mut GameSession,
    phase: GamePhase,
    dt: f32,
    max_frames: u32,
) -> anyhow::Result<u32> {
    for n in 1..=max_frames {
        session.tick(dt);
        if session.phase() == phase {
            return Ok(n);
        }
    }
    bail!("still {} after {max_frames} frames", session.phase())
}
