//! Stand-in camera and detector for headless runs.
//!
//! `SimulatedCamera` produces blank frames at a fixed rate.
//! `SimulatedDetector` ignores the pixels and returns a synthetic face whose
//! expression builds up to a scream and relaxes again, with a little jitter.

use std::{f32::consts::TAU, time::Duration};

use anyhow::bail;
use async_trait::async_trait;
use bytes::Bytes;
use hammer_core::{
    face::{synthetic_face, LandmarkSet},
    tracking::{DetectorConfig, FaceDetector, FrameSource, VideoFrame},
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::debug;

const FRAME_WIDTH: u32 = 64;
const FRAME_HEIGHT: u32 = 48;

/// Fixed-rate blank frame producer.
pub struct SimulatedCamera {
    fps: u32,
    available: bool,
    limit: Option<u64>,
    sequence: u64,
    ticker: Option<Interval>,
    blank: Bytes,
}

impl SimulatedCamera {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            available: true,
            limit: None,
            sequence: 0,
            ticker: None,
            blank: Bytes::from(vec![0u8; (FRAME_WIDTH * FRAME_HEIGHT * 4) as usize]),
        }
    }

    /// A camera that refuses to open (permission denied, no device).
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(30)
        }
    }

    /// Ends the stream after `frames` frames.
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }
}

#[async_trait]
impl FrameSource for SimulatedCamera {
    async fn open(&mut self) -> anyhow::Result<()> {
        if !self.available {
            bail!("camera not available");
        }
        let mut ticker = interval(Duration::from_secs_f32(1.0 / self.fps as f32));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.ticker = Some(ticker);
        debug!(fps = self.fps, "Simulated camera opened");
        Ok(())
    }

    async fn next_frame(&mut self) -> anyhow::Result<Option<VideoFrame>> {
        let Some(ticker) = self.ticker.as_mut() else {
            bail!("camera not opened");
        };
        if self.limit.is_some_and(|limit| self.sequence >= limit) {
            return Ok(None);
        }
        ticker.tick().await;
        self.sequence += 1;
        Ok(Some(VideoFrame {
            sequence: self.sequence,
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            data: self.blank.clone(),
        }))
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.ticker = None;
        Ok(())
    }
}

/// Expression generator standing in for a landmark model.
pub struct SimulatedDetector {
    rng: StdRng,
    /// Frames per full relax → scream → relax cycle.
    cycle_frames: u32,
    face_height: f32,
    dropout: f64,
    max_faces: usize,
}

impl SimulatedDetector {
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let face_height = rng.gen_range(0.35..0.6);
        Self {
            rng,
            cycle_frames: 90,
            face_height,
            dropout: 0.03,
            max_faces: 1,
        }
    }

    pub fn with_cycle(mut self, frames: u32) -> Self {
        self.cycle_frames = frames.max(1);
        self
    }

    /// Expression intensity in `[0, 1]` for a frame.
    fn intensity(&self, sequence: u64) -> f32 {
        let phase = (sequence % self.cycle_frames as u64) as f32 / self.cycle_frames as f32;
        0.5 - 0.5 * (TAU * phase).cos()
    }
}

#[async_trait]
impl FaceDetector for SimulatedDetector {
    async fn configure(&mut self, cfg: &DetectorConfig) -> anyhow::Result<()> {
        self.max_faces = cfg.max_faces;
        debug!(flags = ?cfg.flags(), "Simulated detector configured");
        Ok(())
    }

    async fn detect(&mut self, frame: &VideoFrame) -> anyhow::Result<Vec<LandmarkSet>> {
        if self.max_faces == 0 || self.rng.gen_bool(self.dropout) {
            return Ok(Vec::new());
        }
        let intensity = self.intensity(frame.sequence);
        let jitter: f32 = self.rng.gen_range(-0.01..0.01);

        // Mouth ratio spans roughly 0.02..0.34, eye ratio 0.04..0.11.
        let mouth_ratio = (0.02 + 0.32 * intensity + jitter).max(0.0);
        let eye_ratio = (0.04 + 0.07 * intensity + jitter * 0.5).max(0.0);
        let h = self.face_height;
        Ok(vec![synthetic_face(h, mouth_ratio * h, eye_ratio * h)])
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hammer_core::face::FaceMetrics;

    use super::*;

    #[tokio::test]
    async fn camera_stream_ends_at_limit() {
        let mut cam = SimulatedCamera::new(30).with_limit(3);
        assert!(cam.next_frame().await.is_err());
        cam.open().await.unwrap();
        let mut seen = Vec::new();
        while let Some(frame) = cam.next_frame().await.unwrap() {
            assert_eq!(frame.data.len(), (FRAME_WIDTH * FRAME_HEIGHT * 4) as usize);
            seen.push(frame.sequence);
        }
        assert_eq!(seen, vec![1, 2, 3]);
        cam.close().await.unwrap();
    }

    #[tokio::test]
    async fn unavailable_camera_fails_to_open() {
        assert!(SimulatedCamera::unavailable().open().await.is_err());
    }

    #[tokio::test]
    async fn expression_peaks_mid_cycle() {
        let mut det = SimulatedDetector::new(7).with_cycle(60);
        det.dropout = 0.0;
        let frame = |sequence| VideoFrame {
            sequence,
            width: 1,
            height: 1,
            data: Bytes::new(),
        };
        let calm = det.detect(&frame(0)).await.unwrap();
        let scream = det.detect(&frame(30)).await.unwrap();
        let calm = FaceMetrics::measure(&calm[0]).unwrap();
        let scream = FaceMetrics::measure(&scream[0]).unwrap();
        assert!(calm.mouth_openness < 0.05);
        assert!(scream.mouth_openness > 0.3);
        assert!(scream.eye_openness > calm.eye_openness);
    }
}
