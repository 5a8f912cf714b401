//! Face tracking.
//!
//! Capture and landmark detection run on their own task, usually slower than
//! the render loop. Results cross over through a single slot: each new
//! result replaces the previous one and the game loop reads whatever is
//! newest without waiting. Nothing queues.
//!
//! If the camera or detector cannot be opened the tracker reports
//! [`TrackerStatus::Unavailable`] and the slot stays empty, which the game
//! scores as "no face".

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bitflags::bitflags;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::face::{FaceFrame, LandmarkSet};

/// How long `stop` waits for the task to wind down before aborting it.
const STOP_GRACE: Duration = Duration::from_secs(1);

bitflags! {
    /// Detector feature switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DetectorFlags: u8 {
        /// Refine eye and lip landmarks (adds the iris points). Slower.
        const REFINE_LANDMARKS = 1 << 0;
    }
}

/// Detector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectorConfig {
    pub max_faces: usize,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    pub refine_landmarks: bool,
    /// Run detection on every n-th captured frame.
    pub frame_skip: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_faces: 1,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            refine_landmarks: true,
            frame_skip: 2,
        }
    }
}

impl DetectorConfig {
    pub fn flags(&self) -> DetectorFlags {
        let mut flags = DetectorFlags::empty();
        flags.set(DetectorFlags::REFINE_LANDMARKS, self.refine_landmarks);
        flags
    }
}

/// One captured video frame.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    /// Packed RGBA pixels.
    pub data: Bytes,
}

/// Camera (or any other frame producer).
#[async_trait]
pub trait FrameSource: Send {
    async fn open(&mut self) -> anyhow::Result<()>;
    /// Next frame, or `None` once the stream has ended.
    async fn next_frame(&mut self) -> anyhow::Result<Option<VideoFrame>>;
    async fn close(&mut self) -> anyhow::Result<()>;
}

/// Face landmark detector.
#[async_trait]
pub trait FaceDetector: Send {
    async fn configure(&mut self, cfg: &DetectorConfig) -> anyhow::Result<()>;
    /// All faces found in `frame`; empty when there is none.
    async fn detect(&mut self, frame: &VideoFrame) -> anyhow::Result<Vec<LandmarkSet>>;
    async fn close(&mut self) -> anyhow::Result<()>;
}

/// Creates a connected publisher/reader pair.
pub fn face_slot() -> (FacePublisher, FaceSlot) {
    let (tx, rx) = watch::channel(None);
    (FacePublisher { tx: Arc::new(tx) }, FaceSlot { rx })
}

/// Write side of the handoff. Clones write to the same slot.
#[derive(Debug, Clone)]
pub struct FacePublisher {
    tx: Arc<watch::Sender<Option<Arc<FaceFrame>>>>,
}

impl FacePublisher {
    /// Replaces whatever the slot held.
    pub fn publish(&self, frame: FaceFrame) {
        self.tx.send_replace(Some(Arc::new(frame)));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }
}

/// Read side of the handoff. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FaceSlot {
    rx: watch::Receiver<Option<Arc<FaceFrame>>>,
}

impl FaceSlot {
    /// Newest result, never blocking.
    pub fn latest(&self) -> Option<Arc<FaceFrame>> {
        self.rx.borrow().clone()
    }
}

/// Tracker lifecycle as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    Starting,
    Running,
    /// Camera or detector could not be used. Capture scores 0.
    Unavailable,
    Stopped,
}

/// Handle to a running tracker task.
pub struct TrackerHandle {
    stop_tx: watch::Sender<bool>,
    status: watch::Receiver<TrackerStatus>,
    /// Cleared here when the task has to be aborted.
    faces: FacePublisher,
    task: Option<JoinHandle<()>>,
}

impl TrackerHandle {
    pub fn status(&self) -> TrackerStatus {
        *self.status.borrow()
    }

    /// Waits for the tracker to end on its own (stream exhausted or failed).
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Face tracker task ended abnormally");
            }
        }
    }

    /// Stops capture and releases the camera and detector. Best-effort.
    ///
    /// The slot is empty once this returns, even if the task had to be
    /// aborted.
    pub async fn stop(mut self) {
        self.stop_tx.send_replace(true);
        let Some(mut task) = self.task.take() else {
            return;
        };
        match tokio::time::timeout(STOP_GRACE, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "Face tracker task ended abnormally");
                self.faces.clear();
            }
            Err(_) => {
                warn!("Face tracker did not stop in time, aborting");
                task.abort();
                // Wait out the cancellation so a late publish cannot land after the clear.
                if let Err(e) = task.await {
                    debug!(cancelled = e.is_cancelled(), "Face tracker task aborted");
                }
                self.faces.clear();
            }
        }
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.faces.clear();
        }
    }
}

/// Spawns the capture → detect → publish loop.
pub struct FaceTracker;

impl FaceTracker {
    pub fn spawn<S, D>(
        source: S,
        detector: D,
        cfg: DetectorConfig,
        publisher: FacePublisher,
    ) -> TrackerHandle
    where
        S: FrameSource + 'static,
        D: FaceDetector + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (status_tx, status) = watch::channel(TrackerStatus::Starting);
        let faces = publisher.clone();
        let task = tokio::spawn(run_tracker(
            source, detector, cfg, publisher, status_tx, stop_rx,
        ));
        TrackerHandle {
            stop_tx,
            status,
            faces,
            task: Some(task),
        }
    }
}

async fn run_tracker<S, D>(
    mut source: S,
    mut detector: D,
    cfg: DetectorConfig,
    publisher: FacePublisher,
    status: watch::Sender<TrackerStatus>,
    mut stop: watch::Receiver<bool>,
) where
    S: FrameSource,
    D: FaceDetector,
{
    if let Err(e) = source.open().await {
        warn!(error = %e, "Camera unavailable, power capture disabled");
        status.send_replace(TrackerStatus::Unavailable);
        return;
    }
    if let Err(e) = detector.configure(&cfg).await {
        warn!(error = %e, "Face detector unavailable, power capture disabled");
        status.send_replace(TrackerStatus::Unavailable);
        close_quietly(&mut source, &mut detector).await;
        return;
    }

    info!(
        max_faces = cfg.max_faces,
        flags = ?cfg.flags(),
        frame_skip = cfg.frame_skip,
        "Face tracking started"
    );
    status.send_replace(TrackerStatus::Running);

    let skip = u64::from(cfg.frame_skip.max(1));
    let max_faces = cfg.max_faces.max(1);
    let mut captured: u64 = 0;
    let mut final_status = TrackerStatus::Stopped;

    loop {
        let next = tokio::select! {
            biased;
            _ = stop.changed() => break,
            next = source.next_frame() => next,
        };
        let frame = match next {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!(captured, "Frame source ended");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Camera failed, power capture disabled");
                final_status = TrackerStatus::Unavailable;
                break;
            }
        };

        captured += 1;
        if (captured - 1) % skip != 0 {
            continue;
        }

        // A slow detector must not hold up shutdown.
        let detected = tokio::select! {
            biased;
            _ = stop.changed() => break,
            detected = detector.detect(&frame) => detected,
        };
        let result = match detected {
            Ok(mut faces) => {
                faces.truncate(max_faces);
                FaceFrame {
                    sequence: frame.sequence,
                    faces,
                }
            }
            Err(e) => {
                debug!(error = %e, sequence = frame.sequence, "Detection failed, treating as no face");
                FaceFrame::no_face(frame.sequence)
            }
        };
        publisher.publish(result);
    }

    close_quietly(&mut source, &mut detector).await;
    publisher.clear();
    status.send_replace(final_status);
    info!(captured, "Face tracking stopped");
}

async fn close_quietly<S: FrameSource, D: FaceDetector>(source: &mut S, detector: &mut D) {
    if let Err(e) = detector.close().await {
        warn!(error = %e, "Failed to close face detector");
    }
    if let Err(e) = source.close().await {
        warn!(error = %e, "Failed to close camera");
    }
}
