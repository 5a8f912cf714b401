//! Face tracker task ↔ game loop handoff.

use std::time::Duration;

use hammer_client::input::Command;
use hammer_client::GameSession;
use hammer_core::audio::AudioContext;
use hammer_core::config::GameConfig;
use hammer_core::game::GamePhase;
use hammer_core::render::NullScene;
use hammer_core::tracking::{face_slot, DetectorConfig, FaceTracker, TrackerStatus};
use hammer_tests::{init_tracing, ExpressionDial, Expression, PacedSource, SourceEnd};

const DT: f32 = 1.0 / 60.0;
const CAMERA_PERIOD: Duration = Duration::from_millis(5);

fn every_frame() -> GameConfig {
    let mut cfg = GameConfig {
        score_smoothing: 0.0,
        ..Default::default()
    };
    cfg.detector.frame_skip = 1;
    cfg
}

/// Ticks (with real time passing) until `done` holds.
async fn tick_until_with<F>(session: &mut GameSession, mut done: F) -> anyhow::Result<()>
where
    F: FnMut(&GameSession, Option<f32>) -> bool,
{
    for _ in 0..400 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let report = session.tick(DT);
        let metrics = report
            .score
            .and_then(|s| s.metrics)
            .map(|m| m.mouth_openness);
        if done(session, metrics) {
            return Ok(());
        }
    }
    anyhow::bail!("condition not reached")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tracked_expression_sets_power() -> anyhow::Result<()> {
    init_tracing();

    let dial = ExpressionDial::new(Expression::SCREAM);
    let source = PacedSource::new(CAMERA_PERIOD, SourceEnd::Endless);
    let source_closed = source.closed.clone();
    let mut session = GameSession::start(
        &every_frame(),
        AudioContext::silent(),
        source,
        dial.clone(),
        Box::new(NullScene),
    )?;

    tick_until_with(&mut session, |_, mouth| mouth.is_some()).await?;
    assert_eq!(session.tracker_status(), Some(TrackerStatus::Running));
    assert!((session.game.preview_power().value() - 35.0).abs() < 1e-3);

    // Face leaves the frame: power falls back to the minimum.
    dial.set(Expression::Absent);
    tick_until_with(&mut session, |_, mouth| mouth.is_none()).await?;
    assert!((session.game.preview_power().value() - 10.0).abs() < 1e-3);

    session.shutdown().await;
    assert_eq!(session.tracker_status(), None);
    assert!(dial.is_closed());
    assert!(*source_closed.lock().unwrap());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn faces_are_ignored_while_throwing() -> anyhow::Result<()> {
    init_tracing();

    let dial = ExpressionDial::new(Expression::NEUTRAL);
    let mut session = GameSession::start(
        &every_frame(),
        AudioContext::silent(),
        PacedSource::new(CAMERA_PERIOD, SourceEnd::Endless),
        dial.clone(),
        Box::new(NullScene),
    )?;
    tick_until_with(&mut session, |_, mouth| mouth.is_some()).await?;
    let locked = session.exec(Command::Throw(None));
    assert_eq!(locked, vec!["Throwing with power 10.0"]);

    dial.set(Expression::SCREAM);
    for _ in 0..20 {
        tokio::time::sleep(CAMERA_PERIOD).await;
        let report = session.tick(DT);
        assert!(report.score.is_none());
    }
    assert_eq!(session.game.locked_power().map(|p| p.value()), Some(10.0));

    session.shutdown().await;
    assert_eq!(session.phase(), GamePhase::Idle);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unavailable_camera_degrades_to_minimum_power() -> anyhow::Result<()> {
    init_tracing();

    let dial = ExpressionDial::new(Expression::SCREAM);
    let mut session = GameSession::start(
        &every_frame(),
        AudioContext::silent(),
        PacedSource::new(CAMERA_PERIOD, SourceEnd::Unavailable),
        dial.clone(),
        Box::new(NullScene),
    )?;
    tick_until_with(&mut session, |s, _| {
        s.tracker_status() == Some(TrackerStatus::Unavailable)
    })
    .await?;

    assert_eq!(dial.detections(), 0);
    assert_eq!(session.exec(Command::Throw(None)), vec!["Throwing with power 10.0"]);
    session.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn camera_failure_clears_the_slot() -> anyhow::Result<()> {
    init_tracing();

    let (publisher, slot) = face_slot();
    let source = PacedSource::new(Duration::from_millis(1), SourceEnd::FailAfter(3));
    let closed = source.closed.clone();
    let mut handle = FaceTracker::spawn(
        source,
        ExpressionDial::new(Expression::HALF),
        DetectorConfig {
            frame_skip: 1,
            ..Default::default()
        },
        publisher,
    );
    tokio::time::timeout(Duration::from_secs(5), handle.join()).await?;

    assert_eq!(handle.status(), TrackerStatus::Unavailable);
    assert!(slot.latest().is_none());
    assert!(*closed.lock().unwrap());
    Ok(())
}

#[tokio::test]
async fn frame_skip_limits_detection() -> anyhow::Result<()> {
    init_tracing();

    let (publisher, slot) = face_slot();
    let dial = ExpressionDial::new(Expression::HALF);
    let mut handle = FaceTracker::spawn(
        PacedSource::new(Duration::from_millis(1), SourceEnd::After(8)),
        dial.clone(),
        DetectorConfig {
            frame_skip: 2,
            ..Default::default()
        },
        publisher,
    );
    tokio::time::timeout(Duration::from_secs(5), handle.join()).await?;

    assert_eq!(handle.status(), TrackerStatus::Stopped);
    assert_eq!(dial.detections(), 4);
    assert!(dial.is_closed());
    assert!(slot.latest().is_none());
    Ok(())
}

#[tokio::test]
async fn stop_releases_a_running_tracker() -> anyhow::Result<()> {
    init_tracing();

    let (publisher, slot) = face_slot();
    let dial = ExpressionDial::new(Expression::HALF);
    let handle = FaceTracker::spawn(
        PacedSource::new(Duration::from_millis(2), SourceEnd::Endless),
        dial.clone(),
        DetectorConfig::default(),
        publisher,
    );

    let mut published = false;
    for _ in 0..500 {
        tokio::time::sleep(Duration::from_millis(2)).await;
        if slot.latest().is_some() {
            published = true;
            break;
        }
    }
    assert!(published, "tracker never published");

    handle.stop().await;
    assert!(dial.is_closed());
    assert!(slot.latest().is_none());
    Ok(())
}
