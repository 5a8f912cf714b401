//! Headless game binary.
//!
//! Usage:
//!   cargo run -p hammer_client -- [--config hammer.json] [--fps 60]
//!       [--auto-release] [--no-camera] [--frames N] [--seed N]
//!
//! A simulated camera and detector drive the power meter. Make a face (or
//! wait for the simulated one to scream) and type `throw`.
//!
//! Console commands:
//!   throw [power]  - Release with the current meter power, or a fixed power
//!   power <0..1>   - Release as if the face had scored this
//!   reset          - Start a new round from the result screen
//!   status         - Show phase, meter and last result
//!   results        - Dump this session's throws as JSON
//!   quit           - Exit

use std::env;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use hammer_client::input::{parse_command, Command};
use hammer_client::simulated::{SimulatedCamera, SimulatedDetector};
use hammer_client::GameSession;
use hammer_core::audio::{AudioContext, TracingAudio};
use hammer_core::config::GameConfig;
use hammer_core::game::GamePhase;
use hammer_core::render::NullScene;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Camera frame rate of the simulated device.
const CAMERA_FPS: u32 = 30;

struct Args {
    config: Option<PathBuf>,
    fps: u32,
    auto_release: bool,
    no_camera: bool,
    frames: Option<u64>,
    seed: u64,
}

fn parse_args() -> Args {
    let mut out = Args {
        config: None,
        fps: 60,
        auto_release: false,
        no_camera: false,
        frames: None,
        seed: 1,
    };
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                out.config = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--fps" if i + 1 < args.len() => {
                out.fps = args[i + 1].parse().unwrap_or(out.fps).max(1);
                i += 2;
            }
            "--frames" if i + 1 < args.len() => {
                out.frames = args[i + 1].parse().ok();
                i += 2;
            }
            "--seed" if i + 1 < args.len() => {
                out.seed = args[i + 1].parse().unwrap_or(out.seed);
                i += 2;
            }
            "--auto-release" => {
                out.auto_release = true;
                i += 1;
            }
            "--no-camera" => {
                out.no_camera = true;
                i += 1;
            }
            _ => i += 1,
        }
    }
    out
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = parse_args();
    let mut cfg = match &args.config {
        Some(path) => GameConfig::from_file(path)?,
        None => GameConfig::default(),
    };
    if args.auto_release {
        cfg.auto_release.enabled = true;
    }
    info!(
        fps = args.fps,
        power_min = cfg.power_range.min,
        power_max = cfg.power_range.max,
        auto_release = cfg.auto_release.enabled,
        "Starting hammer throw"
    );

    let camera = if args.no_camera {
        SimulatedCamera::unavailable()
    } else {
        SimulatedCamera::new(CAMERA_FPS)
    };
    let audio = AudioContext::new(Arc::new(TracingAudio));
    let mut session = GameSession::start(
        &cfg,
        audio,
        camera,
        SimulatedDetector::new(args.seed),
        Box::new(NullScene),
    )
    .context("start session")?;

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Type 'throw' to release, 'status' for info, 'quit' to exit.");
    println!();

    let frame_interval = Duration::from_secs_f32(1.0 / args.fps as f32);
    let mut last = Instant::now();
    let mut next = last;

    'run: loop {
        // Process console commands.
        while let Ok(line) = console_rx.try_recv() {
            match parse_command(&line) {
                Ok(cmd) => {
                    for out in session.exec(cmd) {
                        println!("{out}");
                    }
                    if cmd == Command::Quit {
                        break 'run;
                    }
                }
                Err(e) => println!("Error: {e}"),
            }
        }

        let now = Instant::now();
        let dt = (now - last).as_secs_f32();
        last = now;
        let report = session.tick(dt);

        if session.phase() == GamePhase::Idle && session.frame_count() % u64::from(args.fps) == 0 {
            if let Some(score) = report.score {
                debug!(
                    raw = score.power.value(),
                    smoothed = session.game.current_score().value(),
                    power = session.game.preview_power().value(),
                    "Meter"
                );
            }
        }

        if args.frames.is_some_and(|n| session.frame_count() >= n) {
            info!(frames = session.frame_count(), "Frame limit reached");
            break;
        }

        next += frame_interval;
        tokio::time::sleep_until(next).await;
    }

    session.shutdown().await;
    Ok(())
}
