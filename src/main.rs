use std::{
    io::{self, BufRead},
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{Receiver, bounded};
use gesture_ar::{
    AppConfig, Frame, FrameSink, FrameSource, GestureReport, GestureType, OrtHandTracker,
    SessionController, SessionOutcome, SinkControl, StillImageSource, gesture::description_for,
};

#[derive(Parser, Debug)]
#[command(name = "gesture-ar", version, about = "Hand gesture recognition for AR controls")]
struct Cli {
    /// JSON config file; missing keys fall back to defaults.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Replay these images instead of opening the camera.
    #[arg(long, value_name = "PATH", num_args = 1..)]
    images: Vec<PathBuf>,

    /// Capture for this many seconds and print the reports as JSON.
    #[arg(long, value_name = "SECONDS")]
    capture: Option<f64>,

    /// Save the last annotated frame of a live session as PNG.
    #[arg(long, value_name = "FILE.png")]
    snapshot: Option<PathBuf>,

    /// Print the cameras that can be opened and exit.
    #[arg(long)]
    list_cameras: bool,
}

const AR_ACTIONS: [(GestureType, &str); 6] = [
    (GestureType::Point, "Object selected at point location"),
    (GestureType::OpenPalm, "Menu opened / Stop interaction"),
    (GestureType::Fist, "Object grabbed"),
    (GestureType::ThumbsUp, "Confirmed selection"),
    (GestureType::Peace, "Two items selected"),
    (GestureType::Pinch, "Zoom/Scale operation"),
];

type Controller = SessionController<Box<dyn FrameSource>, OrtHandTracker>;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if cli.list_cameras {
        return list_cameras();
    }

    let config = match &cli.config {
        Some(path) => AppConfig::load_json(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => AppConfig::default(),
    };

    let tracker =
        OrtHandTracker::new(&config.hand_tracking).context("failed to set up hand tracker")?;
    let replaying = !cli.images.is_empty();
    let source: Box<dyn FrameSource> = if replaying {
        Box::new(StillImageSource::new(cli.images.iter().cloned()))
    } else {
        camera_source(&config)?
    };

    let mut controller = SessionController::from_config(source, tracker, &config);
    if replaying {
        controller = controller.with_mirror(false);
    }
    register_demo_callbacks(&mut controller);

    let stop = controller.stop_handle();
    ctrlc::set_handler(move || {
        log::info!("interrupt received, stopping");
        stop.stop();
    })
    .context("failed to install Ctrl-C handler")?;

    let result = match cli.capture {
        Some(seconds) => run_capture(&mut controller, seconds),
        None => run_live(&mut controller, cli.snapshot.as_deref()),
    };

    controller.cleanup();
    result
}

#[cfg(feature = "camera-nokhwa")]
fn camera_source(config: &AppConfig) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(gesture_ar::NokhwaCamera::new(config.camera.clone())))
}

#[cfg(not(feature = "camera-nokhwa"))]
fn camera_source(_config: &AppConfig) -> Result<Box<dyn FrameSource>> {
    anyhow::bail!("built without camera support, pass --images instead")
}

#[cfg(feature = "camera-nokhwa")]
fn list_cameras() -> Result<()> {
    let cameras = gesture_ar::pipeline::available_cameras().context("failed to query cameras")?;
    if cameras.is_empty() {
        println!("No cameras found.");
    }
    for camera in cameras {
        println!("{}", camera.label);
    }
    Ok(())
}

#[cfg(not(feature = "camera-nokhwa"))]
fn list_cameras() -> Result<()> {
    anyhow::bail!("built without camera support")
}

fn register_demo_callbacks(controller: &mut Controller) {
    for (gesture, action) in AR_ACTIONS {
        controller.register_callback(gesture, move |report: &GestureReport| {
            log::info!(
                "{}AR action: {action} (confidence: {:.2}, hands: {})",
                gesture.emoji(),
                report.confidence(),
                report.hand_count
            );
        });
    }
}

fn run_capture(controller: &mut Controller, seconds: f64) -> Result<()> {
    let duration =
        Duration::try_from_secs_f64(seconds).context("--capture needs a non-negative number")?;
    let records = controller.capture_session(duration);
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn run_live(controller: &mut Controller, snapshot: Option<&Path>) -> Result<()> {
    print_banner();

    let mut sink = ConsoleSink::new(spawn_quit_listener(), snapshot.is_some());
    let outcome = controller.run_session(&mut sink);
    match outcome {
        SessionOutcome::StartFailed => anyhow::bail!("could not start the frame source"),
        SessionOutcome::Quit => log::info!("quit requested"),
        SessionOutcome::SourceExhausted => log::info!("frame source ended"),
        SessionOutcome::Interrupted => log::info!("session interrupted"),
    }

    if let (Some(path), Some(frame)) = (snapshot, sink.last_frame.take()) {
        let image = frame
            .into_image()
            .context("annotated frame has an inconsistent buffer size")?;
        image
            .save(path)
            .with_context(|| format!("failed to write snapshot to {}", path.display()))?;
        log::info!("snapshot saved to {}", path.display());
    }
    Ok(())
}

fn print_banner() {
    println!("Supported gestures:");
    for gesture in GestureType::ALL.into_iter().skip(1) {
        println!("  {}{}", gesture.emoji(), description_for(gesture));
    }
    println!("Type q and press Enter (or press Ctrl-C) to quit.");
}

/// Stdin is read on its own thread so the capture loop never blocks on it.
fn spawn_quit_listener() -> Receiver<()> {
    let (quit_tx, quit_rx) = bounded(1);
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                    let _ = quit_tx.try_send(());
                    break;
                }
                Ok(_) => {}
                Err(err) => {
                    log::warn!("stdin closed: {err}");
                    break;
                }
            }
        }
    });
    quit_rx
}

struct ConsoleSink {
    quit_rx: Receiver<()>,
    last_gesture: Option<GestureType>,
    keep_frames: bool,
    last_frame: Option<Frame>,
}

impl ConsoleSink {
    fn new(quit_rx: Receiver<()>, keep_frames: bool) -> Self {
        Self {
            quit_rx,
            last_gesture: None,
            keep_frames,
            last_frame: None,
        }
    }
}

impl FrameSink for ConsoleSink {
    fn show(&mut self, frame: &Frame, report: &GestureReport) -> SinkControl {
        if self.last_gesture != Some(report.gesture()) {
            self.last_gesture = Some(report.gesture());
            log::info!("{}", report.display_text());
        }
        log::debug!("{}", report.overlay_lines().join(" | "));

        if self.keep_frames {
            self.last_frame = Some(frame.clone());
        }

        if self.quit_rx.try_recv().is_ok() {
            SinkControl::Quit
        } else {
            SinkControl::Continue
        }
    }
}
