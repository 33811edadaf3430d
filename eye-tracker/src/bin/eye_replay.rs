//! Replay 2D pupil detections through the 3D eye-model tracker.
//!
//! Reads concatenated wire-format 2D results from a file, or generates frames
//! from a synthetic eye, and prints one JSON 3D result per frame.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use eye_tracker::{EyeModelTracker, PinholeCamera, SyntheticEye, TrackerTuning};
use nalgebra::Vector2;
use pupil_shared::wire::decode_prefix;
use pupil_shared::{Detector2DResult, DetectorProperties};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run the 3D eye-model tracker over recorded or synthetic pupil detections",
    long_about = "Feeds 2D pupil detections through the multi-hypothesis 3D eye-model tracker \
        and prints one JSON result per frame on stdout.\n\n\
        With --input, the file must hold concatenated binary 2D result records. \
        Without it, frames come from a synthetic eye rotating in front of the camera."
)]
struct Args {
    #[arg(short, long, help = "File of concatenated binary 2D result records")]
    input: Option<PathBuf>,

    #[arg(long, help = "Namespaced JSON property document")]
    properties: Option<PathBuf>,

    #[arg(long, help = "JSON tracker tuning overrides")]
    tuning: Option<PathBuf>,

    #[arg(long, default_value_t = 620.0, help = "Focal length in pixels")]
    focal_length: f64,

    #[arg(long, default_value_t = 320.0)]
    principal_x: f64,

    #[arg(long, default_value_t = 240.0)]
    principal_y: f64,

    #[arg(long, default_value_t = 2.0, help = "Assumed pupil radius in millimetres")]
    pupil_radius: f64,

    #[arg(short = 'n', long, default_value_t = 300, help = "Synthetic frame count")]
    frames: usize,

    #[arg(long, default_value_t = 30.0, help = "Synthetic frame rate in Hz")]
    fps: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 0.5, help = "Synthetic edge noise sigma in pixels")]
    edge_noise: f64,

    #[arg(long, default_value_t = 0.1, help = "Synthetic ellipse centre noise sigma in pixels")]
    center_noise: f64,

    #[arg(short, long, help = "Include debug payload (edges, predicted circle, models)")]
    debug: bool,
}

fn load_records(path: &Path) -> Result<Vec<Detector2DResult>, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)?;
    let mut records = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let (record, consumed) = decode_prefix(&bytes[offset..])
            .map_err(|e| format!("record {} at byte {offset}: {e}", records.len()))?;
        records.push(record);
        offset += consumed;
    }
    Ok(records)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let properties = match &args.properties {
        Some(path) => DetectorProperties::load_from_file(path)?,
        None => DetectorProperties::default(),
    };
    let tuning: TrackerTuning = match &args.tuning {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => TrackerTuning::default(),
    };

    let camera = PinholeCamera::new(
        args.focal_length,
        Vector2::new(args.principal_x, args.principal_y),
        args.pupil_radius,
    );

    let frames = match &args.input {
        Some(path) => {
            let records = load_records(path)?;
            log::info!("Loaded {} records from {}", records.len(), path.display());
            records
        }
        None => {
            let mut eye =
                SyntheticEye::new(args.seed).with_noise(args.edge_noise, args.center_noise)?;
            eye.camera = camera;
            eye.properties = properties.detector_2d.clone();
            log::info!(
                "Generating {} synthetic frames at {} Hz, true sphere {:?} r={:.2}mm",
                args.frames,
                args.fps,
                eye.sphere.center.as_slice(),
                eye.sphere.radius
            );
            (0..args.frames)
                .map(|i| eye.frame(i as f64 / args.fps))
                .collect()
        }
    };

    let mut tracker = EyeModelTracker::new(camera, tuning)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut last_model = 0;

    for frame in &frames {
        let result = tracker.update(
            Some(frame),
            frame.timestamp,
            &properties.detector_3d,
            args.debug,
        )?;
        if result.model_id != last_model {
            log::info!(
                "t={:.3}: selected model {} (confidence {:.3})",
                result.timestamp,
                result.model_id,
                result.confidence
            );
            last_model = result.model_id;
        }
        writeln!(out, "{}", serde_json::to_string(&result)?)?;
    }

    match tracker.selected() {
        Some(model) => log::info!(
            "Final model {}: sphere {:?} r={:.2}mm, confidence {:.3}, maturity {:.2}",
            model.id(),
            model.sphere().center.as_slice(),
            model.sphere().radius,
            model.confidence(),
            model.maturity()
        ),
        None => log::warn!("No eye model was established"),
    }
    Ok(())
}
