use anyhow::{bail, Context, Result};
use crabscan::capture::{CaptureDecision, CaptureEngine, CaptureSession};
use crabscan::config::CrabScanConfig;
use crabscan::quality::{sharpen, BlurDetector};
use crabscan::storage::{capture_filename, DirectoryStorage, MemoryStorage, StorageSink};
use crabscan::types::{BoundingBox, CameraFrame};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const USAGE: &str = "Usage: crabscan-cli <command> [args]

Commands:
  replay <frames_dir> <detections.json> [--config <path>] [--out <dir>] [--json] [--dry-run]
  blur <image> [--config <path>]
  sharpen <input> <output>
  default-config [path]";

fn main() -> Result<()> {
    crabscan::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    match args[1].as_str() {
        "replay" => cmd_replay(&args[2..]),
        "blur" => cmd_blur(&args[2..]),
        "sharpen" => cmd_sharpen(&args[2..]),
        "default-config" => cmd_default_config(&args[2..]),
        "--help" | "-h" | "help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}\n\n{}", other, USAGE);
            std::process::exit(1);
        }
    }
}

/// Positional arguments plus the flags every command shares.
struct ParsedArgs {
    positional: Vec<String>,
    config: Option<PathBuf>,
    out: Option<PathBuf>,
    json: bool,
    dry_run: bool,
}

fn parse_args(args: &[String]) -> Result<ParsedArgs> {
    let mut parsed = ParsedArgs {
        positional: Vec::new(),
        config: None,
        out: None,
        json: false,
        dry_run: false,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                let value = args.get(i).context("--config needs a path")?;
                parsed.config = Some(PathBuf::from(value));
            }
            "--out" => {
                i += 1;
                let value = args.get(i).context("--out needs a directory")?;
                parsed.out = Some(PathBuf::from(value));
            }
            "--json" => parsed.json = true,
            "--dry-run" => parsed.dry_run = true,
            other => parsed.positional.push(other.to_string()),
        }
        i += 1;
    }

    Ok(parsed)
}

fn load_config(path: Option<&Path>) -> Result<CrabScanConfig> {
    match path {
        Some(path) => CrabScanConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(CrabScanConfig::load_or_default()),
    }
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension().and_then(|e| e.to_str()).is_some_and(|e| {
                matches!(
                    e.to_ascii_lowercase().as_str(),
                    "png" | "jpg" | "jpeg" | "bmp"
                )
            })
        })
        .collect();
    frames.sort();
    Ok(frames)
}

fn cmd_replay(args: &[String]) -> Result<()> {
    let parsed = parse_args(args)?;
    let [frames_dir, detections_path] = parsed.positional.as_slice() else {
        bail!("replay needs <frames_dir> <detections.json>\n\n{}", USAGE);
    };

    let config = load_config(parsed.config.as_deref())?;
    let engine = CaptureEngine::new(&config);

    let detections: Vec<Vec<BoundingBox>> = serde_json::from_str(
        &fs::read_to_string(detections_path)
            .with_context(|| format!("reading {}", detections_path))?,
    )
    .with_context(|| format!("parsing {}", detections_path))?;

    let frames = list_frames(Path::new(frames_dir))?;
    if frames.len() != detections.len() {
        log::warn!(
            "{} frames but {} detection lists; missing lists count as empty",
            frames.len(),
            detections.len()
        );
    }

    let mut session = CaptureSession::new();
    for (index, path) in frames.iter().enumerate() {
        let image = image::open(path)
            .with_context(|| format!("decoding {}", path.display()))?
            .to_rgb8();
        let frame = CameraFrame::from_rgb_image(image).with_sequence(index as u64 + 1);
        let boxes = detections.get(index).map(Vec::as_slice).unwrap_or(&[]);

        let (next, decision) = engine.advance(session, &frame, boxes);
        session = next;
        report(index + 1, path, &decision, parsed.json)?;

        if let CaptureDecision::Captured(captured) = decision {
            let filename = capture_filename(
                &config.storage.filename_prefix,
                &config.storage.timestamp_format,
                chrono::Local::now(),
            );
            let mut storage: Box<dyn StorageSink> = if parsed.dry_run {
                Box::new(MemoryStorage::new())
            } else {
                let out_dir = parsed
                    .out
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(&config.storage.output_directory));
                Box::new(DirectoryStorage::new(out_dir, config.storage.jpeg_quality))
            };
            match storage.store(&captured.image, &filename) {
                Ok(saved) => println!("Saved capture to {}", saved.display()),
                // The capture itself stands; only persistence failed
                Err(e) => eprintln!("Failed to save image: {}", e),
            }
            return Ok(());
        }
    }

    println!("No capture after {} frames", frames.len());
    Ok(())
}

fn report(index: usize, path: &Path, decision: &CaptureDecision, json: bool) -> Result<()> {
    let summary = match decision {
        CaptureDecision::Searching => "searching".to_string(),
        CaptureDecision::Stabilizing {
            stable_frames,
            required,
            ..
        } => format!("stabilizing {}/{}", stable_frames, required),
        CaptureDecision::Skipped { reason } => format!("skipped ({:?})", reason),
        CaptureDecision::BlurRejected { metrics } => {
            format!("blur rejected (variance {:.2})", metrics.variance)
        }
        CaptureDecision::Captured(c) => format!(
            "captured {}x{} (variance {:.2})",
            c.image.width(),
            c.image.height(),
            c.blur.variance
        ),
        CaptureDecision::Idle => "idle".to_string(),
    };

    if json {
        let status = decision.status();
        let line = serde_json::json!({
            "frame": index,
            "path": path.display().to_string(),
            "decision": summary,
            "status": status.as_ref().map(|s| s.text.as_str()),
            "color": status.as_ref().map(|s| s.severity.color_hex()),
        });
        println!("{}", serde_json::to_string(&line)?);
    } else {
        println!("[{:>4}] {}: {}", index, path.display(), summary);
    }
    Ok(())
}

fn cmd_blur(args: &[String]) -> Result<()> {
    let parsed = parse_args(args)?;
    let [image_path] = parsed.positional.as_slice() else {
        bail!("blur needs <image>\n\n{}", USAGE);
    };

    let config = load_config(parsed.config.as_deref())?;
    let image = image::open(image_path)
        .with_context(|| format!("decoding {}", image_path))?
        .to_rgb8();
    let metrics = BlurDetector::new(&config.quality).analyze(&image);

    if parsed.json {
        println!("{}", serde_json::to_string(&metrics)?);
    } else {
        println!(
            "variance {:.2} (threshold {:.2}): {}",
            metrics.variance,
            config.quality.blur_variance_threshold,
            if metrics.is_blurred { "blurred" } else { "sharp" }
        );
    }
    Ok(())
}

fn cmd_sharpen(args: &[String]) -> Result<()> {
    let parsed = parse_args(args)?;
    let [input, output] = parsed.positional.as_slice() else {
        bail!("sharpen needs <input> <output>\n\n{}", USAGE);
    };

    let image = image::open(input)
        .with_context(|| format!("decoding {}", input))?
        .to_rgb8();
    sharpen(&image)
        .save(output)
        .with_context(|| format!("writing {}", output))?;
    println!("Sharpened {} -> {}", input, output);
    Ok(())
}

fn cmd_default_config(args: &[String]) -> Result<()> {
    let path = args
        .first()
        .map(PathBuf::from)
        .unwrap_or_else(CrabScanConfig::default_path);
    CrabScanConfig::default().save_to_file(&path)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
