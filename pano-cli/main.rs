//! `pano`: stitch two images from a list of point correspondences.
//!
//! Usage:
//!   pano left.png right.png matches.json -o panorama.png --blend-mode multiband
//!
//! `matches.json` holds `[{"src": [x, y], "dst": [x, y]}, ...]` with `src` in
//! the first image and `dst` in the second. Set `RUST_LOG=debug` for the
//! per-stage diagnostics.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use image::ImageReader;
use log::info;
use pano_cli::{BlendMode, Correspondence, EstimatorKind, StitchConfig, Stitcher, StitcherBuilder};

#[derive(Parser, Debug)]
#[command(author, version, about = "Pairwise panorama stitching", long_about = None)]
struct Args {
    /// First image; the panorama is built in its frame
    image_a: PathBuf,

    /// Second image
    image_b: PathBuf,

    /// JSON file with the correspondences between the two images
    correspondences: PathBuf,

    /// Output image path
    #[arg(short, long, default_value = "panorama.png")]
    output: PathBuf,

    /// Configuration file (.json or .toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Start from a preset: fast, quality or robust
    #[arg(long)]
    preset: Option<String>,

    /// simple, feather or multiband
    #[arg(short, long)]
    blend_mode: Option<BlendMode>,

    /// Estimator: ransac or lmeds
    #[arg(long)]
    estimator: Option<EstimatorKind>,

    /// Reprojection threshold in pixels
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Seed for reproducible sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    dump_config: Option<PathBuf>,
}

fn base_config(args: &Args) -> Result<StitchConfig, Box<dyn std::error::Error>> {
    let config = match (&args.config, args.preset.as_deref()) {
        (Some(path), _) => StitchConfig::load(path)?,
        (None, Some("fast")) => StitchConfig::fast_preset(),
        (None, Some("quality")) => StitchConfig::quality_preset(),
        (None, Some("robust")) => StitchConfig::robust_preset(),
        (None, Some(other)) => return Err(format!("Unknown preset '{}'", other).into()),
        (None, None) => StitchConfig::default(),
    };
    Ok(config)
}

fn build_stitcher(args: &Args) -> Result<Stitcher, Box<dyn std::error::Error>> {
    let mut builder = StitcherBuilder::from_config(base_config(args)?);
    if let Some(mode) = args.blend_mode {
        builder = builder.blend_mode(mode);
    }
    if let Some(kind) = args.estimator {
        builder = builder.estimator(kind);
    }
    if let Some(threshold) = args.threshold {
        builder = builder.threshold(threshold);
    }
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    Ok(builder.build()?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let stitcher = build_stitcher(&args)?;
    if let Some(path) = &args.dump_config {
        let config = stitcher.config();
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => config.save_toml(path)?,
            _ => config.save_json(path)?,
        }
        println!("Wrote {}", path.display());
        return Ok(());
    }
    info!("{}", stitcher.config().summary());

    let img_a = ImageReader::open(&args.image_a)?.decode()?;
    let img_b = ImageReader::open(&args.image_b)?.decode()?;
    let matches = std::fs::read_to_string(&args.correspondences)?;
    let pairs: Vec<Correspondence> = serde_json::from_str(&matches)?;

    let t0 = Instant::now();
    let panorama = stitcher.stitch_dynamic(&img_a, &img_b, &pairs)?;
    let elapsed = t0.elapsed();

    panorama.image.save(&args.output)?;

    println!("{}", panorama.estimation.summary());
    println!(
        "Panorama: {}x{} (image A at {}, {})",
        panorama.layout.width, panorama.layout.height, panorama.layout.offset_x, panorama.layout.offset_y
    );
    println!("Time taken: {:.2?}", elapsed);
    println!("Saved result image as {}", args.output.display());
    Ok(())
}
