//! Stitch two overlapping crops of a generated scene with every blend mode.
//!
//! Usage:
//!   cargo run --example synthetic_pair
//!   RUST_LOG=debug cargo run --example synthetic_pair

use image::{Rgb, RgbImage};
use pano_cli::{BlendMode, Correspondence, StitchConfig, Stitcher, StitcherBuilder};
use rand::prelude::*;
use std::time::Instant;

const SCENE_WIDTH: u32 = 640;
const SCENE_HEIGHT: u32 = 360;
const CROP_WIDTH: u32 = 400;
/// Horizontal offset of the second crop inside the scene
const SHIFT: u32 = 240;

fn scene() -> RgbImage {
    RgbImage::from_fn(SCENE_WIDTH, SCENE_HEIGHT, |x, y| {
        let (fx, fy) = (x as f32, y as f32);
        let r = 128.0 + 100.0 * (fx / 37.0).sin() * (fy / 53.0).cos();
        let g = 128.0 + 90.0 * ((fx + fy) / 71.0).sin();
        let b = if (x / 40 + y / 40) % 2 == 0 { 200.0 } else { 60.0 };
        Rgb([r as u8, g as u8, b as u8])
    })
}

/// Matches from the known shift, with pixel noise and a share of outliers
fn matches(rng: &mut StdRng, count: usize, outlier_ratio: f64) -> Vec<Correspondence> {
    let overlap = (SHIFT as f64, CROP_WIDTH as f64);
    (0..count)
        .map(|_| {
            let x = rng.gen_range(overlap.0..overlap.1);
            let y = rng.gen_range(0.0..SCENE_HEIGHT as f64);
            if rng.gen_bool(outlier_ratio) {
                let dx = rng.gen_range(0.0..CROP_WIDTH as f64);
                let dy = rng.gen_range(0.0..SCENE_HEIGHT as f64);
                Correspondence::from_coords(x, y, dx, dy)
            } else {
                let nx = rng.gen_range(-0.5..0.5);
                let ny = rng.gen_range(-0.5..0.5);
                Correspondence::from_coords(x, y, x - SHIFT as f64 + nx, y + ny)
            }
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("Synthetic panorama demo");
    println!("=======================\n");

    let scene = scene();
    let left = image::imageops::crop_imm(&scene, 0, 0, CROP_WIDTH, SCENE_HEIGHT).to_image();
    let right = image::imageops::crop_imm(&scene, SHIFT, 0, CROP_WIDTH, SCENE_HEIGHT).to_image();
    println!("Scene {}x{}, crops {}x{} shifted by {}px", SCENE_WIDTH, SCENE_HEIGHT, CROP_WIDTH, SCENE_HEIGHT, SHIFT);

    let mut rng = StdRng::seed_from_u64(7);
    let pairs = matches(&mut rng, 300, 0.3);
    println!("Generated {} correspondences (30% outliers)\n", pairs.len());

    for mode in [BlendMode::Overlay, BlendMode::Feather, BlendMode::MultiBand] {
        let stitcher = StitcherBuilder::new().blend_mode(mode).seed(42).build()?;

        let t0 = Instant::now();
        let panorama = stitcher.stitch(&left, &right, &pairs)?;
        let elapsed = t0.elapsed();

        let path = format!("synthetic_{}.png", mode);
        panorama.image.save(&path)?;
        println!("{:<10} {}x{} in {:.2?}", mode.as_str(), panorama.image.width(), panorama.image.height(), elapsed);
        println!("           {}", panorama.estimation.summary());
        println!("           saved {}", path);
    }

    // Three crops assembled around the middle one
    let step = (SCENE_WIDTH - CROP_WIDTH) / 2;
    let crops: Vec<RgbImage> = (0..3)
        .map(|i| image::imageops::crop_imm(&scene, i * step, 0, CROP_WIDTH, SCENE_HEIGHT).to_image())
        .collect();
    let mut source = |a: &RgbImage, _b: &RgbImage| {
        // Left step: (crop 0, crop 1). Right step: (panorama, crop 2) with the
        // panorama's origin at the padding offset.
        let (shift, origin) = if a.width() == CROP_WIDTH { (step as f64, 0.0) } else { (2.0 * step as f64, 10.0) };
        (0..60)
            .map(|k| {
                let x = shift + 10.0 + (k % 10) as f64 * 12.0;
                let y = 20.0 + (k / 10) as f64 * 50.0;
                Correspondence::from_coords(x + origin, y + origin, x - shift, y)
            })
            .collect::<Vec<_>>()
    };
    let stitcher = Stitcher::new(StitchConfig::quality_preset())?;
    let sequence = stitcher.stitch_sequence(&crops, &mut source)?;
    sequence.image.save("synthetic_sequence.png")?;
    println!(
        "\nSequence of {} crops around image {}: {}x{}, saved synthetic_sequence.png",
        sequence.stitched,
        sequence.reference,
        sequence.image.width(),
        sequence.image.height()
    );

    StitchConfig::quality_preset().save_json("quality_config.json")?;
    StitchConfig::robust_preset().save_toml("robust_config.toml")?;
    println!("Wrote quality_config.json and robust_config.toml");
    Ok(())
}
