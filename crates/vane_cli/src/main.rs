//! vane - ray trace an OBJ model to an image file.
//!
//! The model is centered and rescaled, a BVH is loaded from (or built and
//! written to) `<model>.bvh`, and the scene is rendered with one point light.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use vane_core::{load_obj, Color, Light, Scene, MAX_COORD_AFTER_RESCALE};
use vane_math::Vec3;
use vane_renderer::{render, update_bvh, Camera, RenderConfig, DEFAULT_BUCKET_SIZE};

#[derive(Parser)]
#[command(name = "vane")]
#[command(about = "Whitted ray tracer with a cached SAH BVH", long_about = None)]
struct Cli {
    /// OBJ file to render
    scene: PathBuf,

    /// Output image (format determined by extension)
    #[arg(short, long, default_value = "render.png")]
    output: PathBuf,

    /// Image width in pixels
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Image height in pixels
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Ignore any cached BVH and rebuild it
    #[arg(short, long)]
    force_recalc: bool,

    /// Skip shadow rays
    #[arg(long)]
    no_shadows: bool,

    /// Skip reflection rays
    #[arg(long)]
    no_reflections: bool,

    /// Trace refraction rays
    #[arg(long)]
    refractions: bool,

    /// Bucket edge length in pixels
    #[arg(long, default_value_t = DEFAULT_BUCKET_SIZE)]
    bucket_size: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();

    let mut mesh = load_obj(&cli.scene)
        .with_context(|| format!("Failed to load {}", cli.scene.display()))?;
    mesh.recenter_and_rescale(MAX_COORD_AFTER_RESCALE);

    let scene = Scene::from_mesh(&mesh, Color::splat(0.8))
        .with_source(&cli.scene)
        .with_light(Light::new(Vec3::splat(4.0 * MAX_COORD_AFTER_RESCALE)));
    log::info!(
        "Scene has {} triangles, {} vertices",
        scene.triangle_count(),
        scene.vertices.len()
    );

    let mut last_percent = 0;
    let bvh = update_bvh(&scene, cli.force_recalc, &mut |fraction: f64| {
        let percent = (fraction * 100.0) as u32;
        if percent / 10 > last_percent / 10 {
            log::info!("Building BVH: {}%", percent);
        }
        last_percent = percent;
    })?;

    let mut camera = Camera::new()
        .with_resolution(cli.width, cli.height)
        .with_position(
            Vec3::new(0.0, 0.0, 4.0 * MAX_COORD_AFTER_RESCALE),
            Vec3::ZERO,
            Vec3::Y,
        );
    camera.initialize();

    let config = RenderConfig::default()
        .with_shadows(!cli.no_shadows)
        .with_reflections(!cli.no_reflections)
        .with_refractions(cli.refractions)
        .with_bucket_size(cli.bucket_size);

    let image = render(&scene, &bvh, &camera, &config);
    image
        .save(&cli.output)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;
    log::info!("Wrote {}", cli.output.display());

    Ok(())
}
