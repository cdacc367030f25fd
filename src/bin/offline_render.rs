//! Offline wormhole renderer
//! Renders stills or a time-lapse GIF on the CPU, without a window or GPU

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use glam::Vec3;

use wormhole::camera::CameraPose;
use wormhole::config::WormholeConfig;
use wormhole::environment::{load_environment, EnvironmentSelector};
use wormhole::metric::MetricParameters;
use wormhole::recording::export_animation;
use wormhole::trace::{render_frame, FrameInputs};

#[derive(Parser, Debug)]
#[command(name = "offline_render")]
#[command(about = "Wormhole Offline Renderer")]
struct Args {
    #[arg(short, long, default_value_t = 1920)]
    width: u32,

    #[arg(short = 'H', long, default_value_t = 1080)]
    height: u32,

    /// Camera position x y z (z is the flare coordinate)
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], default_values_t = [0.0, 0.0, 15.0], allow_negative_numbers = true)]
    position: Vec<f32>,

    /// Horizontal look angle in degrees
    #[arg(long, default_value_t = -90.0, allow_negative_numbers = true)]
    yaw: f32,

    /// Vertical look angle in degrees, kept inside +-89.4
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pitch: f32,

    /// Time in seconds, drives the skybox flow
    #[arg(short, long, default_value_t = 0.0)]
    time: f32,

    #[arg(long, default_value = "skybox1")]
    skybox_a: PathBuf,

    #[arg(long, default_value = "skybox2")]
    skybox_b: PathBuf,

    #[arg(long, default_value_t = 2.0)]
    rho: f32,

    #[arg(long, default_value_t = 2.0)]
    lens_width: f32,

    #[arg(long, default_value_t = 0.3)]
    mass: f32,

    /// Max integration steps per ray
    #[arg(short = 'n', long, default_value_t = 500)]
    steps: u32,

    /// Number of frames; more than one writes a GIF
    #[arg(short, long, default_value_t = 1)]
    frames: u32,

    /// Frame spacing for GIF output, in milliseconds
    #[arg(long, default_value_t = 33)]
    frame_ms: u32,

    /// Output file (defaults to a name built from the settings)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = WormholeConfig::default();
    config.metric = MetricParameters::new(args.rho, args.lens_width, args.mass)?;
    config.integrator.max_steps = args.steps;

    let skybox_a = load_environment(&args.skybox_a)
        .with_context(|| format!("loading skybox for universe A from {}", args.skybox_a.display()))?;
    let skybox_b = load_environment(&args.skybox_b)
        .with_context(|| format!("loading skybox for universe B from {}", args.skybox_b.display()))?;
    let selector = EnvironmentSelector::new(Arc::new(skybox_a), Arc::new(skybox_b), config.flow_speed);

    let limit = 90.0 - 0.01f32.to_degrees();
    let position = Vec3::from_slice(&args.position);
    let pose = CameraPose::from_angles(
        position,
        args.yaw.to_radians(),
        args.pitch.clamp(-limit, limit).to_radians(),
    );

    println!("Wormhole Offline Renderer");
    println!("=========================");
    println!("Resolution: {}x{}", args.width, args.height);
    println!("Throat: rho={:.2} a={:.2} M={:.2}", config.metric.rho, config.metric.a, config.metric.mass);
    println!("Camera: ({:.2}, {:.2}, {:.2})", position.x, position.y, position.z);
    println!("Max Steps: {}", config.integrator.max_steps);
    println!();

    let start = std::time::Instant::now();
    let mut images = Vec::with_capacity(args.frames as usize);
    for i in 0..args.frames.max(1) {
        let frame = FrameInputs {
            pose,
            time: args.time + i as f32 * args.frame_ms as f32 / 1000.0,
            width: args.width,
            height: args.height,
        };
        images.push(render_frame(&config, &selector, &frame)?);
        eprint!("\rFrame {}/{}", i + 1, args.frames.max(1));
    }
    eprintln!();
    println!("Render time: {:.1}s", start.elapsed().as_secs_f32());

    if images.len() > 1 {
        let path = args.output.unwrap_or_else(|| {
            PathBuf::from(format!("wormhole_{}x{}_{}frames.gif", args.width, args.height, images.len()))
        });
        export_animation(&images, args.frame_ms, &path)?;
        println!("Saved to: {}", path.display());
    } else {
        let path = args.output.unwrap_or_else(|| {
            PathBuf::from(format!("wormhole_{}x{}_z{:.1}.png", args.width, args.height, position.z))
        });
        images[0]
            .save(&path)
            .with_context(|| format!("saving {}", path.display()))?;
        println!("Saved to: {}", path.display());
    }
    Ok(())
}
