use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use glam::Vec3;

use wormhole::config::ViewerConfig;
use wormhole::metric::MetricParameters;

#[derive(Parser, Debug)]
#[command(name = "wormhole-flythrough")]
#[command(about = "Fly a free camera through a wormhole joining two skyboxes")]
struct Args {
    /// Skybox folder for universe A (l >= 0)
    #[arg(long, default_value = "skybox1")]
    skybox_a: PathBuf,

    /// Skybox folder for universe B (l < 0)
    #[arg(long, default_value = "skybox2")]
    skybox_b: PathBuf,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Throat radius
    #[arg(long, default_value_t = 2.0)]
    rho: f32,

    /// Half-length of the flat collar around the throat
    #[arg(long, default_value_t = 2.0)]
    lens_width: f32,

    /// Steepness of the flare
    #[arg(long, default_value_t = 0.3)]
    mass: f32,

    /// Starting flare coordinate of the camera
    #[arg(long, default_value_t = 15.0, allow_negative_numbers = true)]
    start_z: f32,

    /// Movement speed in units per second
    #[arg(long, default_value_t = 3.0)]
    speed: f32,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ViewerConfig {
        width: args.width,
        height: args.height,
        skybox_a: args.skybox_a,
        skybox_b: args.skybox_b,
        start_position: Vec3::new(0.0, 0.0, args.start_z),
        speed: args.speed,
        ..ViewerConfig::default()
    };
    config.wormhole.metric = MetricParameters::new(args.rho, args.lens_width, args.mass)?;

    log::info!("Starting wormhole viewer...");
    wormhole::run(config).context("wormhole viewer failed")
}
