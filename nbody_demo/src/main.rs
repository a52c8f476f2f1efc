//! N-body demo
//!
//! Renders a cloud of particles attracting each other. An optional first
//! argument names a `.toml` or `.ron` viewer configuration file.

mod simulation;

use std::f32::consts::FRAC_PI_4;

use datviz::config::{Config, ViewerConfig};
use datviz::foundation::logging;
use datviz::foundation::math::Vec3;
use datviz::{Viewer, ViewerResult};
use rand::rngs::StdRng;
use rand::SeedableRng;

use simulation::NBodySystem;

const PARTICLE_COUNT: usize = 2000;
const SEED: u64 = 1234;
const DEFAULT_TITLE: &str = "Example Point Cloud";

fn load_config() -> Result<ViewerConfig, Box<dyn std::error::Error>> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => ViewerConfig::load_from_file(&path)?,
        None => ViewerConfig::default(),
    };
    config.validate()?;

    if config.window.title.is_empty() {
        config.window.title = DEFAULT_TITLE.to_owned();
    }
    Ok(config)
}

fn run(config: ViewerConfig) -> ViewerResult<()> {
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut system = NBodySystem::new(PARTICLE_COUNT, &mut rng);

    let mut viewer = Viewer::new(config);
    viewer.add_logger(|line| eprint!("{line}"));
    viewer.realize()?;

    viewer.set_perspective(FRAC_PI_4, 0.01, 10.0)?;
    viewer.look_at(&Vec3::new(0.0, 0.0, 3.0), &Vec3::zeros(), &Vec3::y());

    log::info!("simulating {} particles", system.len());

    let mut frames: u64 = 0;
    while !viewer.should_close() {
        viewer.begin_frame()?;
        viewer.render_points(system.vertices())?;
        viewer.end_frame()?;
        viewer.poll_input();

        system.step(1.0);
        frames += 1;
    }

    log::info!("rendered {frames} frames");
    viewer.destroy();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    logging::init(&config.logging);

    datviz::global_init()?;
    let result = run(config);
    datviz::global_cleanup();

    if let Err(err) = &result {
        log::error!("n-body demo failed: {err}");
    }
    Ok(result?)
}
