//! Meadow - headless grass placement demo.
//!
//! `meadow [config.json]` places grass over a noise terrain and reports the
//! blade count. Set `MEADOW_BACKEND=wgpu` to commit to a real GPU device.

use bevy::prelude::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use meadow::gpu::{GpuBackend, HostBackend, WgpuBackend};
use meadow::plugin::{GrassBackend, GrassDiagnostics, GrassGround, GrassInput, GrassStatus};
use meadow::{load_config, GrassConfig, GrassPlugin, HeightField};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match load_config(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("could not load '{}': {}", path, e);
                std::process::exit(1);
            }
        },
        None => GrassConfig::default(),
    };

    let ground = match HeightField::covering(&config, 42, 6.0) {
        Ok(ground) => ground,
        Err(e) => {
            error!("terrain generation failed: {}", e);
            std::process::exit(1);
        }
    };

    let use_gpu = std::env::var("MEADOW_BACKEND").is_ok_and(|v| v.eq_ignore_ascii_case("wgpu"));
    if use_gpu {
        match WgpuBackend::request_headless() {
            Ok(backend) => return run(config, ground, Arc::new(backend)),
            Err(e) => warn!("{}, falling back to host buffers", e),
        }
    }
    run(config, ground, Arc::new(HostBackend::new()));
}

fn run<B: GpuBackend>(config: GrassConfig, ground: HeightField, backend: Arc<B>) {
    let [min, max] = config.bounds;
    let center = (min as f32 + max as f32) * 0.5;

    let mut app = App::new();
    app.insert_resource(config)
        .insert_resource(GrassGround(Box::new(ground)))
        .insert_resource(GrassBackend(backend))
        .add_plugins(GrassPlugin::<B>::default());

    // Startup + one frame with the input standing still, one with it moving
    app.world_mut().resource_mut::<GrassInput>().position = Some(Vec3::new(center, 0.0, center));
    app.update();
    app.world_mut().resource_mut::<GrassInput>().position = Some(Vec3::new(center + 0.5, 0.0, center));
    app.update();

    let status = *app.world().resource::<GrassStatus>();
    info!("{} ({:?})", app.world().resource::<GrassDiagnostics>().text, status.0);

    app.world_mut().write_message(AppExit::Success);
    app.update();
}
