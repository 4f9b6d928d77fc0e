//! Bevy app lifecycle: startup placement, input tracking, teardown on exit.

use bevy::prelude::*;
use std::sync::Arc;

use meadow::gpu::HostBackend;
use meadow::plugin::{GrassBackend, GrassDiagnostics, GrassField, GrassGround, GrassInput, GrassInputUniform, GrassStatus};
use meadow::{GrassConfig, GrassPlugin, HeightField, SessionStatus};

fn app(backend: &Arc<HostBackend>, config: GrassConfig) -> App {
    let [min, max] = config.bounds;
    let ground = HeightField::flat(min as f32, max as f32, 0.0).unwrap();
    let mut app = App::new();
    app.insert_resource(config)
        .insert_resource(GrassGround(Box::new(ground)))
        .insert_resource(GrassBackend(backend.clone()))
        .add_plugins(GrassPlugin::<HostBackend>::default());
    app
}

#[test]
fn startup_places_and_exit_releases() {
    let backend = Arc::new(HostBackend::new());
    let mut app = app(&backend, GrassConfig { bounds: [0, 8], density: 2, ..Default::default() });
    app.update();

    assert_eq!(app.world().resource::<GrassStatus>().0, SessionStatus::Ready);
    let count = app.world().resource::<GrassField<HostBackend>>().0.instance_count();
    let diagnostics = app.world().resource::<GrassDiagnostics>();
    assert_eq!(diagnostics.blade_count, count);
    assert_eq!(diagnostics.text, format!("Grass blades: {}", count));
    assert_eq!(backend.live_buffers(), 2);

    app.world_mut().write_message(AppExit::Success);
    app.update();
    assert_eq!(backend.live_buffers(), 0);
    assert_eq!(app.world().resource::<GrassDiagnostics>().blade_count, 0);
    assert_eq!(app.world().resource::<GrassStatus>().0, SessionStatus::Released);
}

#[test]
fn input_motion_reaches_the_uniform() {
    let backend = Arc::new(HostBackend::new());
    let mut app = app(&backend, GrassConfig { bounds: [0, 4], density: 1, ..Default::default() });

    app.world_mut().resource_mut::<GrassInput>().position = Some(Vec3::new(1.0, 0.0, 1.0));
    app.update();
    // The input starts at the origin, so the first sample already moved.
    assert_eq!(app.world().resource::<GrassInputUniform>().0.direction, [10.0, 0.0, 10.0]);
    app.world_mut().resource_mut::<GrassInput>().position = Some(Vec3::new(1.0, 0.0, 2.0));
    app.update();

    let uniform = app.world().resource::<GrassInputUniform>().0;
    assert_eq!(uniform.position, [1.0, 0.0, 2.0]);
    assert_eq!(uniform.direction, [0.0, 0.0, 10.0]);
}

#[test]
fn missing_ground_marks_failure() {
    let backend = Arc::new(HostBackend::new());
    let mut app = App::new();
    app.insert_resource(GrassBackend(backend.clone()))
        .add_plugins(GrassPlugin::<HostBackend>::default());
    app.update();

    assert_eq!(app.world().resource::<GrassStatus>().0, SessionStatus::Failed);
    assert!(app.world().get_resource::<GrassField<HostBackend>>().is_none());
    assert_eq!(backend.live_buffers(), 0);
}

#[test]
fn failed_commit_marks_failure() {
    let backend = Arc::new(HostBackend::with_budget(16));
    let mut app = app(&backend, GrassConfig { bounds: [0, 8], density: 2, ..Default::default() });
    app.update();

    assert_eq!(app.world().resource::<GrassStatus>().0, SessionStatus::Failed);
    assert_eq!(app.world().resource::<GrassDiagnostics>().text, "Grass blades: 0");
    assert_eq!(backend.live_buffers(), 0);
}
