//! Grass Plugin - wires the grass session into a Bevy app.
//!
//! Startup places blades against the `GrassGround` executor and commits them
//! through the `GrassBackend`. Update feeds `GrassInput` into the input
//! uniform. On `AppExit` the store is released.

use bevy::prelude::*;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::blade::InputUniform;
use crate::config::GrassConfig;
use crate::gpu::GpuBackend;
use crate::query::QueryExecutor;
use crate::session::{GrassSystem, SessionStatus};

// ============================================================================
// RESOURCES
// ============================================================================

/// Ground surfaces the placement rays are cast against.
#[derive(Resource)]
pub struct GrassGround(pub Box<dyn QueryExecutor>);

/// Device the blade store is committed to.
#[derive(Resource)]
pub struct GrassBackend<B: GpuBackend>(pub Arc<B>);

/// The live session. Present only after a successful startup.
#[derive(Resource)]
pub struct GrassField<B: GpuBackend>(pub GrassSystem<B>);

#[derive(Resource, Clone, Copy, Debug, PartialEq, Eq)]
pub struct GrassStatus(pub SessionStatus);

impl Default for GrassStatus {
    fn default() -> Self {
        Self(SessionStatus::Idle)
    }
}

/// On-screen diagnostic line.
#[derive(Resource, Default, Clone, Debug)]
pub struct GrassDiagnostics {
    pub blade_count: usize,
    pub text: String,
}

/// World position of the object that bends the grass. `None` = no input.
#[derive(Resource, Default, Clone, Copy, Debug)]
pub struct GrassInput {
    pub position: Option<Vec3>,
}

/// Latest uniform for the bend simulation.
#[derive(Resource, Default, Clone, Copy, Debug)]
pub struct GrassInputUniform(pub InputUniform);

// ============================================================================
// PLUGIN
// ============================================================================

pub struct GrassPlugin<B: GpuBackend> {
    _backend: PhantomData<fn() -> B>,
}

impl<B: GpuBackend> Default for GrassPlugin<B> {
    fn default() -> Self {
        Self { _backend: PhantomData }
    }
}

impl<B: GpuBackend> Plugin for GrassPlugin<B> {
    fn build(&self, app: &mut App) {
        app.init_resource::<GrassConfig>()
            .init_resource::<GrassStatus>()
            .init_resource::<GrassDiagnostics>()
            .init_resource::<GrassInput>()
            .init_resource::<GrassInputUniform>()
            .add_systems(Startup, initialize_grass::<B>)
            .add_systems(Update, track_grass_input::<B>)
            .add_systems(Last, teardown_grass::<B>);
    }
}

// ============================================================================
// SYSTEMS
// ============================================================================

/// Run placement once and publish the session.
fn initialize_grass<B: GpuBackend>(
    mut commands: Commands,
    config: Res<GrassConfig>,
    ground: Option<Res<GrassGround>>,
    backend: Option<Res<GrassBackend<B>>>,
    mut status: ResMut<GrassStatus>,
    mut diagnostics: ResMut<GrassDiagnostics>,
) {
    let (Some(ground), Some(backend)) = (ground, backend) else {
        error!("grass needs GrassGround and GrassBackend resources");
        status.0 = SessionStatus::Failed;
        return;
    };

    let mut grass = GrassSystem::new(config.clone(), backend.0.clone());
    match grass.initialize(ground.0.as_ref()) {
        Ok(()) => {
            diagnostics.blade_count = grass.instance_count();
            diagnostics.text = grass.diagnostic_text();
            status.0 = SessionStatus::Ready;
            commands.insert_resource(GrassField(grass));
        }
        Err(e) => {
            error!("grass initialization failed: {}", e);
            diagnostics.blade_count = 0;
            diagnostics.text = grass.diagnostic_text();
            status.0 = SessionStatus::Failed;
        }
    }
}

fn track_grass_input<B: GpuBackend>(
    input: Res<GrassInput>,
    field: Option<ResMut<GrassField<B>>>,
    mut uniform: ResMut<GrassInputUniform>,
) {
    let (Some(position), Some(mut field)) = (input.position, field) else {
        return;
    };
    if let Some(next) = field.0.track_input(position.to_array()) {
        uniform.0 = next;
    }
}

fn teardown_grass<B: GpuBackend>(
    mut exits: MessageReader<AppExit>,
    field: Option<ResMut<GrassField<B>>>,
    mut status: ResMut<GrassStatus>,
    mut diagnostics: ResMut<GrassDiagnostics>,
) {
    if exits.is_empty() {
        return;
    }
    exits.clear();
    if let Some(mut field) = field {
        field.0.teardown();
        status.0 = field.0.status();
        diagnostics.blade_count = 0;
        diagnostics.text = field.0.diagnostic_text();
    }
}
