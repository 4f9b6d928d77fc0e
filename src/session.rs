//! Grass Session - owns the committed blade store for the life of a scene.
//!
//! Startup runs placement once and publishes the store; teardown releases
//! it. In between the session answers diagnostics, hands the renderer its
//! draw hooks, and turns the interacting object's motion into the input
//! uniform the bend simulation reads.

use noise::{NoiseFn, Perlin};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::blade::{Blade, BladeParams, InputUniform};
use crate::config::GrassConfig;
use crate::constants::{VERTEX_COUNT, WRITE_TARGET};
use crate::error::GrassError;
use crate::gpu::{GpuBackend, InstanceStore};
use crate::pipeline::PlacementPipeline;
use crate::placement::PlacementStats;
use crate::query::QueryExecutor;

// ============================================================================
// RENDER HOOKS
// ============================================================================

/// Points in the frame where grass work is injected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderPass {
    /// Lit geometry, before opaque forward rendering.
    Geometry,
    /// Camera depth prepass.
    Depth,
    /// Shadow map rendering.
    ShadowCaster,
    /// Screen-space shadow texture, bound after the shadow mask resolves.
    ShadowTexture,
}

/// Passes that draw blades. `ShadowTexture` only binds a texture.
pub const DRAW_PASSES: [RenderPass; 3] = [RenderPass::Geometry, RenderPass::Depth, RenderPass::ShadowCaster];

/// One procedural draw: `VERTEX_COUNT` vertices per blade, a single instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawCommand {
    pub pass: RenderPass,
    pub vertex_count: u64,
    pub instance_count: u32,
}

// ============================================================================
// SESSION
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Idle,
    Ready,
    Failed,
    /// Store released and hooks removed after a successful start.
    Released,
}

pub struct GrassSystem<B: GpuBackend> {
    config: GrassConfig,
    backend: Arc<B>,
    status: SessionStatus,
    store: Option<InstanceStore<Blade, B>>,
    stats: PlacementStats,
    hooks: Vec<RenderPass>,
    /// Previous input position; the input starts at the world origin.
    last_input: [f32; 3],
    input: InputUniform,
}

impl<B: GpuBackend> GrassSystem<B> {
    pub fn new(config: GrassConfig, backend: Arc<B>) -> Self {
        Self {
            config,
            backend,
            status: SessionStatus::Idle,
            store: None,
            stats: PlacementStats::default(),
            hooks: Vec::new(),
            last_input: [0.0; 3],
            input: InputUniform::default(),
        }
    }

    /// Place blades with Perlin noise seeded from the config.
    pub fn initialize<E: QueryExecutor + ?Sized>(&mut self, executor: &E) -> Result<(), GrassError> {
        let noise = Perlin::new(self.config.noise_seed);
        self.initialize_with_noise(executor, &noise)
    }

    /// Run placement once and publish the store.
    ///
    /// On failure the session is `Failed`, holds no store and registers no
    /// hooks. A session initializes at most once.
    pub fn initialize_with_noise<E, N>(&mut self, executor: &E, noise: &N) -> Result<(), GrassError>
    where
        E: QueryExecutor + ?Sized,
        N: NoiseFn<f64, 2>,
    {
        if self.status != SessionStatus::Idle {
            return Err(GrassError::PipelineSpent);
        }

        let mut pipeline = PlacementPipeline::new(self.config.clone());
        let placement = match pipeline.run(executor, noise, self.backend.clone()) {
            Ok(placement) => placement,
            Err(e) => {
                self.status = SessionStatus::Failed;
                return Err(e);
            }
        };

        placement.store.set_write_target(WRITE_TARGET);
        self.stats = placement.stats;
        self.store = Some(placement.store);
        self.hooks = vec![
            RenderPass::Geometry,
            RenderPass::Depth,
            RenderPass::ShadowCaster,
            RenderPass::ShadowTexture,
        ];
        self.status = SessionStatus::Ready;
        info!("{}", self.diagnostic_text());
        Ok(())
    }

    /// Release the store and unregister hooks. Safe to call in any state,
    /// any number of times.
    pub fn teardown(&mut self) {
        if let Some(mut store) = self.store.take() {
            store.dispose();
            info!("grass session torn down");
        }
        self.hooks.clear();
        if self.status == SessionStatus::Ready {
            self.status = SessionStatus::Released;
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn config(&self) -> &GrassConfig {
        &self.config
    }

    pub fn stats(&self) -> PlacementStats {
        self.stats
    }

    pub fn store(&self) -> Option<&InstanceStore<Blade, B>> {
        self.store.as_ref()
    }

    /// Committed blade count; zero before initialization and after teardown.
    pub fn instance_count(&self) -> usize {
        self.store.as_ref().map_or(0, |store| store.len())
    }

    pub fn diagnostic_text(&self) -> String {
        format!("Grass blades: {}", self.instance_count())
    }

    pub fn params(&self) -> BladeParams {
        self.config.params()
    }

    /// Hooks currently registered with the renderer.
    pub fn hooks(&self) -> &[RenderPass] {
        &self.hooks
    }

    /// Draws for every registered blade pass.
    pub fn draw_commands(&self) -> Vec<DrawCommand> {
        let vertex_count = u64::from(VERTEX_COUNT) * self.instance_count() as u64;
        self.hooks
            .iter()
            .filter(|pass| DRAW_PASSES.contains(pass))
            .map(|&pass| DrawCommand { pass, vertex_count, instance_count: 1 })
            .collect()
    }

    /// Feed the interacting object's position. Returns the new uniform when
    /// the object moved, `None` when it stood still (the last uniform stays).
    pub fn track_input(&mut self, position: [f32; 3]) -> Option<InputUniform> {
        if position == self.last_input {
            return None;
        }
        self.input = InputUniform::from_motion(self.last_input, position);
        self.last_input = position;
        debug!("grass input moved to {:?}", position);
        Some(self.input)
    }

    pub fn input(&self) -> InputUniform {
        self.input
    }
}

impl<B: GpuBackend> Drop for GrassSystem<B> {
    fn drop(&mut self) {
        if self.store.is_some() {
            warn!("grass session dropped without teardown");
            self.teardown();
        }
    }
}
