//! Meadow - procedural grass placement and double-buffered blade storage.
//!
//! Placement runs once per scene: a jittered grid of downward rays is cast
//! against the ground, noise thins and sizes the hits, and the surviving
//! blades are committed to a two-slot GPU structured buffer.

// ============================================================================
// MODULES
// ============================================================================

pub mod blade;
pub mod config;
pub mod constants;
pub mod error;
pub mod gpu;
pub mod heightfield;
pub mod pipeline;
pub mod placement;
pub mod plugin;
pub mod query;
pub mod sampler;
pub mod session;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use blade::{Blade, BladeParams, InputUniform};
pub use config::{load_config, save_config, GrassConfig};
pub use error::GrassError;
pub use gpu::{GpuBackend, HostBackend, InstanceStore, WgpuBackend};
pub use heightfield::HeightField;
pub use pipeline::{Placement, PlacementPipeline, PipelineState};
pub use placement::PlacementStats;
pub use plugin::GrassPlugin;
pub use query::{LayerMask, QueryExecutor, RayHit, RayQuery};
pub use session::{DrawCommand, GrassSystem, RenderPass, SessionStatus};
