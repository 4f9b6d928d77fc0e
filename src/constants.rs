//! Constants - Tuning parameters for blade placement and the blade buffer

// ============================================================================
// RENDERING
// ============================================================================

/// Vertices emitted per blade by the procedural draw (two triangles).
pub const VERTEX_COUNT: u32 = 6;

/// Physical slots in the blade buffer.
pub const SLOT_COUNT: usize = 2;

/// Slot the bend simulation writes into after placement commits.
pub const WRITE_TARGET: usize = 1;

/// Debug label of the blade storage buffer.
pub const BLADE_BUFFER_LABEL: &str = "blade_buffer";

// ============================================================================
// JOB GRANULARITY
// ============================================================================

/// Cells sampled per parallel chunk in the sampler stage.
pub const BATCH_COUNT: usize = 64;

/// Ray queries handled per parallel chunk by the height field executor.
pub const COMMANDS_PER_JOB: usize = 32;

// ============================================================================
// PLACEMENT
// ============================================================================

/// Scale applied to hit coordinates before the acceptance noise lookup.
pub const NOISE_SCALE: f64 = 0.2;

/// Acceptance noise below this value discards the hit.
pub const NOISE_CLAMP: f32 = 0.1;

/// Blade width in world units. Height comes from noise.
pub const BLADE_WIDTH: f32 = 0.3;

/// Initial facing of every blade (world +X).
pub const BLADE_DIRECTION: [f32; 3] = [1.0, 0.0, 0.0];

// ============================================================================
// INPUT
// ============================================================================

/// Multiplier on the per-frame input displacement sent to the bend shader.
pub const INPUT_DIRECTION_SCALE: f32 = 10.0;

// ============================================================================
// HEIGHT FIELD
// ============================================================================

/// Samples per cell used when marching a non-vertical ray.
pub const MARCH_STEPS_PER_CELL: f32 = 2.0;

/// Upper bound on march steps for a single ray.
pub const MARCH_MAX_STEPS: u32 = 1 << 20;

/// Vertical padding around the sample height range when clipping rays.
pub const MARCH_SLAB_MARGIN: f32 = 0.01;

/// Bisection refinements once a march step brackets the surface.
pub const MARCH_REFINE_ITERATIONS: u32 = 16;

/// Collider id reported by height fields built without an explicit id.
pub const DEFAULT_COLLIDER_ID: u32 = 1;
