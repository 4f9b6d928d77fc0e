//! Spatial Sampler - one downward ray query per candidate cell
//!
//! Cells are independent: cell `i` draws its origin from an RNG seeded with
//! `i + 1`, so the batch can be filled in any order on any thread and the
//! same config always yields the same rays.

use bevy::math::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use crate::config::GrassConfig;
use crate::constants::BATCH_COUNT;
use crate::error::GrassError;
use crate::query::{LayerMask, RayQuery};

/// Build the ray query for cell `index`.
///
/// X, Y and Z are all drawn from `[min, max)`, so rays start somewhere
/// above ground inside the bounds cube and fire straight down.
pub fn query_for_cell(index: usize, bounds: [i32; 2], layer_mask: LayerMask) -> RayQuery {
    // Seed 0 is skipped on purpose: cell 0 gets seed 1.
    let mut rng = StdRng::seed_from_u64(index as u64 + 1);
    let (min, max) = (bounds[0] as f32, bounds[1] as f32);
    let origin = Vec3::new(
        coordinate(&mut rng, min, max),
        coordinate(&mut rng, min, max),
        coordinate(&mut rng, min, max),
    );
    RayQuery::down(origin, layer_mask)
}

fn coordinate(rng: &mut StdRng, min: f32, max: f32) -> f32 {
    if min < max { rng.random_range(min..max) } else { min }
}

/// Fill the descriptor batch for `cell_count` cells, `BATCH_COUNT` cells per job.
pub fn sample_queries(config: &GrassConfig, cell_count: usize) -> Result<Vec<RayQuery>, GrassError> {
    let bounds = config.bounds;
    let layer_mask = config.ground_layers;

    let mut queries = Vec::new();
    queries
        .try_reserve_exact(cell_count)
        .map_err(GrassError::allocation("sampling", cell_count))?;
    queries.resize(cell_count, RayQuery::down(Vec3::ZERO, layer_mask));

    queries
        .par_chunks_mut(BATCH_COUNT)
        .enumerate()
        .for_each(|(chunk, batch)| {
            let base = chunk * BATCH_COUNT;
            for (offset, query) in batch.iter_mut().enumerate() {
                *query = query_for_cell(base + offset, bounds, layer_mask);
            }
        });

    debug!("sampled {} ray queries in {} jobs", cell_count, cell_count.div_ceil(BATCH_COUNT));
    Ok(queries)
}
