//! Placement Filter - turns ray hits into blades
//!
//! Single pass over the hits in index order. Noise thins the field: a hit only
//! becomes a blade if the low-frequency noise at its XZ position reaches
//! `NOISE_CLAMP`. That same sample becomes the blade colour; a second,
//! unscaled sample sets the height.

use noise::NoiseFn;
use tracing::debug;

use crate::blade::Blade;
use crate::constants::{BLADE_WIDTH, NOISE_CLAMP, NOISE_SCALE};
use crate::error::GrassError;
use crate::query::RayHit;

/// Counters from one filter pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlacementStats {
    pub queries: usize,
    pub hits: usize,
    pub accepted: usize,
}

/// Decide a single hit. `None` for misses and noise rejections.
pub fn blade_for_hit<N: NoiseFn<f64, 2>>(hit: &RayHit, noise: &N) -> Option<Blade> {
    if !hit.is_hit() {
        return None;
    }

    let x = hit.point.x as f64;
    let z = hit.point.z as f64;

    let color = noise.get([x * NOISE_SCALE, z * NOISE_SCALE]) as f32;
    if color < NOISE_CLAMP {
        return None;
    }

    let height = ((noise.get([x, z]) as f32).clamp(0.0, 1.0) * 2.0).clamp(0.0, 1.0);

    Some(Blade::new(hit.point.to_array(), [BLADE_WIDTH, height], color))
}

/// Filter every hit, keeping input order among survivors.
pub fn place_blades<N: NoiseFn<f64, 2>>(
    hits: &[RayHit],
    noise: &N,
) -> Result<(Vec<Blade>, PlacementStats), GrassError> {
    let mut blades = Vec::new();
    let mut stats = PlacementStats { queries: hits.len(), ..Default::default() };

    for hit in hits {
        if hit.is_hit() {
            stats.hits += 1;
        }
        let Some(blade) = blade_for_hit(hit, noise) else { continue };
        blades
            .try_reserve(1)
            .map_err(GrassError::allocation("filtering", blades.len() + 1))?;
        blades.push(blade);
    }

    stats.accepted = blades.len();
    debug!(
        "placement filter: {} queries, {} hits, {} blades",
        stats.queries, stats.hits, stats.accepted
    );
    Ok((blades, stats))
}
