//! Ray Queries - Ray descriptors, hit results and the executor seam
//!
//! The executor is whatever collision engine backs the ground. The pipeline
//! only relies on index-aligned output: `hits[i]` answers `queries[i]`.

use bevy::math::Vec3;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::GrassError;

// ============================================================================
// LAYER MASK
// ============================================================================

/// Bit set of collision layers a query may hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: LayerMask = LayerMask(0);
    pub const ALL: LayerMask = LayerMask(u32::MAX);

    /// Mask with only `layer` set. Layers past 31 yield an empty mask.
    pub fn layer(layer: u32) -> Self {
        LayerMask(1u32.checked_shl(layer).unwrap_or(0))
    }

    pub fn contains(self, layer: u32) -> bool {
        self.intersects(LayerMask::layer(layer))
    }

    pub fn intersects(self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        LayerMask::layer(0)
    }
}

// ============================================================================
// QUERY / HIT
// ============================================================================

/// A single ray query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayQuery {
    pub origin: Vec3,
    /// Unit direction.
    pub direction: Vec3,
    pub max_distance: f32,
    pub layer_mask: LayerMask,
}

impl RayQuery {
    /// Straight-down ray with unbounded reach.
    pub fn down(origin: Vec3, layer_mask: LayerMask) -> Self {
        Self {
            origin,
            direction: Vec3::NEG_Y,
            max_distance: f32::INFINITY,
            layer_mask,
        }
    }
}

/// Result of one ray query. `collider_id == 0` means nothing was hit.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RayHit {
    pub collider_id: u32,
    pub point: Vec3,
}

impl RayHit {
    pub const MISS: RayHit = RayHit {
        collider_id: 0,
        point: Vec3::ZERO,
    };

    pub fn new(collider_id: u32, point: Vec3) -> Self {
        Self { collider_id, point }
    }

    #[inline]
    pub fn is_hit(&self) -> bool {
        self.collider_id != 0
    }
}

// ============================================================================
// EXECUTOR
// ============================================================================

/// Batched ray-cast engine.
///
/// Must return exactly one hit per query, in query order, and accept an
/// empty batch. Internal batching and threading are up to the implementor.
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, queries: &[RayQuery]) -> Vec<RayHit>;
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for Box<T> {
    fn execute(&self, queries: &[RayQuery]) -> Vec<RayHit> {
        (**self).execute(queries)
    }
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for &T {
    fn execute(&self, queries: &[RayQuery]) -> Vec<RayHit> {
        (**self).execute(queries)
    }
}

/// Run `executor` and reject output that breaks index alignment.
pub fn execute_checked<E: QueryExecutor + ?Sized>(
    executor: &E,
    queries: &[RayQuery],
) -> Result<Vec<RayHit>, GrassError> {
    let hits = executor.execute(queries);
    if hits.len() != queries.len() {
        error!(
            "query executor broke index alignment: {} results for {} queries",
            hits.len(),
            queries.len()
        );
        return Err(GrassError::ExecutorContract {
            expected: queries.len(),
            actual: hits.len(),
        });
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ShortExecutor;

    impl QueryExecutor for ShortExecutor {
        fn execute(&self, queries: &[RayQuery]) -> Vec<RayHit> {
            vec![RayHit::MISS; queries.len().saturating_sub(1)]
        }
    }

    #[test]
    fn layer_mask_bits() {
        let mask = LayerMask::layer(3);
        assert_eq!(mask.0, 0b1000);
        assert!(mask.contains(3));
        assert!(!mask.contains(0));
        assert_eq!(LayerMask::layer(40), LayerMask::NONE);
        assert!(LayerMask::ALL.intersects(mask));
        assert_eq!(LayerMask::default(), LayerMask(1));
    }

    #[test]
    fn miss_has_zero_collider() {
        assert!(!RayHit::MISS.is_hit());
        assert!(RayHit::new(7, Vec3::ONE).is_hit());
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let queries = vec![RayQuery::down(Vec3::ZERO, LayerMask::ALL); 4];
        match execute_checked(&ShortExecutor, &queries) {
            Err(GrassError::ExecutorContract { expected, actual }) => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 3);
            }
            other => panic!("expected contract violation, got {:?}", other),
        }
    }

    #[test]
    fn empty_batch_is_fine() {
        let hits = execute_checked(&ShortExecutor, &[]).unwrap();
        assert!(hits.is_empty());
    }
}
