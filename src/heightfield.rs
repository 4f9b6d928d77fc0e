//! Height Field - grid terrain collider used as the default ray executor
//!
//! Stands in for a physics engine when none is attached: a regular grid of
//! heights over the XZ plane, bilinearly interpolated, hit only from above.

use bevy::math::{Vec2, Vec3};
use noise::{NoiseFn, Perlin};
use rayon::prelude::*;

use crate::constants::{
    COMMANDS_PER_JOB, DEFAULT_COLLIDER_ID, MARCH_MAX_STEPS, MARCH_REFINE_ITERATIONS, MARCH_SLAB_MARGIN,
    MARCH_STEPS_PER_CELL,
};
use crate::config::GrassConfig;
use crate::error::GrassError;
use crate::query::{QueryExecutor, RayHit, RayQuery};

pub struct HeightField {
    /// World XZ of sample (0, 0).
    pub origin: Vec2,
    pub cell_size: f32,
    /// Samples along X.
    pub width: usize,
    /// Samples along Z.
    pub depth: usize,
    heights: Vec<f32>,
    /// Lowest and highest sample, bounding every surface point.
    height_range: (f32, f32),
    pub collider_id: u32,
    /// Collision layer of the surface.
    pub layer: u32,
}

impl HeightField {
    /// Heights are row-major: `heights[z * width + x]`.
    pub fn new(origin: Vec2, cell_size: f32, width: usize, depth: usize, heights: Vec<f32>) -> Result<Self, GrassError> {
        if width < 2 || depth < 2 {
            return Err(GrassError::InvalidConfig(format!(
                "height field needs at least 2x2 samples, got {}x{}",
                width, depth
            )));
        }
        if !(cell_size > 0.0) {
            return Err(GrassError::InvalidConfig(format!("height field cell size {} must be positive", cell_size)));
        }
        let samples = sample_count(width, depth)?;
        if heights.len() != samples {
            return Err(GrassError::InvalidConfig(format!(
                "height field expects {} samples, got {}",
                samples,
                heights.len()
            )));
        }
        let height_range = heights
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &h| (lo.min(h), hi.max(h)));
        Ok(Self {
            origin,
            cell_size,
            width,
            depth,
            heights,
            height_range,
            collider_id: DEFAULT_COLLIDER_ID,
            layer: 0,
        })
    }

    /// Flat square plane at `height` covering `[min, max]` on X and Z.
    pub fn flat(min: f32, max: f32, height: f32) -> Result<Self, GrassError> {
        let extent = max - min;
        Self::new(Vec2::splat(min), extent, 2, 2, vec![height; 4])
    }

    /// Rolling terrain from three octaves of Perlin noise.
    pub fn from_noise(
        origin: Vec2,
        cell_size: f32,
        width: usize,
        depth: usize,
        seed: u32,
        base_height: f32,
        amplitude: f32,
    ) -> Result<Self, GrassError> {
        let perlin = Perlin::new(seed);
        let frequency = 0.02;

        let samples = sample_count(width, depth)?;
        let mut heights = Vec::new();
        heights
            .try_reserve_exact(samples)
            .map_err(GrassError::allocation("terrain", samples))?;
        for z in 0..depth {
            for x in 0..width {
                let wx = (origin.x + x as f32 * cell_size) as f64;
                let wz = (origin.y + z as f32 * cell_size) as f64;
                let e = (1.0 * perlin.get([wx * frequency, wz * frequency])
                    + 0.5 * perlin.get([wx * frequency * 2.0, wz * frequency * 2.0])
                    + 0.25 * perlin.get([wx * frequency * 4.0, wz * frequency * 4.0]))
                    / 1.75;
                heights.push(base_height + amplitude * e as f32);
            }
        }
        Self::new(origin, cell_size, width, depth, heights)
    }

    /// Noise terrain with one-unit cells spanning the config's placement bounds.
    pub fn covering(config: &GrassConfig, seed: u32, amplitude: f32) -> Result<Self, GrassError> {
        let side = config
            .extent()?
            .max(1)
            .checked_add(1)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or(GrassError::Allocation { stage: "terrain", requested: usize::MAX })?;
        let origin = Vec2::splat(config.bounds[0] as f32);
        Self::from_noise(origin, 1.0, side, side, seed, 0.0, amplitude)
    }

    pub fn with_collider(mut self, collider_id: u32, layer: u32) -> Self {
        self.collider_id = collider_id;
        self.layer = layer;
        self
    }

    /// Far corner of the covered XZ rectangle.
    pub fn max_corner(&self) -> Vec2 {
        self.origin
            + Vec2::new(
                (self.width - 1) as f32 * self.cell_size,
                (self.depth - 1) as f32 * self.cell_size,
            )
    }

    /// Bilinear height, `None` outside the grid.
    pub fn height_at(&self, x: f32, z: f32) -> Option<f32> {
        let max = self.max_corner();
        if x < self.origin.x || z < self.origin.y || x > max.x || z > max.y {
            return None;
        }

        let gx = (x - self.origin.x) / self.cell_size;
        let gz = (z - self.origin.y) / self.cell_size;
        let x0 = (gx.floor() as usize).min(self.width - 2);
        let z0 = (gz.floor() as usize).min(self.depth - 2);
        let tx = gx - x0 as f32;
        let tz = gz - z0 as f32;

        let h = |x: usize, z: usize| self.heights[z * self.width + x];
        let near = h(x0, z0) + (h(x0 + 1, z0) - h(x0, z0)) * tx;
        let far = h(x0, z0 + 1) + (h(x0 + 1, z0 + 1) - h(x0, z0 + 1)) * tx;
        Some(near + (far - near) * tz)
    }

    /// Cast one ray. Misses when the mask excludes this surface.
    pub fn raycast(&self, query: &RayQuery) -> RayHit {
        if !query.layer_mask.contains(self.layer) {
            return RayHit::MISS;
        }
        let dir = query.direction;
        if dir.x == 0.0 && dir.z == 0.0 {
            self.raycast_vertical(query)
        } else {
            self.raycast_march(query)
        }
    }

    fn raycast_vertical(&self, query: &RayQuery) -> RayHit {
        let o = query.origin;
        let Some(ground) = self.height_at(o.x, o.z) else { return RayHit::MISS };
        if query.direction.y >= 0.0 || o.y < ground {
            return RayHit::MISS;
        }
        let distance = (o.y - ground) / -query.direction.y;
        if distance > query.max_distance {
            return RayHit::MISS;
        }
        RayHit::new(self.collider_id, Vec3::new(o.x, ground, o.z))
    }

    fn raycast_march(&self, query: &RayQuery) -> RayHit {
        let Some((t_enter, t_exit)) = self.footprint_span(query) else { return RayHit::MISS };

        // Signed distance above ground along the ray.
        let above = |t: f32| {
            let p = query.origin + query.direction * t;
            self.height_at(p.x, p.z).map(|h| p.y - h)
        };

        let step = self.cell_size / MARCH_STEPS_PER_CELL;
        let mut t_prev = t_enter;
        let Some(start) = above(t_prev) else { return RayHit::MISS };
        if start < 0.0 {
            return RayHit::MISS;
        }

        // Stepping by index keeps t moving even where f32 spacing exceeds `step`.
        // The last step always lands on `t_exit`.
        let steps = ((t_exit - t_enter) / step).ceil().clamp(1.0, MARCH_MAX_STEPS as f32) as u32;
        for k in 1..=steps {
            let t = if k == steps { t_exit } else { (t_enter + k as f32 * step).min(t_exit) };
            let Some(curr) = above(t) else { return RayHit::MISS };
            if curr <= 0.0 {
                let (mut lo, mut hi) = (t_prev, t);
                for _ in 0..MARCH_REFINE_ITERATIONS {
                    let mid = 0.5 * (lo + hi);
                    match above(mid) {
                        Some(d) if d > 0.0 => lo = mid,
                        _ => hi = mid,
                    }
                }
                let p = query.origin + query.direction * hi;
                let ground = self.height_at(p.x, p.z).unwrap_or(p.y);
                return RayHit::new(self.collider_id, Vec3::new(p.x, ground, p.z));
            }
            t_prev = t;
        }
        RayHit::MISS
    }

    /// Ray parameter range spent inside the field's bounding box, clipped to
    /// `[0, max_distance]`. `None` when the ray never enters it.
    fn footprint_span(&self, query: &RayQuery) -> Option<(f32, f32)> {
        let min = self.origin;
        let max = self.max_corner();
        let (low, high) = self.height_range;
        let mut t0 = 0.0f32;
        let mut t1 = query.max_distance;

        for (o, d, lo, hi) in [
            (query.origin.x, query.direction.x, min.x, max.x),
            (query.origin.z, query.direction.z, min.y, max.y),
            (query.origin.y, query.direction.y, low - MARCH_SLAB_MARGIN, high + MARCH_SLAB_MARGIN),
        ] {
            if d == 0.0 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let a = (lo - o) / d;
            let b = (hi - o) / d;
            t0 = t0.max(a.min(b));
            t1 = t1.min(a.max(b));
        }

        (t0 <= t1 && t1.is_finite()).then_some((t0, t1))
    }
}

/// `width * depth`, reported as an allocation failure when it overflows.
fn sample_count(width: usize, depth: usize) -> Result<usize, GrassError> {
    width
        .checked_mul(depth)
        .ok_or(GrassError::Allocation { stage: "terrain", requested: usize::MAX })
}

impl QueryExecutor for HeightField {
    fn execute(&self, queries: &[RayQuery]) -> Vec<RayHit> {
        let mut hits = vec![RayHit::MISS; queries.len()];
        hits.par_chunks_mut(COMMANDS_PER_JOB)
            .zip(queries.par_chunks(COMMANDS_PER_JOB))
            .for_each(|(out, batch)| {
                for (hit, query) in out.iter_mut().zip(batch) {
                    *hit = self.raycast(query);
                }
            });
        hits
    }
}
