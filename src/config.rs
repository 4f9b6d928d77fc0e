//! Grass Config - placement bounds, density and bend constants, persisted as JSON.

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::blade::BladeParams;
use crate::constants::VERTEX_COUNT;
use crate::error::GrassError;
use crate::query::LayerMask;

/// Immutable placement input. Loaded once, handed to the pipeline by value.
#[derive(Resource, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GrassConfig {
    /// Planar extent `[min, max]`, applied to both X and Z.
    pub bounds: [i32; 2],
    /// Samples per unit length along each axis.
    pub density: u32,
    // Bend simulation constants (passed through)
    pub spring_force: f32,
    pub spring_damping: f32,
    pub bend_force: f32,
    /// Surfaces the placement rays may land on.
    pub ground_layers: LayerMask,
    /// Seed of the acceptance/height noise.
    pub noise_seed: u32,
}

impl Default for GrassConfig {
    fn default() -> Self {
        Self {
            bounds: [0, 100],
            density: 8,
            spring_force: 8.0,
            spring_damping: 8.0,
            bend_force: 18.0,
            ground_layers: LayerMask::layer(0),
            noise_seed: 0,
        }
    }
}

impl GrassConfig {
    /// Side length of the planar bounds.
    pub fn extent(&self) -> Result<u64, GrassError> {
        let [min, max] = self.bounds;
        if max < min {
            return Err(GrassError::InvalidConfig(format!(
                "bounds max {} is below min {}",
                max, min
            )));
        }
        Ok((max as i64 - min as i64) as u64)
    }

    /// Candidate cells: `((max - min) * density)^2`.
    pub fn cell_count(&self) -> Result<usize, GrassError> {
        let side = self
            .extent()?
            .checked_mul(self.density as u64)
            .ok_or(GrassError::Allocation { stage: "sampling", requested: usize::MAX })?;
        side.checked_mul(side)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or(GrassError::Allocation { stage: "sampling", requested: usize::MAX })
    }

    pub fn params(&self) -> BladeParams {
        BladeParams {
            spring_force: self.spring_force,
            spring_damping: self.spring_damping,
            bend_force: self.bend_force,
            vertex_count: VERTEX_COUNT,
        }
    }
}

pub fn load_config(path: impl AsRef<Path>) -> Result<GrassConfig, GrassError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)?;
    let config: GrassConfig = serde_json::from_str(&json)?;
    if config.extent().is_err() {
        warn!("Grass config {} has inverted bounds {:?}", path.display(), config.bounds);
    }
    info!("Loaded grass config from {}", path.display());
    Ok(config)
}

pub fn save_config(config: &GrassConfig, path: impl AsRef<Path>) -> Result<(), GrassError> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}
