//! Blade Data - GPU-layout records shared with the grass shaders

use bytemuck::{Pod, Zeroable};

use crate::constants::{BLADE_DIRECTION, INPUT_DIRECTION_SCALE};

// ============================================================================
// BLADE
// ============================================================================

/// One placed grass blade. Layout matches the shader's structured buffer
/// element: 11 tightly packed floats.
///
/// `position`, `size`, `direction` and `color` are fixed at placement.
/// `bend` and `bend_velocity` start at zero and belong to the bend
/// simulation once the buffer is published.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Blade {
    pub position: [f32; 3],
    /// (width, height)
    pub size: [f32; 2],
    pub bend: f32,
    pub bend_velocity: f32,
    pub direction: [f32; 3],
    pub color: f32,
}

const _: () = assert!(std::mem::size_of::<Blade>() == 11 * 4);

impl Blade {
    /// Fresh blade at rest, facing the default direction.
    pub fn new(position: [f32; 3], size: [f32; 2], color: f32) -> Self {
        Self {
            position,
            size,
            bend: 0.0,
            bend_velocity: 0.0,
            direction: BLADE_DIRECTION,
            color,
        }
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.size[1]
    }
}

// ============================================================================
// SHADER PARAMETERS
// ============================================================================

/// Spring/bend constants handed to the bend simulation untouched.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BladeParams {
    pub spring_force: f32,
    pub spring_damping: f32,
    pub bend_force: f32,
    pub vertex_count: u32,
}

/// Interacting object that pushes blades around.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct InputUniform {
    pub position: [f32; 3],
    pub direction: [f32; 3],
}

impl InputUniform {
    /// Uniform for an input that moved from `previous` to `position` this frame.
    pub fn from_motion(previous: [f32; 3], position: [f32; 3]) -> Self {
        let direction = [
            (position[0] - previous[0]) * INPUT_DIRECTION_SCALE,
            (position[1] - previous[1]) * INPUT_DIRECTION_SCALE,
            (position[2] - previous[2]) * INPUT_DIRECTION_SCALE,
        ];
        Self { position, direction }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blade_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Blade>(), 44);
        assert_eq!(std::mem::align_of::<Blade>(), 4);

        let blade = Blade::new([1.0, 2.0, 3.0], [0.3, 0.7], 0.25);
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&blade));
        assert_eq!(
            floats,
            &[1.0, 2.0, 3.0, 0.3, 0.7, 0.0, 0.0, 1.0, 0.0, 0.0, 0.25]
        );
    }

    #[test]
    fn input_direction_is_scaled_displacement() {
        let input = InputUniform::from_motion([0.0, 0.0, 0.0], [1.0, 0.0, -0.5]);
        assert_eq!(input.position, [1.0, 0.0, -0.5]);
        assert_eq!(input.direction, [10.0, 0.0, -5.0]);
    }
}
