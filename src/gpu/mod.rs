//! GPU Buffers - blade storage shared between placement, bend simulation and rendering.
//!
//! Data flow:
//! - Placement: accepted blades copied once into both slots of an `InstanceStore`
//! - Bend simulation: writes into the current write target
//! - Renderer: binds the slot handles and reads the settled slot every frame
//!
//! `GpuBackend` is the allocation seam. `WgpuBackend` drives a real device,
//! `HostBackend` keeps buffers in host memory for headless runs.

pub mod buffers;
pub mod device;
pub mod host;

pub use buffers::InstanceStore;
pub use device::WgpuBackend;
pub use host::{HostBackend, HostBuffer};

use crate::error::GrassError;

/// Allocator and copy engine for GPU-visible buffers.
///
/// Buffers are explicit resources: every buffer from `create_buffer` must
/// go back through `destroy_buffer` exactly once.
pub trait GpuBackend: Send + Sync + 'static {
    type Buffer: Send + Sync + 'static;

    /// Allocate a buffer initialised with `contents`.
    fn create_buffer(&self, label: &str, contents: &[u8]) -> Result<Self::Buffer, GrassError>;

    /// Overwrite `data.len()` bytes at `offset`.
    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]) -> Result<(), GrassError>;

    /// Copy the whole buffer back to the host. May be longer than the
    /// logical contents when the backend pads allocations.
    fn read_buffer(&self, buffer: &Self::Buffer) -> Result<Vec<u8>, GrassError>;

    fn destroy_buffer(&self, buffer: Self::Buffer);
}
