//! Host Backend - buffers in plain memory, with an optional byte budget.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use super::GpuBackend;
use crate::error::GrassError;

pub struct HostBuffer {
    pub label: String,
    data: RwLock<Vec<u8>>,
}

/// Host-memory stand-in for a GPU device.
///
/// `with_budget` caps the live byte total so allocation failure can be
/// exercised without exhausting the machine.
#[derive(Default)]
pub struct HostBackend {
    budget: Option<usize>,
    allocated_bytes: AtomicUsize,
    live_buffers: AtomicUsize,
}

impl HostBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(bytes: usize) -> Self {
        Self {
            budget: Some(bytes),
            ..Default::default()
        }
    }

    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes.load(Ordering::Acquire)
    }

    pub fn live_buffers(&self) -> usize {
        self.live_buffers.load(Ordering::Acquire)
    }
}

fn poisoned(label: &str) -> GrassError {
    GrassError::Backend(format!("host buffer '{}' lock poisoned", label))
}

impl GpuBackend for HostBackend {
    type Buffer = HostBuffer;

    fn create_buffer(&self, label: &str, contents: &[u8]) -> Result<HostBuffer, GrassError> {
        let len = contents.len();
        if let Some(budget) = self.budget {
            if self.allocated_bytes() + len > budget {
                return Err(GrassError::Allocation { stage: "commit", requested: len });
            }
        }

        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(GrassError::allocation("commit", len))?;
        data.extend_from_slice(contents);

        self.allocated_bytes.fetch_add(len, Ordering::AcqRel);
        self.live_buffers.fetch_add(1, Ordering::AcqRel);
        Ok(HostBuffer {
            label: label.to_string(),
            data: RwLock::new(data),
        })
    }

    fn write_buffer(&self, buffer: &HostBuffer, offset: u64, data: &[u8]) -> Result<(), GrassError> {
        let mut dst = buffer.data.write().map_err(|_| poisoned(&buffer.label))?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let end = start.saturating_add(data.len());
        if end > dst.len() {
            return Err(GrassError::Backend(format!(
                "write of {} bytes at {} overruns '{}' ({} bytes)",
                data.len(),
                offset,
                buffer.label,
                dst.len()
            )));
        }
        dst[start..end].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, buffer: &HostBuffer) -> Result<Vec<u8>, GrassError> {
        let src = buffer.data.read().map_err(|_| poisoned(&buffer.label))?;
        Ok(src.clone())
    }

    fn destroy_buffer(&self, buffer: HostBuffer) {
        let len = buffer
            .data
            .into_inner()
            .map(|data| data.len())
            .unwrap_or_else(|e| e.into_inner().len());
        self.allocated_bytes.fetch_sub(len, Ordering::AcqRel);
        self.live_buffers.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_write_read_destroy() {
        let backend = HostBackend::new();
        let buffer = backend.create_buffer("test", &[1, 2, 3, 4]).unwrap();
        assert_eq!(backend.live_buffers(), 1);
        assert_eq!(backend.allocated_bytes(), 4);

        backend.write_buffer(&buffer, 2, &[9, 9]).unwrap();
        assert_eq!(backend.read_buffer(&buffer).unwrap(), vec![1, 2, 9, 9]);

        backend.destroy_buffer(buffer);
        assert_eq!(backend.live_buffers(), 0);
        assert_eq!(backend.allocated_bytes(), 0);
    }

    #[test]
    fn overrun_is_rejected() {
        let backend = HostBackend::new();
        let buffer = backend.create_buffer("small", &[0; 4]).unwrap();
        assert!(matches!(backend.write_buffer(&buffer, 3, &[1, 2]), Err(GrassError::Backend(_))));
        backend.destroy_buffer(buffer);
    }

    #[test]
    fn budget_limits_allocation() {
        let backend = HostBackend::with_budget(8);
        let a = backend.create_buffer("a", &[0; 6]).unwrap();
        assert!(matches!(
            backend.create_buffer("b", &[0; 6]),
            Err(GrassError::Allocation { stage: "commit", requested: 6 })
        ));
        backend.destroy_buffer(a);
        let b = backend.create_buffer("b", &[0; 6]).unwrap();
        backend.destroy_buffer(b);
    }
}
