//! Instance Store - fixed-length structured buffer with two physical slots.
//!
//! Writers target one slot while the renderer reads the other. The write
//! target is a single atomic index; there is no fence or lock around the
//! handoff. Whoever drives the frame (renderer/simulation scheduler) must
//! never select a slot a reader is still consuming.

use bytemuck::Pod;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::GpuBackend;
use crate::constants::SLOT_COUNT;
use crate::error::GrassError;

pub struct InstanceStore<T: Pod, B: GpuBackend> {
    backend: Arc<B>,
    /// `None` once disposed.
    slots: Option<[B::Buffer; SLOT_COUNT]>,
    len: usize,
    write_target: AtomicUsize,
    label: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Pod, B: GpuBackend> InstanceStore<T, B> {
    /// Allocate both slots sized to `items` and copy `items` into each.
    ///
    /// All or nothing: if the second slot cannot be allocated the first is
    /// released before the error is returned.
    pub fn new(backend: Arc<B>, label: &str, items: &[T]) -> Result<Self, GrassError> {
        let bytes: &[u8] = bytemuck::cast_slice(items);

        let front = backend.create_buffer(&format!("{}[0]", label), bytes)?;
        let back = match backend.create_buffer(&format!("{}[1]", label), bytes) {
            Ok(buffer) => buffer,
            Err(e) => {
                backend.destroy_buffer(front);
                return Err(e);
            }
        };

        info!(
            "'{}': {} elements x {} slots ({} bytes each)",
            label,
            items.len(),
            SLOT_COUNT,
            bytes.len()
        );
        Ok(Self {
            backend,
            slots: Some([front, back]),
            len: items.len(),
            write_target: AtomicUsize::new(0),
            label: label.to_string(),
            _marker: PhantomData,
        })
    }

    /// Logical element count. Fixed for the life of the store.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_disposed(&self) -> bool {
        self.slots.is_none()
    }

    /// Route subsequent writes to `slot` (taken modulo the slot count).
    ///
    /// Idempotent and non-blocking. Precondition: no reader is consuming
    /// `slot` when it becomes the write target; the caller serialises that
    /// handoff.
    pub fn set_write_target(&self, slot: usize) {
        let slot = slot % SLOT_COUNT;
        let previous = self.write_target.swap(slot, Ordering::AcqRel);
        if previous != slot {
            debug!("'{}' write target {} -> {}", self.label, previous, slot);
        }
    }

    pub fn write_target(&self) -> usize {
        self.write_target.load(Ordering::Acquire)
    }

    /// The settled slot readers should consume.
    pub fn read_slot(&self) -> usize {
        (self.write_target() + 1) % SLOT_COUNT
    }

    /// Bindable handle of a physical slot.
    pub fn buffer(&self, slot: usize) -> Option<&B::Buffer> {
        self.slots.as_ref().map(|slots| &slots[slot % SLOT_COUNT])
    }

    /// Overwrite elements `first..first + items.len()` in the write target.
    pub fn write(&self, first: usize, items: &[T]) -> Result<(), GrassError> {
        let slots = self.live_slots()?;
        first.checked_add(items.len()).filter(|&end| end <= self.len).ok_or_else(|| {
            GrassError::Backend(format!(
                "'{}' write of {} elements at {} exceeds length {}",
                self.label,
                items.len(),
                first,
                self.len
            ))
        })?;

        let offset = (first * std::mem::size_of::<T>()) as u64;
        self.backend
            .write_buffer(&slots[self.write_target()], offset, bytemuck::cast_slice(items))
    }

    /// Copy a physical slot back to the host.
    pub fn read(&self, slot: usize) -> Result<Vec<T>, GrassError> {
        let slots = self.live_slots()?;
        let bytes = self.backend.read_buffer(&slots[slot % SLOT_COUNT])?;
        let needed = self.len * std::mem::size_of::<T>();
        if bytes.len() < needed {
            return Err(GrassError::Backend(format!(
                "'{}' slot {} returned {} bytes, expected {}",
                self.label,
                slot % SLOT_COUNT,
                bytes.len(),
                needed
            )));
        }
        let mut items = vec![T::zeroed(); self.len];
        bytemuck::cast_slice_mut::<T, u8>(&mut items).copy_from_slice(&bytes[..needed]);
        Ok(items)
    }

    /// Contents of the slot readers currently consume.
    pub fn read_settled(&self) -> Result<Vec<T>, GrassError> {
        self.read(self.read_slot())
    }

    /// Release both slots. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if let Some(slots) = self.slots.take() {
            for buffer in slots {
                self.backend.destroy_buffer(buffer);
            }
            info!("'{}' released", self.label);
        }
    }

    fn live_slots(&self) -> Result<&[B::Buffer; SLOT_COUNT], GrassError> {
        self.slots
            .as_ref()
            .ok_or_else(|| GrassError::Backend(format!("'{}' used after dispose", self.label)))
    }
}

impl<T: Pod, B: GpuBackend> Drop for InstanceStore<T, B> {
    fn drop(&mut self) {
        self.dispose();
    }
}
