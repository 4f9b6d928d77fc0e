//! wgpu Backend - storage buffers on a real device, readback through staging.

use std::sync::mpsc;

use bevy::tasks::block_on;
use tracing::{info, warn};

use super::GpuBackend;
use crate::error::GrassError;

/// Smallest allocation handed to the device; empty stores still bind a valid buffer.
const MIN_BUFFER_SIZE: u64 = 16;

fn padded_size(len: usize) -> u64 {
    let align = wgpu::COPY_BUFFER_ALIGNMENT;
    ((len as u64).div_ceil(align) * align).max(MIN_BUFFER_SIZE)
}

pub struct WgpuBackend {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl WgpuBackend {
    /// Wrap an existing device, e.g. the renderer's.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { device, queue }
    }

    /// Open a headless device on the default adapter.
    pub fn request_headless() -> Result<Self, GrassError> {
        let instance = wgpu::Instance::default();
        let adapter = block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
            .map_err(|e| GrassError::Backend(format!("no GPU adapter: {}", e)))?;
        info!("Using GPU: {:?}", adapter.get_info().name);

        let (device, queue) = block_on(adapter.request_device(&wgpu::DeviceDescriptor::default()))
            .map_err(|e| GrassError::Backend(format!("device request failed: {}", e)))?;
        Ok(Self::new(device, queue))
    }
}

impl GpuBackend for WgpuBackend {
    type Buffer = wgpu::Buffer;

    fn create_buffer(&self, label: &str, contents: &[u8]) -> Result<wgpu::Buffer, GrassError> {
        let size = padded_size(contents.len());
        let limits = self.device.limits();
        if size > limits.max_buffer_size || size > u64::from(limits.max_storage_buffer_binding_size) {
            warn!("'{}' needs {} bytes, over the device storage limit", label, size);
            return Err(GrassError::Allocation { stage: "commit", requested: contents.len() });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        if let Some(err) = block_on(self.device.pop_error_scope()) {
            warn!("'{}' allocation failed: {}", label, err);
            buffer.destroy();
            return Err(GrassError::Allocation { stage: "commit", requested: contents.len() });
        }

        if !contents.is_empty() {
            let aligned = (contents.len() as u64).div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT;
            if aligned == contents.len() as u64 {
                self.queue.write_buffer(&buffer, 0, contents);
            } else {
                let mut padded = contents.to_vec();
                padded.resize(aligned as usize, 0);
                self.queue.write_buffer(&buffer, 0, &padded);
            }
        }
        Ok(buffer)
    }

    fn write_buffer(&self, buffer: &wgpu::Buffer, offset: u64, data: &[u8]) -> Result<(), GrassError> {
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || data.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(GrassError::Backend(format!(
                "write of {} bytes at {} is not 4-byte aligned",
                data.len(),
                offset
            )));
        }
        if offset + data.len() as u64 > buffer.size() {
            return Err(GrassError::Backend(format!(
                "write of {} bytes at {} overruns a {} byte buffer",
                data.len(),
                offset,
                buffer.size()
            )));
        }
        self.queue.write_buffer(buffer, offset, data);
        Ok(())
    }

    fn read_buffer(&self, buffer: &wgpu::Buffer) -> Result<Vec<u8>, GrassError> {
        let size = buffer.size();
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("blade_readback_staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("blade_readback"),
        });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = mpsc::channel();
        staging.slice(..).map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| GrassError::Backend(format!("device poll failed: {:?}", e)))?;

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(GrassError::Backend(format!("buffer map failed: {}", e))),
            Err(_) => return Err(GrassError::Backend("buffer map channel disconnected".into())),
        }

        let bytes = staging.slice(..).get_mapped_range().to_vec();
        staging.unmap();
        staging.destroy();
        Ok(bytes)
    }

    fn destroy_buffer(&self, buffer: wgpu::Buffer) {
        buffer.destroy();
    }
}
