use wgpu::{Buffer, BufferUsages, Device, Queue};

use crate::executor::HashParams;

/// Buffers for one whole-grid hash dispatch.
///
/// Each dispatch owns its own set, so a late readback from a superseded run
/// never aliases the buffers of the current one.
pub struct HashBuffers {
    /// Uniform buffer for the parameter block
    pub params_buffer: Buffer,
    /// Storage buffer written by the compute shader
    pub output_buffer: Buffer,
    /// Mappable copy of the output for CPU readback
    pub staging_buffer: Buffer,
    /// Output size in bytes
    pub size: u64,
}

impl HashBuffers {
    /// Create buffers sized for `params` and upload the parameter block
    pub fn new(device: &Device, queue: &Queue, params: &HashParams) -> Self {
        let size = (params.cell_count() * std::mem::size_of::<u32>()) as u64;

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("hash-params-buffer"),
            size: std::mem::size_of::<HashParams>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("hash-output-buffer"),
            size,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("hash-staging-buffer"),
            size,
            usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        queue.write_buffer(&params_buffer, 0, bytemuck::bytes_of(params));

        Self {
            params_buffer,
            output_buffer,
            staging_buffer,
            size,
        }
    }

    /// Queue the storage-to-staging copy that precedes readback
    pub fn copy_to_staging(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_buffer_to_buffer(&self.output_buffer, 0, &self.staging_buffer, 0, self.size);
    }

    /// Copy the mapped staging buffer out as u32 values and unmap it.
    ///
    /// Must only be called once the `map_async` callback has reported success.
    pub fn read_mapped(&self) -> Vec<u32> {
        let slice = self.staging_buffer.slice(..);
        let data = slice.get_mapped_range();
        let values = bytemuck::cast_slice::<u8, u32>(&data).to_vec();
        drop(data);
        self.staging_buffer.unmap();
        values
    }
}
