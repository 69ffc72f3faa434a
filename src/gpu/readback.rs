//! Copies device data back to the host.
//!
//! Each read records a copy into a fresh `MAP_READ` staging buffer, submits
//! it, then blocks on the map. Meant for tests, captures and manual particle
//! edits between frames, not for the per-frame path.

use image::RgbaImage;

use crate::error::GpuError;

fn map_staging(device: &wgpu::Device, staging: &wgpu::Buffer) -> Result<(), GpuError> {
    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);

    rx.recv()
        .map_err(|e| GpuError::BufferMapping(e.to_string()))?
        .map_err(|e| GpuError::BufferMapping(e.to_string()))
}

/// Copy the first `dst.len()` bytes of `buffer` into `dst`.
pub(crate) fn read_buffer_into(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    buffer: &wgpu::Buffer,
    dst: &mut [u8],
) -> Result<(), GpuError> {
    let size = dst.len() as u64;
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Particle Readback Buffer"),
        size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Particle Readback Encoder"),
    });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
    queue.submit(std::iter::once(encoder.finish()));

    map_staging(device, &staging)?;
    {
        let data = staging.slice(..).get_mapped_range();
        dst.copy_from_slice(&data);
    }
    staging.unmap();
    Ok(())
}

/// Read an `Rgba8Unorm` texture into an image, dropping row padding.
pub(crate) fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> Result<RgbaImage, GpuError> {
    let (width, height) = (texture.width(), texture.height());
    let row_bytes = width * 4;
    let padded_row_bytes = row_bytes.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
        * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Image Readback Buffer"),
        size: padded_row_bytes as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Image Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row_bytes),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    map_staging(device, &staging)?;
    let mut pixels = Vec::with_capacity((row_bytes * height) as usize);
    {
        let data = staging.slice(..).get_mapped_range();
        for row in data.chunks_exact(padded_row_bytes as usize) {
            pixels.extend_from_slice(&row[..row_bytes as usize]);
        }
    }
    staging.unmap();

    RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| GpuError::BufferMapping("image size mismatch".into()))
}
