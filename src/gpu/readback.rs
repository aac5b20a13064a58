use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use bevy::render::render_resource::{Maintain, MapMode};
use bevy::render::renderer::RenderDevice;
use glam::Vec2;

use crate::cpu::particles::ParticleState;
use crate::error::ParticleError;
use crate::gpu::buffers::ReadbackBuffer;
use crate::gpu::ffi::{GPUVec2, split_readback};

const PENDING: u8 = 0;
const MAPPED: u8 = 1;
const FAILED: u8 = 2;

/// Maps the readback buffer, blocks until the map completes and returns its
/// contents (positions, then velocities). The buffer is unmapped on return.
///
/// Only call this on a frame where no copy into the buffer is queued.
pub fn map_readback_blocking(
    render_device: &RenderDevice,
    readback: &ReadbackBuffer,
) -> Result<Vec<GPUVec2>, ParticleError> {
    render_device.poll(Maintain::Wait);
    let slice = readback.buffer.slice(..);

    // async map
    let status = Arc::new(AtomicU8::new(PENDING));
    let cb = status.clone();
    slice.map_async(MapMode::Read, move |r| {
        cb.store(if r.is_ok() { MAPPED } else { FAILED }, Ordering::SeqCst)
    });

    // wait for map completion
    loop {
        render_device.poll(Maintain::Poll);
        match status.load(Ordering::SeqCst) {
            PENDING => std::thread::yield_now(),
            MAPPED => break,
            _ => {
                readback.buffer.unmap();
                return Err(ParticleError::ReadbackMapFailed);
            }
        }
    }

    let data = {
        let view = slice.get_mapped_range();
        bytemuck::cast_slice::<u8, GPUVec2>(&view).to_vec()
    };
    readback.buffer.unmap();
    Ok(data)
}

/// Copies a readback (positions, then velocities) into `state`.
pub fn mirror_into(state: &mut ParticleState, data: &[GPUVec2]) -> Result<(), ParticleError> {
    state.check_lengths()?;
    let n = state.len();
    let mismatch = ParticleError::ReadbackSizeMismatch {
        expected: n,
        actual: data.len() / 2,
    };
    if data.len() != 2 * n {
        return Err(mismatch);
    }
    let (positions, velocities) = split_readback(data, n).ok_or(mismatch)?;

    for (dst, src) in state.positions.iter_mut().zip(positions) {
        *dst = Vec2::from(*src);
    }
    for (dst, src) in state.velocities.iter_mut().zip(velocities) {
        *dst = Vec2::from(*src);
    }
    Ok(())
}
