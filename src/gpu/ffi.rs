use bytemuck::{Pod, Zeroable};
use glam::Vec2;

// one element of the position / velocity storage buffers, WGSL vec2<f32>
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GPUVec2 {
    // not using glam to make sure WGSL compatibility
    pub xy: [f32; 2],
}

impl From<Vec2> for GPUVec2 {
    fn from(v: Vec2) -> Self {
        Self { xy: v.to_array() }
    }
}

impl From<GPUVec2> for Vec2 {
    fn from(v: GPUVec2) -> Self {
        Vec2::from_array(v.xy)
    }
}

pub fn to_gpu(values: &[Vec2]) -> Vec<GPUVec2> {
    values.iter().copied().map(GPUVec2::from).collect()
}

/// Readback layout: `n` positions followed by `n` velocities.
pub fn split_readback(data: &[GPUVec2], n: usize) -> Option<(&[GPUVec2], &[GPUVec2])> {
    if data.len() < 2 * n {
        return None;
    }
    let (positions, rest) = data.split_at(n);
    Some((positions, &rest[..n]))
}
