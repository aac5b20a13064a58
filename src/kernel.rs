// particle update kernel, CPU side (mirrors assets/shaders/particle_update.wgsl)
use glam::Vec2;

// open square boundary, same on both axes
pub const BOUNDARY: f32 = 0.95;
pub const REINJECT_VELOCITY_SCALE: f32 = -2.0;
pub const REINJECT_POSITION_SCALE: f32 = 0.05;

// must match @workgroup_size in the shader
pub const WORKGROUP_SIZE: u32 = 64;

#[inline]
fn out_of_bounds(p: Vec2) -> bool {
    p.x > BOUNDARY || p.x < -BOUNDARY || p.y > BOUNDARY || p.y < -BOUNDARY
}

/// Advances one particle by its velocity. A candidate position outside the
/// boundary is replaced by `-2 * v + p' * 0.05` (re-injected near the origin,
/// heading back the way it came).
#[inline]
pub fn update_particle(position: Vec2, velocity: Vec2) -> Vec2 {
    let candidate = position + velocity;
    if out_of_bounds(candidate) {
        REINJECT_VELOCITY_SCALE * velocity + candidate * REINJECT_POSITION_SCALE
    } else {
        candidate
    }
}

/// One kernel pass over a slice, in place. Only the common prefix of the two
/// slices is touched.
pub fn update_positions(positions: &mut [Vec2], velocities: &[Vec2]) {
    for (p, &v) in positions.iter_mut().zip(velocities) {
        *p = update_particle(*p, v);
    }
}

/// Number of work-groups needed to cover `n` invocations, for a GPU
/// dispatch. Saturates at `u32::MAX` when the count does not fit.
#[inline]
pub fn workgroup_count(n: usize) -> u32 {
    u32::try_from(n.div_ceil(WORKGROUP_SIZE as usize)).unwrap_or(u32::MAX)
}

/// Elements per CPU task when `n` invocations are split over `tasks` tasks.
/// Always a non-zero multiple of the work-group size.
#[inline]
pub fn task_chunk_len(n: usize, tasks: usize) -> usize {
    let groups = n.div_ceil(WORKGROUP_SIZE as usize);
    let groups_per_task = groups.div_ceil(tasks.max(1)).max(1);
    groups_per_task.saturating_mul(WORKGROUP_SIZE as usize)
}
