use bevy_gpu_particles::cpu::particles::ParticleState;
use bevy_gpu_particles::error::ParticleError;
use bevy_gpu_particles::gpu::ffi::{GPUVec2, split_readback, to_gpu};
use bevy_gpu_particles::gpu::readback::mirror_into;
use glam::Vec2;

#[test]
fn gpu_vec2_is_tightly_packed() {
    // WGSL array<vec2<f32>> has an 8 byte stride
    assert_eq!(std::mem::size_of::<GPUVec2>(), 8);
    assert_eq!(std::mem::align_of::<GPUVec2>(), 4);

    let data = to_gpu(&[Vec2::new(1.0, 2.0), Vec2::new(-3.0, 0.5)]);
    let floats: &[f32] = bytemuck::cast_slice(&data);
    assert_eq!(floats, &[1.0, 2.0, -3.0, 0.5]);
}

#[test]
fn split_readback_layout() {
    let data = to_gpu(&[
        Vec2::new(0.1, 0.2),
        Vec2::new(0.3, 0.4),
        Vec2::new(1.0, 0.0),
        Vec2::new(0.0, 1.0),
    ]);
    let (positions, velocities) = split_readback(&data, 2).unwrap();
    assert_eq!(positions, &data[..2]);
    assert_eq!(velocities, &data[2..]);

    assert!(split_readback(&data, 3).is_none());
}

#[test]
fn mirror_into_copies_both_halves() {
    let mut state = ParticleState::new();
    state.push(Vec2::ZERO, Vec2::ZERO);
    state.push(Vec2::ZERO, Vec2::ZERO);

    let data = to_gpu(&[
        Vec2::new(0.1, 0.2),
        Vec2::new(0.3, 0.4),
        Vec2::new(0.01, 0.0),
        Vec2::new(0.0, 0.02),
    ]);
    mirror_into(&mut state, &data).unwrap();

    assert_eq!(state.positions, vec![Vec2::new(0.1, 0.2), Vec2::new(0.3, 0.4)]);
    assert_eq!(state.velocities, vec![Vec2::new(0.01, 0.0), Vec2::new(0.0, 0.02)]);
}

#[test]
fn mirror_into_rejects_wrong_size() {
    let mut state = ParticleState::new();
    state.push(Vec2::ZERO, Vec2::ZERO);
    let before = state.clone();

    let data = vec![GPUVec2::default(); 4];
    assert_eq!(
        mirror_into(&mut state, &data),
        Err(ParticleError::ReadbackSizeMismatch {
            expected: 1,
            actual: 2
        })
    );
    assert_eq!(state, before);
}
