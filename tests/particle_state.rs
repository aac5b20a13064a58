use bevy::tasks::TaskPool;
use bevy_gpu_particles::cpu::particles::ParticleState;
use bevy_gpu_particles::error::ParticleError;
use bevy_gpu_particles::kernel::update_particle;
use glam::Vec2;

// deterministic mix of in-bounds and escaping particles
fn mixed_state(n: usize) -> ParticleState {
    let mut state = ParticleState::new();
    for i in 0..n {
        let t = i as f32 / n.max(1) as f32;
        let pos = Vec2::new(1.8 * t - 0.9, 0.9 - 1.8 * t) * 0.99;
        let vel = Vec2::new((t * 37.0).sin(), (t * 11.0).cos()) * 0.08;
        state.push(pos, vel);
    }
    state
}

#[test]
fn init_grid_n() {
    let mut state = ParticleState::new();
    state.init_grid(10, 5, 0.1);
    assert_eq!(state.len(), 50); // 10 * 5
    assert_eq!(state.velocities.len(), 50);
    assert!(state.velocities.iter().all(|v| *v == Vec2::ZERO));

    // centred on the origin, x fastest
    assert!(state.positions[0].abs_diff_eq(Vec2::new(-0.45, -0.2), 1e-6));
    assert!(state.positions[1].abs_diff_eq(Vec2::new(-0.35, -0.2), 1e-6));
    assert!(state.positions[10].abs_diff_eq(Vec2::new(-0.45, -0.1), 1e-6));
    assert!(state.positions[49].abs_diff_eq(Vec2::new(0.45, 0.2), 1e-6));
}

#[test]
fn demo_burst_starts_in_bounds() {
    let state = ParticleState::demo_burst_4k();
    assert_eq!(state.len(), 4096);
    assert_eq!(state.check_lengths(), Ok(()));
    assert_eq!(state.check_bounds(), Ok(()));
    assert!(state.velocities.iter().any(|v| *v != Vec2::ZERO));
}

#[test]
fn swirl_velocities() {
    let mut state = ParticleState::new();
    state.push(Vec2::new(0.5, 0.0), Vec2::ZERO);
    state.set_swirl_velocities(0.1, 0.2);
    assert!(state.velocities[0].abs_diff_eq(Vec2::new(0.05, 0.1), 1e-6));
}

#[test]
fn from_parts_checks_lengths() {
    let err = ParticleState::from_parts(vec![Vec2::ZERO; 3], vec![Vec2::ZERO; 2]).unwrap_err();
    assert_eq!(
        err,
        ParticleError::LengthMismatch {
            positions: 3,
            velocities: 2
        }
    );
    assert!(ParticleState::from_parts(vec![Vec2::ZERO; 2], vec![Vec2::ZERO; 2]).is_ok());
}

#[test]
fn step_refuses_mismatched_arrays() {
    let mut state = mixed_state(8);
    state.velocities.pop();
    let before = state.clone();

    assert!(matches!(state.step(), Err(ParticleError::LengthMismatch { .. })));
    let pool = TaskPool::new();
    assert!(matches!(state.step_parallel(&pool), Err(ParticleError::LengthMismatch { .. })));
    assert_eq!(state, before);
}

#[test]
fn check_bounds_reports_first_offender() {
    let mut state = ParticleState::new();
    state.push(Vec2::new(0.0, 0.0), Vec2::ZERO);
    state.push(Vec2::new(0.0, 0.95), Vec2::ZERO); // on the open boundary
    state.push(Vec2::new(2.0, 0.0), Vec2::ZERO);
    assert_eq!(
        state.check_bounds(),
        Err(ParticleError::OutOfBounds {
            index: 1,
            position: Vec2::new(0.0, 0.95)
        })
    );

    let mut nan = ParticleState::new();
    nan.push(Vec2::new(f32::NAN, 0.0), Vec2::ZERO);
    assert!(matches!(nan.check_bounds(), Err(ParticleError::OutOfBounds { index: 0, .. })));
}

#[test]
fn step_matches_single_particle_runs() {
    let mut state = mixed_state(200);
    let original = state.clone();
    state.step().unwrap();

    for i in 0..original.len() {
        let mut single = ParticleState::new();
        single.push(original.positions[i], original.velocities[i]);
        single.step().unwrap();
        assert_eq!(single.positions[0], state.positions[i], "particle {i}");
        assert_eq!(
            state.positions[i],
            update_particle(original.positions[i], original.velocities[i])
        );
    }
}

#[test]
fn step_never_touches_velocities() {
    let mut state = mixed_state(130);
    let velocities = state.velocities.clone();
    for _ in 0..50 {
        state.step().unwrap();
    }
    assert_eq!(state.velocities, velocities);
}

#[test]
fn parallel_step_matches_sequential() {
    let pool = TaskPool::new();
    // 1000 is not a multiple of the workgroup size
    for n in [0, 1, 63, 64, 65, 1000] {
        let mut sequential = mixed_state(n);
        let mut parallel = sequential.clone();
        for _ in 0..20 {
            sequential.step().unwrap();
            parallel.step_parallel(&pool).unwrap();
        }
        assert_eq!(parallel, sequential, "n = {n}");
    }
}

#[test]
fn particles_keep_reinjecting_inside_the_box() {
    let mut state = ParticleState::demo_burst_4k();
    for _ in 0..500 {
        state.step().unwrap();
    }
    // a re-injected particle lands near the origin, so nothing drifts far out
    assert!(state.positions.iter().all(|p| p.abs().max_element() < 1.0));
}
