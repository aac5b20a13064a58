use bevy::prelude::*;
use bevy_gpu_particles::cpu::particles::ParticleState;
use bevy_gpu_particles::cpu::plugin::{CpuParticlePlugin, CpuStepFailures};
use bevy_gpu_particles::error::ParticleError;
use bevy_gpu_particles::gpu::buffers::UseGpuIntegration;
use bevy_gpu_particles::kernel::update_particle;

// 150 particles: three work-groups, the last one partial
fn escaping_state() -> ParticleState {
    let mut state = ParticleState::new();
    for i in 0..150 {
        let t = i as f32 / 150.0;
        let pos = glam::Vec2::new(1.8 * t - 0.9, 0.5 - t * 0.9);
        let vel = glam::Vec2::new((t * 23.0).sin(), (t * 7.0).cos()) * 0.07;
        state.push(pos, vel);
    }
    state
}

fn app_with(state: ParticleState) -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(state)
        .add_plugins(CpuParticlePlugin);
    app
}

#[test]
fn one_update_is_one_kernel_pass() {
    let start = escaping_state();
    let mut app = app_with(start.clone());

    app.update();

    let state = app.world().resource::<ParticleState>();
    assert_eq!(state.velocities, start.velocities);
    for (i, p) in state.positions.iter().enumerate() {
        assert_eq!(
            *p,
            update_particle(start.positions[i], start.velocities[i]),
            "particle {i}"
        );
    }
}

#[test]
fn gpu_integration_switch_stops_cpu_steps() {
    let mut app = app_with(escaping_state());
    app.update();
    let after_one = app.world().resource::<ParticleState>().clone();

    app.insert_resource(UseGpuIntegration(true));
    app.update();
    app.update();
    assert_eq!(*app.world().resource::<ParticleState>(), after_one);

    // switching back resumes stepping
    app.insert_resource(UseGpuIntegration(false));
    app.update();
    assert_ne!(*app.world().resource::<ParticleState>(), after_one);
}

#[test]
fn mismatched_state_is_left_alone_and_reported_once() {
    let mut broken = escaping_state();
    broken.velocities.pop();
    let mut app = app_with(broken.clone());

    for _ in 0..3 {
        app.update();
    }

    assert_eq!(*app.world().resource::<ParticleState>(), broken);
    let failures = app.world().resource::<CpuStepFailures>();
    assert_eq!(failures.reported, 1);
    assert_eq!(
        failures.last,
        Some(ParticleError::LengthMismatch {
            positions: 150,
            velocities: 149
        })
    );
}

#[test]
fn failure_clears_after_a_good_step_and_new_failures_are_reported() {
    let mut broken = escaping_state();
    broken.velocities.pop();
    let mut app = app_with(broken);
    app.update();

    // repair: drop the extra position
    app.world_mut().resource_mut::<ParticleState>().positions.pop();
    app.update();
    assert_eq!(app.world().resource::<CpuStepFailures>().last, None);

    // break again: the same error is new after a successful step
    app.world_mut().resource_mut::<ParticleState>().velocities.pop();
    app.update();
    app.update();
    let failures = app.world().resource::<CpuStepFailures>();
    assert_eq!(failures.reported, 2);
}
