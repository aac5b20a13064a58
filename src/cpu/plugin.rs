use bevy::prelude::*;
use bevy::tasks::{ComputeTaskPool, TaskPool};

use crate::cpu::particles::ParticleState;
use crate::error::ParticleError;
use crate::gpu::buffers::UseGpuIntegration;

/// Steps [`ParticleState`] on the CPU once per frame while the GPU path is
/// not driving the simulation.
pub struct CpuParticlePlugin;

impl Plugin for CpuParticlePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CpuStepFailures>()
            .add_systems(Update, cpu_particle_step);
    }
}

/// Last failed CPU step and how many distinct failures were logged.
#[derive(Resource, Debug, Default)]
pub struct CpuStepFailures {
    pub last: Option<ParticleError>,
    pub reported: usize,
}

impl CpuStepFailures {
    // returns the failure when it differs from the previous frame's
    fn record(&mut self, result: Result<(), ParticleError>) -> Option<&ParticleError> {
        match result {
            Ok(()) => {
                self.last = None;
                None
            }
            Err(err) if self.last.as_ref() == Some(&err) => None,
            Err(err) => {
                self.reported += 1;
                Some(&*self.last.insert(err))
            }
        }
    }
}

fn cpu_particle_step(
    state: Option<ResMut<ParticleState>>,
    use_gpu: Option<Res<UseGpuIntegration>>, // absent in CPU-only apps
    mut failures: ResMut<CpuStepFailures>,
) {
    let Some(mut state) = state else {
        return;
    };
    if use_gpu.is_some_and(|u| u.0) {
        return;
    }

    let pool = ComputeTaskPool::get_or_init(TaskPool::default);
    let result = state.step_parallel(pool);
    // report each distinct failure once, not every frame
    if let Some(err) = failures.record(result) {
        error!("cpu particle step skipped: {err}");
    }
}
