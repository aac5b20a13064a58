use bevy::app::AppExit;
use bevy::prelude::*;
use bevy::render::renderer::RenderDevice;
use bevy_gpu_particles::cpu::particles::ParticleState;
use bevy_gpu_particles::gpu::buffers::{
    AllowCopy, GPUParticlePlugin, GpuStepCounter, ReadbackBuffer, UseGpuIntegration,
};
use bevy_gpu_particles::gpu::ffi::split_readback;
use bevy_gpu_particles::gpu::readback::map_readback_blocking;

const STEPS: u64 = 100; // <- compare after at least this many GPU steps

// untouched copy of the starting layout, replayed on the CPU at the end
#[derive(Resource)]
struct Initial(ParticleState);

fn main() {
    let state = ParticleState::demo_burst_4k();
    App::new()
        .add_plugins(DefaultPlugins)
        .insert_resource(Initial(state.clone()))
        .insert_resource(state)
        .insert_resource(UseGpuIntegration(true))
        .add_plugins(GPUParticlePlugin)
        .add_systems(Startup, |mut commands: Commands| {
            commands.spawn(Camera2d::default());
        })
        .add_systems(Update, orchestrate)
        .run();
}

fn orchestrate(
    mut allow_copy: ResMut<AllowCopy>,
    mut use_gpu: ResMut<UseGpuIntegration>,
    steps: Res<GpuStepCounter>,
    initial: Res<Initial>,
    readback: Option<Res<ReadbackBuffer>>,
    render_device: Res<RenderDevice>,
    mut exit: EventWriter<AppExit>,
    mut state: Local<u8>,
) {
    let Some(readback) = readback else { return };

    match *state {
        // stop integrating and copy in the same frame, so the copy sees the
        // last dispatched step
        0 => {
            if steps.get() >= STEPS {
                use_gpu.0 = false;
                allow_copy.0 = true;
                *state = 1;
            }
        }

        // avoid mapping race
        1 => {
            allow_copy.0 = false;
            *state = 2;
        }
        2 => *state = 3,

        3 => {
            let gpu_steps = steps.get();
            let data = match map_readback_blocking(&render_device, &readback) {
                Ok(data) => data,
                Err(err) => {
                    error!("{err}; exiting");
                    exit.write(AppExit::error());
                    return;
                }
            };
            let n = initial.0.len();
            let Some((gpu_pos, gpu_vel)) = split_readback(&data, n) else {
                error!("readback holds {} elements for {} particles", data.len(), n);
                exit.write(AppExit::error());
                return;
            };

            let mut cpu = initial.0.clone();
            for _ in 0..gpu_steps {
                if let Err(err) = cpu.step() {
                    error!("{err}");
                    exit.write(AppExit::error());
                    return;
                }
            }

            let mut max_abs_x = 0.0f32;
            let mut worst = 0usize;
            for (i, (c, g)) in cpu.positions.iter().zip(gpu_pos).enumerate() {
                let d = (glam::Vec2::from(*g) - *c).length();
                if d > max_abs_x {
                    max_abs_x = d;
                    worst = i;
                }
            }
            let velocities_untouched = initial
                .0
                .velocities
                .iter()
                .zip(gpu_vel)
                .all(|(c, g)| glam::Vec2::from(*g) == *c);

            info!(
                "{}-step parity: max_abs |x| = {:.3e} (particle {})  velocities untouched: {}",
                gpu_steps, max_abs_x, worst, velocities_untouched
            );
            // FMA on the GPU can move the last bit; anything larger is a real mismatch
            if max_abs_x > 1e-4 || !velocities_untouched {
                warn!("GPU and CPU kernels disagree");
            }

            info!("Done. Exiting.");
            exit.write(AppExit::Success);
        }

        _ => {}
    }
}
