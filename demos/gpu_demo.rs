use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy::render::renderer::RenderDevice;
use bevy_gpu_particles::cpu::particles::ParticleState;
use bevy_gpu_particles::gpu::buffers::{
    AllowCopy, GPUParticlePlugin, GpuStepCounter, ReadbackBuffer, UseGpuIntegration,
    queue_particle_buffers,
};
use bevy_gpu_particles::gpu::readback::{map_readback_blocking, mirror_into};

const RENDER_SCALE: f32 = 350.0;
const PARTICLE_SIZE: f32 = 3.0;
const CYAN: Color = Color::srgb(0.0, 1.0, 1.0);

#[derive(Component)]
struct ParticleVisual(usize);

fn main() {
    App::new()
        .add_plugins((DefaultPlugins, FrameTimeDiagnosticsPlugin::default()))
        .insert_resource(ClearColor(Color::Srgba(
            bevy::color::palettes::css::DARK_SLATE_GRAY,
        )))
        .insert_resource(ParticleState::demo_burst_4k())
        // RUN the GPU integration
        .insert_resource(UseGpuIntegration(true))
        .add_plugins(GPUParticlePlugin)
        .add_systems(Startup, setup)
        .add_systems(Update, sync_sprites_from_gpu.before(queue_particle_buffers))
        .add_systems(Update, log_fps)
        .run();
}

fn setup(mut commands: Commands, state: Res<ParticleState>) {
    commands.spawn(Camera2d::default());

    // one sprite per particle
    for (i, p) in state.positions.iter().enumerate() {
        commands.spawn((
            Sprite {
                color: CYAN,
                custom_size: Some(Vec2::splat(PARTICLE_SIZE)),
                ..Default::default()
            },
            Transform::from_translation(Vec3::new(
                p.x * RENDER_SCALE,
                p.y * RENDER_SCALE,
                0.0,
            )),
            ParticleVisual(i),
        ));
    }
}

// Read the GPU buffers back every few frames:
//   0: allow copy GPU -> readback
//   1: stop copying
//   2: let the copy land
//   3: map, mirror into ParticleState, update sprites
fn sync_sprites_from_gpu(
    mut allow_copy: ResMut<AllowCopy>,
    readback: Option<Res<ReadbackBuffer>>,
    render_device: Res<RenderDevice>,
    mut state: ResMut<ParticleState>,
    mut q: Query<(&ParticleVisual, &mut Transform)>,
    mut fsm: Local<u8>,
) {
    let Some(readback) = readback else { return };

    match *fsm {
        0 => {
            allow_copy.0 = true;
            *fsm = 1;
        }
        1 => {
            allow_copy.0 = false;
            *fsm = 2;
        }
        2 => *fsm = 3,
        3 => {
            *fsm = 0;
            let data = match map_readback_blocking(&render_device, &readback) {
                Ok(data) => data,
                Err(err) => {
                    error!("{err}");
                    return;
                }
            };
            // GPU -> CPU state so switching back to the CPU continues from here
            if let Err(err) = mirror_into(&mut state, &data) {
                error!("{err}");
                return;
            }

            for (vis, mut tf) in q.iter_mut() {
                let Some(p) = state.positions.get(vis.0) else {
                    continue;
                };
                tf.translation.x = p.x * RENDER_SCALE;
                tf.translation.y = p.y * RENDER_SCALE;
            }
        }
        _ => *fsm = 0,
    }
}

fn log_fps(
    diagnostics: Res<DiagnosticsStore>,
    steps: Res<GpuStepCounter>,
    mut counter: Local<u32>,
) {
    *counter += 1;
    if *counter >= 120 {
        *counter = 0;

        if let Some(fps_diag) = diagnostics.get(&FrameTimeDiagnosticsPlugin::FPS) {
            if let Some(avg) = fps_diag.average() {
                info!(
                    "==== Average FPS over last ~2 s: {:.1} ({} GPU steps so far) ====",
                    avg,
                    steps.get()
                );
            }
        }
    }
}
