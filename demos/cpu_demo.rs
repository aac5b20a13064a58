use bevy::prelude::*;
use bevy_gpu_particles::cpu::particles::ParticleState;
use bevy_gpu_particles::cpu::plugin::CpuParticlePlugin;

#[derive(Component)]
struct ParticleVisual(usize);

const RENDER_SCALE: f32 = 350.0; // the +-0.95 box spans ~665 px
const PARTICLE_SIZE: f32 = 3.0;

fn main() {
    let state = ParticleState::demo_burst_4k();
    if let Err(err) = state.check_bounds() {
        eprintln!("demo layout rejected: {err}");
        return;
    }

    App::new()
        .add_plugins(DefaultPlugins)
        .insert_resource(state)
        .add_plugins(CpuParticlePlugin)
        .add_systems(Startup, setup)
        .add_systems(Update, sync_particles)
        .run();
}

// slow = blue, fast = yellow
fn speed_color(t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    Color::srgb(t, t, 1.0 - t)
}

fn setup(mut commands: Commands, state: Res<ParticleState>) {
    commands.spawn(Camera2d::default());

    for (i, p) in state.positions.iter().enumerate() {
        commands.spawn((
            Sprite {
                color: speed_color(0.0),
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

fn sync_particles(
    state: Res<ParticleState>,
    mut query: Query<(&ParticleVisual, &mut Transform, &mut Sprite)>,
) {
    let max_speed = state
        .velocities
        .iter()
        .map(|v| v.length())
        .fold(0.0f32, f32::max);
    let inv = if max_speed > 0.0 { 1.0 / max_speed } else { 0.0 };

    for (visual, mut transform, mut sprite) in query.iter_mut() {
        let Some(p) = state.positions.get(visual.0) else {
            continue;
        };
        transform.translation.x = p.x * RENDER_SCALE;
        transform.translation.y = p.y * RENDER_SCALE;

        let speed = state.velocities.get(visual.0).map_or(0.0, |v| v.length());
        sprite.color = speed_color(speed * inv);
    }
}
