use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bevy::prelude::*;
use bevy::render::extract_resource::{ExtractResource, ExtractResourcePlugin};
use bevy::render::render_resource::{
    BindGroup, BindGroupEntry, BindGroupLayout, BindGroupLayoutEntry, BindingType, Buffer,
    BufferBindingType, BufferDescriptor, BufferInitDescriptor, BufferUsages, ShaderStages,
};
use bevy::render::renderer::{RenderDevice, RenderQueue};
use bevy::render::{Extract, ExtractSchedule, Render, RenderApp, RenderSet};

use crate::cpu::particles::ParticleState;
use crate::error::ParticleError;
use crate::gpu::ffi::{GPUVec2, to_gpu};
use crate::gpu::pipeline::{add_particle_update_node_to_graph, prepare_particle_update_pipeline};
use crate::kernel::workgroup_count;

// ==================== resources ======================================

// GPU compute advances the particles; otherwise the CPU state is streamed up
#[derive(Resource, Clone, Copy, Debug, Default, ExtractResource)]
pub struct UseGpuIntegration(pub bool);

// copy positions + velocities into the readback buffer this frame
#[derive(Resource, Clone, Copy, Debug, Default, ExtractResource)]
pub struct AllowCopy(pub bool);

/// Number of update dispatches recorded so far. Shared between the main and
/// the render world.
#[derive(Resource, Clone, Debug, Default, ExtractResource)]
pub struct GpuStepCounter(pub Arc<AtomicU64>);

impl GpuStepCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn bump(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }
}

/* binding(0): positions (storage, rw)
binding(1): velocities (storage, read-only) */
#[derive(Resource, Clone)]
pub struct ParticleBindGroupLayout(pub BindGroupLayout);

#[derive(Resource, Clone)]
pub struct ParticleBindGroup(pub BindGroup);

#[derive(Resource)]
pub struct ParticleBuffers {
    pub position_buffer: Buffer,
    pub velocity_buffer: Buffer,
    pub num_particles: u32,
}

// MAP_READ target: num_particles positions, then num_particles velocities
#[derive(Resource)]
pub struct ReadbackBuffer {
    pub buffer: Buffer,
    pub num_particles: u32,
}

// Rendering world copies
#[derive(Resource, Clone)]
pub struct ExtractedParticleBuffers {
    pub position_buffer: Buffer,
    pub velocity_buffer: Buffer,
    pub num_particles: u32,
}

#[derive(Resource, Clone)]
pub struct ExtractedReadbackBuffer {
    pub buffer: Buffer,
    pub num_particles: u32,
}

// =====================================================================

// ========================== systems ==================================

// Startup systems that have to run only once

fn init_gpu_buffers(
    mut commands: Commands,
    render_device: Res<RenderDevice>,
    state: Option<Res<ParticleState>>,
) {
    let Some(state) = state else {
        warn!("no ParticleState resource; GPU particle buffers not created");
        return;
    };
    if state.is_empty() {
        warn!("ParticleState is empty; GPU particle buffers not created");
        return;
    }
    if let Err(err) = state.check_lengths() {
        error!("GPU particle buffers not created: {err}");
        return;
    }

    let particle_buffers = match ParticleBuffers::new(&render_device, &state) {
        Ok(buffers) => buffers,
        Err(err) => {
            error!("GPU particle buffers not created: {err}");
            return;
        }
    };
    let readback = ReadbackBuffer::new(&render_device, particle_buffers.num_particles);
    info!(
        "GPU particle buffers ready: {} particles, {} workgroups per step",
        particle_buffers.num_particles,
        workgroup_count(state.len())
    );
    commands.insert_resource(particle_buffers);
    commands.insert_resource(readback);
}

fn init_particle_bind_group_layout(mut commands: Commands, render_device: Res<RenderDevice>) {
    let layout = render_device.create_bind_group_layout(
        Some("particle_update_bind_group_layout"),
        &[
            // binding 0: positions
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::COMPUTE,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // binding 1: velocities
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::COMPUTE,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    );
    commands.insert_resource(ParticleBindGroupLayout(layout));
}

// Update systems that have to run per frame

pub fn queue_particle_buffers(
    state: Option<Res<ParticleState>>,
    use_gpu: Res<UseGpuIntegration>,
    particle_buffers: Option<Res<ParticleBuffers>>,
    render_queue: Res<RenderQueue>,
) {
    let (Some(state), Some(particle_buffers)) = (state, particle_buffers) else {
        return;
    };
    // the GPU owns the positions while it integrates
    if use_gpu.0 || !state.is_changed() {
        return;
    }
    if state.len() != particle_buffers.num_particles as usize || state.check_lengths().is_err() {
        warn!(
            "ParticleState holds {} positions / {} velocities but GPU buffers hold {}; not uploading",
            state.positions.len(),
            state.velocities.len(),
            particle_buffers.num_particles
        );
        return;
    }

    render_queue.write_buffer(
        &particle_buffers.position_buffer,
        0,
        bytemuck::cast_slice(&to_gpu(&state.positions)),
    );
    render_queue.write_buffer(
        &particle_buffers.velocity_buffer,
        0,
        bytemuck::cast_slice(&to_gpu(&state.velocities)),
    );
}

// Extract systems that send from App to Render

fn extract_particle_buffers(
    mut commands: Commands,
    particle_buffers: Extract<Option<Res<ParticleBuffers>>>,
) {
    let Some(particle_buffers) = particle_buffers.as_ref() else {
        return;
    };
    commands.insert_resource(ExtractedParticleBuffers {
        position_buffer: particle_buffers.position_buffer.clone(),
        velocity_buffer: particle_buffers.velocity_buffer.clone(),
        num_particles: particle_buffers.num_particles,
    });
}

fn extract_readback_buffer(mut commands: Commands, readback: Extract<Option<Res<ReadbackBuffer>>>) {
    let Some(readback) = readback.as_ref() else {
        return;
    };
    commands.insert_resource(ExtractedReadbackBuffer {
        buffer: readback.buffer.clone(),
        num_particles: readback.num_particles,
    });
}

fn extract_bind_group_layout(
    mut commands: Commands,
    layout: Extract<Option<Res<ParticleBindGroupLayout>>>,
) {
    let Some(layout) = layout.as_ref() else {
        return;
    };
    commands.insert_resource(ParticleBindGroupLayout(layout.0.clone()));
}

// Prepare systems that run in Render

fn prepare_particle_bind_group(
    mut commands: Commands,
    render_device: Res<RenderDevice>,
    layout: Option<Res<ParticleBindGroupLayout>>,
    extracted: Option<Res<ExtractedParticleBuffers>>,
) {
    let (Some(layout), Some(extracted)) = (layout, extracted) else {
        return;
    };
    let bind_group = render_device.create_bind_group(
        Some("particle_update_bind_group"),
        &layout.0,
        &[
            BindGroupEntry {
                binding: 0,
                resource: extracted.position_buffer.as_entire_binding(),
            },
            BindGroupEntry {
                binding: 1,
                resource: extracted.velocity_buffer.as_entire_binding(),
            },
        ],
    );
    commands.insert_resource(ParticleBindGroup(bind_group));
}

// Implementations

fn element_bytes(count: u32) -> u64 {
    count as u64 * std::mem::size_of::<GPUVec2>() as u64
}

impl ParticleBuffers {
    pub fn new(render_device: &RenderDevice, state: &ParticleState) -> Result<Self, ParticleError> {
        let num_particles = u32::try_from(state.len())
            .map_err(|_| ParticleError::TooManyParticles { count: state.len() })?;
        let usage = BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC;

        // storage buffers with the init data
        let position_buffer = render_device.create_buffer_with_data(&BufferInitDescriptor {
            label: Some("particle_positions"),
            contents: bytemuck::cast_slice(&to_gpu(&state.positions)),
            usage,
        });
        let velocity_buffer = render_device.create_buffer_with_data(&BufferInitDescriptor {
            label: Some("particle_velocities"),
            contents: bytemuck::cast_slice(&to_gpu(&state.velocities)),
            usage,
        });

        Ok(Self {
            position_buffer,
            velocity_buffer,
            num_particles,
        })
    }
}

impl ReadbackBuffer {
    pub fn new(render_device: &RenderDevice, num_particles: u32) -> Self {
        let buffer = render_device.create_buffer(&BufferDescriptor {
            label: Some("particle_readback"),
            size: 2 * element_bytes(num_particles),
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            num_particles,
        }
    }
}

impl ExtractedParticleBuffers {
    pub fn size_bytes(&self) -> u64 {
        element_bytes(self.num_particles)
    }
}

// =====================================================================

// Plugin

pub struct GPUParticlePlugin;

impl Plugin for GPUParticlePlugin {
    fn build(&self, app: &mut App) {
        // App
        app.init_resource::<UseGpuIntegration>()
            .init_resource::<AllowCopy>()
            .init_resource::<GpuStepCounter>()
            .add_plugins((
                ExtractResourcePlugin::<UseGpuIntegration>::default(),
                ExtractResourcePlugin::<AllowCopy>::default(),
                ExtractResourcePlugin::<GpuStepCounter>::default(),
            ))
            .add_systems(
                Startup,
                (init_gpu_buffers, init_particle_bind_group_layout),
            )
            .add_systems(Update, queue_particle_buffers);

        // Render
        let Some(render_app) = app.get_sub_app_mut(RenderApp) else {
            warn!("no RenderApp; GPU particle update disabled");
            return;
        };
        render_app
            .add_systems(
                ExtractSchedule,
                (
                    extract_particle_buffers,
                    extract_readback_buffer,
                    extract_bind_group_layout,
                ),
            )
            .add_systems(
                Render,
                (
                    prepare_particle_bind_group.in_set(RenderSet::PrepareBindGroups),
                    prepare_particle_update_pipeline.in_set(RenderSet::Prepare),
                ),
            );

        add_particle_update_node_to_graph(render_app);
    }
}
