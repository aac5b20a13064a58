/* compute pass setup follows bevy's compute_shader_game_of_life example:
one pipeline, one bind group, one node ahead of the camera driver */

use std::borrow::Cow;

use bevy::prelude::*;
use bevy::render::graph::CameraDriverLabel;
use bevy::render::render_graph::{
    Node, NodeRunError, RenderGraph, RenderGraphContext, RenderLabel,
};
use bevy::render::render_resource::{
    CachedComputePipelineId, CachedPipelineState, ComputePassDescriptor, ComputePipeline,
    ComputePipelineDescriptor, PipelineCache, PipelineCacheError, PushConstantRange, ShaderDefVal,
};
use bevy::render::renderer::RenderContext;

use crate::gpu::buffers::{
    AllowCopy, ExtractedParticleBuffers, ExtractedReadbackBuffer, GpuStepCounter,
    ParticleBindGroup, ParticleBindGroupLayout, UseGpuIntegration,
};
use crate::kernel::workgroup_count;

pub const PARTICLE_UPDATE_SHADER: &str = "shaders/particle_update.wgsl";

#[derive(Resource)]
pub struct ParticleUpdatePipeline(pub ComputePipeline);

#[derive(Debug, Hash, PartialEq, Eq, Clone, RenderLabel)]
pub struct ParticleUpdatePassLabel;

#[derive(Default)]
struct ParticleUpdateNode;

impl Node for ParticleUpdateNode {
    fn run(
        &self,
        _graph: &mut RenderGraphContext,
        render_context: &mut RenderContext,
        world: &World,
    ) -> Result<(), NodeRunError> {
        let Some(buffers) = world.get_resource::<ExtractedParticleBuffers>() else {
            return Ok(());
        };

        let use_gpu = world
            .get_resource::<UseGpuIntegration>()
            .is_some_and(|u| u.0);
        let pipeline = world.get_resource::<ParticleUpdatePipeline>();
        let bind_group = world.get_resource::<ParticleBindGroup>();

        // nothing to dispatch until the pipeline has compiled
        if let (true, Some(pipeline), Some(bind_group)) = (use_gpu, pipeline, bind_group) {
            let workgroups = workgroup_count(buffers.num_particles as usize);
            {
                let mut pass = render_context
                    .command_encoder()
                    .begin_compute_pass(&ComputePassDescriptor::default());

                pass.set_pipeline(&pipeline.0);
                pass.set_bind_group(0, &bind_group.0, &[]);
                pass.dispatch_workgroups(workgroups, 1, 1);
            }
            if let Some(counter) = world.get_resource::<GpuStepCounter>() {
                counter.bump();
            }
        }

        let allow_copy = world.get_resource::<AllowCopy>().is_some_and(|c| c.0);
        if !allow_copy {
            return Ok(());
        }
        let Some(readback) = world.get_resource::<ExtractedReadbackBuffer>() else {
            return Ok(());
        };
        if readback.num_particles != buffers.num_particles {
            return Ok(());
        }

        // positions first, velocities right after
        let size = buffers.size_bytes();
        let encoder = render_context.command_encoder();
        encoder.copy_buffer_to_buffer(&buffers.position_buffer, 0, &readback.buffer, 0, size);
        encoder.copy_buffer_to_buffer(&buffers.velocity_buffer, 0, &readback.buffer, size, size);

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ErrorReport {
    Retry,  // transient, the cache retries
    First,  // new failure, worth an error line
    Repeat, // same failure as last frame
}

/// Remembers the last pipeline failure so a broken shader is reported once
/// instead of every frame.
#[derive(Debug, Default)]
pub struct PipelineErrorLog {
    last: Option<String>,
}

impl PipelineErrorLog {
    pub fn classify(&mut self, retryable: bool, message: String) -> ErrorReport {
        if retryable {
            return ErrorReport::Retry;
        }
        if self.last.as_deref() == Some(message.as_str()) {
            return ErrorReport::Repeat;
        }
        self.last = Some(message);
        ErrorReport::First
    }

    pub fn clear(&mut self) {
        self.last = None;
    }
}

pub fn prepare_particle_update_pipeline(
    mut commands: Commands,
    pipeline_cache: Res<PipelineCache>,
    layout: Option<Res<ParticleBindGroupLayout>>,
    assets: Res<AssetServer>,
    mut pipeline_id: Local<Option<CachedComputePipelineId>>,
    mut ready: Local<bool>,
    mut errors: Local<PipelineErrorLog>,
) {
    if *ready {
        return;
    }
    let Some(layout) = layout else {
        return;
    };

    let Some(id) = *pipeline_id else {
        let shader: Handle<Shader> = assets.load(PARTICLE_UPDATE_SHADER);
        let desc = ComputePipelineDescriptor {
            label: Some("particle_update_pipeline".into()),
            layout: vec![layout.0.clone()],
            push_constant_ranges: Vec::<PushConstantRange>::new(),
            shader,
            shader_defs: Vec::<ShaderDefVal>::new(),
            entry_point: Cow::from("main"),
            zero_initialize_workgroup_memory: false,
        };
        *pipeline_id = Some(pipeline_cache.queue_compute_pipeline(desc));
        info!("particle_update_pipeline QUEUED");
        return; // waits for compilation
    };

    match pipeline_cache.get_compute_pipeline_state(id) {
        CachedPipelineState::Ok(_) => {
            if let Some(pipeline) = pipeline_cache.get_compute_pipeline(id) {
                commands.insert_resource(ParticleUpdatePipeline(pipeline.clone()));
                *ready = true;
                errors.clear();
                info!("particle_update_pipeline READY");
            }
        }
        CachedPipelineState::Err(err) => {
            // the cache re-queues these on its own once the asset is in
            let retryable = matches!(
                err,
                PipelineCacheError::ShaderNotLoaded(_)
                    | PipelineCacheError::ShaderImportNotYetAvailable
            );
            match errors.classify(retryable, err.to_string()) {
                ErrorReport::Retry => debug!("particle_update_pipeline waiting: {err}"),
                ErrorReport::First => error!("particle_update_pipeline ERROR: {err}"),
                ErrorReport::Repeat => {}
            }
        }
        CachedPipelineState::Queued | CachedPipelineState::Creating(_) => {}
    }
}

pub fn add_particle_update_node_to_graph(render_app: &mut bevy::app::SubApp) {
    let mut graph = render_app.world_mut().resource_mut::<RenderGraph>();
    graph.add_node(ParticleUpdatePassLabel, ParticleUpdateNode);
    graph.add_node_edge(ParticleUpdatePassLabel, CameraDriverLabel);
}
