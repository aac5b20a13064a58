// particle state and host-side dispatch of the update kernel (CPU)
use bevy::prelude::Resource;
use bevy::tasks::TaskPool;
use glam::Vec2;

use crate::error::ParticleError;
use crate::kernel::{BOUNDARY, task_chunk_len, update_positions};

#[derive(Resource, Clone, Debug, Default, PartialEq)]
pub struct ParticleState {
    pub positions: Vec<Vec2>,  // written by the kernel
    pub velocities: Vec<Vec2>, // read-only for the kernel
}

impl ParticleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(positions: Vec<Vec2>, velocities: Vec<Vec2>) -> Result<Self, ParticleError> {
        let state = Self { positions, velocities };
        state.check_lengths()?;
        Ok(state)
    }

    pub fn push(&mut self, position: Vec2, velocity: Vec2) {
        self.positions.push(position);
        self.velocities.push(velocity);
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    // n_x * n_y particles centred on the origin, x fastest, at rest
    pub fn init_grid(&mut self, n_x: usize, n_y: usize, spacing: f32) {
        let extent = Vec2::new(n_x.saturating_sub(1) as f32, n_y.saturating_sub(1) as f32);
        let half = extent * spacing * 0.5;

        self.positions.reserve(n_x * n_y);
        self.velocities.reserve(n_x * n_y);
        for iy in 0..n_y {
            for ix in 0..n_x {
                let pos = Vec2::new(ix as f32, iy as f32) * spacing - half;
                self.push(pos, Vec2::ZERO);
            }
        }
    }

    // outward push plus a spin around the origin
    pub fn set_swirl_velocities(&mut self, radial: f32, tangential: f32) {
        for (v, p) in self.velocities.iter_mut().zip(&self.positions) {
            *v = *p * radial + p.perp() * tangential;
        }
    }

    pub fn check_lengths(&self) -> Result<(), ParticleError> {
        if self.positions.len() != self.velocities.len() {
            return Err(ParticleError::LengthMismatch {
                positions: self.positions.len(),
                velocities: self.velocities.len(),
            });
        }
        Ok(())
    }

    /// Positions are expected to start strictly inside the boundary.
    pub fn check_bounds(&self) -> Result<(), ParticleError> {
        let inside = |c: f32| c > -BOUNDARY && c < BOUNDARY; // NaN fails both
        match self
            .positions
            .iter()
            .position(|p| !(inside(p.x) && inside(p.y)))
        {
            Some(index) => Err(ParticleError::OutOfBounds {
                index,
                position: self.positions[index],
            }),
            None => Ok(()),
        }
    }

    pub fn step(&mut self) -> Result<(), ParticleError> {
        self.check_lengths()?;
        update_positions(&mut self.positions, &self.velocities);
        Ok(())
    }

    /// Same result as [`step`](Self::step), spread over `pool`. Every task
    /// gets a run of whole work-groups; tasks run in no particular order.
    pub fn step_parallel(&mut self, pool: &TaskPool) -> Result<(), ParticleError> {
        self.check_lengths()?;
        if self.is_empty() {
            return Ok(());
        }

        let chunk = task_chunk_len(self.len(), pool.thread_num());

        let chunks = self
            .positions
            .chunks_mut(chunk)
            .zip(self.velocities.chunks(chunk));
        pool.scope(|scope| {
            for (pos, vel) in chunks {
                scope.spawn(async move { update_positions(pos, vel) });
            }
        });
        Ok(())
    }

    // demo function ----------------------------------------------
    pub fn demo_burst_4k() -> Self {
        let mut demo = Self::new();
        demo.init_grid(64, 64, 0.02);
        demo.set_swirl_velocities(0.004, 0.01);
        demo
    }
    // ------------------------------------------------------------
}
