//! Errors raised by the host side of the particle simulation.
//!
//! The update kernel itself has no error channel. Everything here is a
//! contract check performed before a dispatch or after a GPU readback.

use glam::Vec2;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParticleError {
    /// Position and velocity arrays must have one entry per particle.
    #[error("particle arrays differ in length: {positions} positions, {velocities} velocities")]
    LengthMismatch { positions: usize, velocities: usize },

    /// A particle starts outside the open boundary.
    #[error("particle {index} starts out of bounds at {position}")]
    OutOfBounds { index: usize, position: Vec2 },

    /// GPU buffers index particles with `u32`.
    #[error("{count} particles do not fit a GPU dispatch")]
    TooManyParticles { count: usize },

    #[error("mapping the readback buffer failed")]
    ReadbackMapFailed,

    /// The readback holds a different particle count than the CPU state.
    #[error("readback holds {actual} particles, expected {expected}")]
    ReadbackSizeMismatch { expected: usize, actual: usize },
}
