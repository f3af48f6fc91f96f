//! Configuration-error taxonomy (see the Error Handling Design section of the
//! requirements doc). Numerical degeneracies inside constraints are not errors
//! — they resolve to a skipped update and are logged at `trace` level instead.
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SolverError {
    #[error("solver requires at least one particle")]
    EmptyParticleSet,

    #[error("default mass must be finite and positive, got {0}")]
    InvalidDefaultMass(f64),

    #[error("constraint {constraint_index} references particle {particle_index}, but only {particle_count} particles exist")]
    ParticleIndexOutOfRange {
        constraint_index: usize,
        particle_index: usize,
        particle_count: usize,
    },

    #[error("expected {expected} positions, got {got}")]
    PositionCountMismatch { expected: usize, got: usize },
}

#[derive(Debug, Error, PartialEq)]
pub enum SceneError {
    #[error("scene requires at least one particle")]
    EmptyParticleSet,

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("{parameter} must be positive, got {value}")]
    NonPositiveParameter { parameter: &'static str, value: f64 },

    #[error("mesh descriptor has {vertex_count} vertices but indices reference up to {max_index}")]
    MeshIndexOutOfRange { vertex_count: usize, max_index: usize },
}
