//! Extended Position-Based Dynamics: a constraint-projection physics core
//! built around a closed library of constraints (distances, planes,
//! cylinders, bending, tetrahedral and mesh volume, SPH density), a uniform
//! spatial hash shared by collision and fluid-neighbor queries, a rigid
//! shape-matching operator, and an XPBD solver that projects them with
//! compliance and substep damping. [`scene`] assembles these primitives into
//! runnable scenarios.
pub mod compliance;
pub mod constraint;
pub mod error;
pub mod geometry;
pub mod scene;
pub mod shape_match;
pub mod solver;
pub mod spatial_grid;

pub use compliance::{ComplianceArena, ComplianceHandle};
pub use constraint::{ConstraintBehavior, ConstraintKind, FluidParams};
pub use error::{SceneError, SolverError};
pub use geometry::{Cylinder, CylinderHandle, GeometryArena, PlaneHandle, PointHandle, SemiPlane};
pub use scene::Scene;
pub use shape_match::ShapeMatcher;
pub use solver::Solver;
pub use spatial_grid::SpatialGrid;
