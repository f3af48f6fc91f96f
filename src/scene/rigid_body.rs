//! A rigid cube, held together by shape matching rather than per-edge
//! constraints, dropped onto a floor plane.
//!
//! The original's rigid-body scene builds a cube mesh but never wires it to
//! a shape matcher or any constraints; this factory completes that cube into
//! a fully rigid falling body, fanning the single surface cube out into an
//! `n`×`n`×`n` lattice of particles (an N=1 lattice is exactly the original's
//! 8 corners).
use glam::DVec3;

use crate::constraint::{ConstraintKind, SemiPlaneConstraint};
use crate::error::SceneError;
use crate::geometry::SemiPlane;
use crate::scene::Scene;
use crate::shape_match::ShapeMatcher;
use crate::solver::Solver;

#[derive(Debug)]
pub struct RigidBody {
    solver: Solver,
}

impl RigidBody {
    pub fn new(resolution: usize, half_width: f64) -> Result<RigidBody, SceneError> {
        if resolution == 0 {
            return Err(SceneError::NonPositiveParameter { parameter: "resolution", value: 0.0 });
        }
        if half_width <= 0.0 {
            return Err(SceneError::NonPositiveParameter { parameter: "half_width", value: half_width });
        }

        let positions = cube_grid_points(resolution, half_width);
        let default_mass = 1.0 / positions.len() as f64;
        let mut solver = Solver::new(positions.clone(), default_mass)?;
        let alpha_plane_collision = solver.insert_compliance(1e-8);

        let plane = solver.geometry_mut().insert_plane(SemiPlane::new(DVec3::new(0.0, -1.0, 0.0), DVec3::Y));
        for i in 0..positions.len() {
            solver.add_constraint(ConstraintKind::SemiPlane(SemiPlaneConstraint::new(i, plane, 0.0, alpha_plane_collision)))?;
        }

        let matcher = ShapeMatcher::new(positions.clone());
        solver.activate_rigid(matcher, (0..positions.len()).collect());

        Ok(RigidBody { solver })
    }
}

/// A regular `n`×`n`×`n` grid of points filling the cube
/// `[-half_width, half_width]^3`.
fn cube_grid_points(resolution: usize, half_width: f64) -> Vec<DVec3> {
    if resolution == 1 {
        let w = half_width;
        return vec![
            DVec3::new(-w, -w, -w),
            DVec3::new(w, -w, -w),
            DVec3::new(-w, w, -w),
            DVec3::new(w, w, -w),
            DVec3::new(-w, -w, w),
            DVec3::new(w, -w, w),
            DVec3::new(-w, w, w),
            DVec3::new(w, w, w),
        ];
    }

    let n = resolution + 1;
    let step = 2.0 * half_width / resolution as f64;
    let mut points = Vec::with_capacity(n * n * n);
    for ix in 0..n {
        for iy in 0..n {
            for iz in 0..n {
                points.push(DVec3::new(
                    -half_width + ix as f64 * step,
                    -half_width + iy as f64 * step,
                    -half_width + iz as f64 * step,
                ));
            }
        }
    }
    points
}

impl Scene for RigidBody {
    fn name(&self) -> &'static str {
        "rigid_body"
    }
    fn solver(&self) -> &Solver {
        &self.solver
    }
    fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }
}
