//! A box of randomly-packed spheres settling under gravity and pairwise
//! minimum-distance repulsion (no spatial hash — every pair gets its own
//! permanent constraint, fine at this particle count).
use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constraint::{ConstraintKind, MinDistanceConstraint, SemiPlaneConstraint};
use crate::error::SceneError;
use crate::scene::{box_planes, Scene};
use crate::solver::Solver;

#[derive(Debug)]
pub struct Spheres {
    solver: Solver,
    radius: f64,
}

impl Spheres {
    pub fn new(count: usize, radius: f64, seed: u64) -> Result<Spheres, SceneError> {
        if count == 0 {
            return Err(SceneError::EmptyParticleSet);
        }
        if radius <= 0.0 {
            return Err(SceneError::NonPositiveParameter { parameter: "radius", value: radius });
        }

        let bound = 1.0 - radius;
        let mut rng = StdRng::seed_from_u64(seed);
        let positions: Vec<DVec3> = (0..count)
            .map(|_| DVec3::new(rng.gen_range(-bound..bound), rng.gen_range(-bound..bound), rng.gen_range(-bound..bound)))
            .collect();

        let mut solver = Solver::new(positions, 0.1)?;
        let alpha_plane_collision = solver.insert_compliance(1e-8);
        let alpha_collision = solver.insert_compliance(1e-8);

        let planes: Vec<_> = box_planes(1.0, false)
            .into_iter()
            .map(|p| solver.geometry_mut().insert_plane(p))
            .collect();

        for i in 0..count {
            for &plane in &planes {
                solver.add_constraint(ConstraintKind::SemiPlane(SemiPlaneConstraint::new(i, plane, radius, alpha_plane_collision)))?;
            }
            for j in 0..i {
                solver.add_constraint(ConstraintKind::MinDistance(MinDistanceConstraint::new(i, j, 2.0 * radius, alpha_collision)))?;
            }
        }

        Ok(Spheres { solver, radius })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl Scene for Spheres {
    fn name(&self) -> &'static str {
        "spheres"
    }
    fn solver(&self) -> &Solver {
        &self.solver
    }
    fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }
}
