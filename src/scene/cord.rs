//! A hanging chain of distance-constrained particles, pinned at one end.
use glam::DVec3;

use crate::constraint::{ConstraintKind, DistanceConstraint};
use crate::error::SceneError;
use crate::scene::Scene;
use crate::solver::Solver;

#[derive(Debug)]
pub struct Cord {
    solver: Solver,
}

impl Cord {
    pub fn new(n_particles: usize, distance: f64) -> Result<Cord, SceneError> {
        if n_particles == 0 {
            return Err(SceneError::EmptyParticleSet);
        }
        if distance <= 0.0 {
            return Err(SceneError::NonPositiveParameter { parameter: "distance", value: distance });
        }

        let positions: Vec<DVec3> = (0..n_particles).map(|i| DVec3::new(distance * i as f64, 0.0, 0.0)).collect();
        let mut solver = Solver::new(positions, 0.1)?;

        let alpha_distance = solver.insert_compliance(1e-8);
        for i in 0..n_particles - 1 {
            solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(i, i + 1, distance, alpha_distance)))?;
        }
        solver.add_fixed_point(0);

        Ok(Cord { solver })
    }
}

impl Scene for Cord {
    fn name(&self) -> &'static str {
        "cord"
    }
    fn solver(&self) -> &Solver {
        &self.solver
    }
    fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }
}
