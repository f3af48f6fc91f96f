//! A block of SPH fluid particles settling under gravity inside a closed box.
use glam::DVec3;

use crate::constraint::{ConstraintKind, FluidParams, SemiPlaneConstraint};
use crate::error::SceneError;
use crate::scene::{box_planes, Scene};
use crate::solver::Solver;

const PARTICLE_RADIUS: f64 = 0.01;

#[derive(Debug)]
pub struct Fluid {
    solver: Solver,
}

impl Fluid {
    pub fn new(size_x: usize, size_y: usize, size_z: usize) -> Result<Fluid, SceneError> {
        if size_x == 0 || size_y == 0 || size_z == 0 {
            return Err(SceneError::EmptyParticleSet);
        }

        let spacing = 2.0 * PARTICLE_RADIUS;
        let mut positions = Vec::with_capacity(size_x * size_y * size_z);
        for ix in 0..size_x {
            for iy in 0..size_y {
                for iz in 0..size_z {
                    positions.push(DVec3::new(
                        (ix as f64 - size_x as f64 / 2.0) * spacing,
                        iy as f64 * spacing - 0.9,
                        (iz as f64 - size_z as f64 / 2.0) * spacing,
                    ));
                }
            }
        }

        let params = FluidParams { h: 4.0 * PARTICLE_RADIUS, d0: 1000.0, m: 1000.0 * (4.0 * PARTICLE_RADIUS).powi(3) };
        let default_mass = params.m;
        let mut solver = Solver::new(positions.clone(), default_mass)?;
        let alpha_plane_collision = solver.insert_compliance(1e-8);

        let planes: Vec<_> = box_planes(1.0, true).into_iter().map(|p| solver.geometry_mut().insert_plane(p)).collect();
        for i in 0..positions.len() {
            for &plane in &planes {
                solver.add_constraint(ConstraintKind::SemiPlane(SemiPlaneConstraint::new(i, plane, PARTICLE_RADIUS, alpha_plane_collision)))?;
            }
        }

        let all_ids: Vec<usize> = (0..positions.len()).collect();
        solver.activate_fluids(&all_ids, params, 0.0);

        Ok(Fluid { solver })
    }
}

impl Scene for Fluid {
    fn name(&self) -> &'static str {
        "fluid"
    }
    fn solver(&self) -> &Solver {
        &self.solver
    }
    fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_an_empty_block() {
        assert_eq!(Fluid::new(0, 4, 4).unwrap_err(), SceneError::EmptyParticleSet);
    }

    #[test]
    fn settles_inside_the_box_without_nan() {
        let mut fluid = Fluid::new(4, 4, 4).unwrap();
        for _ in 0..120 {
            fluid.step(1.0 / 60.0);
        }
        for p in fluid.positions() {
            assert!(p.is_finite());
            assert!(p.y >= -1.05 && p.y <= 1.05);
        }
    }
}
