//! A cloth tube wrapped around two counter-rotating cylinders, exercising
//! cylinder contact and self-collision together. The cylinders are geometry
//! handles the orchestrator can reposition between steps (see
//! [`ClothTurn::set_cylinder_angle`]).
use glam::DVec3;

use crate::constraint::{ConstraintKind, CylinderCollisionConstraint, DistanceConstraint};
use crate::error::SceneError;
use crate::geometry::{Cylinder, CylinderHandle};
use crate::scene::Scene;
use crate::solver::Solver;

const RING_RESOLUTION: usize = 64;
const CYLINDER_RADIUS: f64 = 0.1;

#[derive(Debug)]
pub struct ClothTurn {
    solver: Solver,
    w: usize,
    cylinder_top: CylinderHandle,
    cylinder_bottom: CylinderHandle,
}

impl ClothTurn {
    pub fn new(w: usize, cylinder_spacing: f64, cylinder_angle_deg: f64) -> Result<ClothTurn, SceneError> {
        if w == 0 {
            return Err(SceneError::EmptyParticleSet);
        }

        let h = RING_RESOLUTION;
        let distance = 4.0 / (h - 1) as f64 * std::f64::consts::FRAC_PI_2;

        let mut positions = Vec::with_capacity(w * h);
        for y in 0..h {
            let theta = 2.0 * y as f64 * std::f64::consts::PI / h as f64;
            for x in 0..w {
                positions.push(DVec3::new(
                    distance * x as f64 - distance * (w - 1) as f64 / 2.0,
                    theta.cos(),
                    theta.sin(),
                ));
            }
        }

        let default_mass = 0.01 / (w * h) as f64;
        let mut solver = Solver::new(positions, default_mass)?;
        let alpha_distance = solver.insert_compliance(1e-8);
        let alpha_plane_collision = solver.insert_compliance(1e-8);

        let cylinder_top = solver
            .geometry_mut()
            .insert_cylinder(Cylinder::new(DVec3::X, DVec3::new(0.0, cylinder_spacing / 2.0, 0.0), CYLINDER_RADIUS + 0.02));
        let cylinder_bottom = solver
            .geometry_mut()
            .insert_cylinder(Cylinder::new(DVec3::X, DVec3::new(0.0, -cylinder_spacing / 2.0, 0.0), CYLINDER_RADIUS + 0.02));

        for y in 0..h {
            for x in 0..w {
                let here = y * w + x;
                let next_row = (y + 1) % h * w + x;
                solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(here, next_row, distance, alpha_distance)))?;

                if x != w - 1 {
                    solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(here, y * w + x + 1, distance, alpha_distance)))?;
                    let diag = distance * std::f64::consts::SQRT_2;
                    solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(here, (y + 1) % h * w + x + 1, diag, alpha_distance)))?;
                    solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new((y + 1) % h * w + x, y * w + x + 1, diag, alpha_distance)))?;
                }

                solver.add_constraint(ConstraintKind::CylinderCollision(CylinderCollisionConstraint::new(here, cylinder_top, alpha_plane_collision)))?;
                solver.add_constraint(ConstraintKind::CylinderCollision(CylinderCollisionConstraint::new(here, cylinder_bottom, alpha_plane_collision)))?;
            }
        }

        solver.activate_global_collision(distance, 1e-8);

        let mut scene = ClothTurn { solver, w, cylinder_top, cylinder_bottom };
        scene.set_cylinder_angle(cylinder_angle_deg.to_radians());
        Ok(scene)
    }

    /// Rotates both cylinders to the given angle (radians), counter-rotating
    /// so the wrapped cloth twists between them.
    pub fn set_cylinder_angle(&mut self, theta: f64) {
        let geo = self.solver.geometry_mut();
        geo.cylinder_mut(self.cylinder_top).dir = DVec3::new(theta.cos(), 0.0, -theta.sin());
        geo.cylinder_mut(self.cylinder_bottom).dir = DVec3::new(theta.cos(), 0.0, theta.sin());
    }

    pub fn width(&self) -> usize {
        self.w
    }
}

impl Scene for ClothTurn {
    fn name(&self) -> &'static str {
        "cloth_turn"
    }
    fn solver(&self) -> &Solver {
        &self.solver
    }
    fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }
    fn step(&mut self, dt: f64) {
        self.solver.update_substeps(dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_width() {
        assert_eq!(ClothTurn::new(0, 1.0, 0.0).unwrap_err(), SceneError::EmptyParticleSet);
    }

    #[test]
    fn rotating_cylinders_keeps_the_tube_finite() {
        let mut turn = ClothTurn::new(8, 1.0, 0.0).unwrap();
        for i in 0..60 {
            turn.set_cylinder_angle(i as f64 * 0.01);
            turn.step(1.0 / 60.0);
        }
        for p in turn.positions() {
            assert!(p.is_finite());
        }
    }
}
