//! A cloth grid dropped over a fixed sphere, using per-triangle
//! sphere/triangle contact rather than a per-particle sphere constraint so
//! the cloth drapes over the curvature between vertices.
use glam::DVec3;

use crate::constraint::{ConstraintKind, DistanceConstraint, SphereTriCollisionConstraint};
use crate::error::SceneError;
use crate::scene::{grid_triangles, Scene};
use crate::solver::Solver;

#[derive(Debug)]
pub struct ClothDrop {
    solver: Solver,
    w: usize,
}

impl ClothDrop {
    pub fn new(w: usize) -> Result<ClothDrop, SceneError> {
        if w < 2 {
            return Err(SceneError::EmptyParticleSet);
        }

        let sphere_radius = 1.0f64;
        let distance = 4.0 / (w - 1) as f64;
        let mut range_max = ((w as f64) / 32.0).ceil() as usize;
        if w > 8 {
            range_max = range_max.max(2);
        }
        range_max = range_max.max(1);

        let mut positions = Vec::with_capacity(w * w);
        for y in 0..w {
            for x in 0..w {
                positions.push(DVec3::new(
                    distance * x as f64 - distance * (w - 1) as f64 / 2.0,
                    3.0,
                    distance * y as f64 - distance * (w - 1) as f64 / 2.0,
                ));
            }
        }

        let default_mass = 0.01 / (w * w) as f64;
        let mut solver = Solver::new(positions, default_mass)?;
        let alpha_distance = solver.insert_compliance(1e-8);
        let alpha_bending = solver.insert_compliance(1e-8);
        let alpha_collision = solver.insert_compliance(1e-8);
        let sphere_center = solver.geometry_mut().insert_point(DVec3::ZERO);

        for y in 0..w {
            for x in 0..w {
                let here = y * w + x;
                if x != w - 1 {
                    solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(here, y * w + x + 1, distance, alpha_distance)))?;
                }
                if y != w - 1 {
                    solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(here, (y + 1) * w + x, distance, alpha_distance)))?;
                }
                if x != w - 1 && y != w - 1 {
                    let diag = distance * std::f64::consts::SQRT_2;
                    solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(here, (y + 1) * w + x + 1, diag, alpha_distance)))?;
                    solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new((y + 1) * w + x, y * w + x + 1, diag, alpha_distance)))?;
                }

                if y < w - range_max {
                    solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(
                        here,
                        (y + range_max) * w + x,
                        distance * range_max as f64,
                        alpha_bending,
                    )))?;
                }
                if x < w - range_max {
                    solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(
                        here,
                        y * w + x + range_max,
                        distance * range_max as f64,
                        alpha_bending,
                    )))?;
                }
                if y < w - range_max && x < w - range_max {
                    let diag = distance * range_max as f64 * std::f64::consts::SQRT_2;
                    solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(
                        here,
                        (y + range_max) * w + x + range_max,
                        diag,
                        alpha_bending,
                    )))?;
                    solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(
                        (y + range_max) * w + x,
                        y * w + x + range_max,
                        diag,
                        alpha_bending,
                    )))?;
                }
            }
        }

        for [a, b, c] in grid_triangles(w, w) {
            solver.add_constraint(ConstraintKind::SphereTriCollision(SphereTriCollisionConstraint::new(
                a,
                b,
                c,
                sphere_center,
                sphere_radius + 0.05,
                alpha_collision,
            )))?;
        }

        Ok(ClothDrop { solver, w })
    }
}

impl Scene for ClothDrop {
    fn name(&self) -> &'static str {
        "cloth_drop"
    }
    fn solver(&self) -> &Solver {
        &self.solver
    }
    fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }
}

impl ClothDrop {
    pub fn width(&self) -> usize {
        self.w
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_too_small_a_grid() {
        assert_eq!(ClothDrop::new(1).unwrap_err(), SceneError::EmptyParticleSet);
    }

    #[test]
    fn settles_above_the_sphere_without_nan() {
        let mut drop = ClothDrop::new(12).unwrap();
        for _ in 0..180 {
            drop.step(1.0 / 60.0);
        }
        for p in drop.positions() {
            assert!(p.is_finite());
        }
    }
}
