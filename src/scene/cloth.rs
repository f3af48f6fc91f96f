//! A rectangular cloth grid over a floor plane, with optional self-collision
//! and a distance-based proxy for bending resistance (the exact dihedral
//! [`BendingConstraint`](crate::constraint::BendingConstraint) is left for
//! scenes that need the tighter formulation; a cloth this size is stable
//! enough with wide-spaced structural constraints alone).
use glam::DVec3;

use crate::constraint::{ConstraintKind, DistanceConstraint};
use crate::error::SceneError;
use crate::geometry::SemiPlane;
use crate::scene::Scene;
use crate::solver::Solver;

#[derive(Debug)]
pub struct Cloth {
    solver: Solver,
    w: usize,
    h: usize,
}

impl Cloth {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        w: usize,
        h: usize,
        distance: f64,
        bending: bool,
        self_collision: bool,
        spawn_vertical: bool,
    ) -> Result<Cloth, SceneError> {
        if w == 0 || h == 0 {
            return Err(SceneError::EmptyParticleSet);
        }
        if distance <= 0.0 {
            return Err(SceneError::NonPositiveParameter { parameter: "distance", value: distance });
        }

        let mut positions = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                if !spawn_vertical {
                    positions.push(DVec3::new(
                        distance * x as f64 - distance * (w - 1) as f64 / 2.0,
                        distance * h as f64 / 2.0,
                        distance * y as f64,
                    ));
                } else {
                    let jitter = ((x * x + 3 * y) % 10) as f64 + 0.1;
                    positions.push(DVec3::new(
                        distance * x as f64 - distance * (w - 1) as f64 / 2.0,
                        distance * (h - y) as f64,
                        jitter / 10000.0,
                    ));
                }
            }
        }

        let mut solver = Solver::new(positions, 0.1)?;
        let alpha_distance = solver.insert_compliance(1e-8);
        let alpha_bending = solver.insert_compliance(1e-8);
        let alpha_plane_collision = solver.insert_compliance(1e-8);

        let plane = solver.geometry_mut().insert_plane(SemiPlane::new(DVec3::new(0.0, -1.5, 0.0), DVec3::Y));

        for y in 0..h {
            for x in 0..w {
                let here = y * w + x;
                if x != w - 1 {
                    solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(here, y * w + x + 1, distance, alpha_distance)))?;
                }
                if y != h - 1 {
                    solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(here, (y + 1) * w + x, distance, alpha_distance)))?;
                }
                if x != w - 1 && y != h - 1 {
                    let diag = distance * std::f64::consts::SQRT_2;
                    solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(here, (y + 1) * w + x + 1, diag, alpha_distance)))?;
                    solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new((y + 1) * w + x, y * w + x + 1, diag, alpha_distance)))?;
                }

                solver.add_constraint(ConstraintKind::SemiPlane(crate::constraint::SemiPlaneConstraint::new(
                    here,
                    plane,
                    0.01,
                    alpha_plane_collision,
                )))?;

                if bending {
                    if y < h.saturating_sub(2) {
                        solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(here, (y + 2) * w + x, distance * 2.0, alpha_bending)))?;
                    }
                    if x < w.saturating_sub(2) {
                        solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(here, y * w + x + 2, distance * 2.0, alpha_bending)))?;
                    }
                }
            }
        }

        if !spawn_vertical {
            solver.add_fixed_point(0);
            solver.add_fixed_point(w - 1);
        }

        if self_collision {
            solver.activate_global_collision(distance, 1e-8);
        }

        Ok(Cloth { solver, w, h })
    }
}

impl Scene for Cloth {
    fn name(&self) -> &'static str {
        "cloth"
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

impl Cloth {
    pub fn width(&self) -> usize {
        self.w
    }
    pub fn height(&self) -> usize {
        self.h
    }
}
