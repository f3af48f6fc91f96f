//! An inflated shell: surface edges resist stretching, a single mesh-volume
//! constraint pressurizes the interior, and the ball settles onto a floor.
use glam::DVec3;

use crate::constraint::{ConstraintKind, DistanceConstraint, MeshVolumeConstraint, SemiPlaneConstraint};
use crate::error::SceneError;
use crate::geometry::SemiPlane;
use crate::scene::{icosphere, unique_edges_of_triangles, MeshDescriptor, Scene};
use crate::solver::Solver;

#[derive(Debug)]
pub struct SoftBall {
    solver: Solver,
    pressure: f64,
}

impl SoftBall {
    pub fn new(pressure: f64, mesh: MeshDescriptor) -> Result<SoftBall, SceneError> {
        mesh.validate()?;
        if mesh.vertices.is_empty() {
            return Err(SceneError::EmptyParticleSet);
        }
        if mesh.triangles.is_empty() {
            return Err(SceneError::NonPositiveParameter { parameter: "triangles.len()", value: 0.0 });
        }
        if pressure <= 0.0 {
            return Err(SceneError::NonPositiveParameter { parameter: "pressure", value: pressure });
        }

        let vertex_count = mesh.vertices.len();
        let positions = mesh.vertices.clone();
        let default_mass = 1.0 / vertex_count as f64;
        let mut solver = Solver::new(positions, default_mass)?;
        let alpha_distance = solver.insert_compliance(1e-8);
        let alpha_plane_collision = solver.insert_compliance(1e-8);

        let plane = solver.geometry_mut().insert_plane(SemiPlane::new(DVec3::new(0.0, -1.5, 0.0), DVec3::Y));

        for (a, b) in unique_edges_of_triangles(&mesh.triangles) {
            let l0 = (mesh.vertices[a] - mesh.vertices[b]).length();
            solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(a, b, l0, alpha_distance)))?;
        }

        for i in 0..vertex_count {
            solver.add_constraint(ConstraintKind::SemiPlane(SemiPlaneConstraint::new(i, plane, 0.0, alpha_plane_collision)))?;
        }

        let alpha_volume = solver.insert_compliance(0.0);
        let volume = MeshVolumeConstraint::new(mesh.triangles.clone(), vertex_count, 0, &mesh.vertices, pressure, alpha_volume);
        solver.add_constraint(ConstraintKind::MeshVolume(volume))?;

        Ok(SoftBall { solver, pressure })
    }

    /// Convenience factory matching the original's default inflated-ball demo.
    pub fn sphere(pressure: f64, subdivisions: u32, radius: f64) -> Result<SoftBall, SceneError> {
        SoftBall::new(pressure, icosphere(subdivisions, radius))
    }

    pub fn pressure(&self) -> f64 {
        self.pressure
    }
}

impl Scene for SoftBall {
    fn name(&self) -> &'static str {
        "soft_ball"
    }
    fn solver(&self) -> &Solver {
        &self.solver
    }
    fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }
}
