//! A tetrahedral soft body: edges keep its shape, per-tetrahedron volume
//! constraints keep it from collapsing, and it settles onto a floor plane.
use glam::DVec3;

use crate::constraint::{ConstraintKind, DistanceConstraint, SemiPlaneConstraint, VolumeConstraint};
use crate::error::SceneError;
use crate::geometry::SemiPlane;
use crate::scene::{tetrahedralized_cube, unique_edges_of_tets, MeshDescriptor, Scene};
use crate::solver::Solver;

#[derive(Debug)]
pub struct SoftBody {
    solver: Solver,
}

impl SoftBody {
    pub fn new(mesh: MeshDescriptor) -> Result<SoftBody, SceneError> {
        mesh.validate()?;
        if mesh.vertices.is_empty() {
            return Err(SceneError::EmptyParticleSet);
        }
        if mesh.tetrahedra.is_empty() {
            return Err(SceneError::NonPositiveParameter { parameter: "tetrahedra.len()", value: 0.0 });
        }

        let positions = mesh.vertices.clone();
        let default_mass = 1.0 / positions.len() as f64;
        let mut solver = Solver::new(positions, default_mass)?;
        let alpha_distance = solver.insert_compliance(1e-8);
        let alpha_volume = solver.insert_compliance(1e-8);
        let alpha_plane_collision = solver.insert_compliance(1e-8);

        let plane = solver.geometry_mut().insert_plane(SemiPlane::new(DVec3::new(0.0, -1.0, 0.0), DVec3::Y));

        for (a, b) in unique_edges_of_tets(&mesh.tetrahedra) {
            let l0 = (mesh.vertices[a] - mesh.vertices[b]).length();
            solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(a, b, l0, alpha_distance)))?;
        }

        for &[p1, p2, p3, p4] in &mesh.tetrahedra {
            solver.add_constraint(ConstraintKind::Volume(VolumeConstraint::new(p1, p2, p3, p4, &mesh.vertices, alpha_volume)))?;
        }

        for i in 0..mesh.vertices.len() {
            solver.add_constraint(ConstraintKind::SemiPlane(SemiPlaneConstraint::new(i, plane, 0.0, alpha_plane_collision)))?;
        }

        Ok(SoftBody { solver })
    }

    /// Convenience factory matching the original's default demo body.
    pub fn cube(half_width: f64) -> Result<SoftBody, SceneError> {
        SoftBody::new(tetrahedralized_cube(half_width))
    }
}

impl Scene for SoftBody {
    fn name(&self) -> &'static str {
        "soft_body"
    }
    fn solver(&self) -> &Solver {
        &self.solver
    }
    fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }
}
