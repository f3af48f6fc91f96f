//! Scene orchestration: nine deterministic factories that each build an
//! initial particle set, permanent constraints, and any geometric
//! collaborators a [`Solver`] needs, plus the particle-grab interaction
//! every scene shares.
//!
//! Factories that would need externally authored mesh data in the original
//! (an organic tetrahedral mesh, a high-resolution sphere loaded from an OFF
//! file) instead accept a [`MeshDescriptor`] the caller supplies; this module
//! ships small procedural generators — an icosphere and a tetrahedralized
//! cube — good enough to exercise every mesh-based constraint without a
//! file loader.
use glam::DVec3;
use rustc_hash::FxHashMap;

use crate::error::SceneError;
use crate::geometry::SemiPlane;
use crate::solver::Solver;

pub mod cloth;
pub mod cloth_drop;
pub mod cloth_turn;
pub mod cord;
pub mod fluid;
pub mod rigid_body;
pub mod soft_ball;
pub mod soft_body;
pub mod spheres;

pub use cloth::Cloth;
pub use cloth_drop::ClothDrop;
pub use cloth_turn::ClothTurn;
pub use cord::Cord;
pub use fluid::Fluid;
pub use rigid_body::RigidBody;
pub use soft_ball::SoftBall;
pub use soft_body::SoftBody;
pub use spheres::Spheres;

/// A scene owns a [`Solver`] and knows how to advance it by one frame. The
/// default [`Scene::step`] uses the plain predict/iterate update; scenes that
/// lean on the collision grid's damping and friction pass override it to use
/// [`Solver::update_substeps`] instead.
pub trait Scene: std::fmt::Debug {
    fn name(&self) -> &'static str;
    fn solver(&self) -> &Solver;
    fn solver_mut(&mut self) -> &mut Solver;

    fn positions(&self) -> &[DVec3] {
        self.solver().positions()
    }

    fn step(&mut self, dt: f64) {
        self.solver_mut().update(dt);
    }
}

/// Vertex/index data for a mesh-based scene, supplied by the caller instead
/// of read from a file. `tetrahedra` is empty for surface-only meshes.
#[derive(Clone, Debug, Default)]
pub struct MeshDescriptor {
    pub vertices: Vec<DVec3>,
    pub triangles: Vec<[usize; 3]>,
    pub tetrahedra: Vec<[usize; 4]>,
}

impl MeshDescriptor {
    pub fn validate(&self) -> Result<(), SceneError> {
        let n = self.vertices.len();
        let max_index = self
            .triangles
            .iter()
            .flatten()
            .chain(self.tetrahedra.iter().flatten())
            .copied()
            .max();
        if let Some(max_index) = max_index {
            if max_index >= n {
                return Err(SceneError::MeshIndexOutOfRange { vertex_count: n, max_index });
            }
        }
        Ok(())
    }
}

/// Subdivided icosahedron, a reasonable stand-in for the high-resolution
/// sphere meshes the original loads from `.off` files.
pub fn icosphere(subdivisions: u32, radius: f64) -> MeshDescriptor {
    let t = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let raw = [
        DVec3::new(-1.0, t, 0.0),
        DVec3::new(1.0, t, 0.0),
        DVec3::new(-1.0, -t, 0.0),
        DVec3::new(1.0, -t, 0.0),
        DVec3::new(0.0, -1.0, t),
        DVec3::new(0.0, 1.0, t),
        DVec3::new(0.0, -1.0, -t),
        DVec3::new(0.0, 1.0, -t),
        DVec3::new(t, 0.0, -1.0),
        DVec3::new(t, 0.0, 1.0),
        DVec3::new(-t, 0.0, -1.0),
        DVec3::new(-t, 0.0, 1.0),
    ];
    let mut vertices: Vec<DVec3> = raw.iter().map(|v| v.normalize() * radius).collect();

    let mut faces: Vec<[usize; 3]> = vec![
        [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
        [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
        [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
        [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
    ];

    let mut midpoints: FxHashMap<(usize, usize), usize> = FxHashMap::default();
    for _ in 0..subdivisions {
        let mut next = Vec::with_capacity(faces.len() * 4);
        for [a, b, c] in faces {
            let ab = midpoint(&mut vertices, &mut midpoints, a, b, radius);
            let bc = midpoint(&mut vertices, &mut midpoints, b, c, radius);
            let ca = midpoint(&mut vertices, &mut midpoints, c, a, radius);
            next.push([a, ab, ca]);
            next.push([b, bc, ab]);
            next.push([c, ca, bc]);
            next.push([ab, bc, ca]);
        }
        faces = next;
    }

    MeshDescriptor { vertices, triangles: faces, tetrahedra: Vec::new() }
}

fn midpoint(vertices: &mut Vec<DVec3>, cache: &mut FxHashMap<(usize, usize), usize>, a: usize, b: usize, radius: f64) -> usize {
    let key = if a < b { (a, b) } else { (b, a) };
    if let Some(&idx) = cache.get(&key) {
        return idx;
    }
    let mid = ((vertices[a] + vertices[b]) * 0.5).normalize() * radius;
    vertices.push(mid);
    let idx = vertices.len() - 1;
    cache.insert(key, idx);
    idx
}

/// A cube split into six tetrahedra fanned around the space diagonal from
/// corner 0 to corner 7, vertex-ordered the same way as the original's own
/// cube-corner layout.
pub fn tetrahedralized_cube(half_width: f64) -> MeshDescriptor {
    let w = half_width;
    let vertices = vec![
        DVec3::new(-w, -w, -w), // 0
        DVec3::new(w, -w, -w),  // 1
        DVec3::new(-w, w, -w),  // 2
        DVec3::new(w, w, -w),   // 3
        DVec3::new(-w, -w, w),  // 4
        DVec3::new(w, -w, w),   // 5
        DVec3::new(-w, w, w),   // 6
        DVec3::new(w, w, w),    // 7
    ];
    let tetrahedra = vec![
        [0, 1, 3, 7],
        [0, 3, 2, 7],
        [0, 2, 6, 7],
        [0, 6, 4, 7],
        [0, 4, 5, 7],
        [0, 5, 1, 7],
    ];
    MeshDescriptor { vertices, triangles: Vec::new(), tetrahedra }
}

/// Unordered edges shared by the given tetrahedra, deduplicated.
pub fn unique_edges_of_tets(tets: &[[usize; 4]]) -> Vec<(usize, usize)> {
    let mut edges = std::collections::BTreeSet::new();
    for &[a, b, c, d] in tets {
        for &(i, j) in &[(a, b), (a, c), (a, d), (b, c), (b, d), (c, d)] {
            edges.insert((i.min(j), i.max(j)));
        }
    }
    edges.into_iter().collect()
}

/// Unordered edges shared by the given triangles, deduplicated.
pub fn unique_edges_of_triangles(triangles: &[[usize; 3]]) -> Vec<(usize, usize)> {
    let mut edges = std::collections::BTreeSet::new();
    for &[a, b, c] in triangles {
        for &(i, j) in &[(a, b), (b, c), (c, a)] {
            edges.insert((i.min(j), i.max(j)));
        }
    }
    edges.into_iter().collect()
}

/// Two triangles per grid cell of a `w` (x) by `h` (y) vertex grid, indices
/// row-major as `y * w + x`.
pub fn grid_triangles(w: usize, h: usize) -> Vec<[usize; 3]> {
    let mut triangles = Vec::with_capacity((w - 1) * (h - 1) * 2);
    for y in 0..h - 1 {
        for x in 0..w - 1 {
            let a = y * w + x;
            let b = y * w + x + 1;
            let c = (y + 1) * w + x;
            let d = (y + 1) * w + x + 1;
            triangles.push([a, b, c]);
            triangles.push([c, b, d]);
        }
    }
    triangles
}

/// Six inward-facing walls of an axis-aligned box. `include_top` omits the
/// +Y wall when false, matching scenes that spawn an open-topped container.
pub fn box_planes(half_extent: f64, include_top: bool) -> Vec<SemiPlane> {
    let h = half_extent;
    let mut planes = vec![
        SemiPlane::new(DVec3::new(-h, 0.0, 0.0), DVec3::X),
        SemiPlane::new(DVec3::new(h, 0.0, 0.0), -DVec3::X),
        SemiPlane::new(DVec3::new(0.0, -h, 0.0), DVec3::Y),
        SemiPlane::new(DVec3::new(0.0, 0.0, -h), DVec3::Z),
        SemiPlane::new(DVec3::new(0.0, 0.0, h), -DVec3::Z),
    ];
    if include_top {
        planes.push(SemiPlane::new(DVec3::new(0.0, h, 0.0), -DVec3::Y));
    }
    planes
}

/// Tracks which particle (if any) is currently pinned by a pointer/ray drag,
/// mirroring the original's grab/move/release flow: picking tests a ray
/// against each particle's position with an effective radius² of 0.1.
#[derive(Clone, Copy, Debug, Default)]
pub struct GrabState {
    grabbed: Option<usize>,
    initial_distance: f64,
}

impl GrabState {
    pub fn new() -> GrabState {
        GrabState::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.grabbed.is_some()
    }

    pub fn grab(&mut self, solver: &mut Solver, origin: DVec3, direction: DVec3) {
        let mut best: Option<(usize, f64)> = None;
        for (i, &p) in solver.positions().iter().enumerate() {
            let pc = p - origin;
            let proj = pc.dot(direction);
            let det = proj * proj - (pc.dot(pc) - 0.1);
            if det > 0.0 {
                let dist = pc.length();
                if best.map_or(true, |(_, d)| dist < d) {
                    best = Some((i, dist));
                }
            }
        }
        self.grabbed = best.map(|(i, _)| i);
        self.initial_distance = best.map_or(0.0, |(_, d)| d);
        if let Some(i) = self.grabbed {
            solver.add_fixed_point(i);
        }
    }

    pub fn move_dragged(&self, solver: &mut Solver, origin: DVec3, direction: DVec3) {
        if let Some(i) = self.grabbed {
            solver.set_pos(i, origin + self.initial_distance * direction);
        }
    }

    pub fn release(&mut self, solver: &mut Solver) {
        if let Some(i) = self.grabbed.take() {
            solver.remove_fixed_point(i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn icosphere_vertices_land_on_the_sphere() {
        let mesh = icosphere(2, 2.0);
        for v in &mesh.vertices {
            assert_relative_eq!(v.length(), 2.0, epsilon = 1e-9);
        }
        mesh.validate().unwrap();
    }

    #[test]
    fn tetrahedralized_cube_has_valid_indices() {
        let mesh = tetrahedralized_cube(0.5);
        mesh.validate().unwrap();
        assert_eq!(mesh.tetrahedra.len(), 6);
        // 12 cube edges + 6 face diagonals this fan introduces + the shared space diagonal.
        assert_eq!(unique_edges_of_tets(&mesh.tetrahedra).len(), 19);
    }

    #[test]
    fn mesh_descriptor_rejects_out_of_range_index() {
        let mesh = MeshDescriptor {
            vertices: vec![DVec3::ZERO],
            triangles: vec![[0, 1, 2]],
            tetrahedra: Vec::new(),
        };
        assert!(matches!(mesh.validate(), Err(SceneError::MeshIndexOutOfRange { .. })));
    }

    #[test]
    fn grab_pins_the_nearest_particle_on_the_ray() {
        let mut solver = Solver::new(vec![DVec3::new(0.0, 0.0, 5.0), DVec3::new(0.0, 0.0, 10.0)], 1.0).unwrap();
        let mut grab = GrabState::new();
        grab.grab(&mut solver, DVec3::ZERO, DVec3::Z);
        assert!(grab.is_dragging());
        assert_relative_eq!(solver.inverse_masses()[0], 0.0);
        grab.release(&mut solver);
        assert!(!grab.is_dragging());
        assert_relative_eq!(solver.inverse_masses()[0], 1.0);
    }
}
