//! Geometric collaborators referenced by constraints: planes and cylinders used
//! for unilateral contact, plus the closest-point query the triangle contact
//! constraint needs.
use glam::DVec3;

/// A half-space boundary: stay on the side the normal points to.
#[derive(Clone, Copy, Debug)]
pub struct SemiPlane {
    pub p: DVec3,
    pub n: DVec3,
}

impl SemiPlane {
    pub fn new(p: DVec3, n: DVec3) -> SemiPlane {
        SemiPlane { p, n: n.normalize() }
    }

    /// Builds a plane from three points on it, with the normal following the
    /// right-hand rule of (b - a) x (c - a).
    pub fn from_points(a: DVec3, b: DVec3, c: DVec3) -> SemiPlane {
        SemiPlane {
            p: a,
            n: (b - a).cross(c - a).normalize(),
        }
    }

    pub fn signed_distance(&self, point: DVec3) -> f64 {
        self.n.dot(point - self.p)
    }
}

/// An infinite cylinder: axis through `p` along unit direction `dir`, radius `r`.
#[derive(Clone, Copy, Debug)]
pub struct Cylinder {
    pub dir: DVec3,
    pub p: DVec3,
    pub r: f64,
}

impl Cylinder {
    pub fn new(dir: DVec3, p: DVec3, r: f64) -> Cylinder {
        Cylinder { dir: dir.normalize(), p, r }
    }

    /// Closest point on the axis to `point`.
    pub fn axis_projection(&self, point: DVec3) -> DVec3 {
        let t = -(self.p - point).dot(self.dir);
        self.p + t * self.dir
    }
}

/// Closest point of triangle (a, b, c) to `target`, used by the sphere/triangle
/// contact constraint. Tests whether the plane projection lies inside all three
/// edge half-planes; if not, falls back to the closest point on the violated
/// edge's segment.
pub fn closest_point_on_triangle(a: DVec3, b: DVec3, c: DVec3, target: DVec3) -> DVec3 {
    let n = match (b - a).cross(c - a).try_normalize() {
        Some(n) => n,
        None => return a,
    };

    let proj = target - n.dot(target - a) * n;

    let verts = [a, b, c];
    for i in 0..3 {
        let orig = verts[i];
        let dest = verts[(i + 1) % 3];
        let inside = (dest - orig).cross(proj - orig).dot(n) > 0.0;
        if !inside {
            let edge = dest - orig;
            let len2 = edge.length_squared();
            let t = if len2 > 1e-12 {
                (-(orig - target).dot(edge) / len2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            return orig + t * edge;
        }
    }

    proj
}

/// Index into a [`GeometryArena`] plane slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlaneHandle(usize);

/// Index into a [`GeometryArena`] cylinder slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CylinderHandle(usize);

/// Index into a [`GeometryArena`] point slot (a collision target such as a
/// sphere center, shared by every constraint that collides against it).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PointHandle(usize);

/// Owns the geometric collaborators that unilateral constraints read during a
/// step: planes, cylinders, and bare points. Constraints hold a handle rather
/// than a reference, so the scene orchestrator can move a cylinder between
/// steps and every constraint referencing it sees the update immediately.
#[derive(Clone, Debug, Default)]
pub struct GeometryArena {
    planes: Vec<SemiPlane>,
    cylinders: Vec<Cylinder>,
    points: Vec<DVec3>,
}

impl GeometryArena {
    pub fn new() -> GeometryArena {
        GeometryArena::default()
    }

    pub fn insert_plane(&mut self, plane: SemiPlane) -> PlaneHandle {
        self.planes.push(plane);
        PlaneHandle(self.planes.len() - 1)
    }

    pub fn plane(&self, handle: PlaneHandle) -> SemiPlane {
        self.planes[handle.0]
    }

    pub fn plane_mut(&mut self, handle: PlaneHandle) -> &mut SemiPlane {
        &mut self.planes[handle.0]
    }

    pub fn insert_cylinder(&mut self, cylinder: Cylinder) -> CylinderHandle {
        self.cylinders.push(cylinder);
        CylinderHandle(self.cylinders.len() - 1)
    }

    pub fn cylinder(&self, handle: CylinderHandle) -> Cylinder {
        self.cylinders[handle.0]
    }

    pub fn cylinder_mut(&mut self, handle: CylinderHandle) -> &mut Cylinder {
        &mut self.cylinders[handle.0]
    }

    pub fn insert_point(&mut self, point: DVec3) -> PointHandle {
        self.points.push(point);
        PointHandle(self.points.len() - 1)
    }

    pub fn point(&self, handle: PointHandle) -> DVec3 {
        self.points[handle.0]
    }

    pub fn point_mut(&mut self, handle: PointHandle) -> &mut DVec3 {
        &mut self.points[handle.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn semi_plane_signed_distance() {
        let plane = SemiPlane::new(DVec3::new(0.0, -1.5, 0.0), DVec3::Y);
        assert_relative_eq!(plane.signed_distance(DVec3::new(0.0, 0.0, 0.0)), 1.5);
        assert_relative_eq!(plane.signed_distance(DVec3::new(5.0, -1.5, 2.0)), 0.0);
    }

    #[test]
    fn closest_point_projects_inside_triangle() {
        let a = DVec3::new(0.0, 0.0, 0.0);
        let b = DVec3::new(1.0, 0.0, 0.0);
        let c = DVec3::new(0.0, 1.0, 0.0);
        let target = DVec3::new(0.25, 0.25, 1.0);
        let hit = closest_point_on_triangle(a, b, c, target);
        assert_relative_eq!(hit, DVec3::new(0.25, 0.25, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn closest_point_clamps_to_edge_outside_triangle() {
        let a = DVec3::new(0.0, 0.0, 0.0);
        let b = DVec3::new(1.0, 0.0, 0.0);
        let c = DVec3::new(0.0, 1.0, 0.0);
        let target = DVec3::new(2.0, -1.0, 0.0);
        let hit = closest_point_on_triangle(a, b, c, target);
        assert_relative_eq!(hit, DVec3::new(1.0, 0.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn arena_handles_see_in_place_mutation() {
        let mut geo = GeometryArena::new();
        let handle = geo.insert_cylinder(Cylinder::new(DVec3::Y, DVec3::ZERO, 0.5));
        assert_relative_eq!(geo.cylinder(handle).r, 0.5);
        geo.cylinder_mut(handle).r = 0.75;
        assert_relative_eq!(geo.cylinder(handle).r, 0.75);
    }
}
