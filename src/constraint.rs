//! The constraint library: every concrete constraint the solver projects,
//! dispatched through a closed tagged enum instead of virtual calls. Each
//! constraint exposes `eval`/`grad`/`satisfied`; `norm_grad` (the denominator
//! of the XPBD lambda update) is the same formula for all of them and lives
//! as a default method over the cached gradient.
//!
//! `grad`'s cache is only valid for the `x` it was last called with, and
//! `norm_grad`/`cached_grad` only make sense read immediately after. The
//! solver always calls them in that order within one constraint projection.
use crate::compliance::ComplianceHandle;
use crate::geometry::{closest_point_on_triangle, CylinderHandle, GeometryArena, PlaneHandle, PointHandle};
use glam::DVec3;

/// Physical constants shared by every density constraint in a fluid body.
/// Threaded through explicitly rather than read off a static, so two fluids
/// in the same scene can disagree on rest density.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FluidParams {
    pub h: f64,
    pub d0: f64,
    pub m: f64,
}

impl Default for FluidParams {
    fn default() -> FluidParams {
        FluidParams { h: 0.02, d0: 1000.0, m: 0.001 }
    }
}

fn poly6(p1: DVec3, p2: DVec3, h: f64) -> f64 {
    let r = (p1 - p2).length();
    if r > h {
        return 0.0;
    }
    315.0 / (64.0 * std::f64::consts::PI * h.powi(9)) * (h * h - r * r).powi(3)
}

fn spiky_grad(p1: DVec3, p2: DVec3, h: f64) -> DVec3 {
    let r = (p1 - p2).length();
    if r > h || r < 1e-12 {
        return DVec3::ZERO;
    }
    (-45.0 / (std::f64::consts::PI * h.powi(6)) * (h - r).powi(2)) * (p1 - p2) / r
}

/// Everything a constraint needs beyond particle positions: the geometric
/// collaborators it might collide against, and the fluid constants a density
/// constraint evaluates its kernel with.
pub struct EvalContext<'a> {
    pub geo: &'a GeometryArena,
    pub fluid: &'a FluidParams,
}

/// Shared contract implemented by every constraint in the library.
pub trait ConstraintBehavior: std::fmt::Debug {
    fn particles(&self) -> &[usize];
    fn alpha(&self) -> ComplianceHandle;

    /// Evaluates `C(x)`. May cache auxiliary state (a hit point, a bent-face
    /// normal) that `grad` reads back.
    fn eval(&mut self, x: &[DVec3], ctx: &EvalContext) -> f64;

    /// Evaluates `dC/dx` per particle, in the same order as `particles()`,
    /// and caches the result for `norm_grad`.
    fn grad(&mut self, x: &[DVec3], ctx: &EvalContext) -> &[DVec3];

    /// The gradient cache left behind by the last `grad` call.
    fn cached_grad(&self) -> &[DVec3];

    fn satisfied(&self, c: f64) -> bool {
        c.abs() < 1e-3
    }

    /// `sum_p w_p * |dC/dx_p|^2`, the denominator of the XPBD lambda update.
    /// Identical across every constraint type, so it lives here once instead
    /// of being re-derived per struct.
    fn norm_grad(&self, w: &[f64]) -> f64 {
        self.particles()
            .iter()
            .zip(self.cached_grad())
            .map(|(&p, g)| w[p] * g.length_squared())
            .sum()
    }

    /// Overridden only by constraints whose particle set is rebuilt every
    /// step (density constraints, from the spatial-hash neighbor query).
    fn set_particles(&mut self, _particles: Vec<usize>) {}
}

#[derive(Clone, Debug)]
pub struct DistanceConstraint {
    particles: [usize; 2],
    l0: f64,
    alpha: ComplianceHandle,
    grad: [DVec3; 2],
}

impl DistanceConstraint {
    pub fn new(i: usize, j: usize, l0: f64, alpha: ComplianceHandle) -> DistanceConstraint {
        DistanceConstraint { particles: [i, j], l0, alpha, grad: [DVec3::ZERO; 2] }
    }
}

impl ConstraintBehavior for DistanceConstraint {
    fn particles(&self) -> &[usize] {
        &self.particles
    }
    fn alpha(&self) -> ComplianceHandle {
        self.alpha
    }
    fn eval(&mut self, x: &[DVec3], _ctx: &EvalContext) -> f64 {
        (x[self.particles[0]] - x[self.particles[1]]).length() - self.l0
    }
    fn grad(&mut self, x: &[DVec3], _ctx: &EvalContext) -> &[DVec3] {
        let dir = (x[self.particles[0]] - x[self.particles[1]]).try_normalize().unwrap_or(DVec3::X);
        self.grad = [dir, -dir];
        &self.grad
    }
    fn cached_grad(&self) -> &[DVec3] {
        &self.grad
    }
}

#[derive(Clone, Debug)]
pub struct PositionConstraint {
    particles: [usize; 1],
    x0: DVec3,
    alpha: ComplianceHandle,
    grad: [DVec3; 1],
}

impl PositionConstraint {
    pub fn new(i: usize, x0: DVec3, alpha: ComplianceHandle) -> PositionConstraint {
        PositionConstraint { particles: [i], x0, alpha, grad: [DVec3::ZERO; 1] }
    }
}

impl ConstraintBehavior for PositionConstraint {
    fn particles(&self) -> &[usize] {
        &self.particles
    }
    fn alpha(&self) -> ComplianceHandle {
        self.alpha
    }
    fn eval(&mut self, x: &[DVec3], _ctx: &EvalContext) -> f64 {
        (x[self.particles[0]] - self.x0).length()
    }
    fn grad(&mut self, x: &[DVec3], _ctx: &EvalContext) -> &[DVec3] {
        self.grad = [(x[self.particles[0]] - self.x0).try_normalize().unwrap_or(DVec3::X)];
        &self.grad
    }
    fn cached_grad(&self) -> &[DVec3] {
        &self.grad
    }
}

/// Distance between two particles is at least `l0`.
#[derive(Clone, Debug)]
pub struct MinDistanceConstraint {
    particles: [usize; 2],
    l0: f64,
    alpha: ComplianceHandle,
    grad: [DVec3; 2],
}

impl MinDistanceConstraint {
    pub fn new(i: usize, j: usize, l0: f64, alpha: ComplianceHandle) -> MinDistanceConstraint {
        MinDistanceConstraint { particles: [i, j], l0, alpha, grad: [DVec3::ZERO; 2] }
    }
}

impl ConstraintBehavior for MinDistanceConstraint {
    fn particles(&self) -> &[usize] {
        &self.particles
    }
    fn alpha(&self) -> ComplianceHandle {
        self.alpha
    }
    fn eval(&mut self, x: &[DVec3], _ctx: &EvalContext) -> f64 {
        (x[self.particles[0]] - x[self.particles[1]]).length() - self.l0
    }
    fn grad(&mut self, x: &[DVec3], _ctx: &EvalContext) -> &[DVec3] {
        let dir = (x[self.particles[0]] - x[self.particles[1]]).try_normalize().unwrap_or(DVec3::X);
        self.grad = [dir, -dir];
        &self.grad
    }
    fn cached_grad(&self) -> &[DVec3] {
        &self.grad
    }
    fn satisfied(&self, c: f64) -> bool {
        c >= 0.0
    }
}

/// Stay on the side of a plane the normal points to, `dist` above it.
#[derive(Clone, Debug)]
pub struct SemiPlaneConstraint {
    particles: [usize; 1],
    plane: PlaneHandle,
    dist: f64,
    alpha: ComplianceHandle,
    grad: [DVec3; 1],
}

impl SemiPlaneConstraint {
    pub fn new(i: usize, plane: PlaneHandle, dist: f64, alpha: ComplianceHandle) -> SemiPlaneConstraint {
        SemiPlaneConstraint { particles: [i], plane, dist, alpha, grad: [DVec3::ZERO; 1] }
    }
}

impl ConstraintBehavior for SemiPlaneConstraint {
    fn particles(&self) -> &[usize] {
        &self.particles
    }
    fn alpha(&self) -> ComplianceHandle {
        self.alpha
    }
    fn eval(&mut self, x: &[DVec3], ctx: &EvalContext) -> f64 {
        ctx.geo.plane(self.plane).signed_distance(x[self.particles[0]]) - self.dist
    }
    fn grad(&mut self, _x: &[DVec3], ctx: &EvalContext) -> &[DVec3] {
        self.grad = [ctx.geo.plane(self.plane).n];
        &self.grad
    }
    fn cached_grad(&self) -> &[DVec3] {
        &self.grad
    }
    fn satisfied(&self, c: f64) -> bool {
        c >= 0.0
    }
}

/// Distance from a fixed point is at least `l0`.
#[derive(Clone, Debug)]
pub struct SphereCollisionConstraint {
    particles: [usize; 1],
    center: PointHandle,
    l0: f64,
    alpha: ComplianceHandle,
    grad: [DVec3; 1],
}

impl SphereCollisionConstraint {
    pub fn new(i: usize, center: PointHandle, l0: f64, alpha: ComplianceHandle) -> SphereCollisionConstraint {
        SphereCollisionConstraint { particles: [i], center, l0, alpha, grad: [DVec3::ZERO; 1] }
    }
}

impl ConstraintBehavior for SphereCollisionConstraint {
    fn particles(&self) -> &[usize] {
        &self.particles
    }
    fn alpha(&self) -> ComplianceHandle {
        self.alpha
    }
    fn eval(&mut self, x: &[DVec3], ctx: &EvalContext) -> f64 {
        (x[self.particles[0]] - ctx.geo.point(self.center)).length() - self.l0
    }
    fn grad(&mut self, x: &[DVec3], ctx: &EvalContext) -> &[DVec3] {
        let dir = (x[self.particles[0]] - ctx.geo.point(self.center)).try_normalize().unwrap_or(DVec3::X);
        self.grad = [dir];
        &self.grad
    }
    fn cached_grad(&self) -> &[DVec3] {
        &self.grad
    }
    fn satisfied(&self, c: f64) -> bool {
        c >= 0.0
    }
}

/// Distance from an infinite cylinder's axis is at least its radius.
#[derive(Clone, Debug)]
pub struct CylinderCollisionConstraint {
    particles: [usize; 1],
    cylinder: CylinderHandle,
    alpha: ComplianceHandle,
    grad: [DVec3; 1],
}

impl CylinderCollisionConstraint {
    pub fn new(i: usize, cylinder: CylinderHandle, alpha: ComplianceHandle) -> CylinderCollisionConstraint {
        CylinderCollisionConstraint { particles: [i], cylinder, alpha, grad: [DVec3::ZERO; 1] }
    }
}

impl ConstraintBehavior for CylinderCollisionConstraint {
    fn particles(&self) -> &[usize] {
        &self.particles
    }
    fn alpha(&self) -> ComplianceHandle {
        self.alpha
    }
    fn eval(&mut self, x: &[DVec3], ctx: &EvalContext) -> f64 {
        let cyl = ctx.geo.cylinder(self.cylinder);
        (cyl.axis_projection(x[self.particles[0]]) - x[self.particles[0]]).length() - cyl.r
    }
    fn grad(&mut self, x: &[DVec3], ctx: &EvalContext) -> &[DVec3] {
        let cyl = ctx.geo.cylinder(self.cylinder);
        let axis_point = cyl.axis_projection(x[self.particles[0]]);
        let dir = (x[self.particles[0]] - axis_point).try_normalize().unwrap_or(DVec3::X);
        self.grad = [dir];
        &self.grad
    }
    fn cached_grad(&self) -> &[DVec3] {
        &self.grad
    }
    fn satisfied(&self, c: f64) -> bool {
        c >= 0.0
    }
}

/// Distance from a fixed point to triangle `(a, b, c)` is at least `l0`.
#[derive(Clone, Debug)]
pub struct SphereTriCollisionConstraint {
    particles: [usize; 3],
    center: PointHandle,
    l0: f64,
    alpha: ComplianceHandle,
    hit_point: DVec3,
    grad: [DVec3; 3],
}

impl SphereTriCollisionConstraint {
    pub fn new(
        a: usize,
        b: usize,
        c: usize,
        center: PointHandle,
        l0: f64,
        alpha: ComplianceHandle,
    ) -> SphereTriCollisionConstraint {
        SphereTriCollisionConstraint {
            particles: [a, b, c],
            center,
            l0,
            alpha,
            hit_point: DVec3::ZERO,
            grad: [DVec3::ZERO; 3],
        }
    }
}

impl ConstraintBehavior for SphereTriCollisionConstraint {
    fn particles(&self) -> &[usize] {
        &self.particles
    }
    fn alpha(&self) -> ComplianceHandle {
        self.alpha
    }
    fn eval(&mut self, x: &[DVec3], ctx: &EvalContext) -> f64 {
        let [a, b, c] = self.particles;
        let center = ctx.geo.point(self.center);
        self.hit_point = closest_point_on_triangle(x[a], x[b], x[c], center);
        (center - self.hit_point).length() - self.l0
    }
    fn grad(&mut self, _x: &[DVec3], ctx: &EvalContext) -> &[DVec3] {
        let center = ctx.geo.point(self.center);
        let dir = (self.hit_point - center).try_normalize().unwrap_or(DVec3::X);
        self.grad = [dir, dir, dir];
        &self.grad
    }
    fn cached_grad(&self) -> &[DVec3] {
        &self.grad
    }
    fn satisfied(&self, c: f64) -> bool {
        c >= 0.0
    }
}

/// Dihedral angle between two triangles sharing edge `(p1, p2)` is fixed.
#[derive(Clone, Debug)]
pub struct BendingConstraint {
    particles: [usize; 4],
    angle: f64,
    alpha: ComplianceHandle,
    grad: [DVec3; 4],
}

impl BendingConstraint {
    pub fn new(p1: usize, p2: usize, p3: usize, p4: usize, angle: f64, alpha: ComplianceHandle) -> BendingConstraint {
        BendingConstraint { particles: [p1, p2, p3, p4], angle, alpha, grad: [DVec3::ZERO; 4] }
    }
}

impl ConstraintBehavior for BendingConstraint {
    fn particles(&self) -> &[usize] {
        &self.particles
    }
    fn alpha(&self) -> ComplianceHandle {
        self.alpha
    }
    fn eval(&mut self, x: &[DVec3], _ctx: &EvalContext) -> f64 {
        let [p1, p2, p3, p4] = self.particles.map(|i| x[i]);
        let n1 = (p2 - p1).cross(p3 - p1);
        let n2 = (p2 - p1).cross(p4 - p1);

        let norms = n1.length() * n2.length();
        let mut d = n1.dot(n2);
        if norms > 1e-8 {
            d /= norms;
        }
        d.clamp(-1.0, 1.0).acos() - self.angle
    }
    fn grad(&mut self, x: &[DVec3], _ctx: &EvalContext) -> &[DVec3] {
        let p1 = x[self.particles[0]];
        let p2 = x[self.particles[1]] - p1;
        let p3 = x[self.particles[2]] - p1;
        let p4 = x[self.particles[3]] - p1;

        let n1 = p2.cross(p3).normalize_or_zero();
        let n2 = p2.cross(p4).normalize_or_zero();
        let d = n1.dot(n2).clamp(-1.0, 1.0);

        if d * d > 1.0 - 1e-8 {
            self.grad = [DVec3::ZERO; 4];
            return &self.grad;
        }

        let factor = 1.0 / (1.0 - d * d).sqrt();
        let len_n1 = p2.cross(p3).length();
        let len_n2 = p2.cross(p4).length();

        let q3 = factor * (p2.cross(n2) + p2.cross(n1) * d) / len_n1;
        let q4 = factor * (p2.cross(n1) + p2.cross(n2) * d) / len_n2;
        let q2 = -factor
            * ((p3.cross(n2) + p3.cross(n1) * d) / len_n1 + (p4.cross(n1) + p4.cross(n2) * d) / len_n2);
        let q1 = -q2 - q3 - q4;

        self.grad = [q1, q2, q3, q4];
        &self.grad
    }
    fn cached_grad(&self) -> &[DVec3] {
        &self.grad
    }
}

/// Signed volume of a single tetrahedron is fixed.
#[derive(Clone, Debug)]
pub struct VolumeConstraint {
    particles: [usize; 4],
    initial_volume: f64,
    alpha: ComplianceHandle,
    grad: [DVec3; 4],
}

fn tet_volume(p1: DVec3, p2: DVec3, p3: DVec3, p4: DVec3) -> f64 {
    (p2 - p1).cross(p3 - p1).dot(p4 - p1)
}

impl VolumeConstraint {
    pub fn new(p1: usize, p2: usize, p3: usize, p4: usize, x: &[DVec3], alpha: ComplianceHandle) -> VolumeConstraint {
        let initial_volume = tet_volume(x[p1], x[p2], x[p3], x[p4]);
        VolumeConstraint { particles: [p1, p2, p3, p4], initial_volume, alpha, grad: [DVec3::ZERO; 4] }
    }
}

impl ConstraintBehavior for VolumeConstraint {
    fn particles(&self) -> &[usize] {
        &self.particles
    }
    fn alpha(&self) -> ComplianceHandle {
        self.alpha
    }
    fn eval(&mut self, x: &[DVec3], _ctx: &EvalContext) -> f64 {
        let [p1, p2, p3, p4] = self.particles.map(|i| x[i]);
        tet_volume(p1, p2, p3, p4) - self.initial_volume
    }
    fn grad(&mut self, x: &[DVec3], _ctx: &EvalContext) -> &[DVec3] {
        let [p1, p2, p3, p4] = self.particles.map(|i| x[i]);
        let v1 = p2 - p1;
        let v2 = p3 - p1;
        let v3 = p4 - p1;
        self.grad = [(p4 - p2).cross(p3 - p2), v2.cross(v3), v3.cross(v1), v1.cross(v2)];
        &self.grad
    }
    fn cached_grad(&self) -> &[DVec3] {
        &self.grad
    }
}

/// Total enclosed volume of a closed triangle mesh is `pressure` times its
/// rest volume; raising `pressure` above 1 inflates the body.
#[derive(Clone, Debug)]
pub struct MeshVolumeConstraint {
    particles: Vec<usize>,
    triangles: Vec<[usize; 3]>,
    start_index: usize,
    initial_volume: f64,
    pressure: f64,
    alpha: ComplianceHandle,
    grad: Vec<DVec3>,
}

impl MeshVolumeConstraint {
    /// `triangles` are local indices (0-based within this body); `start_index`
    /// is where this body's particles begin in the solver's global array.
    pub fn new(
        triangles: Vec<[usize; 3]>,
        vertex_count: usize,
        start_index: usize,
        x: &[DVec3],
        pressure: f64,
        alpha: ComplianceHandle,
    ) -> MeshVolumeConstraint {
        let particles: Vec<usize> = (start_index..start_index + vertex_count).collect();
        let mut constraint = MeshVolumeConstraint {
            particles,
            triangles,
            start_index,
            initial_volume: 0.0,
            pressure,
            alpha,
            grad: vec![DVec3::ZERO; vertex_count],
        };
        constraint.initial_volume = constraint.calculate_volume(x);
        constraint
    }

    pub fn set_pressure(&mut self, pressure: f64) {
        self.pressure = pressure;
    }

    fn calculate_volume(&self, x: &[DVec3]) -> f64 {
        self.triangles
            .iter()
            .map(|&[ia, ib, ic]| {
                let (a, b, c) = self.global_triangle(x, ia, ib, ic);
                a.cross(b).dot(c)
            })
            .sum()
    }

    fn global_triangle(&self, x: &[DVec3], ia: usize, ib: usize, ic: usize) -> (DVec3, DVec3, DVec3) {
        (
            x[self.start_index + ia],
            x[self.start_index + ib],
            x[self.start_index + ic],
        )
    }
}

impl ConstraintBehavior for MeshVolumeConstraint {
    fn particles(&self) -> &[usize] {
        &self.particles
    }
    fn alpha(&self) -> ComplianceHandle {
        self.alpha
    }
    fn eval(&mut self, x: &[DVec3], _ctx: &EvalContext) -> f64 {
        self.calculate_volume(x) - self.pressure * self.initial_volume
    }
    fn grad(&mut self, x: &[DVec3], _ctx: &EvalContext) -> &[DVec3] {
        self.grad.iter_mut().for_each(|g| *g = DVec3::ZERO);
        for &[ia, ib, ic] in &self.triangles {
            let (a, b, c) = self.global_triangle(x, ia, ib, ic);
            self.grad[ia] += b.cross(c);
            self.grad[ib] += c.cross(a);
            self.grad[ic] += a.cross(b);
        }
        &self.grad
    }
    fn cached_grad(&self) -> &[DVec3] {
        &self.grad
    }
}

/// SPH rest-density constraint: particle `particles()[0]`'s neighborhood
/// density (itself plus the neighbors listed after it) must not exceed the
/// fluid's rest density. The neighbor list is replaced every step by the
/// solver's spatial-hash query.
#[derive(Clone, Debug)]
pub struct DensityConstraint {
    particles: Vec<usize>,
    alpha: ComplianceHandle,
    grad: Vec<DVec3>,
}

impl DensityConstraint {
    pub fn new(p0: usize, alpha: ComplianceHandle) -> DensityConstraint {
        DensityConstraint { particles: vec![p0], alpha, grad: Vec::new() }
    }
}

impl ConstraintBehavior for DensityConstraint {
    fn particles(&self) -> &[usize] {
        &self.particles
    }
    fn alpha(&self) -> ComplianceHandle {
        self.alpha
    }
    fn eval(&mut self, x: &[DVec3], ctx: &EvalContext) -> f64 {
        let p0 = self.particles[0];
        let density: f64 = self.particles.iter().map(|&j| ctx.fluid.m * poly6(x[p0], x[j], ctx.fluid.h)).sum();
        density - ctx.fluid.d0
    }
    fn grad(&mut self, x: &[DVec3], ctx: &EvalContext) -> &[DVec3] {
        self.grad.clear();
        self.grad.resize(self.particles.len(), DVec3::ZERO);
        let p0 = self.particles[0];
        for i in 1..self.particles.len() {
            let g = -ctx.fluid.m * spiky_grad(x[p0], x[self.particles[i]], ctx.fluid.h);
            self.grad[i] = g;
            self.grad[0] -= g;
        }
        &self.grad
    }
    fn cached_grad(&self) -> &[DVec3] {
        &self.grad
    }
    fn satisfied(&self, c: f64) -> bool {
        c <= 0.0
    }
    fn set_particles(&mut self, particles: Vec<usize>) {
        self.particles = particles;
    }
}

/// Closed set of every constraint kind the solver knows how to project,
/// dispatched by matching instead of a vtable.
#[derive(Clone, Debug)]
pub enum ConstraintKind {
    Distance(DistanceConstraint),
    Position(PositionConstraint),
    MinDistance(MinDistanceConstraint),
    SemiPlane(SemiPlaneConstraint),
    SphereCollision(SphereCollisionConstraint),
    CylinderCollision(CylinderCollisionConstraint),
    SphereTriCollision(SphereTriCollisionConstraint),
    Bending(BendingConstraint),
    Volume(VolumeConstraint),
    MeshVolume(MeshVolumeConstraint),
    Density(DensityConstraint),
}

macro_rules! dispatch {
    ($self:ident, $method:ident ( $($arg:expr),* )) => {
        match $self {
            ConstraintKind::Distance(c) => c.$method($($arg),*),
            ConstraintKind::Position(c) => c.$method($($arg),*),
            ConstraintKind::MinDistance(c) => c.$method($($arg),*),
            ConstraintKind::SemiPlane(c) => c.$method($($arg),*),
            ConstraintKind::SphereCollision(c) => c.$method($($arg),*),
            ConstraintKind::CylinderCollision(c) => c.$method($($arg),*),
            ConstraintKind::SphereTriCollision(c) => c.$method($($arg),*),
            ConstraintKind::Bending(c) => c.$method($($arg),*),
            ConstraintKind::Volume(c) => c.$method($($arg),*),
            ConstraintKind::MeshVolume(c) => c.$method($($arg),*),
            ConstraintKind::Density(c) => c.$method($($arg),*),
        }
    };
}

impl ConstraintBehavior for ConstraintKind {
    fn particles(&self) -> &[usize] {
        dispatch!(self, particles())
    }
    fn alpha(&self) -> ComplianceHandle {
        dispatch!(self, alpha())
    }
    fn eval(&mut self, x: &[DVec3], ctx: &EvalContext) -> f64 {
        dispatch!(self, eval(x, ctx))
    }
    fn grad(&mut self, x: &[DVec3], ctx: &EvalContext) -> &[DVec3] {
        dispatch!(self, grad(x, ctx))
    }
    fn cached_grad(&self) -> &[DVec3] {
        dispatch!(self, cached_grad())
    }
    fn satisfied(&self, c: f64) -> bool {
        dispatch!(self, satisfied(c))
    }
    fn norm_grad(&self, w: &[f64]) -> f64 {
        dispatch!(self, norm_grad(w))
    }
    fn set_particles(&mut self, particles: Vec<usize>) {
        dispatch!(self, set_particles(particles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::ComplianceArena;
    use approx::assert_relative_eq;

    fn ctx(geo: &GeometryArena, fluid: &FluidParams) -> EvalContext<'_> {
        EvalContext { geo, fluid }
    }

    #[test]
    fn distance_constraint_tracks_stretch() {
        let mut arena = ComplianceArena::new();
        let alpha = arena.insert(0.0);
        let x = vec![DVec3::ZERO, DVec3::new(1.5, 0.0, 0.0)];
        let mut c = DistanceConstraint::new(0, 1, 1.0, alpha);
        let geo = GeometryArena::new();
        let fluid = FluidParams::default();
        let eval_ctx = ctx(&geo, &fluid);
        assert_relative_eq!(c.eval(&x, &eval_ctx), 0.5);
        let grad = c.grad(&x, &eval_ctx);
        assert_relative_eq!(grad[0], DVec3::new(-1.0, 0.0, 0.0), epsilon = 1e-9);
        let w = vec![1.0, 1.0];
        assert_relative_eq!(c.norm_grad(&w), 2.0);
    }

    #[test]
    fn semi_plane_constraint_is_unilateral() {
        use crate::geometry::SemiPlane;
        let mut geo = GeometryArena::new();
        let plane = geo.insert_plane(SemiPlane::new(DVec3::ZERO, DVec3::Y));
        let mut arena = ComplianceArena::new();
        let alpha = arena.insert(0.0);
        let mut c = SemiPlaneConstraint::new(0, plane, 0.0, alpha);
        let fluid = FluidParams::default();
        let eval_ctx = ctx(&geo, &fluid);

        let above = vec![DVec3::new(0.0, 1.0, 0.0)];
        assert!(c.satisfied(c.eval(&above, &eval_ctx)));

        let below = vec![DVec3::new(0.0, -1.0, 0.0)];
        let val = c.eval(&below, &eval_ctx);
        assert!(!c.satisfied(val));
    }

    #[test]
    fn density_constraint_rebuilds_neighbor_list_each_step() {
        let mut arena = ComplianceArena::new();
        let alpha = arena.insert(0.0);
        let mut c = DensityConstraint::new(0, alpha);
        c.set_particles(vec![0, 1, 2]);
        assert_eq!(c.particles(), &[0, 1, 2]);

        let x = vec![DVec3::ZERO, DVec3::new(0.005, 0.0, 0.0), DVec3::new(0.0, 0.005, 0.0)];
        let geo = GeometryArena::new();
        let fluid = FluidParams::default();
        let eval_ctx = ctx(&geo, &fluid);
        let c_val = c.eval(&x, &eval_ctx);
        assert!(c_val.is_finite());

        let grad = c.grad(&x, &eval_ctx);
        // Self-gradient is the negated sum of neighbor gradients (momentum-conserving).
        assert_relative_eq!(grad[0], -(grad[1] + grad[2]), epsilon = 1e-9);
    }

    #[test]
    fn bending_constraint_zero_for_flat_quad() {
        let mut arena = ComplianceArena::new();
        let alpha = arena.insert(0.0);
        let mut c = BendingConstraint::new(0, 1, 2, 3, std::f64::consts::PI, alpha);
        // Two coplanar triangles sharing edge (p1, p2): the dihedral angle is pi.
        let x = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, -1.0, 0.0),
        ];
        let geo = GeometryArena::new();
        let fluid = FluidParams::default();
        let eval_ctx = ctx(&geo, &fluid);
        assert_relative_eq!(c.eval(&x, &eval_ctx), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn mesh_volume_constraint_scales_with_pressure() {
        // A unit-ish tetrahedron treated as a 4-vertex closed mesh.
        let x = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
        ];
        let triangles = vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];
        let mut arena = ComplianceArena::new();
        let alpha = arena.insert(0.0);
        let mut c = MeshVolumeConstraint::new(triangles, 4, 0, &x, 1.0, alpha);
        let geo = GeometryArena::new();
        let fluid = FluidParams::default();
        let eval_ctx = ctx(&geo, &fluid);
        assert_relative_eq!(c.eval(&x, &eval_ctx), 0.0, epsilon = 1e-9);

        c.set_pressure(2.0);
        let c_val = c.eval(&x, &eval_ctx);
        assert!(c_val < 0.0, "doubling target volume should read as under-inflated");
    }
}
