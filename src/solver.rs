//! The XPBD solver proper: predicts positions under gravity, projects every
//! constraint in Gauss-Seidel order with compliance-scaled Lagrange
//! multipliers, then derives velocities from the position delta. Two outer
//! loops are exposed: [`Solver::update`] (one predict, N projection sweeps,
//! a single velocity update) and [`Solver::update_substeps`] (N independent
//! predict/project/update cycles with Rayleigh damping and friction), mirroring
//! the two update strategies real-time XPBD engines pick between depending on
//! how stiff their constraints are.
use glam::DVec3;
use rustc_hash::FxHashMap;
use tracing::{instrument, trace, trace_span, warn};

use crate::compliance::{ComplianceArena, ComplianceHandle};
use crate::constraint::{
    ConstraintBehavior, ConstraintKind, DensityConstraint, EvalContext, FluidParams, MinDistanceConstraint,
};
use crate::error::SolverError;
use crate::geometry::GeometryArena;
use crate::shape_match::ShapeMatcher;
use crate::spatial_grid::SpatialGrid;

pub const DEFAULT_ITERATIONS: usize = 20;

struct CollisionConfig {
    h: f64,
    alpha: ComplianceHandle,
    enabled: bool,
}

struct RigidBody {
    matcher: ShapeMatcher,
    particles: Vec<usize>,
}

/// Owns the full particle state (positions, velocities, inverse masses) and
/// the constraint set that acts on it. Constructed once per simulated body
/// or scene; [`update`](Solver::update)/[`update_substeps`](Solver::update_substeps)
/// advance it by one frame.
#[derive(Debug)]
pub struct Solver {
    x: Vec<DVec3>,
    v: Vec<DVec3>,
    w: Vec<f64>,
    saved_mass: FxHashMap<usize, f64>,
    constraints: Vec<ConstraintKind>,
    permanent_count: usize,
    compliance: ComplianceArena,
    geo: GeometryArena,
    gravity: DVec3,
    n_iterations: usize,

    grid: SpatialGrid,
    collision: Option<CollisionConfig>,

    fluid_params: FluidParams,
    use_fluids: bool,
    fluid_constraints: FxHashMap<usize, usize>,

    rigid: Option<RigidBody>,
}

impl std::fmt::Debug for CollisionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionConfig").field("h", &self.h).field("enabled", &self.enabled).finish()
    }
}

impl std::fmt::Debug for RigidBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RigidBody").field("particles", &self.particles.len()).finish()
    }
}

impl Solver {
    pub fn new(positions: Vec<DVec3>, default_mass: f64) -> Result<Solver, SolverError> {
        if positions.is_empty() {
            return Err(SolverError::EmptyParticleSet);
        }
        if !default_mass.is_finite() || default_mass <= 0.0 {
            return Err(SolverError::InvalidDefaultMass(default_mass));
        }

        let n = positions.len();
        Ok(Solver {
            v: vec![DVec3::ZERO; n],
            w: vec![1.0 / default_mass; n],
            x: positions,
            saved_mass: FxHashMap::default(),
            constraints: Vec::new(),
            permanent_count: 0,
            compliance: ComplianceArena::new(),
            geo: GeometryArena::new(),
            gravity: DVec3::new(0.0, -9.81, 0.0),
            n_iterations: DEFAULT_ITERATIONS,
            grid: SpatialGrid::new(1.0),
            collision: None,
            fluid_params: FluidParams::default(),
            use_fluids: false,
            fluid_constraints: FxHashMap::default(),
            rigid: None,
        })
    }

    pub fn particle_count(&self) -> usize {
        self.x.len()
    }

    pub fn positions(&self) -> &[DVec3] {
        &self.x
    }

    pub fn velocities(&self) -> &[DVec3] {
        &self.v
    }

    pub fn inverse_masses(&self) -> &[f64] {
        &self.w
    }

    pub fn set_gravity(&mut self, gravity: DVec3) {
        self.gravity = gravity;
    }

    pub fn set_iterations(&mut self, n: usize) {
        self.n_iterations = n;
    }

    pub fn compliance_arena_mut(&mut self) -> &mut ComplianceArena {
        &mut self.compliance
    }

    pub fn insert_compliance(&mut self, alpha: f64) -> ComplianceHandle {
        self.compliance.insert(alpha)
    }

    pub fn geometry_mut(&mut self) -> &mut GeometryArena {
        &mut self.geo
    }

    pub fn geometry(&self) -> &GeometryArena {
        &self.geo
    }

    /// Registers a permanent constraint (as opposed to the transient
    /// collision constraints the solver itself generates every step).
    pub fn add_constraint(&mut self, constraint: ConstraintKind) -> Result<(), SolverError> {
        for (i, &p) in constraint.particles().iter().enumerate() {
            if p >= self.x.len() {
                return Err(SolverError::ParticleIndexOutOfRange {
                    constraint_index: self.constraints.len(),
                    particle_index: i,
                    particle_count: self.x.len(),
                });
            }
        }
        self.constraints.push(constraint);
        self.permanent_count = self.constraints.len();
        Ok(())
    }

    pub fn add_fixed_point(&mut self, index: usize) {
        self.saved_mass.entry(index).or_insert(self.w[index]);
        self.w[index] = 0.0;
    }

    pub fn add_fixed_point_at(&mut self, index: usize, pos: DVec3) {
        self.add_fixed_point(index);
        self.x[index] = pos;
    }

    /// Restores the particle's inverse mass to what it was before it was
    /// last pinned. A no-op (with a warning) if the particle was never pinned.
    pub fn remove_fixed_point(&mut self, index: usize) {
        match self.saved_mass.remove(&index) {
            Some(mass) => self.w[index] = mass,
            None => warn!(index, "remove_fixed_point called on a particle that was never pinned"),
        }
    }

    pub fn set_pos(&mut self, index: usize, pos: DVec3) {
        self.x[index] = pos;
    }

    pub fn set_all_pos(&mut self, positions: Vec<DVec3>) -> Result<(), SolverError> {
        if positions.len() != self.x.len() {
            return Err(SolverError::PositionCountMismatch { expected: self.x.len(), got: positions.len() });
        }
        self.x = positions;
        Ok(())
    }

    pub fn activate_global_collision(&mut self, h: f64, alpha: f64) {
        let alpha = self.compliance.insert(alpha);
        self.collision = Some(CollisionConfig { h, alpha, enabled: true });
        self.grid = SpatialGrid::new(h);
    }

    /// Toggles global collision on or off without discarding the cached
    /// `(h, alpha)` from [`activate_global_collision`](Self::activate_global_collision) —
    /// a no-op if global collision was never activated.
    pub fn set_global_collision(&mut self, on: bool) {
        if let Some(collision) = &mut self.collision {
            collision.enabled = on;
        } else {
            warn!("set_global_collision called before activate_global_collision");
        }
    }

    pub fn get_global_collision(&self) -> bool {
        self.active_collision().is_some()
    }

    fn active_collision(&self) -> Option<&CollisionConfig> {
        self.collision.as_ref().filter(|c| c.enabled)
    }

    /// Marks `particle_ids` as an SPH fluid body, inserting one permanent
    /// [`DensityConstraint`] per particle.
    pub fn activate_fluids(&mut self, particle_ids: &[usize], params: FluidParams, alpha: f64) {
        self.use_fluids = true;
        self.fluid_params = params;
        let alpha_handle = self.compliance.insert(alpha);
        for &id in particle_ids {
            let slot = self.constraints.len();
            self.constraints.push(ConstraintKind::Density(DensityConstraint::new(id, alpha_handle)));
            self.fluid_constraints.insert(id, slot);
        }
        self.permanent_count = self.constraints.len();
    }

    pub fn activate_rigid(&mut self, matcher: ShapeMatcher, particles: Vec<usize>) {
        self.rigid = Some(RigidBody { matcher, particles });
    }

    /// One predict/project/update cycle over the full timestep, with
    /// N Gauss-Seidel sweeps over every constraint and plain (undamped)
    /// Lagrange-multiplier accumulation.
    #[instrument(level = "trace", skip(self))]
    pub fn update(&mut self, dt: f64) {
        let n = self.x.len();
        let mut next_x: Vec<DVec3> =
            (0..n).map(|i| if self.w[i] != 0.0 { self.x[i] + dt * self.v[i] + dt * dt * self.gravity } else { self.x[i] }).collect();

        self.apply_rigid(&mut next_x);
        self.generate_collision_constraints();
        self.generate_fluid_neighbors();

        let mut lambda = vec![0.0; self.constraints.len()];

        for iter in 0..self.n_iterations {
            let span = trace_span!("iteration", iter);
            let _enter = span.enter();

            for j in 0..self.constraints.len() {
                let c = &mut self.constraints[j];
                let ctx = EvalContext { geo: &self.geo, fluid: &self.fluid_params };

                let c_val = c.eval(&next_x, &ctx);
                if c.satisfied(c_val) {
                    continue;
                }

                let grad = c.grad(&next_x, &ctx).to_vec();
                let norm_grad = c.norm_grad(&self.w);
                let particles = c.particles().to_vec();
                let alpha = self.compliance.get(c.alpha()) / (dt * dt);

                let denom = norm_grad + alpha;
                if denom.abs() < 1e-12 {
                    trace!(constraint = j, "degenerate normGrad + alpha, skipping projection");
                    continue;
                }

                let dlambda = (-c_val - alpha * lambda[j]) / denom;
                lambda[j] += dlambda;

                for (i, &p) in particles.iter().enumerate() {
                    next_x[p] += dlambda * self.w[p] * grad[i];
                }

                self.apply_rigid(&mut next_x);
            }
        }

        for i in 0..n {
            self.v[i] = (next_x[i] - self.x[i]) / dt;
            self.x[i] = next_x[i];
        }

        self.clean_collision_constraints();
    }

    /// `N` independent substeps of length `dt_total / N`, each with its own
    /// predict/project/update, Rayleigh damping on every projection, a
    /// friction pass over the step's collision constraints, and a velocity
    /// clamp that prevents a particle from tunneling through the collision
    /// grid's cell size in one substep.
    #[instrument(level = "trace", skip(self))]
    pub fn update_substeps(&mut self, dt_total: f64) {
        const DAMPING_BETA: f64 = 0.05;

        let n = self.x.len();
        let dt = dt_total / self.n_iterations as f64;
        let vmax = self.active_collision().map_or(f64::MAX, |c| c.h / 4.0 / dt);

        self.generate_collision_constraints();
        self.generate_fluid_neighbors();

        let mut next_x = vec![DVec3::ZERO; n];

        for sub in 0..self.n_iterations {
            let span = trace_span!("substep", sub);
            let _enter = span.enter();

            for i in 0..n {
                next_x[i] = if self.w[i] != 0.0 { self.x[i] + dt * self.v[i] + dt * dt * self.gravity } else { self.x[i] };
            }

            for j in 0..self.constraints.len() {
                let c = &mut self.constraints[j];
                let ctx = EvalContext { geo: &self.geo, fluid: &self.fluid_params };

                let c_val = c.eval(&next_x, &ctx);
                if c.satisfied(c_val) {
                    continue;
                }

                let grad = c.grad(&next_x, &ctx).to_vec();
                let norm_grad = c.norm_grad(&self.w);
                let particles = c.particles().to_vec();
                let alpha = self.compliance.get(c.alpha()) / (dt * dt);
                let gamma = DAMPING_BETA * alpha / dt;

                let correction: f64 =
                    particles.iter().enumerate().map(|(i, &p)| grad[i].dot(next_x[p] - self.x[p])).sum();

                let denom = (1.0 + gamma) * norm_grad + alpha;
                if denom.abs() < 1e-12 {
                    trace!(constraint = j, "degenerate damped denominator, skipping projection");
                    continue;
                }

                let dlambda = (-c_val - gamma * correction) / denom;

                for (i, &p) in particles.iter().enumerate() {
                    next_x[p] += dlambda * self.w[p] * grad[i];
                }
            }

            self.apply_friction(&mut next_x, dt);
            self.apply_rigid(&mut next_x);

            for i in 0..n {
                self.v[i] = (next_x[i] - self.x[i]) / dt;
                if self.active_collision().is_some() {
                    let speed = self.v[i].length();
                    if speed > vmax {
                        self.v[i] *= vmax / speed;
                        self.x[i] += self.v[i] * dt;
                    } else {
                        self.x[i] = next_x[i];
                    }
                } else {
                    self.x[i] = next_x[i];
                }
            }
        }

        self.clean_collision_constraints();
    }

    fn apply_rigid(&self, next_x: &mut [DVec3]) {
        let Some(rigid) = &self.rigid else { return };
        let mut local: Vec<DVec3> = rigid.particles.iter().map(|&i| next_x[i]).collect();
        rigid.matcher.project(&mut local);
        for (&i, &p) in rigid.particles.iter().zip(&local) {
            next_x[i] = p;
        }
    }

    /// Rebuilds transient collision constraints from the positions at the
    /// start of this step (not the in-progress prediction), exactly the way
    /// they're cleared again in [`clean_collision_constraints`](Self::clean_collision_constraints).
    fn generate_collision_constraints(&mut self) {
        let Some(collision) = self.active_collision() else { return };
        let (h, alpha) = (collision.h, collision.alpha);

        self.grid.clear();
        for (i, &p) in self.x.iter().enumerate() {
            self.grid.insert(p, i);
        }

        let mut pairs = Vec::new();
        self.grid.for_each_neighbor_pair(|a, b| pairs.push((a, b)));
        for (a, b) in pairs {
            self.constraints.push(ConstraintKind::MinDistance(MinDistanceConstraint::new(a, b, h, alpha)));
        }
    }

    fn clean_collision_constraints(&mut self) {
        if self.active_collision().is_none() {
            return;
        }
        self.constraints.truncate(self.permanent_count);
    }

    fn apply_friction(&self, next_x: &mut [DVec3], dt: f64) {
        if self.active_collision().is_none() {
            return;
        }
        let d = 20.0 * dt;
        for c in &self.constraints[self.permanent_count..] {
            let p = c.particles();
            let (p1, p2) = (p[0], p[1]);
            let v1 = next_x[p1] - self.x[p1];
            let v2 = next_x[p2] - self.x[p2];
            let v_avg = (v1 + v2) * 0.5;
            next_x[p1] += d * (v_avg - v1);
            next_x[p2] += d * (v_avg - v2);
        }
    }

    /// Rebuilds every fluid particle's neighbor list (itself plus every
    /// other fluid particle sharing its spatial-hash neighborhood) and
    /// writes it into the matching [`DensityConstraint`].
    fn generate_fluid_neighbors(&mut self) {
        if !self.use_fluids {
            return;
        }
        let h = self.fluid_params.h;
        let mapping = self.fluid_constraints.clone();

        let mut grid = SpatialGrid::new(h);
        for &id in mapping.keys() {
            grid.insert(self.x[id], id);
        }

        for (&id, &slot) in &mapping {
            let mut neighbors = vec![id];
            grid.neighbors_of(self.x[id], id, |q| {
                if mapping.contains_key(&q) {
                    neighbors.push(q);
                }
            });
            self.constraints[slot].set_particles(neighbors);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::DistanceConstraint;
    use crate::geometry::SemiPlane;
    use approx::assert_relative_eq;

    #[test]
    fn empty_particle_set_is_rejected() {
        assert_eq!(Solver::new(vec![], 1.0), Err(SolverError::EmptyParticleSet));
    }

    #[test]
    fn invalid_default_mass_is_rejected() {
        assert_eq!(Solver::new(vec![DVec3::ZERO], 0.0), Err(SolverError::InvalidDefaultMass(0.0)));
        assert_eq!(Solver::new(vec![DVec3::ZERO], -1.0), Err(SolverError::InvalidDefaultMass(-1.0)));
    }

    #[test]
    fn constraint_with_out_of_range_particle_is_rejected() {
        let mut solver = Solver::new(vec![DVec3::ZERO], 1.0).unwrap();
        let alpha = solver.insert_compliance(0.0);
        let result = solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(0, 5, 1.0, alpha)));
        assert!(matches!(result, Err(SolverError::ParticleIndexOutOfRange { .. })));
    }

    #[test]
    fn pinned_particle_does_not_move_under_gravity() {
        let mut solver = Solver::new(vec![DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0)], 1.0).unwrap();
        solver.add_fixed_point(0);
        for _ in 0..10 {
            solver.update(1.0 / 60.0);
        }
        assert_relative_eq!(solver.positions()[0], DVec3::ZERO, epsilon = 1e-9);
    }

    #[test]
    fn remove_fixed_point_restores_prior_inverse_mass() {
        let mut solver = Solver::new(vec![DVec3::ZERO], 2.0).unwrap();
        let original_w = solver.inverse_masses()[0];
        solver.add_fixed_point(0);
        assert_relative_eq!(solver.inverse_masses()[0], 0.0);
        solver.remove_fixed_point(0);
        assert_relative_eq!(solver.inverse_masses()[0], original_w);
    }

    #[test]
    fn free_fall_matches_kinematics_after_one_step() {
        let mut solver = Solver::new(vec![DVec3::ZERO], 1.0).unwrap();
        solver.set_gravity(DVec3::new(0.0, -9.81, 0.0));
        let dt = 1.0 / 60.0;
        solver.update(dt);
        assert_relative_eq!(solver.positions()[0].y, -9.81 * dt * dt, epsilon = 1e-9);
    }

    #[test]
    fn semi_plane_floor_stops_a_falling_particle() {
        let mut solver = Solver::new(vec![DVec3::new(0.0, 0.5, 0.0)], 1.0).unwrap();
        let plane = solver.geometry_mut().insert_plane(SemiPlane::new(DVec3::ZERO, DVec3::Y));
        let alpha = solver.insert_compliance(0.0);
        solver
            .add_constraint(ConstraintKind::SemiPlane(crate::constraint::SemiPlaneConstraint::new(0, plane, 0.0, alpha)))
            .unwrap();

        for _ in 0..120 {
            solver.update_substeps(1.0 / 60.0);
        }

        assert!(solver.positions()[0].y >= -1e-3, "particle penetrated the floor: {:?}", solver.positions()[0]);
    }

    #[test]
    fn no_nan_after_many_steps_of_a_stiff_distance_constraint() {
        let mut solver = Solver::new(vec![DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0)], 1.0).unwrap();
        solver.add_fixed_point(0);
        let alpha = solver.insert_compliance(0.0);
        solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(0, 1, 1.0, alpha))).unwrap();

        for _ in 0..300 {
            solver.update_substeps(1.0 / 60.0);
        }

        for &p in solver.positions() {
            assert!(p.is_finite());
        }
    }

    #[test]
    fn global_collision_can_be_toggled_without_losing_its_config() {
        let mut solver = Solver::new(vec![DVec3::ZERO, DVec3::new(0.05, 0.0, 0.0)], 1.0).unwrap();
        assert!(!solver.get_global_collision());

        solver.activate_global_collision(0.2, 1e-8);
        assert!(solver.get_global_collision());

        solver.set_global_collision(false);
        assert!(!solver.get_global_collision());

        solver.set_global_collision(true);
        assert!(solver.get_global_collision());
    }

    #[test]
    fn set_global_collision_before_activation_is_a_harmless_no_op() {
        let mut solver = Solver::new(vec![DVec3::ZERO], 1.0).unwrap();
        solver.set_global_collision(true);
        assert!(!solver.get_global_collision());
    }
}
