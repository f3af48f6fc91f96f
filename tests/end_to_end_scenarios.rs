//! The six reference scenarios: small, hand-built solver configurations with
//! numeric thresholds a correct XPBD implementation must satisfy. These are
//! built directly from [`xpbd::Solver`] and constraint primitives rather than
//! through the `Scene` factories, since each one pins exact parameter values
//! (grid size, starting height, spacing) that a general-purpose factory
//! wouldn't reproduce verbatim.
use glam::DVec3;

use xpbd::constraint::{
    ConstraintKind, DistanceConstraint, MeshVolumeConstraint, MinDistanceConstraint, SemiPlaneConstraint,
};
use xpbd::geometry::SemiPlane;
use xpbd::scene::icosphere;
use xpbd::shape_match::ShapeMatcher;
use xpbd::solver::Solver;

const DT: f64 = 0.016;

#[test]
fn single_pendulum_swings_on_its_first_step() {
    let mut solver = Solver::new(vec![DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0)], 1.0).unwrap();
    let alpha = solver.insert_compliance(0.0);
    solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(0, 1, 1.0, alpha))).unwrap();
    solver.add_fixed_point(0);
    solver.set_iterations(20);

    solver.update(DT);

    let free = solver.positions()[1];
    assert!(free.y > -2e-3 && free.y < 0.0, "y = {}", free.y);
    assert!((free.length() - 1.0).abs() < 1e-3);
}

#[test]
fn hanging_cord_settles_with_the_right_spacing() {
    let positions: Vec<DVec3> = (0..10).map(|i| DVec3::new(0.5 * i as f64, 0.0, 0.0)).collect();
    let mut solver = Solver::new(positions, 1.0).unwrap();
    let alpha = solver.insert_compliance(1e-8);
    for i in 0..9 {
        solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(i, i + 1, 0.5, alpha))).unwrap();
    }
    solver.add_fixed_point(0);
    solver.set_iterations(20);

    for _ in 0..120 {
        solver.update(DT);
    }

    let pos = solver.positions();
    assert!(pos[9].y < -1.0, "y = {}", pos[9].y);
    assert!(((pos[9] - pos[8]).length() - 0.5).abs() < 1e-2);
}

#[test]
fn cloth_on_a_plane_never_sinks_through() {
    let w = 8;
    let h = 8;
    let distance = 0.1;
    let mut positions = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            positions.push(DVec3::new(distance * x as f64, 1.0, distance * y as f64));
        }
    }

    let mut solver = Solver::new(positions, 0.1).unwrap();
    let alpha_distance = solver.insert_compliance(1e-8);
    let alpha_plane = solver.insert_compliance(1e-8);
    let plane = solver.geometry_mut().insert_plane(SemiPlane::new(DVec3::new(0.0, -1.5, 0.0), DVec3::Y));

    for y in 0..h {
        for x in 0..w {
            let here = y * w + x;
            if x != w - 1 {
                solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(here, y * w + x + 1, distance, alpha_distance))).unwrap();
            }
            if y != h - 1 {
                solver.add_constraint(ConstraintKind::Distance(DistanceConstraint::new(here, (y + 1) * w + x, distance, alpha_distance))).unwrap();
            }
            solver.add_constraint(ConstraintKind::SemiPlane(SemiPlaneConstraint::new(here, plane, 0.0, alpha_plane))).unwrap();
        }
    }
    solver.set_iterations(20);

    for _ in 0..300 {
        solver.update(DT);
    }

    for p in solver.positions() {
        assert!(p.y >= -1.55, "vertex fell through: {p:?}");
    }
}

#[test]
fn sphere_pile_never_overlaps_beyond_tolerance() {
    let radius = 0.1;
    let mut positions = Vec::with_capacity(50);
    for i in 0..50 {
        let t = i as f64;
        positions.push(DVec3::new(
            (-1.0 + 2.0 * ((t * 7.0) % 10.0) / 9.0) * 0.9,
            (-1.0 + 2.0 * ((t * 13.0) % 10.0) / 9.0) * 0.9,
            (-1.0 + 2.0 * ((t * 19.0) % 10.0) / 9.0) * 0.9,
        ));
    }

    let mut solver = Solver::new(positions, 0.1).unwrap();
    let alpha_plane = solver.insert_compliance(1e-8);
    let alpha_collision = solver.insert_compliance(1e-8);

    let planes = [
        SemiPlane::new(DVec3::new(-1.0, 0.0, 0.0), DVec3::X),
        SemiPlane::new(DVec3::new(1.0, 0.0, 0.0), -DVec3::X),
        SemiPlane::new(DVec3::new(0.0, -1.0, 0.0), DVec3::Y),
        SemiPlane::new(DVec3::new(0.0, 1.0, 0.0), -DVec3::Y),
        SemiPlane::new(DVec3::new(0.0, 0.0, -1.0), DVec3::Z),
        SemiPlane::new(DVec3::new(0.0, 0.0, 1.0), -DVec3::Z),
    ]
    .map(|p| solver.geometry_mut().insert_plane(p));

    for i in 0..50 {
        for &plane in &planes {
            solver.add_constraint(ConstraintKind::SemiPlane(SemiPlaneConstraint::new(i, plane, radius, alpha_plane))).unwrap();
        }
        for j in 0..i {
            solver.add_constraint(ConstraintKind::MinDistance(MinDistanceConstraint::new(i, j, 2.0 * radius, alpha_collision))).unwrap();
        }
    }
    solver.set_iterations(20);

    for _ in 0..200 {
        solver.update(DT);
    }

    let pos = solver.positions();
    for i in 0..pos.len() {
        for j in (i + 1)..pos.len() {
            assert!((pos[i] - pos[j]).length() >= 2.0 * radius - 1e-2);
        }
    }
}

#[test]
fn inflated_ball_holds_its_pressurized_volume() {
    let mesh = icosphere(1, 0.5);
    let vertex_count = mesh.vertices.len();
    let mut solver = Solver::new(mesh.vertices.clone(), 1.0 / vertex_count as f64).unwrap();
    let alpha_vol = solver.insert_compliance(1e-8);

    let initial_volume = mesh
        .triangles
        .iter()
        .map(|&[a, b, c]| mesh.vertices[a].dot(mesh.vertices[b].cross(mesh.vertices[c])) / 6.0)
        .sum::<f64>();

    let volume = MeshVolumeConstraint::new(mesh.triangles, vertex_count, 0, &mesh.vertices, 2.0, alpha_vol);
    solver.add_constraint(ConstraintKind::MeshVolume(volume)).unwrap();
    solver.set_gravity(DVec3::ZERO);
    solver.set_iterations(20);

    for _ in 0..100 {
        solver.update(DT);
    }

    let final_volume: f64 = {
        let pos = solver.positions();
        let mesh2 = icosphere(1, 0.5);
        mesh2.triangles.iter().map(|&[a, b, c]| pos[a].dot(pos[b].cross(pos[c])) / 6.0).sum()
    };

    assert!(final_volume > 1.8 * initial_volume && final_volume < 2.2 * initial_volume, "final = {final_volume}, initial = {initial_volume}");
}

#[test]
fn rigid_cube_drop_preserves_shape_after_settling() {
    let corners = vec![
        DVec3::new(-0.5, -0.5, -0.5),
        DVec3::new(0.5, -0.5, -0.5),
        DVec3::new(-0.5, 0.5, -0.5),
        DVec3::new(0.5, 0.5, -0.5),
        DVec3::new(-0.5, -0.5, 0.5),
        DVec3::new(0.5, -0.5, 0.5),
        DVec3::new(-0.5, 0.5, 0.5),
        DVec3::new(0.5, 0.5, 0.5),
    ];
    let mut initial_distances = Vec::new();
    for i in 0..8 {
        for j in (i + 1)..8 {
            initial_distances.push((i, j, (corners[i] - corners[j]).length()));
        }
    }

    let mut solver = Solver::new(corners.clone(), 0.1).unwrap();
    let alpha_coll = solver.insert_compliance(1e-8);
    let plane = solver.geometry_mut().insert_plane(SemiPlane::new(DVec3::new(0.0, -1.5, 0.0), DVec3::Y));
    for i in 0..8 {
        solver.add_constraint(ConstraintKind::SemiPlane(SemiPlaneConstraint::new(i, plane, 0.0, alpha_coll))).unwrap();
    }
    solver.activate_rigid(ShapeMatcher::new(corners), (0..8).collect());
    solver.set_iterations(20);

    for _ in 0..400 {
        solver.update(DT);
    }

    let pos = solver.positions();
    for (i, j, d0) in initial_distances {
        assert!(((pos[i] - pos[j]).length() - d0).abs() < 1e-2);
    }
    assert!(pos.iter().map(|p| p.y).fold(f64::INFINITY, f64::min) >= -1.55);
}
