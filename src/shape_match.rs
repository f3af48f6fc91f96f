//! Rigid shape matching: projects a predicted point cloud onto the best rigid
//! transform of a reference configuration via polar decomposition. Used by
//! rigid-body scenes once per outer solver iteration.
use glam::DVec3;
use nalgebra::{Matrix3, SVD};

/// Reference configuration a predicted point cloud is matched against.
#[derive(Clone, Debug)]
pub struct ShapeMatcher {
    reference: Vec<DVec3>,
    reference_com: DVec3,
}

impl ShapeMatcher {
    pub fn new(reference: Vec<DVec3>) -> ShapeMatcher {
        let reference_com = center_of_mass(&reference);
        ShapeMatcher { reference, reference_com }
    }

    pub fn reference(&self) -> &[DVec3] {
        &self.reference
    }

    /// Replaces `predicted` in place with its best rigid match to the reference
    /// configuration: `predicted[i] <- R * (reference[i] - reference_com) + com(predicted)`.
    pub fn project(&self, predicted: &mut [DVec3]) {
        debug_assert_eq!(predicted.len(), self.reference.len());

        let com = center_of_mass(predicted);

        let mut m = Matrix3::<f64>::zeros();
        for (p, x) in predicted.iter().zip(&self.reference) {
            let r = *p - com;
            let r_ref = *x - self.reference_com;
            m += outer_product(r, r_ref);
        }

        let r = polar_rotation(m);

        for (p, x) in predicted.iter_mut().zip(&self.reference) {
            let local = *x - self.reference_com;
            let rotated = r * nalgebra::Vector3::new(local.x, local.y, local.z);
            *p = DVec3::new(rotated.x, rotated.y, rotated.z) + com;
        }
    }
}

fn center_of_mass(points: &[DVec3]) -> DVec3 {
    points.iter().copied().sum::<DVec3>() / points.len() as f64
}

fn outer_product(a: DVec3, b: DVec3) -> Matrix3<f64> {
    Matrix3::new(
        a.x * b.x, a.x * b.y, a.x * b.z,
        a.y * b.x, a.y * b.y, a.y * b.z,
        a.z * b.x, a.z * b.y, a.z * b.z,
    )
}

/// Extracts the rotation R = U * V^T from the polar decomposition of `m`,
/// forcing det(R) = +1 by flipping the last column of U when the raw SVD
/// result would introduce a reflection.
fn polar_rotation(m: Matrix3<f64>) -> Matrix3<f64> {
    let svd = SVD::new(m, true, true);
    let u = svd.u.expect("SVD::new(compute_u = true) always returns U");
    let v_t = svd.v_t.expect("SVD::new(compute_v = true) always returns V^T");

    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_fixed = u;
        for row in 0..3 {
            u_fixed[(row, 2)] = -u_fixed[(row, 2)];
        }
        r = u_fixed * v_t;
    }
    r
}
