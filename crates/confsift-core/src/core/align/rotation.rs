use super::error::AlignError;
use nalgebra::{Matrix3, Point3};
use tracing::warn;

/// Least-squares rotation `R` with `R * mobile[i] ≈ reference[i]`.
///
/// Both point sets must already be centered and paired index by index. An improper solution
/// (reflection) is corrected by flipping the axis of the smallest singular value.
///
/// # Errors
///
/// Returns [`AlignError::DegenerateGeometry`] if the coordinates are not finite or the SVD
/// cannot be computed. Fewer than two points yield the identity.
pub fn fit_rotation(
    reference: &[Point3<f64>],
    mobile: &[Point3<f64>],
) -> Result<Matrix3<f64>, AlignError> {
    if reference.len() != mobile.len() {
        return Err(AlignError::SizeMismatch {
            reference: reference.len(),
            target: mobile.len(),
        });
    }
    if reference.len() < 2 {
        return Ok(Matrix3::identity());
    }

    let mut covariance = Matrix3::zeros();
    for (r, m) in reference.iter().zip(mobile) {
        covariance += m.coords * r.coords.transpose();
    }
    if covariance.iter().any(|v| !v.is_finite()) {
        return Err(AlignError::DegenerateGeometry("non-finite covariance"));
    }

    let svd = covariance.svd(true, true);
    let (Some(u), Some(mut v_t)) = (svd.u, svd.v_t) else {
        return Err(AlignError::DegenerateGeometry("SVD did not converge"));
    };

    if (v_t.transpose() * u.transpose()).determinant() < 0.0 {
        let flipped = -v_t.row(2).into_owned();
        v_t.set_row(2, &flipped);
    }
    Ok(v_t.transpose() * u.transpose())
}

/// Like [`fit_rotation`], but logs and falls back to the identity on degenerate input.
pub fn fit_rotation_or_identity(reference: &[Point3<f64>], mobile: &[Point3<f64>]) -> Matrix3<f64> {
    fit_rotation(reference, mobile).unwrap_or_else(|e| {
        warn!(error = %e, "Rotation fit failed, using identity rotation.");
        Matrix3::identity()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utils::geometry::{calculate_rmsd, centroid, rotate, translate};
    use nalgebra::{Rotation3, Vector3};

    fn centered(points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        translate(points, &-centroid(points).coords)
    }

    fn sample() -> Vec<Point3<f64>> {
        centered(&[
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.5, 0.0, 0.0),
            Point3::new(1.5, 1.2, 0.0),
            Point3::new(0.3, 1.9, 0.8),
            Point3::new(-0.7, 0.4, 1.1),
        ])
    }

    #[test]
    fn recovers_known_rotation() {
        let reference = sample();
        let truth = Rotation3::from_euler_angles(0.3, -1.1, 2.0);
        let mobile = rotate(&reference, truth.matrix());
        let fitted = fit_rotation(&reference, &mobile).unwrap();
        let aligned = rotate(&mobile, &fitted);
        assert!(calculate_rmsd(&reference, &aligned).unwrap() < 1e-9);
        assert!((fitted.determinant() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn never_returns_a_reflection() {
        let reference = sample();
        let mirrored: Vec<_> = reference
            .iter()
            .map(|p| Point3::new(-p.x, p.y, p.z))
            .collect();
        let fitted = fit_rotation(&reference, &mirrored).unwrap();
        assert!((fitted.determinant() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn single_point_gives_identity() {
        let p = [Point3::new(1.0, 2.0, 3.0)];
        assert_eq!(fit_rotation(&p, &p).unwrap(), Matrix3::identity());
    }

    #[test]
    fn non_finite_input_falls_back_to_identity() {
        let reference = sample();
        let mut broken = reference.clone();
        broken[0] = Point3::from(Vector3::repeat(f64::NAN));
        assert!(matches!(
            fit_rotation(&reference, &broken),
            Err(AlignError::DegenerateGeometry(_))
        ));
        assert_eq!(
            fit_rotation_or_identity(&reference, &broken),
            Matrix3::identity()
        );
    }
}
