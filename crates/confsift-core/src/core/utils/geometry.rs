use nalgebra::{Matrix3, Point3, Vector3};
use std::cmp::Ordering;

/// Conversion between a moment of inertia in amu·Å² and a rotational constant in MHz.
pub const ROTATIONAL_CONSTANT_FACTOR: f64 = 505_379.07;

const MIN_MOMENT: f64 = 1e-8;

pub fn centroid(points: &[Point3<f64>]) -> Point3<f64> {
    if points.is_empty() {
        return Point3::origin();
    }
    let sum: Vector3<f64> = points.iter().map(|p| p.coords).sum();
    Point3::from(sum / points.len() as f64)
}

pub fn center_of_mass(points: &[Point3<f64>], masses: &[f64]) -> Point3<f64> {
    let total: f64 = masses.iter().sum();
    if points.is_empty() || total <= 0.0 {
        return centroid(points);
    }
    let weighted: Vector3<f64> = points
        .iter()
        .zip(masses)
        .map(|(p, &m)| p.coords * m)
        .sum();
    Point3::from(weighted / total)
}

pub fn translate(points: &[Point3<f64>], offset: &Vector3<f64>) -> Vec<Point3<f64>> {
    points.iter().map(|p| p + offset).collect()
}

pub fn rotate(points: &[Point3<f64>], rotation: &Matrix3<f64>) -> Vec<Point3<f64>> {
    points.iter().map(|p| Point3::from(rotation * p.coords)).collect()
}

/// Plain RMSD between two equally long, already paired coordinate lists.
///
/// Returns `None` when the lists differ in length; an empty pair has RMSD `0`.
pub fn calculate_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    if coords1.len() != coords2.len() {
        return None;
    }
    if coords1.is_empty() {
        return Some(0.0);
    }
    let n = coords1.len() as f64;
    let squared_dist_sum: f64 = coords1
        .iter()
        .zip(coords2.iter())
        .map(|(p1, p2)| (p1 - p2).norm_squared())
        .sum();
    Some((squared_dist_sum / n).sqrt())
}

/// RMSD over explicit `(first, second)` index pairs of two coordinate lists.
pub fn calculate_paired_rmsd(
    coords1: &[Point3<f64>],
    coords2: &[Point3<f64>],
    pairs: &[(usize, usize)],
) -> Option<f64> {
    if pairs
        .iter()
        .any(|&(i, j)| i >= coords1.len() || j >= coords2.len())
    {
        return None;
    }
    if pairs.is_empty() {
        return Some(0.0);
    }
    let squared_dist_sum: f64 = pairs
        .iter()
        .map(|&(i, j)| (coords1[i] - coords2[j]).norm_squared())
        .sum();
    Some((squared_dist_sum / pairs.len() as f64).sqrt())
}

pub fn inertia_tensor(points: &[Point3<f64>], masses: &[f64]) -> Matrix3<f64> {
    let com = center_of_mass(points, masses);
    let mut tensor = Matrix3::zeros();
    for (p, &m) in points.iter().zip(masses) {
        let r = p - com;
        let r2 = r.norm_squared();
        tensor += (Matrix3::identity() * r2 - r * r.transpose()) * m;
    }
    tensor
}

/// Principal moments (ascending) and the matching right-handed axes as matrix columns.
pub fn principal_frame(
    points: &[Point3<f64>],
    masses: &[f64],
) -> Option<(Vector3<f64>, Matrix3<f64>)> {
    if points.len() < 2 {
        return None;
    }
    let eigen = inertia_tensor(points, masses).symmetric_eigen();
    if eigen.eigenvalues.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[a]
            .partial_cmp(&eigen.eigenvalues[b])
            .unwrap_or(Ordering::Equal)
    });

    let moments = Vector3::new(
        eigen.eigenvalues[order[0]],
        eigen.eigenvalues[order[1]],
        eigen.eigenvalues[order[2]],
    );
    let mut axes = Matrix3::from_columns(&[
        eigen.eigenvectors.column(order[0]).into_owned(),
        eigen.eigenvectors.column(order[1]).into_owned(),
        eigen.eigenvectors.column(order[2]).into_owned(),
    ]);
    if axes.determinant() < 0.0 {
        let flipped = -axes.column(2).into_owned();
        axes.set_column(2, &flipped);
    }
    Some((moments, axes))
}

/// Rotational constants in MHz, ordered by ascending principal moment.
/// A vanishing moment yields a constant of `0`.
pub fn rotational_constants(points: &[Point3<f64>], masses: &[f64]) -> Option<[f64; 3]> {
    let (moments, _) = principal_frame(points, masses)?;
    let constant = |moment: f64| {
        if moment > MIN_MOMENT {
            ROTATIONAL_CONSTANT_FACTOR / moment
        } else {
            0.0
        }
    };
    Some([constant(moments[0]), constant(moments[1]), constant(moments[2])])
}
