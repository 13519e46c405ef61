//! Least-squares fitting helpers
//!
//! Pure numeric routines over point sets: best-fit plane, orthogonal
//! projection, circle-center fitting and dimensionality
//! classification. These back the sketch-interpretation features of the
//! host application (deciding whether a stroke is a point, a line, a
//! flat profile or a free 3D path) and never touch the registry.
//!
//! All routines are deterministic and total over degenerate input: two
//! points, collinear points and fully coincident points yield a
//! well-defined fallback instead of a crash. Only an empty point set is
//! rejected.

use glam::Vec3;
use nalgebra::{Matrix3, SymmetricEigen, Vector3 as NaVector3};

use crate::error::{CadError, CadResult};

/// A plane in point-normal form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// A point on the plane (the centroid of the fitted points).
    pub origin: Vec3,
    /// Unit normal.
    pub normal: Vec3,
}

impl Plane {
    /// Signed distance from `point` to the plane.
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        (point - self.origin).dot(self.normal)
    }

    /// Orthonormal in-plane basis `(u, v)` with `u × v = normal`.
    pub fn basis(&self) -> (Vec3, Vec3) {
        let helper = if self.normal.z.abs() < 0.9 {
            Vec3::Z
        } else {
            Vec3::X
        };
        let u = self.normal.cross(helper).normalize();
        let v = self.normal.cross(u);
        (u, v)
    }
}

/// Centroid of `points`.
fn centroid(points: &[Vec3]) -> Vec3 {
    let sum: Vec3 = points.iter().copied().sum();
    sum / points.len() as f32
}

/// Eigen decomposition of the covariance matrix of the centered point
/// cloud, eigenvalues ascending. Eigenvalues are sums of squared
/// distances (not divided by the point count).
fn covariance_eigen(points: &[Vec3], center: Vec3) -> ([f64; 3], [Vec3; 3]) {
    let mut cov = Matrix3::<f64>::zeros();
    for p in points {
        let d = NaVector3::new(
            (p.x - center.x) as f64,
            (p.y - center.y) as f64,
            (p.z - center.z) as f64,
        );
        cov += d * d.transpose();
    }
    let eigen = SymmetricEigen::new(cov);

    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[a]
            .partial_cmp(&eigen.eigenvalues[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut values = [0.0f64; 3];
    let mut vectors = [Vec3::ZERO; 3];
    for (slot, &idx) in order.iter().enumerate() {
        values[slot] = eigen.eigenvalues[idx].max(0.0);
        let col = eigen.eigenvectors.column(idx);
        let mut vector = Vec3::new(col[0] as f32, col[1] as f32, col[2] as f32);
        // Canonical sign: largest-magnitude component positive, so the
        // answer does not flip between otherwise identical inputs.
        let dominant = [vector.x, vector.y, vector.z]
            .into_iter()
            .fold(0.0f32, |acc, c| if c.abs() > acc.abs() { c } else { acc });
        if dominant < 0.0 {
            vector = -vector;
        }
        vectors[slot] = vector;
    }
    (values, vectors)
}

/// Least-squares plane through `points`, minimizing orthogonal
/// distance.
///
/// The plane passes through the centroid with the smallest principal
/// component as normal. Collinear or coincident input degenerates to an
/// arbitrary but deterministic normal.
pub fn fit_plane(points: &[Vec3]) -> CadResult<Plane> {
    if points.is_empty() {
        return Err(CadError::InvalidParameter(
            "cannot fit a plane through an empty point set".into(),
        ));
    }
    let origin = centroid(points);
    let (_, vectors) = covariance_eigen(points, origin);
    let normal = vectors[0];
    let normal = if normal.length_squared() > f32::EPSILON {
        normal.normalize()
    } else {
        Vec3::Z
    };
    Ok(Plane { origin, normal })
}

/// Orthogonal projection of each point onto `plane`; cardinality and
/// order match the input.
pub fn project(points: &[Vec3], plane: &Plane) -> Vec<Vec3> {
    points
        .iter()
        .map(|&p| p - plane.normal * plane.signed_distance(p))
        .collect()
}

/// The input points projected onto their own distance-minimizing common
/// plane.
pub fn flatten(points: &[Vec3]) -> CadResult<Vec<Vec3>> {
    let plane = fit_plane(points)?;
    Ok(project(points, &plane))
}

/// Normal of the plane fitted through `points` (the least significant
/// principal component of the cloud).
pub fn principal_normal(points: &[Vec3]) -> CadResult<Vec3> {
    Ok(fit_plane(points)?.normal)
}

/// Least-squares circle center for (approximately) coplanar points.
///
/// The points are projected into their fitted plane and a Kåsa fit is
/// solved there. Collinear input makes the normal equations singular;
/// the centroid is returned in that case.
pub fn fit_circle_center(points: &[Vec3]) -> CadResult<Vec3> {
    let plane = fit_plane(points)?;
    let (u, v) = plane.basis();

    let mut sxx = 0.0f64;
    let mut sxy = 0.0f64;
    let mut syy = 0.0f64;
    let mut sx = 0.0f64;
    let mut sy = 0.0f64;
    let mut sxz = 0.0f64;
    let mut syz = 0.0f64;
    let mut sz = 0.0f64;
    for &p in points {
        let d = p - plane.origin;
        let x = d.dot(u) as f64;
        let y = d.dot(v) as f64;
        let z = x * x + y * y;
        sxx += x * x;
        sxy += x * y;
        syy += y * y;
        sx += x;
        sy += y;
        sxz += x * z;
        syz += y * z;
        sz += z;
    }
    let n = points.len() as f64;

    // Normal equations of minimizing |x^2 + y^2 - 2ax - 2by - c|^2.
    let lhs = Matrix3::new(sxx, sxy, sx, sxy, syy, sy, sx, sy, n);
    let rhs = NaVector3::new(sxz, syz, sz);
    let solution = lhs.lu().solve(&rhs);

    match solution {
        Some(s) if s[0].is_finite() && s[1].is_finite() => {
            let a = (s[0] / 2.0) as f32;
            let b = (s[1] / 2.0) as f32;
            Ok(plane.origin + u * a + v * b)
        }
        // Collinear or coincident points: no unique circle.
        _ => Ok(centroid(points)),
    }
}

/// Dimensionality of the point cloud within `tolerance`: 0 if all
/// points coincide, 1 if they are collinear, 2 if coplanar, 3
/// otherwise.
///
/// The classification counts principal directions whose standard
/// deviation exceeds `tolerance`.
pub fn coincident_dimensions(points: &[Vec3], tolerance: f32) -> CadResult<u8> {
    if points.is_empty() {
        return Err(CadError::InvalidParameter(
            "cannot classify an empty point set".into(),
        ));
    }
    let center = centroid(points);
    let (values, _) = covariance_eigen(points, center);
    let n = points.len() as f64;
    let count = values
        .iter()
        .filter(|&&lambda| (lambda / n).sqrt() > tolerance as f64)
        .count();
    Ok(count as u8)
}
