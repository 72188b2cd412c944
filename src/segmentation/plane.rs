use nalgebra::{Matrix3, SymmetricEigen, Vector3};

/// Plane `normal . p + offset = 0` with a unit normal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f64>,
    pub offset: f64,
}

impl Plane {
    /// Plane through three points. `None` if they are (nearly) collinear.
    pub fn from_points(p0: &Vector3<f64>, p1: &Vector3<f64>, p2: &Vector3<f64>) -> Option<Self> {
        let v0 = p1 - p0;
        let v1 = p2 - p0;
        let normal = v0.cross(&v1);
        let mag = normal.norm();
        if !(mag > 1e-12 * v0.norm() * v1.norm()) {
            return None;
        }
        let normal = normal / mag;
        Some(Self {
            normal,
            offset: -normal.dot(p0),
        })
    }

    /// Total least squares fit. Also returns the smallest covariance eigenvalue,
    /// the mean squared distance of the points to the plane.
    pub fn fit<'a, I>(points: I) -> Option<(Self, f64)>
    where
        I: IntoIterator<Item = &'a Vector3<f64>>,
        I::IntoIter: Clone,
    {
        let points = points.into_iter();
        let (sum, count) = points
            .clone()
            .fold((Vector3::zeros(), 0usize), |(sum, count), p| (sum + p, count + 1));
        if count < 3 {
            return None;
        }
        let centroid = sum / count as f64;

        let covariance = points.fold(Matrix3::zeros(), |cov, p| {
            let d = p - centroid;
            cov + d * d.transpose()
        }) / count as f64;

        let eigen = SymmetricEigen::new(covariance);
        let min_idx = eigen.eigenvalues.imin();
        let normal: Vector3<f64> = eigen.eigenvectors.column(min_idx).into_owned();
        let mag = normal.norm();
        if !mag.is_finite() || mag == 0.0 {
            return None;
        }
        let normal = normal / mag;
        Some((
            Self {
                normal,
                offset: -normal.dot(&centroid),
            },
            eigen.eigenvalues[min_idx].max(0.0),
        ))
    }

    /// Unsigned distance of a point to the plane.
    pub fn distance(&self, point: &Vector3<f64>) -> f64 {
        (self.normal.dot(point) + self.offset).abs()
    }

    /// Same plane with the normal pointing to the half-space of `direction`.
    pub fn oriented_towards(self, direction: &Vector3<f64>) -> Self {
        if self.normal.dot(direction) < 0.0 {
            Self {
                normal: -self.normal,
                offset: -self.offset,
            }
        } else {
            self
        }
    }
}
