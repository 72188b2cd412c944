use nalgebra::{
    Isometry3, Matrix3, Matrix4, Quaternion, Rotation3, Translation3, UnitQuaternion, Vector3,
    Vector6,
};

use std::ops;

/// Maximum orthogonality error `|R^T R - I|` tolerated before re-orthonormalization.
pub const ORTHONORMAL_TOLERANCE: f64 = 1e-6;

/// Rigid transform, an element of SE(3).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform(Isometry3<f64>);

impl Default for Transform {
    fn default() -> Self {
        Self::eye()
    }
}

impl Transform {
    /// Identity transform.
    pub fn eye() -> Self {
        Self(Isometry3::identity())
    }

    /// Creates a transform from a translation and a (non necessarily normalized) quaternion.
    pub fn new(translation: &Vector3<f64>, rotation: &Quaternion<f64>) -> Self {
        Self(Isometry3::from_parts(
            Translation3::from(*translation),
            UnitQuaternion::from_quaternion(*rotation),
        ))
    }

    /// Creates a transform from a translation and a rotation of `angle` radians around `axis`.
    pub fn from_axis_angle(translation: &Vector3<f64>, axis: &Vector3<f64>, angle: f64) -> Self {
        let axis = axis.normalize();
        Self(Isometry3::from_parts(
            Translation3::from(*translation),
            UnitQuaternion::from_scaled_axis(axis * angle),
        ))
    }

    /// Exponential map of a twist. The first three elements are the translation and
    /// the last three the scaled rotation axis.
    pub fn exp(twist: &Vector6<f64>) -> Self {
        let translation = Translation3::new(twist[0], twist[1], twist[2]);
        let so3 = Vector3::new(twist[3], twist[4], twist[5]);

        Self(Isometry3::from_parts(
            translation,
            UnitQuaternion::from_scaled_axis(so3),
        ))
    }

    /// Logarithm of the transform, inverse of [`Transform::exp`].
    pub fn log(&self) -> Vector6<f64> {
        let t = self.0.translation.vector;
        let so3 = self.0.rotation.scaled_axis();
        Vector6::new(t[0], t[1], t[2], so3[0], so3[1], so3[2])
    }

    /// Creates a transform from a homogeneous matrix. The rotation block is projected
    /// onto the closest rotation matrix.
    pub fn from_matrix4(matrix: &Matrix4<f64>) -> Self {
        let translation = Translation3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)]);
        let rotation: Matrix3<f64> = matrix.fixed_slice::<3, 3>(0, 0).into_owned();
        let rotation = Rotation3::from_matrix(&rotation);
        Self(Isometry3::from_parts(
            translation,
            UnitQuaternion::from_rotation_matrix(&rotation),
        ))
    }

    pub fn to_matrix4(&self) -> Matrix4<f64> {
        self.0.to_homogeneous()
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.0.rotation.to_rotation_matrix().into_inner()
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.0.translation.vector
    }

    /// Rotation angle in radians.
    pub fn angle(&self) -> f64 {
        self.0.rotation.angle()
    }

    pub fn inverse(&self) -> Self {
        Self(self.0.inverse())
    }

    pub fn transform_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.0.rotation * point + self.0.translation.vector
    }

    pub fn transform_normal(&self, normal: &Vector3<f64>) -> Vector3<f64> {
        self.0.rotation * normal
    }

    /// True if every component is finite.
    pub fn is_finite(&self) -> bool {
        self.0.translation.vector.iter().all(|v| v.is_finite())
            && self.0.rotation.coords.iter().all(|v| v.is_finite())
    }

    /// Frobenius norm of `R^T R - I`.
    pub fn orthogonality_error(&self) -> f64 {
        let rot = self.rotation_matrix();
        (rot.transpose() * rot - Matrix3::identity()).norm()
    }

    /// Projects the rotation back onto SO(3) if it drifted beyond [`ORTHONORMAL_TOLERANCE`].
    /// Returns true if a correction was applied.
    pub fn orthonormalize(&mut self) -> bool {
        let det_error = (self.rotation_matrix().determinant() - 1.0).abs();
        if self.orthogonality_error() <= ORTHONORMAL_TOLERANCE && det_error <= ORTHONORMAL_TOLERANCE
        {
            return false;
        }
        self.0.rotation.renormalize();
        true
    }
}

impl From<Isometry3<f64>> for Transform {
    fn from(isometry: Isometry3<f64>) -> Self {
        Self(isometry)
    }
}

impl From<Transform> for Matrix4<f64> {
    fn from(transform: Transform) -> Self {
        transform.0.into()
    }
}

impl ops::Mul<&Vector3<f64>> for &Transform {
    type Output = Vector3<f64>;

    fn mul(self, rhs: &Vector3<f64>) -> Self::Output {
        self.transform_point(rhs)
    }
}

impl ops::Mul<&Transform> for &Transform {
    type Output = Transform;

    fn mul(self, rhs: &Transform) -> Self::Output {
        Transform(self.0 * rhs.0)
    }
}
