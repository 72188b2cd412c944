use nalgebra::Vector3;

/// Returns the angle between two unit normals in radians.
///
/// # Arguments
///
/// * lfs - Left normal.
/// * rfs - Right normal.
///
/// # Returns
///
/// * Angle between the two normals in radians, in `[0, pi]`.
pub fn angle_between_normals(lfs: &Vector3<f64>, rfs: &Vector3<f64>) -> f64 {
    lfs.dot(rfs).clamp(-1.0, 1.0).acos()
}

/// Angle between the lines spanned by two unit normals, in `[0, pi/2]`.
/// Use it when the normal orientation is not consistent.
pub fn angle_between_lines(lfs: &Vector3<f64>, rfs: &Vector3<f64>) -> f64 {
    lfs.dot(rfs).abs().min(1.0).acos()
}
