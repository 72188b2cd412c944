use log::debug;

use crate::{error::Error, trajectory::Trajectory, transform::Transform};

/// Accumulates relative transforms into the running global pose and records the
/// resulting trajectory.
///
/// The pose maps points of the current frame into the frame of the first one. Each
/// relative transform maps the current frame into the previous one and is
/// pre-multiplied: `P <- T_rel * P`.
#[derive(Clone, Debug, Default)]
pub struct PoseAccumulator {
    trajectory: Trajectory,
    pose: Transform,
    last_frame: Option<usize>,
}

impl PoseAccumulator {
    /// Creates an accumulator at the identity pose with an empty trajectory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Composes `now_to_previous` into the running pose and records it.
    ///
    /// # Arguments
    ///
    /// * `now_to_previous` - Transform from the current frame to the previous one.
    /// * `frame` - Frame index recorded in the trajectory. Defaults to the next index.
    ///
    /// # Returns
    ///
    /// The new pose, or `PoseCorruption` if the composition is not finite. In that case
    /// the accumulator is left untouched.
    pub fn accumulate(
        &mut self,
        now_to_previous: &Transform,
        frame: Option<usize>,
    ) -> Result<Transform, Error> {
        self.pose = self.peek(now_to_previous)?;
        self.record(frame);
        Ok(self.pose)
    }

    /// Records the current pose again for a frame whose registration was skipped.
    pub fn hold(&mut self, frame: Option<usize>) -> Transform {
        self.record(frame);
        self.pose
    }

    /// The pose `accumulate` would produce, without modifying the accumulator.
    pub fn peek(&self, now_to_previous: &Transform) -> Result<Transform, Error> {
        if !now_to_previous.is_finite() {
            return Err(Error::PoseCorruption(format!(
                "relative transform is not finite: {now_to_previous:?}"
            )));
        }
        let mut pose = now_to_previous * &self.pose;
        let drift = pose.orthogonality_error();
        if pose.orthonormalize() {
            debug!("Re-orthonormalized pose, error was {:e}", drift);
        }
        if !pose.is_finite() {
            return Err(Error::PoseCorruption(format!(
                "accumulated pose is not finite after {} frames",
                self.trajectory.len()
            )));
        }
        Ok(pose)
    }

    fn record(&mut self, frame: Option<usize>) {
        let frame = frame.unwrap_or_else(|| self.last_frame.map_or(0, |last| last + 1));
        self.last_frame = Some(frame);
        self.trajectory.push(self.pose, frame);
    }

    /// Current sensor to world pose.
    pub fn pose(&self) -> Transform {
        self.pose
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    /// Returns the trajectory built so far.
    pub fn build(self) -> Trajectory {
        self.trajectory
    }

    /// Back to the identity pose with an empty trajectory.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use nalgebra::{Matrix4, Quaternion, Vector3};

    use super::*;

    fn sample_transforms() -> Vec<Transform> {
        vec![
            Transform::from_axis_angle(&Vector3::new(1.0, 0.0, 0.0), &Vector3::z(), 0.1),
            Transform::from_axis_angle(&Vector3::new(0.5, -0.2, 0.1), &Vector3::x(), -0.05),
            Transform::from_axis_angle(&Vector3::new(0.0, 2.0, 0.3), &Vector3::new(1.0, 1.0, 0.0), 0.3),
            Transform::from_axis_angle(&Vector3::new(-1.0, 0.0, 0.0), &Vector3::y(), 0.02),
        ]
    }

    #[test]
    fn test_accumulate_matches_matrix_product() {
        let transforms = sample_transforms();
        let mut accumulator = PoseAccumulator::new();
        for transform in transforms.iter() {
            accumulator.accumulate(transform, None).unwrap();
        }

        // T_n * ... * T_2 * T_1
        let expected = transforms
            .iter()
            .fold(Matrix4::<f64>::identity(), |acc, transform| {
                transform.to_matrix4() * acc
            });
        assert_abs_diff_eq!(accumulator.pose().to_matrix4(), expected, epsilon = 1e-12);

        let trajectory = accumulator.build();
        assert_eq!(trajectory.len(), 4);
        assert_eq!(trajectory.last().unwrap().1, 3);
    }

    #[test]
    fn test_hold_keeps_pose() {
        let mut accumulator = PoseAccumulator::new();
        let first = sample_transforms()[0];
        accumulator.accumulate(&first, None).unwrap();
        let held = accumulator.hold(Some(7));
        assert_eq!(held, accumulator.pose());
        assert_eq!(accumulator.trajectory().len(), 2);
        assert_eq!(accumulator.trajectory()[1], accumulator.trajectory()[0]);
        assert_eq!(accumulator.trajectory().last().unwrap().1, 7);
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut accumulator = PoseAccumulator::new();
        accumulator.accumulate(&sample_transforms()[0], None).unwrap();
        let before = accumulator.pose();

        let corrupted = Transform::new(
            &Vector3::new(f64::NAN, 0.0, 0.0),
            &Quaternion::new(1.0, 0.0, 0.0, 0.0),
        );
        assert!(accumulator.peek(&corrupted).is_err());
        let result = accumulator.accumulate(&corrupted, Some(1));
        assert!(matches!(result, Err(Error::PoseCorruption(_))));
        assert_eq!(accumulator.pose(), before);
        assert_eq!(accumulator.trajectory().len(), 1);
    }

    #[test]
    fn test_stays_orthonormal() {
        let step = Transform::from_axis_angle(
            &Vector3::new(0.01, 0.0, 0.0),
            &Vector3::new(0.3, 0.2, 1.0),
            0.013,
        );
        let mut accumulator = PoseAccumulator::new();
        for _ in 0..10_000 {
            accumulator.accumulate(&step, None).unwrap();
        }
        let pose = accumulator.pose();
        assert!(pose.orthogonality_error() < 1e-6);
        assert_abs_diff_eq!(pose.rotation_matrix().determinant(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_reset() {
        let mut accumulator = PoseAccumulator::new();
        accumulator.accumulate(&sample_transforms()[0], None).unwrap();
        accumulator.reset();
        assert_eq!(accumulator.pose(), Transform::eye());
        assert!(accumulator.trajectory().is_empty());
    }
}
