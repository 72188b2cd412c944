use crate::{error::Error, trajectory::Trajectory, transform::Transform};

/// Metrics for comparing two transforms.
#[derive(Clone, Debug, Default)]
pub struct TransformMetrics {
    /// Angle between the two transforms in radians.
    pub angle: f64,
    /// Translation vector size between the two transforms.
    pub translation: f64,
}

impl TransformMetrics {
    /// Creates a new `TransformMetrics` from two transforms.
    pub fn new(lfs: &Transform, rhs: &Transform) -> Self {
        let diff = &lfs.inverse() * rhs;

        Self {
            angle: diff.angle(),
            translation: diff.translation().norm(),
        }
    }

    /// Mean of the per-pose metrics of two trajectories of the same length.
    pub fn mean_trajectory_error(
        pred_trajectory: &Trajectory,
        gt_trajectory: &Trajectory,
    ) -> Result<Self, Error> {
        if pred_trajectory.len() != gt_trajectory.len() {
            return Err(Error::invalid_parameter(format!(
                "predicted and ground truth trajectories have different lengths: {} != {}",
                pred_trajectory.len(),
                gt_trajectory.len()
            )));
        }
        if pred_trajectory.is_empty() {
            return Ok(Self::default());
        }

        let mut accum_metrics = TransformMetrics::default();
        for ((pred, _), (gt, _)) in pred_trajectory.iter().zip(gt_trajectory.iter()) {
            let metrics = Self::new(&pred, &gt);
            accum_metrics.angle += metrics.angle;
            accum_metrics.translation += metrics.translation;
        }

        let count = pred_trajectory.len() as f64;
        Ok(Self {
            angle: accum_metrics.angle / count,
            translation: accum_metrics.translation / count,
        })
    }

    /// Returns the total error of the two transforms.
    pub fn total(&self) -> f64 {
        self.angle + self.translation
    }
}

impl std::fmt::Display for TransformMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "angle: {:.4} deg, translation: {:.5}",
            self.angle.to_degrees(),
            self.translation
        )
    }
}
