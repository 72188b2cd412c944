use nalgebra::{Cholesky, Const, SMatrix, SVector};

/// Smallest accepted ratio between a squared Cholesky pivot and the largest
/// hessian diagonal entry.
const MIN_PIVOT_RATIO: f64 = 1e-10;

/// Implements the standard Gauss Newton optimization
///
/// # Type parameters
///
/// * `DIM` - The dimension of the problem.
pub struct GaussNewton<const DIM: usize> {
    hessian: SMatrix<f64, DIM, DIM>,
    gradient: SVector<f64, DIM>,
    squared_residual_sum: f64,
    count: usize,
}

impl<const DIM: usize> Default for GaussNewton<DIM> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const DIM: usize> GaussNewton<DIM> {
    /// Creates a new Gauss Newton optimizer.
    pub fn new() -> Self {
        Self {
            hessian: SMatrix::zeros(),
            gradient: SVector::zeros(),
            squared_residual_sum: 0.0,
            count: 0,
        }
    }

    /// Resets the optimizer.
    pub fn reset(&mut self) {
        self.hessian.fill(0.0);
        self.gradient.fill(0.0);
        self.squared_residual_sum = 0.0;
        self.count = 0;
    }

    /// Adds a new step to the optimizer.
    ///
    /// # Arguments
    ///
    /// * `residual` - The residual of the step.
    /// * `jacobian` - The jacobian of the step.
    pub fn step(&mut self, residual: f64, jacobian: &[f64; DIM]) {
        for i in 0..DIM {
            let ival = jacobian[i];
            self.gradient[i] += ival * residual;

            self.hessian[(i, i)] += ival * ival;
            for j in i + 1..DIM {
                let mul = ival * jacobian[j];
                self.hessian[(i, j)] += mul;
                self.hessian[(j, i)] += mul;
            }
        }

        self.squared_residual_sum += residual * residual;
        self.count += 1;
    }

    /// Solve the current gauss newton system.
    ///
    /// # Returns
    ///
    /// The update vector, or `None` if there are no steps, the system is rank
    /// deficient or the solution is not finite.
    pub fn solve(&self) -> Option<SVector<f64, DIM>> {
        if self.count == 0 || self.hessian.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let cholesky = Cholesky::<f64, Const<DIM>>::new(self.hessian)?;

        // Rank check: every pivot must be significant w.r.t. the largest diagonal entry.
        let max_diagonal = self.hessian.diagonal().max();
        let min_pivot = cholesky.l_dirty().diagonal().map(|v| v * v).min();
        if !(max_diagonal > 0.0 && min_pivot > max_diagonal * MIN_PIVOT_RATIO) {
            return None;
        }

        Some(cholesky.solve(&self.gradient)).filter(|update| update.iter().all(|v| v.is_finite()))
    }

    /// Adds the values of another optimizer to this one.
    /// Use this to combine the state of sub optimizers.
    ///
    /// # Arguments
    ///
    /// * `other` - The other optimizer.
    pub fn add(&mut self, other: &Self) {
        self.hessian += other.hessian;
        self.gradient += other.gradient;
        self.squared_residual_sum += other.squared_residual_sum;
        self.count += other.count;
    }

    /// Number of accumulated steps.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns the mean squared residual.
    pub fn mean_squared_residual(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.squared_residual_sum / self.count as f64
    }
}
