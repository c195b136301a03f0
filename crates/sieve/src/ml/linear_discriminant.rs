//! Linear Discriminant Analysis, used as the classifier inside the
//! semi-supervised training loop.
//!
//! The Fisher discriminant is the leading eigenvector of `inv(Sw) . Sb`: we
//! solve the linear system `Sw . x = Sb` with Gauss-Jordan elimination, and
//! find the eigenvector of `x` with the power method.

use super::gauss::Gauss;
use super::matrix::Matrix;
use crate::psm::TARGET;

/// A trainable linear classifier
pub trait Learner: Sync {
    /// Fit a linear model separating examples labelled [`TARGET`] from the
    /// rest. `costs` weighs the contribution of every example.
    ///
    /// Returns `features.cols + 1` weights, with the bias term last, or `None`
    /// if no model could be fit.
    fn train(&self, features: &Matrix, labels: &[i32], costs: &[f64]) -> Option<Vec<f64>>;
}

pub struct LinearDiscriminantAnalysis {
    eigenvector: Vec<f64>,
    bias: f64,
}

/// Ridge added to the diagonal of the within-class scatter matrix, relative
/// to its mean diagonal, so that constant features don't make it singular
const RIDGE: f64 = 1E-6;

impl LinearDiscriminantAnalysis {
    pub fn train(
        features: &Matrix,
        labels: &[i32],
        costs: &[f64],
    ) -> Option<LinearDiscriminantAnalysis> {
        assert_eq!(features.rows, labels.len());
        assert_eq!(features.rows, costs.len());

        let cols = features.cols;
        let mut scatter_within = Matrix::zeros(cols, cols);
        let mut scatter_between = Matrix::zeros(cols, cols);

        // Cost-weighted class means
        let mut class_means = Vec::with_capacity(2 * cols);
        let mut class_weights = [0.0; 2];
        for (ix, class) in [true, false].into_iter().enumerate() {
            let mut mean = vec![0.0; cols];
            for row in 0..features.rows {
                if (labels[row] == TARGET) == class {
                    class_weights[ix] += costs[row];
                    for (m, x) in mean.iter_mut().zip(features.row(row)) {
                        *m += costs[row] * x;
                    }
                }
            }
            if class_weights[ix] <= 0.0 {
                log::trace!("- cannot fit linear model: empty class");
                return None;
            }
            mean.iter_mut().for_each(|m| *m /= class_weights[ix]);
            class_means.extend(mean);
        }
        let class_means = Matrix::new(class_means, 2, cols);
        let total = class_weights[0] + class_weights[1];
        let x_bar = (0..cols)
            .map(|col| {
                (class_means[(0, col)] * class_weights[0]
                    + class_means[(1, col)] * class_weights[1])
                    / total
            })
            .collect::<Vec<_>>();

        for (ix, class) in [true, false].into_iter().enumerate() {
            let mut centered = Matrix::zeros(features.rows, cols);
            for row in 0..features.rows {
                if (labels[row] == TARGET) != class {
                    continue;
                }
                let scale = costs[row].sqrt();
                for (col, x) in features.row(row).iter().enumerate() {
                    centered[(row, col)] = (x - class_means[(ix, col)]) * scale;
                }
            }
            scatter_within += centered.transpose().dot(&centered);

            let diff = Matrix::col_vector(
                class_means
                    .row(ix)
                    .iter()
                    .zip(x_bar.iter())
                    .map(|(x, y)| (x - y) * class_weights[ix].sqrt())
                    .collect::<Vec<_>>(),
            );
            scatter_between += diff.dot(&diff.transpose());
        }

        let ridge = RIDGE * (0..cols).map(|i| scatter_within[(i, i)]).sum::<f64>() / cols as f64;
        for i in 0..cols {
            scatter_within[(i, i)] += ridge.max(f64::EPSILON);
        }

        // Start the power method from the difference in class means, which is
        // close to the discriminant when features are weakly correlated
        let initial = class_means
            .row(0)
            .iter()
            .zip(class_means.row(1))
            .map(|(t, d)| t - d)
            .collect::<Vec<_>>();
        if initial.iter().all(|x| *x == 0.0) {
            log::trace!("- cannot fit linear model: class means coincide");
            return None;
        }

        let mut evec =
            Gauss::solve(scatter_within, scatter_between).map(|mat| mat.power_method(&initial))?;

        // Make it so that target scores are higher than decoy scores
        let mut coef = class_means.dotv(&evec);
        if coef[0] < coef[1] {
            evec.iter_mut().for_each(|c| *c *= -1.0);
            coef.iter_mut().for_each(|c| *c *= -1.0);
        }

        if !evec.iter().all(|f| f.is_finite()) {
            log::error!("linear model eigenvector includes NaN: {:?}", evec);
            return None;
        }

        // Decision boundary half way between the projected class means
        let bias = -(coef[0] + coef[1]) / 2.0;

        log::trace!("- linear model fit with eigenvector: {:?}", evec);
        Some(LinearDiscriminantAnalysis {
            eigenvector: evec,
            bias,
        })
    }

    pub fn score(&self, features: &Matrix) -> Vec<f64> {
        features
            .dotv(&self.eigenvector)
            .into_iter()
            .map(|s| s + self.bias)
            .collect()
    }

    /// Weight vector with the bias term appended
    pub fn weights(&self) -> Vec<f64> {
        let mut w = self.eigenvector.clone();
        w.push(self.bias);
        w
    }
}

/// Linear discriminant analysis as a [`Learner`]
#[derive(Copy, Clone, Debug, Default)]
pub struct Lda;

impl Learner for Lda {
    fn train(&self, features: &Matrix, labels: &[i32], costs: &[f64]) -> Option<Vec<f64>> {
        LinearDiscriminantAnalysis::train(features, labels, costs).map(|lda| lda.weights())
    }
}
