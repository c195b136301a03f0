//! Gauss-Jordan elimination for systems of linear equations
//!
//! The discriminant learner solves `Sw . x = Sb` for the within- and
//! between-class scatter matrices, and then extracts the dominant eigenvector
//! of `x` with the power method.

use super::matrix::Matrix;

/// Singular pivots below this magnitude are treated as zero
const EPSILON: f64 = 1E-12;

#[derive(Debug)]
pub struct Gauss {
    left: Matrix,
    right: Matrix,
}

impl Gauss {
    /// Solve `left . x = right`, returning `x`. Rows of `left` that are
    /// linearly dependent on earlier rows reduce to zero and are tolerated.
    pub fn solve(left: Matrix, right: Matrix) -> Option<Matrix> {
        assert_eq!(
            left.rows, right.rows,
            "left and right hand side must have the same number of rows"
        );
        let mut g = Gauss { left, right };
        g.eliminate();
        if g.consistent() {
            Some(g.right)
        } else {
            None
        }
    }

    fn eliminate(&mut self) {
        let (m, n) = self.left.shape();
        let mut pivot_row = 0;

        for col in 0..n {
            if pivot_row == m {
                break;
            }

            // Partial pivoting on absolute value
            let (best, magnitude) = (pivot_row..m)
                .map(|row| (row, self.left[(row, col)].abs()))
                .fold((pivot_row, 0.0), |acc, x| if x.1 > acc.1 { x } else { acc });
            if magnitude <= EPSILON {
                for row in pivot_row..m {
                    self.left[(row, col)] = 0.0;
                }
                continue;
            }
            self.left.swap_rows(pivot_row, best);
            self.right.swap_rows(pivot_row, best);

            let pivot = self.left[(pivot_row, col)];
            self.left.row_mut(pivot_row).iter_mut().for_each(|x| *x /= pivot);
            self.right.row_mut(pivot_row).iter_mut().for_each(|x| *x /= pivot);

            // Clear the pivot column in every other row
            for row in 0..m {
                if row == pivot_row {
                    continue;
                }
                let factor = self.left[(row, col)];
                if factor == 0.0 {
                    continue;
                }
                for j in 0..n {
                    self.left[(row, j)] -= factor * self.left[(pivot_row, j)];
                }
                for j in 0..self.right.cols {
                    self.right[(row, j)] -= factor * self.right[(pivot_row, j)];
                }
            }
            pivot_row += 1;
        }
    }

    /// Is `left` reduced to the identity, except for rows of all zeros?
    fn consistent(&self) -> bool {
        let n = self.left.cols;
        (0..self.left.rows).all(|i| {
            (0..n).all(|j| {
                let x = self.left[(i, j)];
                if i == j {
                    (x - 1.0).abs() <= EPSILON || x.abs() <= EPSILON
                } else {
                    x.abs() <= 1E-9
                }
            })
        })
    }
}
