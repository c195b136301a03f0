//! Target-decoy competition q-values

use crate::scores::ScoreHolder;

/// Counts needed to turn a ranked list of PSMs into q-values
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QValueCalculator {
    pub total_targets: usize,
    pub total_decoys: usize,
    /// `total_targets / max(1, total_decoys)`
    pub ratio: f64,
    pub pi0: f64,
    pub use_pi0: bool,
}

impl QValueCalculator {
    /// Estimated number of false positive targets after observing `decoys`
    /// decoys
    pub fn efp(&self, decoys: usize) -> f64 {
        if self.use_pi0 {
            self.pi0 * decoys as f64 * self.ratio
        } else {
            decoys as f64
        }
    }

    /// Estimated FDR of the set formed by the first `targets + decoys` PSMs
    pub fn fdr(&self, targets: usize, decoys: usize) -> f64 {
        let q = match targets {
            0 => self.pi0,
            _ => self.efp(decoys) / targets as f64,
        };
        q.min(self.pi0)
    }

    /// Assign p-values and q-values in place, returning the number of targets
    /// accepted at `fdr`
    ///
    /// # Invariants
    /// * `scores` must be sorted in descending order (e.g. best PSM is first)
    /// * `scores` must contain exactly `total_targets + total_decoys` PSMs
    pub fn assign(&self, scores: &mut [ScoreHolder], fdr: f64) -> usize {
        assert_eq!(
            self.total_targets + self.total_decoys,
            scores.len(),
            "target/decoy counts are out of sync with the score collection"
        );

        let mut targets = 0;
        let mut decoys = 0;
        let mut passing = 0;

        for sh in scores.iter_mut() {
            if sh.is_target() {
                targets += 1;
                sh.p = (decoys as f64 + 1.0) / (self.total_decoys as f64 + 1.0);
            } else {
                decoys += 1;
                sh.p = decoys as f64 / self.total_decoys as f64;
            }
            sh.q = self.fdr(targets, decoys);
            if fdr >= sh.q {
                passing = targets;
            }
        }

        // Reverse slice, and calculate the cumulative minimum
        let mut q_min = f64::INFINITY;
        for sh in scores.iter_mut().rev() {
            q_min = q_min.min(sh.q);
            sh.q = q_min;
        }
        passing
    }
}
