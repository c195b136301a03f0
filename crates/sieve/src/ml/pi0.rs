//! Estimate the fraction of target PSMs that are drawn from the null
//! distribution (pi0), from the p-values of the targets.
//!
//! For a grid of thresholds λ, `pi0(λ) = #{p > λ} / (n (1 - λ))`. The λ whose
//! bootstrap replicates deviate least (in mean squared error) from the
//! smallest observed estimate is selected.
//!
//! Storey & Tibshirani, 2003 [https://doi.org/10.1073/pnas.1530509100]

use crate::scores::ScoreHolder;
use crate::settings::Settings;
use crate::Error;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Empirical p-values of the target PSMs, sorted in ascending order.
///
/// A target's p-value is the fraction of decoys scoring at least as well as
/// it, with a pseudo-count: `(decoys + 1) / (total_decoys + 1)`.
///
/// # Invariants
/// * `scores` must be sorted in descending order (e.g. best PSM is first)
pub fn target_p_values(scores: &[ScoreHolder]) -> Vec<f64> {
    let total_decoys = scores.iter().filter(|sh| sh.is_decoy()).count() as f64;
    let mut decoys = 0;
    let mut p = Vec::with_capacity(scores.len());
    for sh in scores {
        match sh.is_decoy() {
            true => decoys += 1,
            false => p.push((decoys as f64 + 1.0) / (total_decoys + 1.0)),
        }
    }
    p
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pi0Estimator {
    pub lambdas: usize,
    pub max_lambda: f64,
    pub bootstraps: usize,
    pub max_bootstrap_size: usize,
    pub seed: u64,
}

impl Default for Pi0Estimator {
    fn default() -> Self {
        Settings::default().into()
    }
}

impl From<Settings> for Pi0Estimator {
    fn from(settings: Settings) -> Self {
        Self {
            lambdas: settings.pi0_lambdas,
            max_lambda: settings.pi0_max_lambda,
            bootstraps: settings.pi0_bootstraps,
            max_bootstrap_size: settings.max_bootstrap_size,
            seed: settings.seed,
        }
    }
}

/// `#{p > λ} / (n (1 - λ))` for `p` sorted ascending
fn pi0_at(p: &[f64], lambda: f64) -> f64 {
    let above = p.len() - p.partition_point(|&x| x <= lambda);
    above as f64 / p.len() as f64 / (1.0 - lambda)
}

impl Pi0Estimator {
    /// Estimate pi0 from p-values sorted in ascending order
    pub fn estimate(&self, p: &[f64]) -> Result<f64, Error> {
        if p.is_empty() {
            return Err(Error::Pi0Separation);
        }

        let (lambdas, pi0s): (Vec<f64>, Vec<f64>) = (0..self.lambdas)
            .map(|ix| (ix + 1) as f64 / self.lambdas as f64 * self.max_lambda)
            .map(|lambda| (lambda, pi0_at(p, lambda)))
            .filter(|&(_, pi0)| pi0 > 0.0)
            .unzip();

        if pi0s.is_empty() {
            return Err(Error::Pi0Separation);
        }

        let min_pi0 = pi0s.iter().fold(f64::MAX, |acc, &x| acc.min(x));

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut mse = vec![0.0; lambdas.len()];
        let size = p.len().min(self.max_bootstrap_size);
        let mut sample = Vec::with_capacity(size);
        for _ in 0..self.bootstraps {
            sample.clear();
            sample.extend((0..size).map(|_| p[rng.gen_range(0..p.len())]));
            sample.sort_by(|a, b| a.total_cmp(b));

            for (lambda, err) in lambdas.iter().zip(mse.iter_mut()) {
                *err += (pi0_at(&sample, *lambda) - min_pi0).powi(2);
            }
        }

        // First λ with the smallest error wins
        let best = mse
            .iter()
            .enumerate()
            .fold((0, f64::MAX), |acc, (ix, &err)| {
                if err < acc.1 {
                    (ix, err)
                } else {
                    acc
                }
            })
            .0;

        let pi0 = pi0s[best].clamp(0.0, 1.0);
        log::trace!(
            "- selected lambda {:.3}, pi0 = {:.4}",
            lambdas[best],
            pi0
        );
        Ok(pi0)
    }
}
