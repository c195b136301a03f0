//! Non-parametric alternative to the logistic spline for posterior error
//! probabilities. Kernel Density Estimation is used to fit the target and
//! decoy score distributions separately; binning and linear interpolation
//! keep the cost of evaluating a score constant.
//!
//! Käll, 2008 [https://pubmed.ncbi.nlm.nih.gov/18052118/]
//! Ma, 2012 [https://pubmed.ncbi.nlm.nih.gov/23176103/]

use super::spline::LogOddsModel;
use rayon::prelude::*;
use std::convert::identity;

pub struct Kde<'a> {
    sample: &'a [f64],
    pub bandwidth: f64,
    constant: f64,
}

impl<'a> Kde<'a> {
    /// Gaussian kernel with Silverman's rule-of-thumb bandwidth
    pub fn new(sample: &'a [f64], bw_adjust: impl Fn(f64) -> f64) -> Self {
        let factor = 4. / 3.;
        let exponent = 1. / 5.;
        let sigma = match super::std(sample) {
            x if x > 0.0 && x.is_finite() => x,
            _ => 1.0,
        };
        let bandwidth = bw_adjust(sigma * (factor / sample.len() as f64).powf(exponent));
        let constant = (2.0 * std::f64::consts::PI).sqrt() * bandwidth * sample.len() as f64;
        Self {
            sample,
            bandwidth,
            constant,
        }
    }

    fn kernel(&self, x: f64) -> f64 {
        (-0.5 * x.powi(2)).exp()
    }

    pub fn pdf(&self, x: f64) -> f64 {
        if self.sample.is_empty() {
            return 0.0;
        }
        let h = self.bandwidth;

        // Summed in sample order, so that densities don't depend on the
        // thread pool
        let sum = self
            .sample
            .iter()
            .map(|xi| self.kernel((x - xi) / h))
            .sum::<f64>();

        sum / self.constant
    }
}

pub struct Builder {
    monotonic: bool,
    bins: usize,
    bw_adjust: Box<dyn Fn(f64) -> f64>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            monotonic: true,
            bins: 1000,
            bw_adjust: Box::new(identity),
        }
    }
}

impl Builder {
    pub fn monotonic(mut self, monotonic: bool) -> Self {
        self.monotonic = monotonic;
        self
    }

    pub fn bw_adjust<F: 'static + Fn(f64) -> f64>(mut self, bw_adjust: F) -> Self {
        self.bw_adjust = Box::new(bw_adjust);
        self
    }

    pub fn bins(mut self, bins: usize) -> Self {
        self.bins = bins.max(2);
        self
    }

    /// Fit the model to `(score, is_target)` pairs
    pub fn build(self, combined: &[(f64, bool)]) -> Estimator {
        let (t, d): (Vec<(f64, bool)>, Vec<(f64, bool)>) =
            combined.par_iter().partition(|(_, target)| *target);
        let t = t.into_iter().map(|(s, _)| s).collect::<Vec<_>>();
        let d = d.into_iter().map(|(s, _)| s).collect::<Vec<_>>();

        // P(decoy)
        let pi = d.len() as f64 / combined.len().max(1) as f64;
        let decoy = Kde::new(&d, &self.bw_adjust);
        let target = Kde::new(&t, &self.bw_adjust);

        // Essentially, np.linspace(scores.min(), scores.max(), bins)
        let mut min_score = f64::MAX;
        let mut max_score = f64::MIN;
        for (s, _) in combined {
            min_score = min_score.min(*s);
            max_score = max_score.max(*s);
        }
        if min_score > max_score {
            min_score = 0.0;
            max_score = 0.0;
        }
        let score_step = match (max_score - min_score) / (self.bins - 1) as f64 {
            x if x > 0.0 => x,
            _ => 1.0,
        };

        // Posterior probability of being a decoy, at evenly spaced scores
        let mut bins = (0..self.bins)
            .into_par_iter()
            .map(|bin| {
                let score = (bin as f64 * score_step) + min_score;
                let decoy = decoy.pdf(score) * pi;
                let target = target.pdf(score) * (1.0 - pi);
                match decoy + target {
                    total if total > 0.0 => decoy / total,
                    _ => pi,
                }
            })
            .collect::<Vec<_>>();

        if self.monotonic {
            // Lower scores never have a lower error probability
            let mut acc = 0.0f64;
            for x in bins.iter_mut().rev() {
                acc = acc.max(*x);
                *x = acc;
            }
        }

        Estimator {
            bins,
            min_score,
            score_step,
        }
    }
}

pub struct Estimator {
    bins: Vec<f64>,
    min_score: f64,
    score_step: f64,
}

impl Estimator {
    /// Calculate the posterior error probability for a given score, under the
    /// pre-fit non-parametric probability model.
    pub fn posterior_error(&self, score: f64) -> f64 {
        let position = ((score - self.min_score) / self.score_step).max(0.0);
        let last = self.bins.len().saturating_sub(1);
        let bin_lo = last.min(position.floor() as usize);
        let bin_hi = last.min(bin_lo + 1);

        // PEP of lower & one higher bin
        let lower = self.bins[bin_lo];
        let upper = self.bins[bin_hi];

        // What percent of the way to the higher bin are we?
        let linear = (position - bin_lo as f64).min(1.0);

        // Linear interpolation between lower and upper bin
        lower + (upper - lower) * linear
    }
}

impl LogOddsModel for Estimator {
    fn log_odds(&self, score: f64) -> f64 {
        let pe = self.posterior_error(score);
        (pe / (1.0 - pe)).ln()
    }
}
