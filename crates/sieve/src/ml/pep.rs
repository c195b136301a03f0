//! Posterior error probabilities
//!
//! Scores are binned, and a model of the log-odds that a PSM is a decoy is
//! fit to the bins. Since every decoy stands in for `T/D` false targets, the
//! probability that a target at a given score is incorrect is
//! `pi0 * T/D * exp(log-odds)`.

use super::kde;
use super::spline::{LogOddsModel, LogisticSpline};
use crate::settings::{PepModel, Settings};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PepEstimator {
    pub model: PepModel,
    /// Target number of score bins for the spline fit
    pub bins: usize,
}

impl From<Settings> for PepEstimator {
    fn from(settings: Settings) -> Self {
        Self {
            model: settings.pep_model,
            bins: settings.pep_bins,
        }
    }
}

/// Bin (score, is_target) pairs sorted by ascending score. Returns the median
/// score, number of decoys and total number of PSMs of every bin. Bins are
/// extended so that tied scores never straddle a bin boundary.
fn bin(ascending: &[(f64, bool)], bins: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let size = (ascending.len() / bins.max(1)).max(1);
    let mut medians = Vec::new();
    let mut negatives = Vec::new();
    let mut sizes = Vec::new();

    let mut start = 0;
    while start < ascending.len() {
        let mut end = (start + size).min(ascending.len());
        while end < ascending.len() && ascending[end].0 == ascending[end - 1].0 {
            end += 1;
        }
        let chunk = &ascending[start..end];
        medians.push(chunk[chunk.len() / 2].0);
        negatives.push(chunk.iter().filter(|(_, target)| !target).count() as f64);
        sizes.push(chunk.len() as f64);
        start = end;
    }
    (medians, negatives, sizes)
}

impl PepEstimator {
    /// Estimate PEPs for `(score, is_target)` pairs sorted best-first. The
    /// returned PEPs are in the same order as `combined`.
    pub fn estimate(&self, combined: &[(f64, bool)], use_pi0: bool, pi0: f64) -> Vec<f64> {
        if combined.is_empty() {
            return Vec::new();
        }
        let targets = combined.iter().filter(|(_, target)| *target).count();
        let decoys = combined.len() - targets;
        let factor = match use_pi0 {
            true => pi0,
            false => 1.0,
        } * targets as f64
            / decoys.max(1) as f64;

        match self.model {
            PepModel::Spline => {
                log::trace!("- fitting logistic spline for posterior error probabilities");
                let ascending = combined.iter().rev().copied().collect::<Vec<_>>();
                let (medians, negatives, sizes) = bin(&ascending, self.bins);
                let spline = LogisticSpline::fit(&medians, &negatives, &sizes);
                posterior_errors(&spline, combined, factor)
            }
            PepModel::Kde => {
                log::trace!("- fitting non-parametric model for posterior error probabilities");
                let kde = kde::Builder::default().build(combined);
                posterior_errors(&kde, combined, factor)
            }
        }
    }
}

/// Evaluate `model` on best-first `combined`, scaling odds into PEPs: the
/// worst PEP seen caps everything below it, and a running minimum from the
/// tail makes PEPs non-decreasing down the list.
fn posterior_errors<M: LogOddsModel>(model: &M, combined: &[(f64, bool)], factor: f64) -> Vec<f64> {
    let mut peps = combined
        .iter()
        .map(|(score, _)| model.log_odds(*score))
        .collect::<Vec<_>>();

    let max = peps.iter().fold(f64::MIN, |acc, &x| acc.max(x));
    let top = (factor * max.exp()).min(1.0);

    let mut capped = false;
    for pep in peps.iter_mut() {
        if capped {
            *pep = top;
            continue;
        }
        *pep = (factor * pep.exp()).min(top);
        if *pep >= top || pep.is_nan() {
            *pep = top;
            capped = true;
        }
    }

    let mut acc = f64::MAX;
    for pep in peps.iter_mut().rev() {
        acc = acc.min(*pep);
        *pep = acc;
    }
    peps
}
