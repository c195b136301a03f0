//! Semi-supervised, cross-validated rescoring
//!
//! Each fold learns a linear model on the other folds: starting from the best
//! single feature, decoys serve as negative examples and the targets accepted
//! at the training FDR as positive examples. The learnt weights then score the
//! held-out fold, and the held-out folds are calibrated and merged.

use crate::dataset::{Dataset, PsmSource};
use crate::ml::linear_discriminant::Learner;
use crate::ml::pep::PepEstimator;
use crate::ml::pi0::Pi0Estimator;
use crate::scores::{Scores, TrainingSet};
use crate::settings::Settings;
use crate::xval::CrossValidationPartitioner;
use crate::Error;
use rayon::prelude::*;

/// Output of a training run
#[derive(Clone, Debug)]
pub struct Model {
    /// Weight vector (bias last) learnt by every fold
    pub weights: Vec<Vec<f64>>,
    /// All PSMs, rescored and calibrated
    pub scores: Scores,
}

impl Model {
    /// Feature weights averaged over folds, bias last
    pub fn mean_weights(&self) -> Vec<f64> {
        let width = self.weights.first().map_or(0, |w| w.len());
        let mut mean = vec![0.0; width];
        for w in &self.weights {
            for (m, x) in mean.iter_mut().zip(w) {
                *m += x / self.weights.len() as f64;
            }
        }
        mean
    }
}

pub struct Trainer<'a, L: Learner> {
    settings: Settings,
    learner: &'a L,
}

impl<'a, L: Learner> Trainer<'a, L> {
    pub fn new(settings: Settings, learner: &'a L) -> Self {
        Self { settings, learner }
    }

    /// Learn one model per cross-validation fold and rescore every PSM of
    /// `data`. Feature rows are relocated so that each fold is contiguous.
    pub fn train(&self, data: &mut Dataset) -> Result<Model, Error> {
        let settings = &self.settings;
        let pi0 = Pi0Estimator::from(*settings);

        let mut scores = Scores::new(settings.use_pi0);
        scores.fill(data)?;

        let mut folds = CrossValidationPartitioner {
            folds: settings.folds,
            seed: settings.seed,
        }
        .partition(&scores)?;
        folds.relocate_features(data);
        log::info!(
            "training {} folds with {} iterations each",
            folds.len(),
            settings.iterations
        );

        let data: &Dataset = data;
        let weights = folds
            .train
            .par_iter_mut()
            .enumerate()
            .map(|(fold, train)| self.train_fold(fold, train, data))
            .collect::<Result<Vec<_>, Error>>()?;

        for (fold, (test, w)) in folds.test.iter_mut().zip(&weights).enumerate() {
            let positives = test.calc_scores(w, settings.test_fdr, data)?;
            log::trace!(
                "- fold {}: {} test positives at {} FDR",
                fold,
                positives,
                settings.test_fdr
            );
        }

        scores.merge(&mut folds.test, settings.test_fdr, &pi0)?;
        let positives = scores.calc_q(settings.test_fdr);
        scores.calc_pep(&PepEstimator::from(*settings));

        log::info!(
            "discovered {} target PSMs at {}% FDR (pi0 = {:.4})",
            positives,
            settings.test_fdr * 100.0,
            scores.pi0()
        );
        Ok(Model { weights, scores })
    }

    fn train_fold(
        &self,
        fold: usize,
        train: &mut Scores,
        data: &Dataset,
    ) -> Result<Vec<f64>, Error> {
        let settings = &self.settings;
        let (mut weights, _) = train.get_init_direction(settings.train_fdr, data);
        let mut positives = train.calc_scores(&weights, settings.train_fdr, data)?;

        for iteration in 0..settings.iterations {
            let mut set = TrainingSet::new(data.num_features());
            train.generate_negative_training_set(&mut set, data, settings.cneg);
            train.generate_positive_training_set(&mut set, data, settings.train_fdr, settings.cpos);
            if set.positives == 0 {
                log::warn!(
                    "fold {}: no positive training examples at {} FDR, keeping current weights",
                    fold,
                    settings.train_fdr
                );
                break;
            }

            match self.learner.train(&set.matrix(), &set.labels, &set.costs) {
                Some(w) => weights = w,
                None => {
                    log::warn!(
                        "fold {}: failed to fit model at iteration {}, keeping previous weights",
                        fold,
                        iteration + 1
                    );
                    break;
                }
            }
            positives = train.calc_scores(&weights, settings.train_fdr, data)?;
            log::trace!(
                "- fold {} iteration {}: {} positives ({} examples)",
                fold,
                iteration + 1,
                positives,
                set.len()
            );
        }
        log::trace!("- fold {}: {} training positives, weights {:?}", fold, positives, weights);
        Ok(weights)
    }
}
