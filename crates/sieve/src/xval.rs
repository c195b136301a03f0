//! Cross-validation folds, stratified by spectrum
//!
//! PSMs of the same spectrum are not independent (at most one of them can be
//! correct), so every PSM sharing a scan number is assigned to the same fold.

use crate::dataset::Dataset;
use crate::scores::{ScoreHolder, Scores};
use crate::Error;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CrossValidationPartitioner {
    pub folds: usize,
    pub seed: u64,
}

/// `test[f]` holds the PSMs of fold `f`; `train[f]` holds every other fold
#[derive(Clone, Debug)]
pub struct Folds {
    pub train: Vec<Scores>,
    pub test: Vec<Scores>,
}

impl CrossValidationPartitioner {
    pub fn partition(&self, scores: &Scores) -> Result<Folds, Error> {
        let k = self.folds;
        if k == 0 {
            return Err(Error::EmptyFold(0));
        }

        let mut ordered: Vec<ScoreHolder> = scores.holders().to_vec();
        ordered.sort_by_key(|sh| sh.scan);

        let groups = ordered
            .windows(2)
            .filter(|w| w[0].scan != w[1].scan)
            .count()
            + usize::from(!ordered.is_empty());

        // Spread the scan groups as evenly as possible over the folds
        let mut remaining = vec![0usize; k];
        let mut left = groups;
        for (f, quota) in remaining.iter_mut().enumerate() {
            *quota = left / (k - f);
            left -= *quota;
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut train = vec![Scores::new(scores.use_pi0()); k];
        let mut test = vec![Scores::new(scores.use_pi0()); k];

        let mut fold = 0;
        let mut previous = None;
        for sh in ordered {
            if previous != Some(sh.scan) {
                let open = (0..k).filter(|&f| remaining[f] > 0).collect::<Vec<_>>();
                fold = open[rng.gen_range(0..open.len())];
                remaining[fold] -= 1;
                previous = Some(sh.scan);
            }
            test[fold].push_unchecked(sh);
            for (_, set) in train.iter_mut().enumerate().filter(|(f, _)| *f != fold) {
                set.push_unchecked(sh);
            }
        }

        for (f, (train, test)) in train.iter_mut().zip(test.iter_mut()).enumerate() {
            train.recalculate_sizes();
            test.recalculate_sizes();
            log::trace!(
                "- fold {}: {} training PSMs, {} test PSMs",
                f,
                train.len(),
                test.len()
            );
            if test.is_empty() {
                return Err(Error::EmptyFold(f));
            }
        }

        Ok(Folds { train, test })
    }
}

impl Folds {
    pub fn len(&self) -> usize {
        self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.test.is_empty()
    }

    /// Make the feature rows of every test fold contiguous in the pool, fold
    /// after fold, with targets before decoys inside each fold
    pub fn relocate_features(&self, data: &mut Dataset) {
        let mut ix = 0;
        for fold in &self.test {
            let targets = fold.iter().filter(|sh| sh.is_target());
            let decoys = fold.iter().filter(|sh| sh.is_decoy());
            for sh in targets.chain(decoys) {
                let slot = data.pool().address_from_index(ix);
                data.relocate(sh.psm, slot);
                ix += 1;
            }
        }
    }
}
