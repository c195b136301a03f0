//! In-memory store of PSMs and their feature vectors

use crate::pool::{FeaturePool, Slot};
use crate::psm::{Psm, PsmIx, DECOY, TARGET};
use crate::Error;
use std::ops::Index;

/// Provider of labelled PSMs, consumed by [`crate::scores::Scores::fill`]
pub trait PsmSource {
    /// Dimensionality of the feature vectors
    fn num_features(&self) -> usize;

    /// Number of PSMs carrying `label`
    fn size_from_label(&self, label: i32) -> usize {
        self.psms().filter(|(_, psm)| psm.label == label).count()
    }

    /// Every PSM, in input order
    fn psms(&self) -> Box<dyn Iterator<Item = (PsmIx, &Psm)> + '_>;

    /// Return the feature row of a PSM that will not be scored
    fn release(&mut self, ix: PsmIx);
}

/// Owns every PSM of a run, plus the pool holding their feature rows.
///
/// PSMs are never removed: score collections refer to them by [`PsmIx`], which
/// stays valid across merges, partitioning and feature-row relocation.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    feature_names: Vec<String>,
    psms: Vec<Psm>,
    pool: FeaturePool,
}

impl Dataset {
    pub fn new(feature_names: Vec<String>) -> Self {
        let pool = FeaturePool::new(feature_names.len());
        Self {
            feature_names,
            psms: Vec::new(),
            pool,
        }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn len(&self) -> usize {
        self.psms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.psms.is_empty()
    }

    pub fn pool(&self) -> &FeaturePool {
        &self.pool
    }

    /// Take ownership of `psm`, copying `features` into the pool
    pub fn push(&mut self, mut psm: Psm, features: &[f64]) -> Result<PsmIx, Error> {
        let ix = PsmIx(self.psms.len() as u32);
        psm.features = Some(self.pool.insert(ix, features)?);
        self.psms.push(psm);
        Ok(ix)
    }

    /// Feature row of a PSM, or `None` if it has been released
    pub fn features(&self, ix: PsmIx) -> Option<&[f64]> {
        self.psms[ix.0 as usize]
            .features
            .map(|slot| self.pool.row(slot))
    }

    /// Return the feature row of a PSM to the pool
    pub fn release(&mut self, ix: PsmIx) {
        if let Some(slot) = self.psms[ix.0 as usize].features.take() {
            self.pool.deallocate(slot);
        }
    }

    /// Move the feature row of `ix` into `slot`, swapping it with whatever row
    /// currently lives there. Both affected PSMs are updated, so handles are
    /// never left pointing at a row that has moved.
    pub fn relocate(&mut self, ix: PsmIx, slot: Slot) {
        let current = match self.psms[ix.0 as usize].features {
            Some(current) => current,
            None => return,
        };
        if current == slot {
            return;
        }
        let (now_at_current, now_at_slot) = self.pool.swap(current, slot);
        if let Some(owner) = now_at_current {
            self.psms[owner.0 as usize].features = Some(current);
        }
        if let Some(owner) = now_at_slot {
            self.psms[owner.0 as usize].features = Some(slot);
        }
    }
}

impl Index<PsmIx> for Dataset {
    type Output = Psm;

    fn index(&self, index: PsmIx) -> &Self::Output {
        &self.psms[index.0 as usize]
    }
}

impl PsmSource for Dataset {
    fn num_features(&self) -> usize {
        self.feature_names.len()
    }

    fn psms(&self) -> Box<dyn Iterator<Item = (PsmIx, &Psm)> + '_> {
        Box::new(
            self.psms
                .iter()
                .enumerate()
                .map(|(ix, psm)| (PsmIx(ix as u32), psm)),
        )
    }

    fn release(&mut self, ix: PsmIx) {
        Dataset::release(self, ix)
    }
}

impl Dataset {
    /// Number of (targets, decoys)
    pub fn label_sizes(&self) -> (usize, usize) {
        (self.size_from_label(TARGET), self.size_from_label(DECOY))
    }
}
