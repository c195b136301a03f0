//! Ranked collections of scored PSMs, and the statistics computed over them

use crate::dataset::{Dataset, PsmSource};
use crate::ml::matrix::Matrix;
use crate::ml::normalize::normalize;
use crate::ml::pep::PepEstimator;
use crate::ml::pi0::{target_p_values, Pi0Estimator};
use crate::ml::qvalue::QValueCalculator;
use crate::psm::{Psm, PsmIx, DECOY, TARGET};
use crate::Error;
use fnv::FnvHashMap;
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
/// A single PSM, as ranked inside a [`Scores`] collection
pub struct ScoreHolder {
    pub psm: PsmIx,
    /// Target/Decoy label, -1 is decoy, 1 is target
    pub label: i32,
    /// Cached from the PSM, for tie-breaking
    pub scan: u32,
    pub expmass: f64,
    pub score: f64,
    pub q: f64,
    pub pep: f64,
    pub p: f64,
}

impl ScoreHolder {
    pub fn new(ix: PsmIx, psm: &Psm) -> Self {
        ScoreHolder {
            psm: ix,
            label: psm.label,
            scan: psm.scan,
            expmass: psm.expmass,
            score: 0.0,
            q: 0.0,
            pep: 0.0,
            p: 0.0,
        }
    }

    pub fn is_target(&self) -> bool {
        self.label == TARGET
    }

    pub fn is_decoy(&self) -> bool {
        self.label == DECOY
    }

    pub fn to_pair(&self) -> (f64, bool) {
        (self.score, self.is_target())
    }

    /// Best PSM first: descending by score, then scan, experimental mass and
    /// label
    pub fn descending(a: &ScoreHolder, b: &ScoreHolder) -> Ordering {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.scan.cmp(&a.scan))
            .then_with(|| b.expmass.total_cmp(&a.expmass))
            .then_with(|| b.label.cmp(&a.label))
    }
}

/// Labelled feature rows handed to a [`crate::ml::linear_discriminant::Learner`]
#[derive(Clone, Debug, Default)]
pub struct TrainingSet {
    width: usize,
    features: Vec<f64>,
    pub labels: Vec<i32>,
    pub costs: Vec<f64>,
    pub positives: usize,
    pub negatives: usize,
}

impl TrainingSet {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            ..Default::default()
        }
    }

    fn push(&mut self, row: &[f64], label: i32, cost: f64) {
        self.features.extend_from_slice(row);
        self.labels.push(label);
        self.costs.push(cost);
        match label {
            TARGET => self.positives += 1,
            _ => self.negatives += 1,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn matrix(&self) -> Matrix {
        Matrix::new(self.features.clone(), self.len(), self.width)
    }
}

#[derive(Clone, Debug)]
/// An ordered collection of [`ScoreHolder`]s, for a single cross-validation
/// fold or for a whole run
pub struct Scores {
    scores: Vec<ScoreHolder>,
    use_pi0: bool,
    pi0: f64,
    total_targets: usize,
    total_decoys: usize,
    ratio: f64,
    /// Representative PSM of each peptide -> every PSM of that peptide
    peptide_psms: FnvHashMap<PsmIx, Vec<PsmIx>>,
}

impl Default for Scores {
    fn default() -> Self {
        Scores::new(true)
    }
}

impl Scores {
    pub fn new(use_pi0: bool) -> Self {
        Scores {
            scores: Vec::new(),
            use_pi0,
            pi0: 1.0,
            total_targets: 0,
            total_decoys: 0,
            ratio: 1.0,
            peptide_psms: FnvHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoreHolder> {
        self.scores.iter()
    }

    pub fn holders(&self) -> &[ScoreHolder] {
        &self.scores
    }

    pub fn use_pi0(&self) -> bool {
        self.use_pi0
    }

    pub fn pi0(&self) -> f64 {
        self.pi0
    }

    /// Number of targets
    pub fn pos_size(&self) -> usize {
        self.total_targets
    }

    /// Number of decoys
    pub fn neg_size(&self) -> usize {
        self.total_decoys
    }

    /// `targets / max(1, decoys)`
    pub fn target_decoy_ratio(&self) -> f64 {
        self.ratio
    }

    /// Every PSM of the peptide represented by `representative`, after
    /// [`Scores::weed_out_redundant`]
    pub fn get_psms(&self, representative: PsmIx) -> &[PsmIx] {
        self.peptide_psms
            .get(&representative)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn calculator(&self) -> QValueCalculator {
        QValueCalculator {
            total_targets: self.total_targets,
            total_decoys: self.total_decoys,
            ratio: self.ratio,
            pi0: self.pi0,
            use_pi0: self.use_pi0,
        }
    }

    /// Wrap every target and decoy of `source`, targets first. PSMs with any
    /// other label are dropped and their feature rows released.
    pub fn fill<S: PsmSource + ?Sized>(&mut self, source: &mut S) -> Result<(), Error> {
        self.scores.clear();
        let mut decoys = Vec::new();
        let mut dropped = Vec::new();
        for (ix, psm) in source.psms() {
            match psm.label {
                TARGET => self.scores.push(ScoreHolder::new(ix, psm)),
                DECOY => decoys.push(ScoreHolder::new(ix, psm)),
                label => {
                    log::warn!(
                        "PSM {} has label {}, expected 1 or -1: ignoring it",
                        psm.id,
                        label
                    );
                    dropped.push(ix);
                }
            }
        }
        self.scores.append(&mut decoys);
        for ix in dropped {
            source.release(ix);
        }
        self.recalculate_sizes();

        if self.total_targets == 0 {
            return Err(Error::NoTargets);
        }
        if self.total_decoys == 0 {
            return Err(Error::NoDecoys);
        }

        let minimum = 5 * source.num_features();
        if self.total_targets < minimum {
            log::warn!(
                "the number of positive samples read ({}) is too small to perform a correct classification",
                self.total_targets
            );
        }
        if self.total_decoys < minimum {
            log::warn!(
                "the number of negative samples read ({}) is too small to perform a correct classification",
                self.total_decoys
            );
        }

        log::info!(
            "read {} targets and {} decoys, target/decoy ratio {:.3}",
            self.total_targets,
            self.total_decoys,
            self.ratio
        );
        Ok(())
    }

    /// Add a holder, updating the target/decoy counts. Holders with a label
    /// other than +1/-1 are dropped, and their feature row returned to the
    /// pool.
    pub fn add_score_holder(&mut self, holder: ScoreHolder, data: &mut Dataset) -> bool {
        match holder.label {
            TARGET => self.total_targets += 1,
            DECOY => self.total_decoys += 1,
            label => {
                log::warn!(
                    "PSM {} has label {}, expected 1 or -1: ignoring it",
                    data[holder.psm].id,
                    label
                );
                data.release(holder.psm);
                return false;
            }
        }
        self.scores.push(holder);
        self.ratio = self.total_targets as f64 / self.total_decoys.max(1) as f64;
        true
    }

    /// Score `holder` with `weights`, return its feature row to the pool and
    /// add it to the collection
    pub fn score_and_add(
        &mut self,
        mut holder: ScoreHolder,
        weights: &[f64],
        data: &mut Dataset,
    ) -> Result<bool, Error> {
        check_weights(weights, data.num_features())?;
        holder.score = score(data.features(holder.psm), weights);
        data.release(holder.psm);
        Ok(self.add_score_holder(holder, data))
    }

    /// Sort best PSM first
    pub fn sort(&mut self) {
        self.scores.par_sort_by(ScoreHolder::descending);
    }

    pub fn recalculate_sizes(&mut self) {
        self.total_decoys = self.scores.iter().filter(|sh| sh.is_decoy()).count();
        self.total_targets = self.scores.len() - self.total_decoys;
        self.ratio = self.total_targets as f64 / self.total_decoys.max(1) as f64;
    }

    /// Score every PSM with `weights` (bias last), sort, and assign q-values.
    /// Returns the number of targets accepted at `fdr`.
    pub fn calc_scores(
        &mut self,
        weights: &[f64],
        fdr: f64,
        data: &Dataset,
    ) -> Result<usize, Error> {
        check_weights(weights, data.num_features())?;
        self.scores.par_iter_mut().for_each(|sh| {
            sh.score = score(data.features(sh.psm), weights);
        });
        self.sort();
        Ok(self.calc_q(fdr))
    }

    /// Assign p-values and q-values, returning the number of targets accepted
    /// at `fdr`. The collection must already be sorted.
    pub fn calc_q(&mut self, fdr: f64) -> usize {
        self.calculator().assign(&mut self.scores, fdr)
    }

    pub fn estimate_pi0(&mut self, estimator: &Pi0Estimator) -> Result<f64, Error> {
        let p = target_p_values(&self.scores);
        self.pi0 = estimator.estimate(&p)?;
        Ok(self.pi0)
    }

    pub fn calc_pep(&mut self, estimator: &PepEstimator) {
        let combined = self.scores.iter().map(|sh| sh.to_pair()).collect::<Vec<_>>();
        let peps = estimator.estimate(&combined, self.use_pi0, self.pi0);
        for (sh, pep) in self.scores.iter_mut().zip(peps) {
            sh.pep = pep;
        }
    }

    /// Map the last score with `q < fdr` to 0, and the median decoy to -1
    pub fn normalize_scores(&mut self, fdr: f64) -> Result<(), Error> {
        normalize(&mut self.scores, self.total_decoys, fdr)
    }

    /// Calibrate every collection in `parts` independently (pi0, q-values and
    /// normalized scores), and replace `self` with their union
    pub fn merge(
        &mut self,
        parts: &mut [Scores],
        fdr: f64,
        estimator: &Pi0Estimator,
    ) -> Result<(), Error> {
        self.scores.clear();
        for part in parts.iter_mut() {
            part.sort();
            if part.use_pi0 {
                part.estimate_pi0(estimator)?;
            }
            part.calc_q(fdr);
            part.normalize_scores(fdr)?;
            self.scores.extend_from_slice(&part.scores);
        }
        self.post_merge_step(estimator)
    }

    /// Re-sort, recount, and re-estimate pi0 after the membership of the
    /// collection has changed
    pub fn post_merge_step(&mut self, estimator: &Pi0Estimator) -> Result<(), Error> {
        self.sort();
        self.recalculate_sizes();
        self.pi0 = 1.0;
        if self.use_pi0 {
            self.estimate_pi0(estimator)?;
        }
        Ok(())
    }

    /// All decoys, with cost `cneg`
    pub fn generate_negative_training_set(&self, set: &mut TrainingSet, data: &Dataset, cneg: f64) {
        for sh in self.scores.iter().filter(|sh| sh.is_decoy()) {
            if let Some(row) = data.features(sh.psm) {
                set.push(row, DECOY, cneg);
            }
        }
    }

    /// Targets from the top of the list with `q <= fdr`, with cost `cpos`
    pub fn generate_positive_training_set(
        &self,
        set: &mut TrainingSet,
        data: &Dataset,
        fdr: f64,
        cpos: f64,
    ) {
        for sh in self.scores.iter().filter(|sh| sh.is_target()) {
            if fdr < sh.q {
                break;
            }
            if let Some(row) = data.features(sh.psm) {
                set.push(row, TARGET, cpos);
            }
        }
    }

    /// Find the single feature, in either direction, that accepts the most
    /// targets before the estimated FDR reaches `fdr`. Returns the unit
    /// weight vector of that feature (bias last, zero) and the number of
    /// targets it accepts.
    pub fn get_init_direction(&mut self, fdr: f64, data: &Dataset) -> (Vec<f64>, usize) {
        let n = data.num_features();
        let calc = self.calculator();
        let mut best: Option<(usize, f64, usize)> = None;

        for feature in 0..n {
            for sh in self.scores.iter_mut() {
                sh.score = data.features(sh.psm).map_or(f64::NEG_INFINITY, |f| f[feature]);
            }
            self.sort();

            // Low-is-best first, so that it wins ties
            for sign in [-1.0, 1.0] {
                let ranked: Box<dyn Iterator<Item = &ScoreHolder>> = match sign > 0.0 {
                    true => Box::new(self.scores.iter()),
                    false => Box::new(self.scores.iter().rev()),
                };

                let mut first = None;
                let mut targets = 0;
                let mut decoys = 0;
                for sh in ranked {
                    let top = *first.get_or_insert(sh.score);
                    match sh.is_target() {
                        true => targets += 1,
                        false => decoys += 1,
                    }
                    let q = match targets {
                        0 => calc.pi0,
                        _ => calc.efp(decoys) / targets as f64,
                    };
                    if fdr <= q {
                        let improves = best.map_or(true, |(_, _, b)| targets > b);
                        if improves && top != sh.score {
                            best = Some((feature, sign, targets));
                        }
                        break;
                    }
                }
            }
        }

        let mut direction = vec![0.0; n + 1];
        match best {
            Some((feature, sign, positives)) => {
                direction[feature] = sign;
                log::info!(
                    "selected feature {} ({}) as initial search direction, separating {} positives",
                    feature + 1,
                    data.feature_names()[feature],
                    positives
                );
                (direction, positives)
            }
            None => {
                log::warn!(
                    "no single feature separates targets from decoys, starting from feature 1"
                );
                if n > 0 {
                    direction[0] = 1.0;
                }
                (direction, 0)
            }
        }
    }

    /// Keep only the best PSM of every (peptide, label), remembering which
    /// PSMs each survivor represents
    pub fn weed_out_redundant(
        &mut self,
        data: &Dataset,
        estimator: &Pi0Estimator,
    ) -> Result<(), Error> {
        self.scores.sort_by(|a, b| {
            data[a.psm]
                .sequence()
                .cmp(data[b.psm].sequence())
                .then_with(|| a.label.cmp(&b.label))
                .then_with(|| ScoreHolder::descending(a, b))
        });

        self.peptide_psms.clear();
        let mut kept: Vec<ScoreHolder> = Vec::new();
        let mut previous: Option<(&str, i32)> = None;
        for sh in &self.scores {
            let key = (data[sh.psm].sequence(), sh.label);
            if previous != Some(key) {
                kept.push(*sh);
                previous = Some(key);
            }
            if let Some(representative) = kept.last() {
                self.peptide_psms
                    .entry(representative.psm)
                    .or_default()
                    .push(sh.psm);
            }
        }
        log::trace!(
            "- kept {} of {} PSMs as unique peptides",
            kept.len(),
            self.scores.len()
        );
        self.scores = kept;
        self.post_merge_step(estimator)
    }

    /// Keep only the best PSM of every spectrum (scan, experimental mass),
    /// i.e. let targets and decoys compete. Dropped PSMs return their feature
    /// rows to the pool.
    pub fn weed_out_redundant_tdc(
        &mut self,
        data: &mut Dataset,
        estimator: &Pi0Estimator,
    ) -> Result<(), Error> {
        self.scores.sort_by(|a, b| {
            a.scan
                .cmp(&b.scan)
                .then_with(|| a.expmass.total_cmp(&b.expmass))
                .then_with(|| b.score.total_cmp(&a.score))
                .then_with(|| b.label.cmp(&a.label))
        });

        let before = self.scores.len();
        let mut kept: Vec<ScoreHolder> = Vec::with_capacity(before);
        for sh in self.scores.drain(..) {
            match kept.last() {
                Some(last) if last.scan == sh.scan && last.expmass == sh.expmass => {
                    data.release(sh.psm);
                }
                _ => kept.push(sh),
            }
        }
        log::trace!("- kept {} of {} PSMs after competition", kept.len(), before);
        self.scores = kept;
        self.post_merge_step(estimator)
    }

    /// Number of targets with `q < level`
    pub fn q_values_below_level(&self, level: f64) -> usize {
        self.scores
            .iter()
            .filter(|sh| sh.is_target() && sh.q < level)
            .count()
    }

    pub(crate) fn push_unchecked(&mut self, holder: ScoreHolder) {
        self.scores.push(holder);
    }
}

fn check_weights(weights: &[f64], features: usize) -> Result<(), Error> {
    if weights.len() != features + 1 {
        return Err(Error::WeightLength {
            expected: features + 1,
            found: weights.len(),
        });
    }
    Ok(())
}

/// `features . weights[..n] + weights[n]`, or -inf if the feature row has
/// been released
fn score(features: Option<&[f64]>, weights: &[f64]) -> f64 {
    match features {
        Some(features) => {
            let bias = weights[weights.len() - 1];
            features
                .iter()
                .zip(weights)
                .fold(bias, |acc, (x, w)| acc + x * w)
        }
        None => f64::NEG_INFINITY,
    }
}

impl<'a> IntoIterator for &'a Scores {
    type Item = &'a ScoreHolder;
    type IntoIter = std::slice::Iter<'a, ScoreHolder>;

    fn into_iter(self) -> Self::IntoIter {
        self.scores.iter()
    }
}

impl std::ops::Index<usize> for Scores {
    type Output = ScoreHolder;

    fn index(&self, index: usize) -> &Self::Output {
        &self.scores[index]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dataset::test::psm;

    /// Two features: the first separates targets from decoys, the second is
    /// noise that favours decoys
    fn dataset(targets: usize, decoys: usize) -> Dataset {
        let mut data = Dataset::new(vec!["good".into(), "noise".into()]);
        for i in 0..targets {
            let x = i as f64;
            data.push(psm(i, TARGET, i as u32), &[10.0 + x, (x * 7.0) % 5.0])
                .unwrap();
        }
        for i in 0..decoys {
            let x = i as f64;
            data.push(psm(targets + i, DECOY, i as u32), &[x / 2.0, 3.0 + (x * 3.0) % 5.0])
                .unwrap();
        }
        data
    }

    #[test]
    fn fill_requires_both_labels() {
        let mut scores = Scores::new(true);
        assert!(matches!(
            scores.fill(&mut dataset(0, 10)),
            Err(Error::NoTargets)
        ));
        assert!(matches!(
            scores.fill(&mut dataset(10, 0)),
            Err(Error::NoDecoys)
        ));

        scores.fill(&mut dataset(30, 20)).unwrap();
        assert_eq!(scores.len(), 50);
        assert_eq!(scores.pos_size(), 30);
        assert_eq!(scores.neg_size(), 20);
        assert_eq!(scores.target_decoy_ratio(), 1.5);
    }

    #[test]
    fn invalid_labels_are_dropped() {
        let mut data = dataset(2, 2);
        let ix = data.push(psm(99, 0, 99), &[1.0, 1.0]).unwrap();
        let mut scores = Scores::new(false);
        for i in 0..data.len() {
            let ix = PsmIx(i as u32);
            let holder = ScoreHolder::new(ix, &data[ix]);
            scores.add_score_holder(holder, &mut data);
        }
        assert_eq!(scores.len(), 4);
        assert_eq!((scores.pos_size(), scores.neg_size()), (2, 2));
        assert!(data.features(ix).is_none());
    }

    #[test]
    fn fill_releases_invalid_labels() {
        let mut data = dataset(10, 10);
        let ix = data.push(psm(20, 0, 20), &[1.0, 1.0]).unwrap();
        assert_eq!(data.pool().allocated(), 21);

        let mut scores = Scores::new(true);
        scores.fill(&mut data).unwrap();
        assert_eq!(scores.len(), 20);
        assert_eq!((scores.pos_size(), scores.neg_size()), (10, 10));
        assert!(scores.iter().all(|sh| sh.psm != ix));
        assert!(data.features(ix).is_none());
        assert_eq!(data.pool().allocated(), 20);
    }

    #[test]
    fn score_and_add_releases_rows() {
        let mut data = dataset(3, 3);
        let mut scores = Scores::new(false);
        let weights = [1.0, 0.0, -2.0];
        for i in 0..6 {
            let ix = PsmIx(i);
            let holder = ScoreHolder::new(ix, &data[ix]);
            assert!(scores.score_and_add(holder, &weights, &mut data).unwrap());
        }
        assert_eq!(data.pool().allocated(), 0);
        assert_eq!(scores[0].score, 8.0);
        assert!(matches!(
            scores.score_and_add(ScoreHolder::new(PsmIx(0), &data[PsmIx(0)]), &[1.0], &mut data),
            Err(Error::WeightLength {
                expected: 3,
                found: 1
            })
        ));
    }

    #[test]
    fn sort_breaks_ties() {
        let mut data = dataset(2, 2);
        let mut scores = Scores::new(false);
        scores.fill(&mut data).unwrap();
        // Every PSM scores zero: order falls back to scan, mass, label
        scores.calc_scores(&[0.0, 0.0, 0.0], 0.01, &data).unwrap();
        let order = scores
            .iter()
            .map(|sh| (sh.scan, sh.label))
            .collect::<Vec<_>>();
        assert_eq!(order, vec![(1, 1), (1, -1), (0, 1), (0, -1)]);
    }

    #[test]
    fn heavier_precursor_breaks_scan_ties() {
        let mut data = Dataset::new(vec!["x".into()]);
        for (id, (label, mass)) in [(TARGET, 100.0), (DECOY, 300.0), (TARGET, 200.0)]
            .into_iter()
            .enumerate()
        {
            let mut p = psm(id, label, 5);
            p.expmass = mass;
            data.push(p, &[1.0]).unwrap();
        }
        let mut scores = Scores::new(false);
        scores.fill(&mut data).unwrap();
        scores.calc_scores(&[1.0, 0.0], 0.01, &data).unwrap();
        let order = scores
            .iter()
            .map(|sh| (sh.psm, sh.expmass, sh.label))
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![
                (PsmIx(1), 300.0, DECOY),
                (PsmIx(2), 200.0, TARGET),
                (PsmIx(0), 100.0, TARGET)
            ]
        );
    }

    #[test]
    fn calc_scores_ranks_targets_first() {
        let mut data = dataset(40, 40);
        let mut scores = Scores::new(false);
        scores.fill(&mut data).unwrap();
        let accepted = scores.calc_scores(&[1.0, 0.0, 0.0], 0.01, &data).unwrap();
        assert_eq!(accepted, 40);
        assert_eq!(scores.q_values_below_level(0.01), 40);
        assert!(scores.iter().take(40).all(|sh| sh.is_target()));
        assert!(scores.holders().windows(2).all(|w| w[0].score >= w[1].score));
        assert!(matches!(
            scores.calc_scores(&[1.0, 0.0], 0.01, &data),
            Err(Error::WeightLength { .. })
        ));
    }

    #[test]
    fn initial_direction() {
        let mut data = dataset(40, 40);
        let mut scores = Scores::new(false);
        scores.fill(&mut data).unwrap();
        let (direction, positives) = scores.get_init_direction(0.01, &data);
        assert_eq!(direction, vec![1.0, 0.0, 0.0]);
        assert_eq!(positives, 40);
    }

    #[test]
    fn initial_direction_prefers_low_scores_on_ties() {
        let mut data = Dataset::new(vec!["x".into()]);
        let records = [
            (TARGET, 10.0),
            (TARGET, 9.0),
            (DECOY, 5.0),
            (DECOY, 4.0),
            (TARGET, 1.0),
            (TARGET, 0.0),
        ];
        for (id, (label, x)) in records.into_iter().enumerate() {
            data.push(psm(id, label, id as u32), &[x]).unwrap();
        }
        let mut scores = Scores::new(false);
        scores.fill(&mut data).unwrap();
        let (direction, positives) = scores.get_init_direction(0.01, &data);
        assert_eq!(direction, vec![-1.0, 0.0]);
        assert_eq!(positives, 2);
    }

    #[test]
    fn training_sets() {
        let mut data = dataset(40, 40);
        let mut scores = Scores::new(false);
        scores.fill(&mut data).unwrap();
        scores.calc_scores(&[1.0, 0.0, 0.0], 0.01, &data).unwrap();

        let mut set = TrainingSet::new(2);
        scores.generate_negative_training_set(&mut set, &data, 2.0);
        scores.generate_positive_training_set(&mut set, &data, 0.01, 0.5);
        assert_eq!((set.positives, set.negatives), (40, 40));
        assert_eq!(set.matrix().shape(), (80, 2));
        assert_eq!(set.costs[0], 2.0);
        assert_eq!(set.costs[79], 0.5);
    }

    #[test]
    fn weed_out_peptides() {
        let mut data = Dataset::new(vec!["x".into()]);
        let peptides = ["K.AAA.R", "-.AAA.R", "K.CCC.R", "K.AAA.R"];
        for (i, peptide) in peptides.iter().enumerate() {
            let mut p = psm(i, TARGET, i as u32);
            p.peptide = peptide.to_string();
            data.push(p, &[i as f64]).unwrap();
        }
        let mut decoy = psm(4, DECOY, 4);
        decoy.peptide = "K.AAA.R".into();
        data.push(decoy, &[10.0]).unwrap();

        let mut scores = Scores::new(false);
        scores.fill(&mut data).unwrap();
        scores.calc_scores(&[1.0, 0.0], 0.01, &data).unwrap();
        scores
            .weed_out_redundant(&data, &Pi0Estimator::default())
            .unwrap();

        assert_eq!(scores.len(), 3);
        assert_eq!((scores.pos_size(), scores.neg_size()), (2, 1));
        // AAA target is represented by its best PSM
        let mut psms = scores.get_psms(PsmIx(3)).to_vec();
        psms.sort();
        assert_eq!(psms, vec![PsmIx(0), PsmIx(1), PsmIx(3)]);
        assert_eq!(scores.get_psms(PsmIx(4)), &[PsmIx(4)]);
        assert_eq!(scores.get_psms(PsmIx(2)), &[PsmIx(2)]);
        assert!(scores.holders().windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn target_decoy_competition() {
        let mut data = Dataset::new(vec!["x".into()]);
        data.push(psm(0, TARGET, 1), &[3.0]).unwrap();
        data.push(psm(1, DECOY, 1), &[5.0]).unwrap();
        data.push(psm(2, TARGET, 2), &[4.0]).unwrap();
        data.push(psm(3, DECOY, 2), &[1.0]).unwrap();
        data.push(psm(4, TARGET, 3), &[2.0]).unwrap();

        let mut scores = Scores::new(false);
        scores.fill(&mut data).unwrap();
        scores.calc_scores(&[1.0, 0.0], 0.01, &data).unwrap();
        scores
            .weed_out_redundant_tdc(&mut data, &Pi0Estimator::default())
            .unwrap();

        let kept = scores.iter().map(|sh| sh.psm).collect::<Vec<_>>();
        assert_eq!(kept, vec![PsmIx(1), PsmIx(2), PsmIx(4)]);
        assert_eq!((scores.pos_size(), scores.neg_size()), (2, 1));
        assert!(data.features(PsmIx(0)).is_none());
        assert!(data.features(PsmIx(3)).is_none());
    }

    #[test]
    fn merge_recounts() {
        let mut data = dataset(60, 60);
        let mut all = Scores::new(false);
        all.fill(&mut data).unwrap();
        all.calc_scores(&[1.0, 0.0, 0.0], 0.01, &data).unwrap();

        let mut parts = vec![Scores::new(false), Scores::new(false)];
        for (i, sh) in all.iter().enumerate() {
            parts[i % 2].push_unchecked(*sh);
        }
        parts.iter_mut().for_each(|p| p.recalculate_sizes());

        // Every target outscores every decoy, so both parts normalize
        let mut merged = Scores::new(false);
        merged
            .merge(&mut parts, 0.01, &Pi0Estimator::default())
            .unwrap();
        assert_eq!(merged.len(), 120);
        assert_eq!(
            merged.pos_size(),
            parts[0].pos_size() + parts[1].pos_size()
        );
        assert_eq!(merged.neg_size(), 60);
        assert_eq!(merged.pi0(), 1.0);
        assert!(merged.holders().windows(2).all(|w| w[0].score >= w[1].score));
    }
}
