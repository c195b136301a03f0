//! Properties of the scoring pipeline on generated data

use quickcheck_macros::quickcheck;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sieve_core::dataset::Dataset;
use sieve_core::ml::linear_discriminant::Lda;
use sieve_core::ml::pi0::Pi0Estimator;
use sieve_core::psm::{Psm, DECOY, TARGET};
use sieve_core::scores::Scores;
use sieve_core::settings::Settings;
use sieve_core::train::Trainer;
use sieve_core::xval::CrossValidationPartitioner;
use sieve_core::Error;

fn psm(id: usize, label: i32, scan: u32, peptide: &str) -> Psm {
    Psm {
        id: format!("psm_{}", id),
        label,
        scan,
        expmass: 1000.0 + scan as f64,
        calcmass: 1000.0,
        charge: 2,
        peptide: peptide.into(),
        proteins: vec!["prot".into()],
        features: None,
    }
}

/// Single-feature dataset from `(feature, scan, is_target)` triples, with at
/// least one target and one decoy
fn single_feature(records: &[(u8, u8, bool)]) -> Dataset {
    let mut data = Dataset::new(vec!["x".into()]);
    let fixed = [(0u8, 0u8, true), (0, 0, false)];
    for (id, (x, scan, target)) in fixed.iter().chain(records).enumerate() {
        let label = if *target { TARGET } else { DECOY };
        data.push(psm(id, label, *scan as u32, "K.PEPTIDE.R"), &[*x as f64])
            .unwrap();
    }
    data
}

#[quickcheck]
fn ranking_is_total(records: Vec<(u8, u8, u8, bool)>) {
    // Few distinct scores and scans, so that every tie-break level is reached
    let mut data = Dataset::new(vec!["x".into()]);
    let fixed = [(0u8, 0u8, 0u8, true), (0, 0, 0, false)];
    for (id, (x, scan, mass, target)) in fixed.iter().chain(&records).enumerate() {
        let label = if *target { TARGET } else { DECOY };
        let mut p = psm(id, label, (scan % 4) as u32, "K.PEPTIDE.R");
        p.expmass = (mass % 3) as f64;
        data.push(p, &[(x % 5) as f64]).unwrap();
    }
    let mut scores = Scores::new(true);
    scores.fill(&mut data).unwrap();
    scores.calc_scores(&[1.0, 0.0], 0.01, &data).unwrap();

    for w in scores.holders().windows(2) {
        let (a, b) = (&w[0], &w[1]);
        assert!(a.score >= b.score);
        if a.score == b.score {
            assert!(a.scan >= b.scan);
            if a.scan == b.scan {
                assert!(a.expmass >= b.expmass);
                if a.expmass == b.expmass {
                    assert!(a.label >= b.label);
                }
            }
        }
    }
}

#[quickcheck]
fn q_values_are_monotone_and_bounded(records: Vec<(u8, u8, bool)>, fdr: u8) {
    let mut data = single_feature(&records);
    let mut scores = Scores::new(true);
    scores.fill(&mut data).unwrap();
    let fdr = fdr as f64 / 255.0;
    let passing = scores.calc_scores(&[1.0, 0.0], fdr, &data).unwrap();

    assert!(passing <= scores.pos_size());
    for sh in &scores {
        assert!(sh.q >= 0.0 && sh.q <= scores.pi0(), "{:?}", sh);
        assert!(sh.p > 0.0 && sh.p <= 1.0, "{:?}", sh);
    }
    for w in scores.holders().windows(2) {
        assert!(w[0].q <= w[1].q);
    }
}

#[test]
fn fdr_trace() {
    // Best first: T, T, D, T, D, D, T
    let labels = [TARGET, TARGET, DECOY, TARGET, DECOY, DECOY, TARGET];
    let mut data = Dataset::new(vec!["x".into()]);
    for (ix, label) in labels.iter().enumerate() {
        data.push(psm(ix, *label, ix as u32, "PEPTIDE"), &[7.0 - ix as f64])
            .unwrap();
    }

    let mut scores = Scores::new(true);
    scores.fill(&mut data).unwrap();
    assert_eq!(scores.pos_size(), 4);
    assert_eq!(scores.neg_size(), 3);
    assert_eq!(scores.target_decoy_ratio(), 4.0 / 3.0);
    assert_eq!(scores.pi0(), 1.0);

    let passing = scores.calc_scores(&[1.0, 0.0], 0.5, &data).unwrap();
    assert_eq!(passing, 3);

    // Raw estimates are 0, 0, 2/3, 4/9, 8/9, 1, 1 before the running minimum
    let expected = [0.0, 0.0, 4.0 / 9.0, 4.0 / 9.0, 8.0 / 9.0, 1.0, 1.0];
    for (sh, q) in scores.iter().zip(expected) {
        assert!((sh.q - q).abs() < 1E-12, "{} != {}", sh.q, q);
    }
    let p = [0.25, 0.25, 1.0 / 3.0, 0.5, 2.0 / 3.0, 1.0, 1.0];
    for (sh, p) in scores.iter().zip(p) {
        assert!((sh.p - p).abs() < 1E-12, "{} != {}", sh.p, p);
    }
}

#[quickcheck]
fn partition_keeps_spectra_together(records: Vec<(u8, u8, bool)>, folds: u8, seed: u64) {
    let mut data = single_feature(&records);
    let mut scores = Scores::new(false);
    scores.fill(&mut data).unwrap();

    let k = 2 + folds as usize % 4;
    let mut scans = records.iter().map(|r| r.1).collect::<Vec<_>>();
    scans.push(0);
    scans.sort_unstable();
    scans.dedup();

    let folds = match (CrossValidationPartitioner { folds: k, seed }).partition(&scores) {
        Ok(folds) => folds,
        Err(Error::EmptyFold(_)) => {
            assert!(scans.len() < k);
            return;
        }
        Err(e) => panic!("{}", e),
    };

    assert_eq!(
        folds.test.iter().map(|f| f.len()).sum::<usize>(),
        scores.len()
    );
    for scan in scans {
        let scan = scan as u32;
        let total = scores.iter().filter(|sh| sh.scan == scan).count();
        let homes = folds
            .test
            .iter()
            .map(|f| f.iter().filter(|sh| sh.scan == scan).count())
            .collect::<Vec<_>>();
        assert_eq!(homes.iter().filter(|&&n| n > 0).count(), 1);
        assert_eq!(homes.iter().sum::<usize>(), total);
        for (test, train) in homes.iter().zip(&folds.train) {
            let n = train.iter().filter(|sh| sh.scan == scan).count();
            assert_eq!(n, total - test);
        }
    }
    for (test, train) in folds.test.iter().zip(&folds.train) {
        assert_eq!(test.len() + train.len(), scores.len());
        assert_eq!(test.pos_size() + train.pos_size(), scores.pos_size());
    }
}

#[quickcheck]
fn pi0_is_a_proportion(p: Vec<u16>) {
    let mut p = p
        .into_iter()
        .map(|x| (x as f64 + 1.0) / 65536.0)
        .collect::<Vec<_>>();
    p.sort_by(|a, b| a.total_cmp(b));
    let estimator = Pi0Estimator {
        bootstraps: 20,
        ..Default::default()
    };
    match estimator.estimate(&p) {
        Ok(pi0) => assert!(pi0 > 0.0 && pi0 <= 1.0, "{}", pi0),
        Err(Error::Pi0Separation) => assert!(p.iter().all(|&p| p <= 0.5)),
        Err(e) => panic!("{}", e),
    }
}

/// Approximately standard normal
fn normal(rng: &mut ChaCha8Rng) -> f64 {
    (0..12).map(|_| rng.gen::<f64>()).sum::<f64>() - 6.0
}

/// Two candidate peptides per spectrum, one target and one decoy. Correct
/// targets are shifted up on both informative features; every peptide is seen
/// in two spectra.
fn search_results(spectra: u32, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut data = Dataset::new(vec!["score".into(), "delta".into(), "noise".into()]);
    let mut id = 0;
    for scan in 0..spectra {
        let correct = rng.gen_bool(0.5);
        for label in [TARGET, DECOY] {
            let shift = if label == TARGET && correct { 1.0 } else { 0.0 };
            let features = [
                2.5 * shift + normal(&mut rng),
                1.5 * shift + normal(&mut rng),
                normal(&mut rng),
            ];
            let peptide = match label {
                TARGET => format!("K.TARGET{}.R", scan / 2),
                _ => format!("R.DECOY{}.K", scan / 2),
            };
            data.push(psm(id, label, scan, &peptide), &features).unwrap();
            id += 1;
        }
    }
    data
}

#[test]
fn full_pipeline() {
    let mut data = search_results(2000, 5);
    let settings = Settings {
        iterations: 4,
        ..Default::default()
    };
    let model = Trainer::new(settings, &Lda).train(&mut data).unwrap();
    let mut psms = model.scores;

    assert_eq!(psms.len(), 4000);
    assert!(psms.pi0() > 0.3 && psms.pi0() < 0.7, "{}", psms.pi0());
    let accepted = psms.q_values_below_level(settings.test_fdr);
    assert!(accepted > 300, "{}", accepted);
    assert!(accepted <= 1200);
    for sh in &psms {
        assert!((0.0..=1.0).contains(&sh.pep));
    }

    // Let targets and decoys compete for each spectrum
    let pi0 = Pi0Estimator::from(settings);
    psms.weed_out_redundant_tdc(&mut data, &pi0).unwrap();
    assert_eq!(psms.len(), 2000);
    assert!(psms.pos_size() > psms.neg_size());
    assert_eq!(data.pool().allocated(), 2000);

    // Collapse to one PSM per peptide
    let mut peptides = psms.clone();
    peptides.weed_out_redundant(&data, &pi0).unwrap();
    peptides.calc_q(settings.test_fdr);
    assert!(peptides.len() <= 2000);
    assert!(peptides.len() >= 500);
    let represented = peptides
        .iter()
        .map(|sh| peptides.get_psms(sh.psm).len())
        .sum::<usize>();
    assert_eq!(represented, psms.len());
    for sh in &peptides {
        assert!(peptides.get_psms(sh.psm).contains(&sh.psm));
    }
}

#[test]
fn merged_counts_add_up() {
    let mut data = search_results(900, 9);
    let settings = Settings {
        use_pi0: false,
        iterations: 1,
        ..Default::default()
    };
    let model = Trainer::new(settings, &Lda).train(&mut data).unwrap();
    assert_eq!(model.scores.pos_size(), 900);
    assert_eq!(model.scores.neg_size(), 900);
    assert_eq!(model.scores.pi0(), 1.0);
}
