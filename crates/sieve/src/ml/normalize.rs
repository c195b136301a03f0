use crate::scores::ScoreHolder;
use crate::Error;

/// Rescale scores in place so that the last PSM with `q < fdr` scores 0 and
/// the median decoy scores -1.
///
/// # Invariants
/// * `scores` must be sorted in descending order, with q-values assigned
pub fn normalize(scores: &mut [ScoreHolder], total_decoys: usize, fdr: f64) -> Result<(), Error> {
    let median_index = total_decoys / 2;
    let mut q1 = match scores.first() {
        Some(sh) => sh.score,
        None => return Err(Error::Separation),
    };
    let mut median = None;
    let mut decoys = 0;

    for sh in scores.iter() {
        if sh.q < fdr {
            q1 = sh.score;
        }
        if sh.is_decoy() {
            decoys += 1;
            if decoys == median_index {
                median = Some(sh.score);
                break;
            }
        }
    }

    let median = match median {
        Some(median) if q1 > median => median,
        _ => return Err(Error::Separation),
    };

    let diff = q1 - median;
    for sh in scores.iter_mut() {
        sh.score = (sh.score - q1) / diff;
    }
    log::trace!("- normalized scores: q1 = {:.4}, median decoy = {:.4}", q1, median);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::psm::{PsmIx, DECOY, TARGET};

    fn holder(score: f64, q: f64, label: i32) -> ScoreHolder {
        ScoreHolder {
            psm: PsmIx(0),
            label,
            scan: 0,
            expmass: 0.0,
            score,
            q,
            pep: 0.0,
            p: 0.0,
        }
    }

    #[test]
    fn reference_maps_to_zero() {
        let mut scores = vec![
            holder(10.0, 0.0, TARGET),
            holder(8.0, 0.0, TARGET),
            holder(6.0, 0.5, DECOY),
            holder(5.0, 0.5, TARGET),
            holder(4.0, 0.6, DECOY),
            holder(2.0, 0.6, DECOY),
            holder(1.0, 0.6, DECOY),
        ];
        normalize(&mut scores, 4, 0.01).unwrap();
        // q1 = 8, median decoy (2nd) = 4
        assert_eq!(scores[1].score, 0.0);
        assert_eq!(scores[4].score, -1.0);
        assert_eq!(scores[0].score, 0.5);
        assert_eq!(scores[6].score, -1.75);
    }

    #[test]
    fn too_good_separation() {
        // Decoys on top: the reference score never rises above the median decoy
        let mut scores = vec![
            holder(1.0, 0.5, DECOY),
            holder(0.5, 0.5, DECOY),
            holder(0.0, 0.5, TARGET),
        ];
        assert!(matches!(
            normalize(&mut scores, 2, 0.01),
            Err(Error::Separation)
        ));

        // A single decoy has no median
        let mut scores = vec![holder(1.0, 0.0, TARGET), holder(0.5, 0.5, DECOY)];
        assert!(matches!(
            normalize(&mut scores, 1, 0.01),
            Err(Error::Separation)
        ));
    }
}
