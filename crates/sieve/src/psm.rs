use crate::pool::Slot;
use serde::Serialize;

/// Target label
pub const TARGET: i32 = 1;
/// Decoy label
pub const DECOY: i32 = -1;

/// Index of a [`Psm`] inside a [`crate::dataset::Dataset`]
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PsmIx(pub u32);

#[derive(Clone, Debug, Serialize)]
/// Identity of a peptide-spectrum match, as reported by the search engine
pub struct Psm {
    /// Identifier, unique within a run
    pub id: String,
    /// Target/Decoy label, -1 is decoy, 1 is target
    pub label: i32,
    /// Spectrum scan number
    pub scan: u32,
    /// Experimental (observed) mass
    pub expmass: f64,
    /// Calculated (theoretical) mass
    pub calcmass: f64,
    /// Precursor charge, 0 if unknown
    pub charge: u8,
    /// Peptide, possibly with flanking residues: `K.PEPTIDE.R`
    pub peptide: String,
    pub proteins: Vec<String>,
    /// Feature row, `None` once the row has been returned to the pool
    #[serde(skip_serializing)]
    pub features: Option<Slot>,
}

impl Psm {
    pub fn is_target(&self) -> bool {
        self.label == TARGET
    }

    pub fn is_decoy(&self) -> bool {
        self.label == DECOY
    }

    /// Peptide sequence with flanking residues removed
    pub fn sequence(&self) -> &str {
        let bytes = self.peptide.as_bytes();
        let n = bytes.len();
        if n >= 5 && bytes[1] == b'.' && bytes[n - 2] == b'.' {
            &self.peptide[2..n - 2]
        } else {
            &self.peptide
        }
    }

    /// Flanking residues, `XX` if the peptide was reported without them
    pub fn flanks(&self) -> (char, char) {
        let bytes = self.peptide.as_bytes();
        let n = bytes.len();
        if n >= 5 && bytes[1] == b'.' && bytes[n - 2] == b'.' {
            (bytes[0] as char, bytes[n - 1] as char)
        } else {
            ('X', 'X')
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn psm(peptide: &str) -> Psm {
        Psm {
            id: "a".into(),
            label: TARGET,
            scan: 1,
            expmass: 0.0,
            calcmass: 0.0,
            charge: 2,
            peptide: peptide.into(),
            proteins: vec![],
            features: None,
        }
    }

    #[test]
    fn strip_flanks() {
        assert_eq!(psm("K.PEPTIDE.R").sequence(), "PEPTIDE");
        assert_eq!(psm("K.PEPTIDE.R").flanks(), ('K', 'R'));
        assert_eq!(psm("-.M[15.99]EK.-").sequence(), "M[15.99]EK");
        assert_eq!(psm("PEPTIDE").sequence(), "PEPTIDE");
        assert_eq!(psm("PEPTIDE").flanks(), ('X', 'X'));
        assert_eq!(psm("K.A.R").sequence(), "A");
    }
}
