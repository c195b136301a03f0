pub mod dataset;
pub mod ml;
pub mod pool;
pub mod psm;
pub mod scores;
pub mod settings;
pub mod train;
pub mod xval;

#[derive(Debug)]
pub enum Error {
    /// No target PSMs were provided
    NoTargets,
    /// No decoy PSMs were provided
    NoDecoys,
    /// Score normalization could not find a reference score above the median decoy
    Separation,
    /// No lambda value yields a positive pi0 estimate
    Pi0Separation,
    /// Weight vector does not have `num_features + 1` entries
    WeightLength { expected: usize, found: usize },
    /// Feature row does not match the width of the feature pool
    FeatureWidth { expected: usize, found: usize },
    /// A cross-validation fold received no PSMs
    EmptyFold(usize),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoTargets => write!(f, "no target PSMs were provided"),
            Self::NoDecoys => write!(f, "no decoy PSMs were provided"),
            Self::Separation => write!(
                f,
                "the input data has too good separation between target and decoy PSMs"
            ),
            Self::Pi0Separation => write!(
                f,
                "too good separation between target and decoy PSMs: impossible to estimate pi0"
            ),
            Self::WeightLength { expected, found } => write!(
                f,
                "weight vector has {} entries, expected {} (features + bias)",
                found, expected
            ),
            Self::FeatureWidth { expected, found } => write!(
                f,
                "feature row has {} values, expected {}",
                found, expected
            ),
            Self::EmptyFold(fold) => write!(f, "cross-validation fold {} contains no PSMs", fold),
            Self::Io(e) => e.fmt(f),
            Self::Json(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

pub fn read_json<P, T>(path: P) -> Result<T, Error>
where
    P: AsRef<std::path::Path>,
    T: for<'de> serde::Deserialize<'de>,
{
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(Error::Json)
}
