use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PepModel {
    /// Logistic regression on a cross-validated smoothing spline
    Spline,
    /// Binned kernel density estimates of the target & decoy distributions
    Kde,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
/// Parameters shared by the scoring, estimation and training passes
pub struct Settings {
    /// Scale estimated false positives by the fraction of null targets
    pub use_pi0: bool,
    /// FDR threshold used to select positive training examples
    pub train_fdr: f64,
    /// FDR threshold used for reporting, and as the normalization reference
    pub test_fdr: f64,
    /// Number of cross-validation folds
    pub folds: usize,
    /// Number of training iterations per fold
    pub iterations: usize,
    /// Seed for fold assignment and pi0 bootstrapping
    pub seed: u64,
    pub pi0_bootstraps: usize,
    pub pi0_lambdas: usize,
    pub pi0_max_lambda: f64,
    /// Maximum number of p-values drawn per bootstrap replicate
    pub max_bootstrap_size: usize,
    pub pep_model: PepModel,
    /// Number of score bins used to fit the PEP model
    pub pep_bins: usize,
    /// Misclassification cost for positive (target) training examples
    pub cpos: f64,
    /// Misclassification cost for negative (decoy) training examples
    pub cneg: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_pi0: true,
            train_fdr: 0.01,
            test_fdr: 0.01,
            folds: 3,
            iterations: 10,
            seed: 1,
            pi0_bootstraps: 100,
            pi0_lambdas: 100,
            pi0_max_lambda: 0.5,
            max_bootstrap_size: 1000,
            pep_model: PepModel::Spline,
            pep_bins: 500,
            cpos: 1.0,
            cneg: 1.0,
        }
    }
}
