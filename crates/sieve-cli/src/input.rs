use anyhow::{ensure, Context};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use sieve_core::settings::{PepModel, Settings};
use std::path::PathBuf;

#[derive(Serialize)]
/// Actual run parameters - may include overrides or default values not set by user
pub struct Search {
    pub version: String,
    pub settings: Settings,
    pub pin_path: String,
    pub peptide_level: bool,
    pub competition: bool,
    pub report_decoys: bool,
    pub output_paths: Vec<String>,

    #[serde(skip_serializing)]
    pub output_directory: PathBuf,
}

#[derive(Deserialize, Default)]
/// Input run parameters deserialized from JSON file
pub struct Input {
    pin_path: Option<String>,
    output_directory: Option<String>,
    use_pi0: Option<bool>,
    train_fdr: Option<f64>,
    test_fdr: Option<f64>,
    folds: Option<usize>,
    iterations: Option<usize>,
    seed: Option<u64>,
    cpos: Option<f64>,
    cneg: Option<f64>,
    pi0: Option<Pi0Options>,
    pep: Option<PepOptions>,
    peptide_level: Option<bool>,
    competition: Option<bool>,
    report_decoys: Option<bool>,
}

#[derive(Serialize, Deserialize, Default, Debug)]
pub struct Pi0Options {
    bootstraps: Option<usize>,
    lambdas: Option<usize>,
    max_lambda: Option<f64>,
    max_bootstrap_size: Option<usize>,
}

#[derive(Serialize, Deserialize, Default, Debug)]
pub struct PepOptions {
    model: Option<PepModel>,
    bins: Option<usize>,
}

impl Input {
    pub fn from_arguments(matches: ArgMatches) -> anyhow::Result<Self> {
        let mut input = match matches.get_one::<String>("parameters") {
            Some(path) => Input::load(path)
                .with_context(|| format!("Failed to read parameters from `{path}`"))?,
            None => Input::default(),
        };

        // Handle JSON configuration overrides
        if let Some(pin_path) = matches.get_one::<String>("pin_path") {
            log::trace!("overriding `pin_path` parameter.");
            input.pin_path = Some(pin_path.into());
        }
        if let Some(output_directory) = matches.get_one::<String>("output_directory") {
            log::trace!("overriding `output_directory` parameter.");
            input.output_directory = Some(output_directory.into());
        }
        if let Some(seed) = matches.get_one::<u64>("seed").copied() {
            log::trace!("overriding `seed` parameter.");
            input.seed = Some(seed);
        }
        if matches.get_flag("peptide-level") {
            input.peptide_level = Some(true);
        }
        if matches.get_flag("no-pi0") {
            input.use_pi0 = Some(false);
        }
        if matches.get_flag("competition") {
            input.competition = Some(true);
        }
        if matches.get_flag("report-decoys") {
            input.report_decoys = Some(true);
        }

        ensure!(
            input.pin_path.is_some(),
            "`pin_path` must be set. For more information try '--help'"
        );

        Ok(input)
    }

    pub fn load<S: AsRef<str>>(path: S) -> anyhow::Result<Self> {
        sieve_core::read_json(path.as_ref()).map_err(anyhow::Error::from)
    }

    fn settings(&self) -> Settings {
        let default = Settings::default();
        let pi0 = self.pi0.as_ref();
        let pep = self.pep.as_ref();
        Settings {
            use_pi0: self.use_pi0.unwrap_or(default.use_pi0),
            train_fdr: self.train_fdr.unwrap_or(default.train_fdr),
            test_fdr: self.test_fdr.unwrap_or(default.test_fdr),
            folds: self.folds.unwrap_or(default.folds),
            iterations: self.iterations.unwrap_or(default.iterations),
            seed: self.seed.unwrap_or(default.seed),
            pi0_bootstraps: pi0
                .and_then(|p| p.bootstraps)
                .unwrap_or(default.pi0_bootstraps),
            pi0_lambdas: pi0.and_then(|p| p.lambdas).unwrap_or(default.pi0_lambdas),
            pi0_max_lambda: pi0
                .and_then(|p| p.max_lambda)
                .unwrap_or(default.pi0_max_lambda),
            max_bootstrap_size: pi0
                .and_then(|p| p.max_bootstrap_size)
                .unwrap_or(default.max_bootstrap_size),
            pep_model: pep.and_then(|p| p.model).unwrap_or(default.pep_model),
            pep_bins: pep.and_then(|p| p.bins).unwrap_or(default.pep_bins),
            cpos: self.cpos.unwrap_or(default.cpos),
            cneg: self.cneg.unwrap_or(default.cneg),
        }
    }

    pub fn build(self) -> anyhow::Result<Search> {
        let settings = self.settings();

        ensure!(
            settings.train_fdr > 0.0 && settings.train_fdr < 1.0,
            "`train_fdr` must be between 0 and 1, got {}",
            settings.train_fdr
        );
        ensure!(
            settings.test_fdr > 0.0 && settings.test_fdr < 1.0,
            "`test_fdr` must be between 0 and 1, got {}",
            settings.test_fdr
        );
        ensure!(
            settings.folds >= 2,
            "`folds` must be at least 2, got {}",
            settings.folds
        );
        ensure!(
            settings.pi0_max_lambda > 0.0 && settings.pi0_max_lambda < 1.0,
            "`pi0.max_lambda` must be between 0 and 1, got {}",
            settings.pi0_max_lambda
        );
        ensure!(
            settings.pi0_lambdas > 0 && settings.pep_bins > 0,
            "`pi0.lambdas` and `pep.bins` must be positive"
        );
        if settings.train_fdr > settings.test_fdr {
            log::warn!(
                "training FDR ({}) is higher than reporting FDR ({}), is this correct?",
                settings.train_fdr,
                settings.test_fdr
            );
        }
        if settings.cpos <= 0.0 || settings.cneg <= 0.0 {
            log::warn!("non-positive misclassification costs will disable training examples");
        }

        let pin_path = self.pin_path.context("`pin_path` must be provided!")?;

        let output_directory = match self.output_directory {
            Some(path) => {
                let path = PathBuf::from(path);
                std::fs::create_dir_all(&path).with_context(|| {
                    format!("Failed to create output directory `{}`", path.display())
                })?;
                path
            }
            None => std::env::current_dir()?,
        };

        Ok(Search {
            version: clap::crate_version!().into(),
            settings,
            pin_path,
            peptide_level: self.peptide_level.unwrap_or(false),
            competition: self.competition.unwrap_or(false),
            report_decoys: self.report_decoys.unwrap_or(false),
            output_paths: Vec::new(),
            output_directory,
        })
    }
}
