use super::input::Search;
use super::pin::read_pin_path;
use anyhow::Context;
use log::info;
use sieve_core::dataset::Dataset;
use sieve_core::ml::linear_discriminant::Lda;
use sieve_core::ml::pep::PepEstimator;
use sieve_core::ml::pi0::Pi0Estimator;
use sieve_core::train::Trainer;
use std::path::PathBuf;
use std::time::Instant;

pub struct Runner {
    pub parameters: Search,
    data: Dataset,
    start: Instant,
}

impl Runner {
    pub fn new(parameters: Search) -> anyhow::Result<Self> {
        let start = Instant::now();
        let data = read_pin_path(&parameters.pin_path)?;
        let (targets, decoys) = data.label_sizes();
        info!(
            "read {} PSMs ({} targets, {} decoys) with {} features in {:#?}",
            data.len(),
            targets,
            decoys,
            data.feature_names().len(),
            start.elapsed()
        );
        Ok(Self {
            parameters,
            data,
            start,
        })
    }

    // Create a path for `file_name` in the specified output directory
    pub(crate) fn make_path<S: AsRef<str>>(&self, file_name: S) -> PathBuf {
        self.parameters.output_directory.join(file_name.as_ref())
    }

    pub fn run(mut self) -> anyhow::Result<Search> {
        let settings = self.parameters.settings;
        let fdr = settings.test_fdr;
        let pi0 = Pi0Estimator::from(settings);
        let pep = PepEstimator::from(settings);

        let model = Trainer::new(settings, &Lda)
            .train(&mut self.data)
            .context("Failed to rescore PSMs")?;
        let weights = model.weights;
        let mut psms = model.scores;

        if self.parameters.competition {
            psms.weed_out_redundant_tdc(&mut self.data, &pi0)
                .context("Failed to perform target-decoy competition")?;
            psms.calc_q(fdr);
            psms.calc_pep(&pep);
        }
        let q_spectrum = psms.q_values_below_level(fdr);

        let peptides = match self.parameters.peptide_level {
            true => {
                let mut peptides = psms.clone();
                peptides
                    .weed_out_redundant(&self.data, &pi0)
                    .context("Failed to collapse PSMs into peptides")?;
                peptides.calc_q(fdr);
                peptides.calc_pep(&pep);
                Some(peptides)
            }
            false => None,
        };

        log::info!(
            "discovered {} target peptide-spectrum matches at {}% FDR",
            q_spectrum,
            fdr * 100.0
        );
        if let Some(peptides) = &peptides {
            log::info!(
                "discovered {} target peptides at {}% FDR",
                peptides.q_values_below_level(fdr),
                fdr * 100.0
            );
        }
        log::trace!("writing outputs");

        let path = self.write_psms(&psms, &self.data)?;
        self.parameters.output_paths.push(path);
        if let Some(peptides) = &peptides {
            let path = self.write_peptides(peptides, &self.data)?;
            self.parameters.output_paths.push(path);
        }
        let path = self.write_weights(&weights, &self.data)?;
        self.parameters.output_paths.push(path);

        let path = self.make_path("results.json");
        self.parameters
            .output_paths
            .push(path.display().to_string());
        println!("{}", serde_json::to_string_pretty(&self.parameters)?);

        let bytes = serde_json::to_vec_pretty(&self.parameters)?;
        std::fs::write(&path, bytes)?;

        let run_time = (Instant::now() - self.start).as_secs();
        info!("finished in {}s", run_time);

        Ok(self.parameters)
    }
}
