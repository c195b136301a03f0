use rayon::prelude::*;
use sieve_core::dataset::Dataset;
use sieve_core::scores::{ScoreHolder, Scores};

use crate::runner::Runner;

const PSM_HEADERS: [&str; 13] = [
    "psm_id",
    "label",
    "scannr",
    "charge",
    "expmass",
    "calcmass",
    "score",
    "q_value",
    "posterior_error",
    "p_value",
    "peptide",
    "proteins",
    "flanking_aa",
];

impl Runner {
    pub fn serialize_psm(&self, sh: &ScoreHolder, data: &Dataset) -> csv::ByteRecord {
        let psm = &data[sh.psm];
        let mut record = csv::ByteRecord::new();
        record.push_field(psm.id.as_bytes());
        record.push_field(itoa::Buffer::new().format(sh.label).as_bytes());
        record.push_field(itoa::Buffer::new().format(sh.scan).as_bytes());
        record.push_field(itoa::Buffer::new().format(psm.charge).as_bytes());
        record.push_field(ryu::Buffer::new().format(psm.expmass).as_bytes());
        record.push_field(ryu::Buffer::new().format(psm.calcmass).as_bytes());
        record.push_field(ryu::Buffer::new().format(sh.score).as_bytes());
        record.push_field(ryu::Buffer::new().format(sh.q).as_bytes());
        record.push_field(ryu::Buffer::new().format(sh.pep).as_bytes());
        record.push_field(ryu::Buffer::new().format(sh.p).as_bytes());
        record.push_field(psm.sequence().as_bytes());
        record.push_field(psm.proteins.join(";").as_bytes());
        let (n_term, c_term) = psm.flanks();
        record.push_field(format!("{}{}", n_term, c_term).as_bytes());
        record
    }

    fn serialize_scores<F>(&self, scores: &Scores, serialize: F) -> Vec<csv::ByteRecord>
    where
        F: Fn(&ScoreHolder) -> csv::ByteRecord + Send + Sync,
    {
        let report_decoys = self.parameters.report_decoys;
        scores
            .holders()
            .par_iter()
            .filter(|sh| report_decoys || sh.is_target())
            .map(serialize)
            .collect()
    }

    fn write_table(
        &self,
        file_name: &str,
        headers: csv::ByteRecord,
        records: Vec<csv::ByteRecord>,
    ) -> anyhow::Result<String> {
        let path = self.make_path(file_name);

        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(vec![]);

        wtr.write_byte_record(&headers)?;
        for record in records {
            wtr.write_byte_record(&record)?;
        }

        wtr.flush()?;
        let bytes = wtr.into_inner()?;
        std::fs::write(&path, bytes)?;
        Ok(path.display().to_string())
    }

    /// One row per PSM, best first
    pub fn write_psms(&self, scores: &Scores, data: &Dataset) -> anyhow::Result<String> {
        let records = self.serialize_scores(scores, |sh| self.serialize_psm(sh, data));
        self.write_table(
            "results.sieve.psms.tsv",
            csv::ByteRecord::from(PSM_HEADERS.to_vec()),
            records,
        )
    }

    /// One row per peptide, with the identifiers of every PSM it represents
    pub fn write_peptides(&self, peptides: &Scores, data: &Dataset) -> anyhow::Result<String> {
        let records = self.serialize_scores(peptides, |sh| {
            let mut record = self.serialize_psm(sh, data);
            let ids = peptides
                .get_psms(sh.psm)
                .iter()
                .map(|ix| data[*ix].id.as_str())
                .collect::<Vec<_>>()
                .join(";");
            record.push_field(ids.as_bytes());
            record
        });

        let mut headers = PSM_HEADERS.to_vec();
        headers.push("psm_ids");
        self.write_table(
            "results.sieve.peptides.tsv",
            csv::ByteRecord::from(headers),
            records,
        )
    }

    /// Feature weights learnt by every cross-validation fold, bias last
    pub fn write_weights(&self, weights: &[Vec<f64>], data: &Dataset) -> anyhow::Result<String> {
        let mut headers = vec!["fold"];
        headers.extend(data.feature_names().iter().map(|s| s.as_str()));
        headers.push("bias");

        let records = weights
            .iter()
            .enumerate()
            .map(|(fold, w)| {
                let mut record = csv::ByteRecord::new();
                record.push_field(itoa::Buffer::new().format(fold).as_bytes());
                for x in w {
                    record.push_field(ryu::Buffer::new().format(*x).as_bytes());
                }
                record
            })
            .collect();

        self.write_table(
            "weights.sieve.tsv",
            csv::ByteRecord::from(headers),
            records,
        )
    }
}
