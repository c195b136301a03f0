//! Reader for tab-delimited percolator input (PIN) files
//!
//! ```text
//! SpecId  Label  ScanNr  [ExpMass]  [CalcMass]  feature...  Peptide  Proteins...
//! ```
//!
//! An optional second row starting with `DefaultDirection` is skipped.

use anyhow::{bail, Context};
use regex::Regex;
use sieve_core::dataset::Dataset;
use sieve_core::psm::{Psm, DECOY, TARGET};
use std::io::Read;

/// Column layout, resolved from the header row
struct Columns {
    expmass: Option<usize>,
    calcmass: Option<usize>,
    features: std::ops::Range<usize>,
    peptide: usize,
}

impl Columns {
    fn from_header(header: &csv::StringRecord) -> anyhow::Result<(Self, Vec<String>)> {
        let names = header.iter().map(|s| s.trim()).collect::<Vec<_>>();
        let find = |name: &str| names.iter().position(|n| n.eq_ignore_ascii_case(name));

        if names.len() < 5 {
            bail!("PIN header has only {} columns", names.len());
        }
        if !names[1].eq_ignore_ascii_case("label") || !names[2].eq_ignore_ascii_case("scannr") {
            bail!("PIN header must start with `SpecId, Label, ScanNr`");
        }

        let expmass = find("expmass");
        let calcmass = find("calcmass");
        let peptide = find("peptide").context("PIN header has no `Peptide` column")?;

        let start = [expmass, calcmass]
            .into_iter()
            .flatten()
            .map(|ix| ix + 1)
            .fold(3, usize::max);
        if peptide <= start {
            bail!("PIN header has no feature columns");
        }

        let names = names[start..peptide]
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        Ok((
            Columns {
                expmass,
                calcmass,
                features: start..peptide,
                peptide,
            },
            names,
        ))
    }
}

fn parse_f64(field: &str, column: usize, line: u64) -> anyhow::Result<f64> {
    field
        .trim()
        .parse::<f64>()
        .with_context(|| {
            format!(
                "line {}, column {}: invalid number `{}`",
                line,
                column + 1,
                field
            )
        })
}

/// Read every PSM of a PIN file into a [`Dataset`]. Rows with a label other
/// than 1 or -1 are skipped with a warning.
pub fn read_pin<R: Read>(reader: R) -> anyhow::Result<Dataset> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let (columns, names) = Columns::from_header(rdr.headers()?)?;
    let mut data = Dataset::new(names);
    let charge_re = Regex::new(r"_(\d+)_\d+$").context("invalid charge pattern")?;

    let mut features = vec![0.0; columns.features.len()];
    let mut skipped = 0;
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        if record
            .get(0)
            .map_or(true, |id| id.eq_ignore_ascii_case("defaultdirection"))
        {
            continue;
        }
        if record.len() <= columns.peptide {
            bail!("line {}: expected at least {} columns", line, columns.peptide + 1);
        }

        let id = &record[0];
        let label = match record[1].trim().parse::<i32>() {
            Ok(label @ (TARGET | DECOY)) => label,
            _ => {
                log::warn!("line {}: PSM {} has label `{}`, ignoring it", line, id, &record[1]);
                skipped += 1;
                continue;
            }
        };
        let scan = record[2]
            .trim()
            .parse::<u32>()
            .with_context(|| format!("line {}: invalid scan number `{}`", line, &record[2]))?;

        for (value, column) in features.iter_mut().zip(columns.features.clone()) {
            *value = parse_f64(&record[column], column, line)?;
        }

        let charge = charge_re
            .captures(id)
            .and_then(|cap| cap.get(1))
            .and_then(|m| m.as_str().parse::<u8>().ok())
            .unwrap_or(0);

        let psm = Psm {
            id: id.to_string(),
            label,
            scan,
            expmass: match columns.expmass {
                Some(ix) => parse_f64(&record[ix], ix, line)?,
                None => 0.0,
            },
            calcmass: match columns.calcmass {
                Some(ix) => parse_f64(&record[ix], ix, line)?,
                None => 0.0,
            },
            charge,
            peptide: record[columns.peptide].trim().to_string(),
            proteins: record
                .iter()
                .skip(columns.peptide + 1)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect(),
            features: None,
        };
        data.push(psm, &features)?;
    }

    if skipped > 0 {
        log::warn!("skipped {} PSMs with invalid labels", skipped);
    }
    let (targets, decoys) = data.label_sizes();
    log::trace!(
        "- read {} targets and {} decoys with {} features",
        targets,
        decoys,
        data.feature_names().len()
    );
    Ok(data)
}

pub fn read_pin_path<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Dataset> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open PIN file `{}`", path.display()))?;
    read_pin(std::io::BufReader::new(file))
        .with_context(|| format!("Failed to parse PIN file `{}`", path.display()))
}
