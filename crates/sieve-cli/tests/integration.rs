use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sieve_cli::input::Input;
use sieve_cli::runner::Runner;
use std::io::Write;

/// Approximately standard normal
fn normal(rng: &mut ChaCha8Rng) -> f64 {
    (0..12).map(|_| rng.gen::<f64>()).sum::<f64>() - 6.0
}

fn write_pin(path: &std::path::Path, spectra: u32) -> anyhow::Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    writeln!(
        file,
        "SpecId\tLabel\tScanNr\tExpMass\tCalcMass\thyperscore\tdelta_best\tnoise\tPeptide\tProteins"
    )?;
    writeln!(file, "DefaultDirection\t-\t-\t-\t-\t1\t1\t0\t-\t-")?;
    for scan in 0..spectra {
        let correct = rng.gen_bool(0.5);
        for (label, peptide, protein) in [(1, "TARGET", "sp|P"), (-1, "DECOY", "rev_sp|P")] {
            let shift = if label == 1 && correct { 1.0 } else { 0.0 };
            writeln!(
                file,
                "run_{}_{}_1\t{}\t{}\t{:.4}\t{:.4}\t{:.5}\t{:.5}\t{:.5}\tK.{}{}.R\t{}{}",
                scan,
                2 + scan % 3,
                label,
                scan,
                1000.0 + scan as f64 * 0.5,
                1000.0 + scan as f64 * 0.5,
                2.5 * shift + normal(&mut rng),
                1.5 * shift + normal(&mut rng),
                normal(&mut rng),
                peptide,
                scan / 3,
                protein,
                scan % 50,
            )?;
        }
    }
    file.flush()?;
    Ok(())
}

fn read_tsv(path: &str) -> anyhow::Result<(csv::StringRecord, Vec<csv::StringRecord>)> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;
    let headers = rdr.headers()?.clone();
    let rows = rdr.records().collect::<Result<Vec<_>, _>>()?;
    Ok((headers, rows))
}

#[test]
fn integration() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let pin = dir.path().join("run.pin");
    write_pin(&pin, 1500)?;

    let output = dir.path().join("out");
    let parameters = serde_json::json!({
        "pin_path": pin.display().to_string(),
        "output_directory": output.display().to_string(),
        "iterations": 3,
        "peptide_level": true,
        "competition": true,
    });
    let json = dir.path().join("params.json");
    std::fs::write(&json, serde_json::to_vec_pretty(&parameters)?)?;

    let search = Input::load(json.display().to_string())?.build()?;
    let search = Runner::new(search)?.run()?;
    assert_eq!(search.output_paths.len(), 4);
    for path in &search.output_paths {
        assert!(std::path::Path::new(path).exists(), "{}", path);
    }

    let (headers, psms) = read_tsv(&search.output_paths[0])?;
    assert_eq!(&headers[0], "psm_id");
    assert_eq!(&headers[7], "q_value");
    assert!(!psms.is_empty());
    assert!(psms.len() <= 1500);
    let mut last_q = 0.0;
    for row in &psms {
        assert_eq!(&row[1], "1");
        let q = row[7].parse::<f64>()?;
        assert!(q >= last_q);
        last_q = q;
        assert!(row[3] == *"2" || row[3] == *"3" || row[3] == *"4");
        assert!(row[10].starts_with("TARGET"));
        assert_eq!(&row[12], "KR");
    }
    let accepted = psms
        .iter()
        .filter(|row| row[7].parse::<f64>().map_or(false, |q| q < 0.01))
        .count();
    assert!(accepted > 200, "{}", accepted);

    let (headers, peptides) = read_tsv(&search.output_paths[1])?;
    assert_eq!(&headers[13], "psm_ids");
    assert!(peptides.len() < psms.len());
    for row in &peptides {
        assert!(row[13].split(';').any(|id| id == &row[0]));
    }

    let (headers, weights) = read_tsv(&search.output_paths[2])?;
    assert_eq!(headers.len(), 5);
    assert_eq!(&headers[1], "hyperscore");
    assert_eq!(weights.len(), 3);

    let results: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&search.output_paths[3])?)?;
    assert_eq!(results["settings"]["iterations"], 3);
    assert_eq!(results["peptide_level"], true);
    Ok(())
}

#[test]
fn missing_pin() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let json = dir.path().join("params.json");
    let parameters = serde_json::json!({
        "pin_path": dir.path().join("missing.pin").display().to_string(),
        "output_directory": dir.path().display().to_string(),
    });
    std::fs::write(&json, serde_json::to_vec(&parameters)?)?;

    let search = Input::load(json.display().to_string())?.build()?;
    assert!(Runner::new(search).is_err());
    Ok(())
}
