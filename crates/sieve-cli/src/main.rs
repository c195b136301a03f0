use clap::{value_parser, Arg, Command, ValueHint};
use rayon::ThreadPoolBuilder;
use sieve_cli::input::Input;
use sieve_cli::runner::Runner;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::default()
        .filter_level(log::LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("SIEVE_LOG", "error,sieve=info"))
        .init();

    let matches = Command::new("sieve")
        .version(clap::crate_version!())
        .about("Semi-supervised rescoring and FDR control for peptide-spectrum matches")
        .arg(
            Arg::new("pin_path")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Path to a tab-delimited PIN file. Overrides the file listed in the \
                     configuration file.",
                )
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("parameters")
                .short('p')
                .long("parameters")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Path to configuration parameters (JSON file)")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("output_directory")
                .short('o')
                .long("output_directory")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Path where results will be written. Overrides the directory \
                     specified in the configuration file.",
                )
                .value_hint(ValueHint::DirPath),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(value_parser!(u64))
                .help("Seed for cross-validation fold assignment and pi0 bootstrapping")
                .value_hint(ValueHint::Other),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .value_parser(value_parser!(u16).range(1..))
                .help("Number of worker threads (default = # of CPUs)")
                .value_hint(ValueHint::Other),
        )
        .arg(
            Arg::new("peptide-level")
                .long("peptide-level")
                .action(clap::ArgAction::SetTrue)
                .help("Also report results collapsed to one PSM per peptide"),
        )
        .arg(
            Arg::new("no-pi0")
                .long("no-pi0")
                .action(clap::ArgAction::SetTrue)
                .help("Do not scale false discovery estimates by the null target fraction"),
        )
        .arg(
            Arg::new("competition")
                .long("competition")
                .action(clap::ArgAction::SetTrue)
                .help("Keep only the best-scoring PSM of every spectrum before reporting"),
        )
        .arg(
            Arg::new("report-decoys")
                .long("report-decoys")
                .action(clap::ArgAction::SetTrue)
                .help("Include decoy PSMs in the output tables"),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    let threads = matches
        .get_one::<u16>("threads")
        .copied()
        .map(usize::from)
        .unwrap_or_else(num_cpus::get);
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()?;

    let input = Input::from_arguments(matches)?;

    input.build().and_then(Runner::new)?.run()?;

    Ok(())
}
