use chrono::Local;
use clap::{Arg, ArgAction, ArgMatches, Command};
use cordex_catalog::{
    chunks::ChunkSizes,
    config::Config,
    naming::TimeRange,
    plan::{plan_variables, PlanOptions},
    ClimateVariable, ConfigError,
};
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::io::Write;
use std::path::PathBuf;

fn main() {
    let matches = build_cli().get_matches();

    let Some((name, sub_matches)) = matches.subcommand() else {
        eprintln!("Please specify a subcommand. Use --help for more information.");
        std::process::exit(1);
    };

    let config = match Config::from_matches(sub_matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    init_logging(config.log_level.as_deref());

    let result = match name {
        "variables" => run_variables(&config),
        "info" => run_info(&config, sub_matches),
        "files" => run_files(&config, sub_matches),
        "output-name" => run_output_name(&config, sub_matches),
        "metadata" => run_metadata(&config),
        "plan" => run_plan(&config, sub_matches),
        _ => Err(ConfigError::InvalidArgument(format!(
            "Unknown subcommand: {}",
            name
        ))),
    };

    if let Err(e) = result {
        eprintln!("{} error: {}", name, e);
        std::process::exit(1);
    }
}

/// Filter directives for env_logger: `--log-level` wins over `RUST_LOG`;
/// the default is warnings only.
fn log_filters(level: Option<&str>, env: Option<String>) -> String {
    level
        .map(str::to_string)
        .or(env)
        .unwrap_or_else(|| "warn".to_string())
}

/// Log to stderr so stdout stays machine-readable for job scripts.
fn init_logging(level: Option<&str>) {
    let filters = log_filters(level, std::env::var("RUST_LOG").ok());

    Builder::new()
        .filter_level(LevelFilter::Warn)
        .parse_filters(&filters)
        .target(Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {:5} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

fn variable_arg() -> Arg {
    Arg::new("variable")
        .value_name("VARIABLE")
        .help("Climate variable (humidity, precipitation, pressure, radiation, wind-speed, temperature)")
        .value_parser(|s: &str| s.parse::<ClimateVariable>())
        .required(true)
}

fn get_variable(matches: &ArgMatches) -> Result<ClimateVariable, ConfigError> {
    matches
        .get_one::<ClimateVariable>("variable")
        .copied()
        .ok_or_else(|| ConfigError::InvalidArgument("missing variable".to_string()))
}

fn run_variables(config: &Config) -> Result<(), ConfigError> {
    let catalog = config.catalog()?;
    for variable in ClimateVariable::ALL {
        match catalog.variable_info(variable) {
            Ok(info) => println!("{}\t{}\t{}", variable, info.name, info.units),
            Err(e) if e.is_unsupported() => log::debug!("{}", e),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn run_info(config: &Config, matches: &ArgMatches) -> Result<(), ConfigError> {
    let catalog = config.catalog()?;
    let info = catalog.variable_info(get_variable(matches)?)?;
    println!("name={}", info.name);
    println!("units={}", info.units);
    Ok(())
}

fn run_files(config: &Config, matches: &ArgMatches) -> Result<(), ConfigError> {
    let catalog = config.catalog()?;
    let variable = get_variable(matches)?;
    let expand = matches.get_flag("expand");

    let mut count = 0;
    for path in catalog.input_files(variable, expand)? {
        println!("{}", path?.display());
        count += 1;
    }
    log::info!(
        "{}: {} input path(s) for {}",
        catalog.name(),
        count,
        variable
    );
    Ok(())
}

fn run_output_name(config: &Config, matches: &ArgMatches) -> Result<(), ConfigError> {
    let catalog = config.catalog()?;
    let variable = get_variable(matches)?;

    let name = match (
        matches.get_one::<String>("start"),
        matches.get_one::<String>("end"),
    ) {
        (Some(start), Some(end)) => {
            let range = TimeRange::parse(start, end).map_err(ConfigError::InvalidArgument)?;
            catalog.output_file_name_for_range(variable, &range)?
        }
        _ => catalog.output_file_name(variable)?,
    };
    println!("{}", name);
    Ok(())
}

fn run_metadata(config: &Config) -> Result<(), ConfigError> {
    let catalog = config.catalog()?;
    let mut entries: Vec<(String, String)> = catalog.metadata().into_iter().collect();
    entries.sort();
    for (key, value) in entries {
        println!("{}={}", key, value);
    }
    Ok(())
}

fn run_plan(config: &Config, matches: &ArgMatches) -> Result<(), ConfigError> {
    let catalog = config.catalog()?;
    let variables: Vec<ClimateVariable> = match matches.get_many::<ClimateVariable>("variables") {
        Some(values) => values.copied().collect(),
        None => ClimateVariable::ALL.to_vec(),
    };
    let chunks = match matches.get_one::<String>("chunk-sizes") {
        Some(spec) => ChunkSizes::parse(spec)?,
        None => ChunkSizes::default(),
    };
    let output_dir = matches
        .get_one::<String>("output-dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let threads = if matches.get_flag("serial") {
        Some(1)
    } else {
        matches.get_one::<u64>("threads").map(|n| *n as usize)
    };

    let options = PlanOptions {
        expand: matches.get_flag("expand"),
        output_dir,
        chunks,
        threads,
        show_progress: matches.get_flag("show-progress"),
    };

    log::info!(
        "Planning {} variable(s) for {} using {} thread(s)",
        variables.len(),
        catalog.name(),
        options.threads.unwrap_or_else(rayon::current_num_threads)
    );
    if !options.chunks.is_empty() {
        log::info!("Chunk sizes: {}", options.chunks);
    }
    let plan = plan_variables(&catalog, &variables, &options)?;

    for job in &plan.jobs {
        println!("{}", job);
    }
    for variable in &plan.skipped {
        log::warn!("{} does not provide {}; skipped", catalog.name(), variable);
    }
    for (variable, e) in &plan.failed {
        log::error!("{}: {}", variable, e);
    }

    match plan.failed.into_iter().next() {
        Some((_, e)) => Err(e.into()),
        None => Ok(()),
    }
}

fn build_cli() -> Command {
    Command::new("cordex_catalog")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Resolve input files, output names and metadata for regional climate archives")
        .args(Config::args())
        .subcommand(Command::new("variables").about("List the variables the dataset provides"))
        .subcommand(
            Command::new("info")
                .about("Show the name and units of a variable")
                .arg(variable_arg()),
        )
        .subcommand(
            Command::new("files")
                .about("List the input files backing a variable")
                .arg(variable_arg())
                .arg(
                    Arg::new("expand")
                        .short('x')
                        .long("expand")
                        .help("Expand wildcards against the archive")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("output-name")
                .about("Print the canonical output file name of a variable")
                .arg(variable_arg())
                .arg(
                    Arg::new("start")
                        .short('s')
                        .long("start")
                        .value_name("DATE")
                        .help("Start of the time range (YYYY-MM-DD [HH:MM:SS])")
                        .requires("end"),
                )
                .arg(
                    Arg::new("end")
                        .short('e')
                        .long("end")
                        .value_name("DATE")
                        .help("End of the time range (YYYY-MM-DD [HH:MM:SS])")
                        .requires("start"),
                ),
        )
        .subcommand(Command::new("metadata").about("Print dataset provenance as key=value lines"))
        .subcommand(
            Command::new("plan")
                .about("Resolve every variable into a tab-separated job line")
                .arg(
                    Arg::new("variables")
                        .short('l')
                        .long("variables")
                        .value_name("LIST")
                        .help("Comma-separated variables (default: all)")
                        .value_parser(|s: &str| s.parse::<ClimateVariable>())
                        .value_delimiter(',')
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("expand")
                        .short('x')
                        .long("expand")
                        .help("Expand wildcards against the archive")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("output-dir")
                        .short('o')
                        .long("output-dir")
                        .value_name("DIR")
                        .help("Directory for merged output files"),
                )
                .arg(
                    Arg::new("chunk-sizes")
                        .short('c')
                        .long("chunk-sizes")
                        .value_name("SPEC")
                        .help("Chunk sizes for rechunk jobs, e.g. lat/1,lon/1,time/365"),
                )
                .arg(
                    Arg::new("threads")
                        .short('j')
                        .long("threads")
                        .value_name("N")
                        .help("Number of worker threads (default: one per core)")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                )
                .arg(
                    Arg::new("serial")
                        .long("serial")
                        .help("Resolve variables one at a time on the main thread")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("threads"),
                )
                .arg(
                    Arg::new("show-progress")
                        .short('p')
                        .long("show-progress")
                        .help("Log progress and walltime at info level")
                        .action(ArgAction::SetTrue),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filters_precedence() {
        assert_eq!(log_filters(None, None), "warn");
        assert_eq!(log_filters(Some("debug"), Some("error".to_string())), "debug");
        assert_eq!(
            log_filters(None, Some("cordex_catalog=debug".to_string())),
            "cordex_catalog=debug"
        );
    }

    #[test]
    fn test_module_filters_are_understood() {
        let logger = Builder::new()
            .filter_level(LevelFilter::Warn)
            .parse_filters(&log_filters(None, Some("cordex_catalog=debug".to_string())))
            .build();
        assert_eq!(logger.filter(), LevelFilter::Debug);
    }

    #[test]
    fn test_plan_thread_options() {
        let matches = build_cli()
            .try_get_matches_from(["cordex_catalog", "plan", "--threads", "2", "-p"])
            .unwrap();
        let (_, plan) = matches.subcommand().unwrap();
        assert_eq!(plan.get_one::<u64>("threads"), Some(&2));
        assert!(plan.get_flag("show-progress"));

        assert!(build_cli()
            .try_get_matches_from(["cordex_catalog", "plan", "--threads", "0"])
            .is_err());
        assert!(build_cli()
            .try_get_matches_from(["cordex_catalog", "plan", "--serial", "--threads", "2"])
            .is_err());
    }
}
