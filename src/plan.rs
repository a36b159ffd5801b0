use rayon::prelude::*;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::catalog::DatasetCatalog;
use crate::chunks::ChunkSizes;
use crate::error::{CatalogError, ConfigError};
use crate::variable::{ClimateVariable, VariableInfo};

/// Options shared by every job in a plan
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Expand wildcards against the archive
    pub expand: bool,
    /// Directory the output files will be written to
    pub output_dir: PathBuf,
    /// Chunking passed on to rechunk jobs
    pub chunks: ChunkSizes,
    /// Worker threads; `None` uses the global rayon pool and `Some(1)`
    /// resolves the variables one after another on the calling thread
    pub threads: Option<usize>,
    /// Log progress and walltime at info level
    pub show_progress: bool,
}

/// Everything a batch job needs to merge one variable
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    pub variable: ClimateVariable,
    pub info: VariableInfo,
    pub inputs: Vec<PathBuf>,
    pub output_file: PathBuf,
    pub chunks: ChunkSizes,
}

impl fmt::Display for JobSpec {
    /// Tab-separated: variable, name, units, output file, chunks, inputs...
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.variable,
            self.info.name,
            self.info.units,
            self.output_file.display(),
            self.chunks
        )?;
        for input in &self.inputs {
            write!(f, "\t{}", input.display())?;
        }
        Ok(())
    }
}

/// Result of resolving a set of variables against one catalog
#[derive(Debug, Default)]
pub struct Plan {
    pub jobs: Vec<JobSpec>,
    /// Variables the dataset does not offer
    pub skipped: Vec<ClimateVariable>,
    /// Variables whose inputs could not be listed
    pub failed: Vec<(ClimateVariable, CatalogError)>,
}

impl Plan {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Outcome {
    Job(JobSpec),
    Skipped(ClimateVariable),
    Failed(ClimateVariable, CatalogError),
}

fn resolve(
    catalog: &DatasetCatalog,
    variable: ClimateVariable,
    options: &PlanOptions,
) -> Result<JobSpec, CatalogError> {
    let info = catalog.variable_info(variable)?;
    let output_file = options
        .output_dir
        .join(catalog.output_file_name(variable)?);
    let inputs = catalog
        .input_files(variable, options.expand)?
        .collect_paths()?;

    Ok(JobSpec {
        variable,
        info,
        inputs,
        output_file,
        chunks: options.chunks.clone(),
    })
}

/// Formats a duration as `H:MM:SS`
fn format_walltime(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Counts resolved variables and reports progress through `log`
pub struct ProgressMonitor {
    total: usize,
    completed: AtomicUsize,
    start_time: Instant,
    enabled: bool,
}

impl ProgressMonitor {
    pub fn new(total: usize, enabled: bool) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
            start_time: Instant::now(),
            enabled,
        }
    }

    /// Record one finished variable and return the number completed so far
    pub fn record(&self, variable: ClimateVariable) -> usize {
        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        if self.enabled && self.total > 0 {
            let elapsed = self.start_time.elapsed();
            let fraction = completed as f64 / self.total as f64;
            let remaining = elapsed.mul_f64(((1.0 - fraction) / fraction).max(0.0));
            log::info!(
                "Working: {:.2}% ({}/{}, {}); elapsed: {}; remaining: {}",
                fraction * 100.0,
                completed,
                self.total,
                variable,
                format_walltime(elapsed),
                format_walltime(remaining)
            );
        }
        completed
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn walltime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

fn resolve_outcome(
    catalog: &DatasetCatalog,
    variable: ClimateVariable,
    options: &PlanOptions,
    monitor: &ProgressMonitor,
) -> Outcome {
    let outcome = match resolve(catalog, variable, options) {
        Ok(job) => Outcome::Job(job),
        Err(e) if e.is_unsupported() => Outcome::Skipped(variable),
        Err(e) => Outcome::Failed(variable, e),
    };
    monitor.record(variable);
    outcome
}

/// Resolve each variable into a job description, in parallel unless
/// `options.threads` is `Some(1)`.
///
/// Unsupported variables are skipped rather than treated as failures, and
/// jobs keep the order of `variables`. Only building a sized thread pool
/// can fail.
pub fn plan_variables(
    catalog: &DatasetCatalog,
    variables: &[ClimateVariable],
    options: &PlanOptions,
) -> Result<Plan, ConfigError> {
    let monitor = ProgressMonitor::new(variables.len(), options.show_progress);
    let parallel = || -> Vec<Outcome> {
        variables
            .par_iter()
            .map(|variable| resolve_outcome(catalog, *variable, options, &monitor))
            .collect()
    };

    let outcomes: Vec<Outcome> = match options.threads {
        Some(1) => variables
            .iter()
            .map(|variable| resolve_outcome(catalog, *variable, options, &monitor))
            .collect(),
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?;
            pool.install(parallel)
        }
        None => parallel(),
    };

    if options.show_progress {
        log::info!(
            "Resolved {} variable(s) for {} in {}",
            monitor.completed(),
            catalog.name(),
            format_walltime(monitor.walltime())
        );
    }

    let mut plan = Plan::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Job(job) => plan.jobs.push(job),
            Outcome::Skipped(variable) => plan.skipped.push(variable),
            Outcome::Failed(variable, e) => plan.failed.push((variable, e)),
        }
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DatasetDescriptor;

    #[test]
    fn test_plan_without_expansion() {
        let catalog = DatasetCatalog::new(DatasetDescriptor::barra_c2("/archive")).unwrap();
        let options = PlanOptions {
            expand: false,
            output_dir: PathBuf::from("/scratch/out"),
            chunks: ChunkSizes::parse("time/24").unwrap(),
            ..PlanOptions::default()
        };
        let plan = plan_variables(&catalog, &ClimateVariable::ALL, &options).unwrap();

        assert!(plan.is_complete());
        assert_eq!(plan.skipped, vec![ClimateVariable::Radiation]);
        assert_eq!(plan.jobs.len(), 5);
        assert_eq!(plan.jobs[0].variable, ClimateVariable::Humidity);
        assert_eq!(plan.jobs[0].inputs.len(), 1);
        assert!(plan.jobs[0].output_file.starts_with("/scratch/out"));

        let line = plan.jobs[0].to_string();
        assert!(line.starts_with("humidity\thuss\t1\t/scratch/out/huss_AUST-04_"));
        assert!(line.contains("\ttime/24\t"));
    }

    #[test]
    fn test_serial_and_sized_pools_match_global_pool() {
        let catalog = DatasetCatalog::new(DatasetDescriptor::barra_c2("/archive")).unwrap();
        let global = plan_variables(&catalog, &ClimateVariable::ALL, &PlanOptions::default())
            .unwrap();

        for threads in [1, 2] {
            let options = PlanOptions {
                threads: Some(threads),
                show_progress: true,
                ..PlanOptions::default()
            };
            let plan = plan_variables(&catalog, &ClimateVariable::ALL, &options).unwrap();
            assert_eq!(plan.jobs, global.jobs, "threads = {}", threads);
            assert_eq!(plan.skipped, global.skipped);
        }
    }

    #[test]
    fn test_progress_monitor_counts() {
        let monitor = ProgressMonitor::new(2, false);
        assert_eq!(monitor.record(ClimateVariable::Temperature), 1);
        assert_eq!(monitor.record(ClimateVariable::Precipitation), 2);
        assert_eq!(monitor.completed(), 2);
    }

    #[test]
    fn test_format_walltime() {
        assert_eq!(format_walltime(Duration::from_secs(0)), "0:00:00");
        assert_eq!(format_walltime(Duration::from_secs(3723)), "1:02:03");
        assert_eq!(format_walltime(Duration::from_millis(59_999)), "0:00:59");
    }
}
