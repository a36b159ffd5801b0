use clap::{Arg, ArgMatches};
use std::path::PathBuf;

use crate::catalog::DatasetCatalog;
use crate::descriptor::{DatasetDescriptor, PRESET_NAMES};
use crate::error::ConfigError;

/// Archive root used by the built-in presets when none is given
pub const DEFAULT_ROOT: &str = "/g/data/ob53/BARRA2/output";

/// Preset selected when neither a dataset nor a descriptor file is given
pub const DEFAULT_DATASET: &str = "BARRA-R2";

/// Command-line configuration shared by every subcommand.
///
/// Each option falls back to an environment variable so batch scripts can
/// select the dataset once in their job environment.
#[derive(Clone, Debug)]
pub struct Config {
    /// Built-in dataset preset name
    pub dataset: String,
    /// Descriptor file; takes precedence over `dataset`
    pub descriptor_path: Option<PathBuf>,
    /// Archive root override
    pub root: Option<PathBuf>,
    /// Log level filter string (e.g. "info")
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset: DEFAULT_DATASET.to_string(),
            descriptor_path: None,
            root: None,
            log_level: None,
        }
    }
}

impl Config {
    /// Global arguments understood by [`Config::from_matches`]
    pub fn args() -> Vec<Arg> {
        vec![
            Arg::new("dataset")
                .short('d')
                .long("dataset")
                .value_name("NAME")
                .env("CATALOG_DATASET")
                .help("Built-in dataset preset")
                .value_parser(PRESET_NAMES.to_vec())
                .ignore_case(true)
                .default_value(DEFAULT_DATASET)
                .global(true),
            Arg::new("descriptor")
                .long("descriptor")
                .value_name("FILE")
                .env("CATALOG_DESCRIPTOR")
                .help("YAML dataset descriptor (overrides --dataset)")
                .global(true),
            Arg::new("root")
                .short('r')
                .long("root")
                .value_name("DIR")
                .env("CATALOG_ROOT")
                .help("Archive root directory")
                .global(true),
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .env("CATALOG_LOG")
                .help("Log level: error, warn, info, debug, trace")
                .value_parser(["off", "error", "warn", "info", "debug", "trace"])
                .global(true),
        ]
    }

    pub fn from_matches(matches: &ArgMatches) -> Result<Self, ConfigError> {
        let dataset = matches
            .get_one::<String>("dataset")
            .cloned()
            .unwrap_or_else(|| DEFAULT_DATASET.to_string());
        let descriptor_path = matches.get_one::<String>("descriptor").map(PathBuf::from);
        let root = matches.get_one::<String>("root").map(PathBuf::from);
        let log_level = matches.get_one::<String>("log-level").cloned();

        let config = Self {
            dataset,
            descriptor_path,
            root,
            log_level,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.descriptor_path {
            if !path.is_file() {
                return Err(ConfigError::InvalidArgument(format!(
                    "Descriptor file does not exist: {}",
                    path.display()
                )));
            }
        } else if !PRESET_NAMES
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&self.dataset))
        {
            return Err(ConfigError::UnknownDataset(self.dataset.clone()));
        }

        if let Some(root) = &self.root {
            if root.as_os_str().is_empty() {
                return Err(ConfigError::InvalidArgument(
                    "Archive root must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Descriptor selected by this configuration, with the root override applied
    pub fn load_descriptor(&self) -> Result<DatasetDescriptor, ConfigError> {
        let mut descriptor = match &self.descriptor_path {
            Some(path) => DatasetDescriptor::from_file(path)?,
            None => DatasetDescriptor::preset(&self.dataset, DEFAULT_ROOT)
                .ok_or_else(|| ConfigError::UnknownDataset(self.dataset.clone()))?,
        };
        if let Some(root) = &self.root {
            descriptor.root = root.clone();
        }
        Ok(descriptor)
    }

    pub fn catalog(&self) -> Result<DatasetCatalog, ConfigError> {
        Ok(DatasetCatalog::new(self.load_descriptor()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Command;
    use std::fs;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Result<Config, ConfigError> {
        let matches = Command::new("test")
            .args(Config::args())
            .try_get_matches_from(args)
            .map_err(|e| ConfigError::InvalidArgument(e.to_string()))?;
        Config::from_matches(&matches)
    }

    #[test]
    fn test_defaults_select_barra_r2() {
        let config = Config::default();
        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.name(), "BARRA-R2");
        assert_eq!(catalog.descriptor().root, PathBuf::from(DEFAULT_ROOT));
    }

    #[test]
    fn test_dataset_and_root_arguments() {
        let config = parse(&["test", "--dataset", "barra-c2", "--root", "/tmp/archive"]).unwrap();
        let descriptor = config.load_descriptor().unwrap();
        assert_eq!(descriptor.name, "BARRA-C2");
        assert_eq!(descriptor.root, PathBuf::from("/tmp/archive"));
    }

    #[test]
    fn test_unknown_dataset_rejected() {
        assert!(parse(&["test", "--dataset", "ERA5"]).is_err());

        let config = Config {
            dataset: "ERA5".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownDataset(_))
        ));
    }

    #[test]
    fn test_descriptor_file_takes_precedence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.yaml");
        fs::write(
            &path,
            r#"
name: CUSTOM
root: /data/custom
domain: AUS-20i
driving_source: ERA5
driving_experiment: evaluation
driving_variant: r1i1p1f1
institution: UQ-DEC
source_id: CCAM
version_realisation: v1
frequency: mon
directory_template: "{frequency}/{variable}"
variables:
  precipitation:
    name: pr
    units: kg m-2 s-1
"#,
        )
        .unwrap();

        let config = parse(&["test", "--descriptor", path.to_str().unwrap()]).unwrap();
        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.name(), "CUSTOM");
        assert_eq!(catalog.descriptor().root, PathBuf::from("/data/custom"));
    }

    #[test]
    fn test_missing_descriptor_file_rejected() {
        let result = parse(&["test", "--descriptor", "/nonexistent/descriptor.yaml"]);
        assert!(matches!(result, Err(ConfigError::InvalidArgument(_))));
    }

    #[test]
    fn test_invalid_descriptor_surfaces_catalog_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, "name: BROKEN\ndomain: AUS-11\n").unwrap();

        let config = Config {
            descriptor_path: Some(path),
            ..Config::default()
        };
        assert!(matches!(
            config.catalog(),
            Err(ConfigError::Catalog(crate::error::CatalogError::InvalidDescriptor(_)))
        ));
    }
}
