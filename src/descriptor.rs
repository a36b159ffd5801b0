use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{CatalogError, ConfigError};
use crate::naming::{Frequency, Template, Token, OUTPUT_TOKENS, TOKEN_SEPARATOR};
use crate::variable::{ClimateVariable, VariableInfo};

/// Default directory layout below the archive root
pub const DEFAULT_DIRECTORY_TEMPLATE: &str = "{activity}/{domain}/{institution}/{driving_source}/{driving_experiment}/{driving_variant}/{source_id}/{version_realisation}/{frequency}/{variable}/{data_version}";

/// Default file name layout for input files
pub const DEFAULT_FILE_TEMPLATE: &str = "{variable}_{domain}_{driving_source}_{driving_experiment}_{driving_variant}_{institution}_{source_id}_{version_realisation}_{frequency}_{time_range}.nc";

/// Names accepted by [`DatasetDescriptor::preset`]
pub const PRESET_NAMES: &[&str] = &["BARRA-R2", "BARRA-C2"];

fn default_directory_template() -> String {
    DEFAULT_DIRECTORY_TEMPLATE.to_string()
}

fn default_file_template() -> String {
    DEFAULT_FILE_TEMPLATE.to_string()
}

fn default_true() -> bool {
    true
}

/// One row of a dataset's variable table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableSpec {
    /// Variable name in the archive
    pub name: String,
    /// Physical units
    pub units: String,
    /// Token used in file and directory names, when it differs from `name`
    #[serde(default)]
    pub file_token: Option<String>,
    /// False if the dataset lists the variable but does not provide it
    #[serde(default = "default_true")]
    pub available: bool,
}

impl VariableSpec {
    pub fn new(name: impl Into<String>, units: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            file_token: None,
            available: true,
        }
    }

    /// Row built from the variable's standard name and units
    pub fn standard(variable: ClimateVariable) -> Self {
        let info = variable.default_info();
        Self::new(info.name, info.units)
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn file_token(&self) -> &str {
        self.file_token.as_deref().unwrap_or(&self.name)
    }

    pub fn info(&self) -> VariableInfo {
        VariableInfo::new(self.name.clone(), self.units.clone())
    }
}

/// Identity and layout of one climate archive.
///
/// Token fields are plain strings so that a descriptor file with missing
/// tokens still loads; completeness is checked when a catalog is built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetDescriptor {
    /// Dataset name (e.g. "BARRA-R2")
    #[serde(default)]
    pub name: String,
    /// Archive root directory
    #[serde(default)]
    pub root: PathBuf,
    #[serde(default = "default_directory_template")]
    pub directory_template: String,
    #[serde(default = "default_file_template")]
    pub file_template: String,

    #[serde(default)]
    pub activity: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub driving_source: String,
    #[serde(default)]
    pub driving_experiment: String,
    #[serde(default)]
    pub driving_variant: String,
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub version_realisation: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub data_version: String,

    /// Variables offered by the dataset
    #[serde(default, deserialize_with = "deserialize_variables")]
    pub variables: BTreeMap<ClimateVariable, VariableSpec>,
    /// Extra provenance fields reported by the catalog metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn deserialize_variables<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<ClimateVariable, VariableSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, VariableSpec>::deserialize(deserializer)?;
    let mut variables = BTreeMap::new();
    for (key, spec) in raw {
        let variable = key
            .parse::<ClimateVariable>()
            .map_err(serde::de::Error::custom)?;
        if variables.insert(variable, spec).is_some() {
            return Err(serde::de::Error::custom(format!(
                "variable {} listed twice (key '{}')",
                variable, key
            )));
        }
    }
    Ok(variables)
}

/// Templates and frequency of a descriptor that passed validation
#[derive(Debug, Clone)]
pub(crate) struct Layout {
    pub directory: Template,
    pub file: Template,
    pub frequency: Frequency,
}

impl DatasetDescriptor {
    /// Descriptor with every token empty and the default layout templates
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: PathBuf::new(),
            directory_template: default_directory_template(),
            file_template: default_file_template(),
            activity: String::new(),
            domain: String::new(),
            driving_source: String::new(),
            driving_experiment: String::new(),
            driving_variant: String::new(),
            institution: String::new(),
            source_id: String::new(),
            version_realisation: String::new(),
            frequency: String::new(),
            data_version: String::new(),
            variables: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// BARRA-R2: the 12 km Australian regional reanalysis driven by ERA5
    pub fn barra_r2(root: impl Into<PathBuf>) -> Self {
        let mut descriptor = Self::barra("BARRA-R2", root.into());
        descriptor.domain = "AUS-11".to_string();
        descriptor.frequency = "day".to_string();
        descriptor.variables = ClimateVariable::ALL
            .iter()
            .map(|v| (*v, VariableSpec::standard(*v)))
            .collect();
        descriptor
    }

    /// BARRA-C2: the 4 km convection-permitting downscaling of BARRA-R2.
    /// Shortwave radiation is not published at this resolution.
    pub fn barra_c2(root: impl Into<PathBuf>) -> Self {
        let mut descriptor = Self::barra("BARRA-C2", root.into());
        descriptor.domain = "AUST-04".to_string();
        descriptor.frequency = "1hr".to_string();
        descriptor.variables = ClimateVariable::ALL
            .iter()
            .map(|v| {
                let spec = VariableSpec::standard(*v);
                match v {
                    ClimateVariable::Radiation => (*v, spec.unavailable()),
                    _ => (*v, spec),
                }
            })
            .collect();
        descriptor
    }

    fn barra(name: &str, root: PathBuf) -> Self {
        let mut descriptor = Self::empty(name);
        descriptor.root = root;
        descriptor.activity = "reanalysis".to_string();
        descriptor.driving_source = "ERA5".to_string();
        descriptor.driving_experiment = "historical".to_string();
        descriptor.driving_variant = "hres".to_string();
        descriptor.institution = "BOM".to_string();
        descriptor.source_id = name.to_string();
        descriptor.version_realisation = "v1".to_string();
        descriptor.data_version = "latest".to_string();
        descriptor
            .metadata
            .insert("project".to_string(), "BARRA2".to_string());
        descriptor
    }

    /// Look up a built-in descriptor by name, ignoring case
    pub fn preset(name: &str, root: impl Into<PathBuf>) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "BARRA-R2" => Some(Self::barra_r2(root)),
            "BARRA-C2" => Some(Self::barra_c2(root)),
            _ => None,
        }
    }

    /// Parse a descriptor from YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read a descriptor from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Value of a dataset-level token. `Variable` and `TimeRange` depend on
    /// the query and are not stored in the descriptor.
    pub fn token(&self, token: Token) -> Option<&str> {
        let value = match token {
            Token::Activity => &self.activity,
            Token::Domain => &self.domain,
            Token::DrivingSource => &self.driving_source,
            Token::DrivingExperiment => &self.driving_experiment,
            Token::DrivingVariant => &self.driving_variant,
            Token::Institution => &self.institution,
            Token::SourceId => &self.source_id,
            Token::VersionRealisation => &self.version_realisation,
            Token::Frequency => &self.frequency,
            Token::DataVersion => &self.data_version,
            Token::Variable | Token::TimeRange => return None,
        };
        Some(value.as_str())
    }

    /// Check that every required token is present and both templates are
    /// well formed
    pub(crate) fn validate(&self) -> Result<Layout, CatalogError> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::invalid("dataset name is empty"));
        }

        for token in OUTPUT_TOKENS.iter().filter(|t| **t != Token::Variable) {
            let value = self.token(*token).unwrap_or_default();
            if value.trim().is_empty() {
                return Err(CatalogError::invalid(format!(
                    "{}: required token '{}' is empty",
                    self.name,
                    token.name()
                )));
            }
            check_file_name_token(&self.name, token.name(), value)?;
        }

        let frequency = self
            .frequency
            .parse::<Frequency>()
            .map_err(|e| CatalogError::invalid(format!("{}: {}", self.name, e)))?;

        let directory = Template::parse(&self.directory_template)
            .map_err(|e| CatalogError::invalid(format!("{}: {}", self.name, e)))?;
        let file = Template::parse(&self.file_template)
            .map_err(|e| CatalogError::invalid(format!("{}: {}", self.name, e)))?;

        if directory.uses(Token::TimeRange) {
            return Err(CatalogError::invalid(format!(
                "{}: directory template cannot use '{{time_range}}'",
                self.name
            )));
        }
        if file.as_str().contains('/') {
            return Err(CatalogError::invalid(format!(
                "{}: file template must not contain '/'",
                self.name
            )));
        }

        for token in directory.tokens().chain(file.tokens()) {
            if let Some(value) = self.token(token) {
                if value.trim().is_empty() {
                    return Err(CatalogError::invalid(format!(
                        "{}: template uses '{{{}}}' but the token is empty",
                        self.name,
                        token.name()
                    )));
                }
                if value.contains('/') {
                    return Err(CatalogError::invalid(format!(
                        "{}: token '{}' contains '/'",
                        self.name,
                        token.name()
                    )));
                }
            }
        }

        for (variable, spec) in &self.variables {
            if spec.name.trim().is_empty() || spec.units.trim().is_empty() {
                return Err(CatalogError::invalid(format!(
                    "{}: variable {} needs both a name and units",
                    self.name, variable
                )));
            }
            check_file_name_token(&self.name, variable.key(), spec.file_token())?;
        }

        Ok(Layout {
            directory,
            file,
            frequency,
        })
    }
}

fn check_file_name_token(dataset: &str, label: &str, value: &str) -> Result<(), CatalogError> {
    if value.trim().is_empty() || value.contains(TOKEN_SEPARATOR) || value.contains('/') {
        return Err(CatalogError::invalid(format!(
            "{}: '{}' value '{}' must be non-empty and free of '{}' and '/'",
            dataset, label, value, TOKEN_SEPARATOR
        )));
    }
    Ok(())
}
