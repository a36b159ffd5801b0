use std::collections::HashMap;
use std::path::PathBuf;

use crate::descriptor::{DatasetDescriptor, Layout, VariableSpec};
use crate::error::CatalogError;
use crate::naming::{archive_file_name, TimeRange, Token, TIME_RANGE_WILDCARD};
use crate::variable::{ClimateVariable, VariableInfo};
use crate::wildcard::{Expansion, PathPattern};

/// Query surface over one climate archive.
///
/// A catalog owns an immutable [`DatasetDescriptor`] and answers every query
/// as a function of that descriptor and the requested variable. It holds no
/// other state, so a single instance can be shared between threads.
#[derive(Debug, Clone)]
pub struct DatasetCatalog {
    descriptor: DatasetDescriptor,
    layout: Layout,
}

impl DatasetCatalog {
    /// Build a catalog, rejecting descriptors with missing or malformed
    /// naming tokens
    pub fn new(descriptor: DatasetDescriptor) -> Result<Self, CatalogError> {
        let layout = descriptor.validate()?;
        let catalog = Self { descriptor, layout };
        // Wildcards in token values must compile now, not at query time
        for variable in catalog.supported_variables() {
            PathPattern::new(catalog.input_glob(variable)?)?;
        }
        Ok(catalog)
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    /// Variables this dataset provides, in canonical order
    pub fn supported_variables(&self) -> impl Iterator<Item = ClimateVariable> + '_ {
        ClimateVariable::ALL
            .into_iter()
            .filter(|v| self.spec(*v).is_ok())
    }

    pub fn supports(&self, variable: ClimateVariable) -> bool {
        self.spec(variable).is_ok()
    }

    fn spec(&self, variable: ClimateVariable) -> Result<&VariableSpec, CatalogError> {
        self.descriptor
            .variables
            .get(&variable)
            .filter(|spec| spec.available)
            .ok_or_else(|| CatalogError::UnsupportedVariable {
                dataset: self.descriptor.name.clone(),
                variable,
            })
    }

    fn token_value(&self, spec: &VariableSpec, token: Token, time_range: &str) -> String {
        match token {
            Token::Variable => spec.file_token().to_string(),
            Token::TimeRange => time_range.to_string(),
            other => self.descriptor.token(other).unwrap_or_default().to_string(),
        }
    }

    /// Unexpanded path pattern of the input files backing `variable`
    pub fn input_pattern(&self, variable: ClimateVariable) -> Result<PathBuf, CatalogError> {
        let spec = self.spec(variable)?;
        let lookup = |token: Token| self.token_value(spec, token, TIME_RANGE_WILDCARD);
        let directory = self.layout.directory.render(lookup);
        let file = self.layout.file.render(lookup);
        Ok(self.descriptor.root.join(directory).join(file))
    }

    /// Glob form of [`DatasetCatalog::input_pattern`]. The root and the
    /// template text are escaped; token values and the time range keep
    /// their wildcards.
    fn input_glob(&self, variable: ClimateVariable) -> Result<PathBuf, CatalogError> {
        let spec = self.spec(variable)?;
        let lookup = |token: Token| self.token_value(spec, token, TIME_RANGE_WILDCARD);
        let directory = self.layout.directory.render_with(lookup, globset::escape);
        let file = self.layout.file.render_with(lookup, globset::escape);
        let root = match self.descriptor.root.to_str() {
            Some(root) => PathBuf::from(globset::escape(root)),
            None => self.descriptor.root.clone(),
        };
        Ok(root.join(directory).join(file))
    }

    /// Input files backing `variable`.
    ///
    /// Without expansion the result is the single unexpanded pattern. With
    /// expansion the archive is listed now and on every later call; when
    /// nothing matches, the pattern itself is returned so the caller can
    /// resolve it later.
    pub fn input_files(
        &self,
        variable: ClimateVariable,
        expand_wildcard: bool,
    ) -> Result<InputFiles, CatalogError> {
        let pattern = self.input_pattern(variable)?;
        if !expand_wildcard {
            return Ok(InputFiles::pattern(pattern));
        }
        let expansion = PathPattern::new(self.input_glob(variable)?)?.expand()?;
        Ok(InputFiles::expanding(expansion, pattern))
    }

    /// Canonical name and units of `variable` in this dataset
    pub fn variable_info(&self, variable: ClimateVariable) -> Result<VariableInfo, CatalogError> {
        Ok(self.spec(variable)?.info())
    }

    /// Archive-convention name of the file produced for `variable`
    pub fn output_file_name(&self, variable: ClimateVariable) -> Result<String, CatalogError> {
        self.build_output_name(variable, None)
    }

    /// Output file name with a `_<start>-<end>` suffix. Fixed fields (`fx`)
    /// carry no suffix.
    pub fn output_file_name_for_range(
        &self,
        variable: ClimateVariable,
        range: &TimeRange,
    ) -> Result<String, CatalogError> {
        self.build_output_name(variable, Some(range))
    }

    fn build_output_name(
        &self,
        variable: ClimateVariable,
        range: Option<&TimeRange>,
    ) -> Result<String, CatalogError> {
        let spec = self.spec(variable)?;
        Ok(archive_file_name(
            |token: Token| self.token_value(spec, token, ""),
            self.layout.frequency,
            range,
        ))
    }

    /// Dataset provenance. Built fresh on every call.
    pub fn metadata(&self) -> HashMap<String, String> {
        let d = &self.descriptor;
        let mut metadata: HashMap<String, String> = d
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let builtin = [
            ("dataset", &d.name),
            ("activity_id", &d.activity),
            ("domain_id", &d.domain),
            ("driving_source_id", &d.driving_source),
            ("driving_experiment_id", &d.driving_experiment),
            ("driving_variant_label", &d.driving_variant),
            ("institution_id", &d.institution),
            ("source_id", &d.source_id),
            ("version_realisation", &d.version_realisation),
            ("frequency", &d.frequency),
            ("data_version", &d.data_version),
        ];
        for (key, value) in builtin {
            if value.is_empty() {
                metadata.remove(key);
            } else {
                metadata.insert(key.to_string(), value.clone());
            }
        }
        metadata
    }
}

enum Source {
    Pattern(Option<PathBuf>),
    Expanding {
        expansion: Expansion,
        fallback: Option<PathBuf>,
    },
}

/// Paths returned by [`DatasetCatalog::input_files`]
pub struct InputFiles {
    source: Source,
}

impl InputFiles {
    fn pattern(pattern: PathBuf) -> Self {
        Self {
            source: Source::Pattern(Some(pattern)),
        }
    }

    fn expanding(expansion: Expansion, pattern: PathBuf) -> Self {
        Self {
            source: Source::Expanding {
                expansion,
                fallback: Some(pattern),
            },
        }
    }

    /// Drain into a vector, stopping at the first filesystem error
    pub fn collect_paths(self) -> Result<Vec<PathBuf>, CatalogError> {
        self.collect()
    }
}

impl Iterator for InputFiles {
    type Item = Result<PathBuf, CatalogError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            Source::Pattern(pattern) => pattern.take().map(Ok),
            Source::Expanding {
                expansion,
                fallback,
            } => match expansion.next() {
                Some(item) => {
                    // Any real result, including an error, replaces the fallback
                    *fallback = None;
                    Some(item)
                }
                None => fallback.take().map(Ok),
            },
        }
    }
}
