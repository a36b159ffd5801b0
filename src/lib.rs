pub mod catalog;
pub mod chunks;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod naming;
pub mod plan;
pub mod variable;
pub mod wildcard;

pub use catalog::{DatasetCatalog, InputFiles};
pub use descriptor::{DatasetDescriptor, VariableSpec};
pub use error::{CatalogError, ConfigError};
pub use variable::{ClimateVariable, VariableInfo};
