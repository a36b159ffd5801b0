//! Chunk sizes for rechunking jobs, written the way nco expects them:
//! `lat/1,lon/1,time/365`
use std::fmt;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkSizes {
    entries: Vec<(String, usize)>,
}

impl ChunkSizes {
    /// Parse a comma-separated list of `dimension/size` pairs.
    /// An empty string means "no chunking configured".
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let mut entries: Vec<(String, usize)> = Vec::new();

        for item in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (dim, size) = item.split_once('/').ok_or_else(|| {
                ConfigError::InvalidChunkSizes(format!(
                    "'{}' is not of the form dimension/size",
                    item
                ))
            })?;
            let dim = dim.trim();
            if dim.is_empty() {
                return Err(ConfigError::InvalidChunkSizes(format!(
                    "missing dimension name in '{}'",
                    item
                )));
            }
            let size: usize = size.trim().parse().map_err(|_| {
                ConfigError::InvalidChunkSizes(format!("invalid size in '{}'", item))
            })?;
            if size == 0 {
                return Err(ConfigError::InvalidChunkSizes(format!(
                    "chunk size for '{}' must be positive",
                    dim
                )));
            }
            if entries.iter().any(|(d, _)| d == dim) {
                return Err(ConfigError::InvalidChunkSizes(format!(
                    "dimension '{}' given more than once",
                    dim
                )));
            }
            entries.push((dim.to_string(), size));
        }

        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ChunkSizes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(dim, size)| format!("{}/{}", dim, size))
            .collect();
        f.write_str(&parts.join(","))
    }
}
