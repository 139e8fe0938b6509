//! Mapping run configuration
//!
//! Loaded from TOML or JSON. Every field has a default, so a config file
//! only needs the values it wants to change:
//!
//! ```toml
//! base_iri = "http://example.org/"
//! batch_size = 128
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RmlError, RmlResult};
use crate::materialize::is_absolute_iri;

pub const DEFAULT_BATCH_SIZE: usize = 256;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
pub const DEFAULT_MAX_CONCURRENT_SOURCES: usize = 8;

/// Configuration of a mapping run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RmlConfig {
    /// Base IRI prefixed to relative IRIs
    pub base_iri: Option<String>,
    /// Records requested from a source per pull
    pub batch_size: usize,
    /// Output quads buffered before drivers wait for the consumer
    pub channel_capacity: usize,
    /// Logical sources open at the same time
    pub max_concurrent_sources: usize,
    /// Emit `rdf:type` triples for subject map classes
    pub emit_class_triples: bool,
}

impl Default for RmlConfig {
    fn default() -> Self {
        Self {
            base_iri: None,
            batch_size: DEFAULT_BATCH_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_concurrent_sources: DEFAULT_MAX_CONCURRENT_SOURCES,
            emit_class_triples: true,
        }
    }
}

impl RmlConfig {
    /// Set the base IRI
    pub fn with_base_iri(mut self, base_iri: impl Into<String>) -> Self {
        self.base_iri = Some(base_iri.into());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_max_concurrent_sources(mut self, max: usize) -> Self {
        self.max_concurrent_sources = max;
        self
    }

    pub fn from_toml_str(s: &str) -> RmlResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| RmlError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> RmlResult<Self> {
        let config: Self =
            serde_json::from_str(s).map_err(|e| RmlError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file
    pub fn load(path: impl AsRef<Path>) -> RmlResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RmlError::Config(format!("failed to read {}: {e}", path.display())))?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content)?,
            Some("json") => Self::from_json_str(&content)?,
            _ => {
                return Err(RmlError::Config(format!(
                    "unsupported config file extension: {}",
                    path.display()
                )))
            }
        };
        tracing::debug!(path = %path.display(), "loaded RML config");
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> RmlResult<()> {
        if self.batch_size == 0 {
            return Err(RmlError::Config("batch_size must be at least 1".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(RmlError::Config(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_sources == 0 {
            return Err(RmlError::Config(
                "max_concurrent_sources must be at least 1".to_string(),
            ));
        }
        if let Some(base) = &self.base_iri {
            if !is_absolute_iri(base) {
                return Err(RmlError::Config(format!(
                    "base_iri must be an absolute IRI: {base}"
                )));
            }
        }
        Ok(())
    }
}
