//! Build options for [`PackWriter`](crate::PackWriter).
//!
//! Options can be assembled in code or loaded from a TOML file written by a
//! packaging tool:
//!
//! ```toml
//! password = "hunter2"
//! level = 7
//! alignment = 16
//! ```

use crate::compress::DEFAULT_LEVEL;
use crate::error::{PackError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options recognised by [`PackWriter::begin`](crate::PackWriter::begin)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildOptions {
    /// Password for obfuscated entries; empty means none
    pub password: Option<String>,

    /// Compression level hint, clamped to the codec's range
    pub level: i32,

    /// Payload alignment in bytes (power of two; 0 and 1 mean unaligned)
    pub alignment: u64,
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn with_alignment(mut self, alignment: u64) -> Self {
        self.alignment = alignment;
        self
    }

    /// Password, if one was set and it is not empty
    pub fn effective_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    /// Payload alignment with 0 normalised to 1
    pub fn effective_alignment(&self) -> u64 {
        self.alignment.max(1)
    }

    /// Check option values before a build session starts
    pub fn validate(&self) -> Result<()> {
        if !self.effective_alignment().is_power_of_two() {
            return Err(PackError::InvalidArg(format!(
                "alignment must be a power of two, got {}",
                self.alignment
            )));
        }
        Ok(())
    }

    /// Parse options from a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let options: Self = toml::from_str(source)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file on disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            password: None,
            level: DEFAULT_LEVEL,
            alignment: 1,
        }
    }
}
