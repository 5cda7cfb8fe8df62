//! Tree configuration
//!
//! Every field has a default, so an empty TOML document is a valid
//!  configuration:
//!
//! ```toml
//! steplen = 4
//! alphabet = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ"
//! unique_sibling_names = true
//! commit_retries = 3
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::path::PathCodec;

pub const DEFAULT_ALPHABET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const DEFAULT_STEPLEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// characters per path segment
    pub steplen: usize,
    /// ordered digit alphabet for path segments
    pub alphabet: String,
    /// reject siblings whose names only differ by case
    pub unique_sibling_names: bool,
    /// how many times a mutation is re-planned after the store
    ///  reports that its preconditions went stale
    pub commit_retries: u32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            steplen: DEFAULT_STEPLEN,
            alphabet: DEFAULT_ALPHABET.to_string(),
            unique_sibling_names: true,
            commit_retries: 3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("path alphabet must be at least two strictly ascending ASCII characters: {0:?}")]
    InvalidAlphabet(String),
    #[error("step length {0} is zero or overflows the rank range")]
    InvalidSteplen(usize),
}

impl TreeConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: TreeConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Check that the alphabet and step length make a usable codec.
    pub fn validate(&self) -> Result<(), ConfigError> {
        PathCodec::from_config(self).map(|_| ())
    }
}
