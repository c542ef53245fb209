//! Codec limits.
//!
//! A [`CodecConfig`] bounds what a decoder is willing to materialize from a declared length and
//! how deep it follows nested objects. Defaults suit trusted peers; tighten them for input
//! from anywhere else.
//!
//! ```
//! use graph_pack::CodecConfig;
//!
//! let config = CodecConfig::from_toml("max_depth = 32\nmax_length = 65536").unwrap();
//! assert_eq!(config.max_depth, 32);
//! ```

use std::fs;
use std::path::Path;

use educe::Educe;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default nesting limit for objects reached through the generic dispatcher.
pub const MAX_DEPTH: usize = 100;

/// Default ceiling on any declared byte, string or element count: 256 MiB.
pub const MAX_LENGTH: usize = 1 << 28;

#[derive(Educe, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default)]
pub struct CodecConfig {
    /// Maximum nesting of dispatched objects (and of fallback pack elements).
    #[educe(Default = 100)]
    pub max_depth: usize,
    /// Maximum declared length accepted for byte sequences, strings, arrays and collections.
    #[educe(Default = 268435456)]
    pub max_length: usize,
}

impl CodecConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: CodecConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(Error::Config("max_depth must be at least 1".to_string()));
        }
        if self.max_length > i32::MAX as usize {
            return Err(Error::Config(format!(
                "max_length {} can't exceed the i32 length prefix",
                self.max_length
            )));
        }
        Ok(())
    }
}
