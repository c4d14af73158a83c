//! Engine-wide tunables.
//!
//! Every field has a default so an empty TOML document is a valid config:
//!
//! ```toml
//! hunk_size = 25165824
//! cache_size = 4194304
//! texture_limit = 32
//! base_dir = "id1"
//! ```

use serde::Deserialize;
use std::{fs, io, path::Path, path::PathBuf};
use thiserror::Error;

pub const DEFAULT_HUNK_SIZE: usize = 24 * 1024 * 1024;
pub const DEFAULT_CACHE_SIZE: usize = 4 * 1024 * 1024;
pub const DEFAULT_SCRATCH_SIZE: usize = 8 * 1024 * 1024;
pub const DEFAULT_MAX_MODELS: usize = 256;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Level-lifetime arena ceiling in bytes.
    pub hunk_size: usize,
    /// Evictable cache region in bytes (alias model payloads).
    pub cache_size: usize,
    /// Largest file window a single read may request.
    pub scratch_size: usize,
    /// Number of model registry slots.
    pub max_models: usize,
    /// Load at most this many distinct brush textures and substitute the
    /// rest. `None` loads everything.
    pub texture_limit: Option<usize>,
    /// Root that relative model names resolve against.
    pub base_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hunk_size: DEFAULT_HUNK_SIZE,
            cache_size: DEFAULT_CACHE_SIZE,
            scratch_size: DEFAULT_SCRATCH_SIZE,
            max_models: DEFAULT_MAX_MODELS,
            texture_limit: None,
            base_dir: PathBuf::from("."),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: EngineConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            ("hunk_size", self.hunk_size),
            ("cache_size", self.cache_size),
            ("scratch_size", self.scratch_size),
            ("max_models", self.max_models),
        ];
        for (field, value) in sizes {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if self.texture_limit == Some(0) {
            return Err(ConfigError::Zero {
                field: "texture_limit",
            });
        }
        Ok(())
    }
}
