//! TOML configuration.
//!
//! Everything has a working default; a config file only overrides what it
//! names. The default location is `skein/skein.toml` under the platform
//! config directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{DEFAULT_PDS, PUBLIC_APPVIEW};
use crate::error::{Result, SkeinError};
use crate::paginate::PageConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeinConfig {
    pub service: ServiceConfig,
    pub defaults: DefaultsConfig,
    pub pagination: PageConfig,
}

impl Default for SkeinConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            defaults: DefaultsConfig::default(),
            pagination: PageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// AppView used for unauthenticated reads.
    pub appview: String,
    /// PDS entrypoint used for session creation.
    pub pds: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            appview: PUBLIC_APPVIEW.to_string(),
            pds: DEFAULT_PDS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Post count requested when the caller doesn't pass one.
    pub limit: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self { limit: 50 }
    }
}

impl SkeinConfig {
    /// Conventional config file location, if a config directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("skein").join("skein.toml"))
    }

    /// Load from `path` when given, otherwise from the default location.
    ///
    /// A missing file at the default location is not an error; a missing
    /// explicitly-named file is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    SkeinError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::parse(&raw, path)
            }
            None => {
                let Some(path) = Self::default_path() else {
                    return Ok(Self::default());
                };
                match std::fs::read_to_string(&path) {
                    Ok(raw) => Self::parse(&raw, &path),
                    Err(_) => {
                        debug!("no config at {}, using defaults", path.display());
                        Ok(Self::default())
                    }
                }
            }
        }
    }

    fn parse(raw: &str, path: &Path) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|e| SkeinError::Config(format!("invalid config {}: {}", path.display(), e)))
    }
}
