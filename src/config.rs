//! Application configuration loaded from TOML.
//!
//! Resolution order:
//! 1. an explicit path (the `--config` flag)
//! 2. the `RUSTY_TUBE_CONFIG` environment variable
//! 3. built-in defaults
//!
//! ```toml
//! default_sample_size = 50000
//!
//! [loader]
//! chunk_size = 100000
//! sample_seed = 42
//!
//! [filter]
//! min_views = 1000
//! categories = ["Music", "Gaming"]
//! filter_outliers = true
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::{FilterSpec, LoaderConfig};

pub const CONFIG_ENV: &str = "RUSTY_TUBE_CONFIG";

/// Sample size used when neither the config nor the CLI sets one.
pub const DEFAULT_SAMPLE_SIZE: usize = 50_000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub loader: LoaderConfig,
    pub filter: FilterSpec,
    /// `None` loads every row.
    pub default_sample_size: Option<usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            loader: LoaderConfig::default(),
            filter: FilterSpec::default(),
            default_sample_size: Some(DEFAULT_SAMPLE_SIZE),
        }
    }
}

impl AppConfig {
    pub fn from_toml(text: &str) -> Result<AppConfig> {
        toml::from_str(text).context("parsing configuration TOML")
    }

    pub fn from_file(path: &Path) -> Result<AppConfig> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file '{}'", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in '{}'", path.display()))
    }

    /// Load from `explicit`, else from `$RUSTY_TUBE_CONFIG`, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<AppConfig> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        match path {
            Some(p) => {
                log::info!("using configuration from '{}'", p.display());
                Self::from_file(&p)
            }
            None => Ok(AppConfig::default()),
        }
    }
}
