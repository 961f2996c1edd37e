//! Configuration file loading for retrofit.
//!
//! Discovers and loads `retrofit.toml` from the working directory.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use retrofit_core::settings::{CacheSettings, TranspileSettings};
use retrofit_types::Version;
use serde::Deserialize;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "retrofit.toml";

/// Top-level configuration from retrofit.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrofitConfig {
    /// Oldest interpreter version the output must run on.
    pub target: Option<Version>,

    pub max_target: Option<Version>,

    /// Fixer ids to switch off.
    pub disable: Vec<String>,

    /// Installed same-name backports. Setting this turns on strict mode.
    pub backports: Option<Vec<String>>,

    pub coding_header: Option<bool>,

    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: Option<bool>,
    pub dir: Option<Utf8PathBuf>,
}

/// Discover the retrofit.toml config file in `dir`.
pub fn discover_config(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

pub fn load_config(path: &Utf8Path) -> anyhow::Result<RetrofitConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

pub fn parse_config(contents: &str) -> anyhow::Result<RetrofitConfig> {
    let config: RetrofitConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load an explicit config file, else `retrofit.toml` in `dir`, else defaults.
pub fn load_or_default(explicit: Option<&Utf8Path>, dir: &Utf8Path) -> anyhow::Result<RetrofitConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match discover_config(dir) {
        Some(path) => load_config(&path),
        None => Ok(RetrofitConfig::default()),
    }
}

/// Settings given on the command line. `None`/empty means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub target: Option<Version>,
    pub max_target: Option<Version>,
    pub disable: Vec<String>,
    pub backports: Vec<String>,
    pub no_cache: bool,
    pub no_coding_header: bool,
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: RetrofitConfig,
}

impl ConfigMerger {
    pub fn new(config: RetrofitConfig) -> Self {
        Self { config }
    }

    /// Scalars from the CLI replace the file's; lists extend them.
    pub fn merge(self, cli: &CliOverrides) -> TranspileSettings {
        let defaults = TranspileSettings::default();

        let mut disable = self.config.disable;
        for id in &cli.disable {
            if !disable.contains(id) {
                disable.push(id.clone());
            }
        }

        let backports = match (self.config.backports, cli.backports.is_empty()) {
            (file, true) => file,
            (file, false) => {
                let mut names = file.unwrap_or_default();
                for name in &cli.backports {
                    if !names.contains(name) {
                        names.push(name.clone());
                    }
                }
                Some(names)
            }
        };

        let cache = CacheSettings {
            enabled: !cli.no_cache && self.config.cache.enabled.unwrap_or(defaults.cache.enabled),
            dir: self.config.cache.dir.unwrap_or(defaults.cache.dir),
        };

        TranspileSettings {
            target: cli.target.or(self.config.target).unwrap_or(defaults.target),
            max_target: cli.max_target.or(self.config.max_target),
            disable,
            backports,
            coding_header: !cli.no_coding_header
                && self.config.coding_header.unwrap_or(defaults.coding_header),
            cache,
        }
    }
}
