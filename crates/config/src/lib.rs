//! Layered configuration for curio catalogs.
//!
//! Sources, lowest precedence first:
//!
//! 1. Built-in defaults ([`Config::default()`]).
//! 2. A config file: TOML, YAML or JSON, picked by extension. Either given
//!    explicitly or looked up at [`Config::default_path()`].
//! 3. Environment variables prefixed `CURIO_`; `__` separates nested keys
//!    (`CURIO_LIMITS__FEATURED=3`).

pub mod error;

use crate::error::{ErrorKind, Result};
use curio_catalog::{BOOKMARK_PARAM, CatalogKind, DEBOUNCE, PAGE_SIZE, Settings};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "CURIO_";
const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub page_size: usize,
    pub debounce_ms: u64,
    pub bookmark_param: String,
    pub limits: Limits,
}

/// Section size overrides. Unset means the catalog kind's default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub featured: Option<usize>,
    pub top_rated: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            debounce_ms: u64::try_from(DEBOUNCE.as_millis()).unwrap_or(u64::MAX),
            bookmark_param: BOOKMARK_PARAM.to_string(),
            limits: Limits::default(),
        }
    }
}

impl Config {
    /// `config.toml` in the platform's config directory for curio, if the
    /// platform has one.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "curio").map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
    }

    /// Merge every source into a [`Figment`] without extracting it.
    ///
    /// An explicit `path` must exist; the default path is only used when
    /// something is actually there.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        let file = match path {
            Some(path) if !path.exists() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|path| path.exists()),
        };
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "reading config file");
            figment = match file.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(&file)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(&file)),
                Some("json") => figment.merge(Json::file(&file)),
                other => exn::bail!(ErrorKind::UnsupportedFormat(other.unwrap_or_default().to_string())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(path)?.extract().or_raise(|| ErrorKind::Extract)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            exn::bail!(ErrorKind::Invalid("page_size must be at least 1".to_string()));
        }
        if self.bookmark_param.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("bookmark_param must not be empty".to_string()));
        }
        Ok(())
    }

    /// Engine settings for one catalog kind.
    pub fn settings(&self, kind: CatalogKind) -> Settings {
        let defaults = Settings::new(kind);
        Settings {
            kind,
            page_size: self.page_size,
            debounce: Duration::from_millis(self.debounce_ms),
            bookmark_param: self.bookmark_param.clone(),
            featured_limit: self.limits.featured.unwrap_or(defaults.featured_limit),
            top_rated_limit: self.limits.top_rated.unwrap_or(defaults.top_rated_limit),
        }
    }
}
