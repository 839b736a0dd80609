//! Registry configuration.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable holding extra descriptor sources, separated like `PATH`.
pub const DESCRIPTOR_PATH_ENV: &str = "SPINE_DESCRIPTOR_PATH";

/// Environment variable overriding the default type URL prefix.
pub const TYPE_URL_PREFIX_ENV: &str = "SPINE_TYPE_URL_PREFIX";

pub const DEFAULT_TYPE_URL_PREFIX: &str = "type.googleapis.com";

/// Configuration for a [`crate::KnownTypes`] registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnownTypesConfig {
    /// Name used in the summary line of the type dump.
    pub registry_name: String,
    /// Extension (without the dot) of descriptor set files.
    pub descriptor_extension: String,
    /// Type URL prefixes by proto package.
    pub type_urls: UrlPrefixes,
    /// Sources loaded when the registry is created.
    pub default_sources: Vec<PathBuf>,
    /// Seed the registry with the `google.protobuf` well-known types.
    pub include_well_known: bool,
}

impl Default for KnownTypesConfig {
    fn default() -> Self {
        Self {
            registry_name: "KnownTypes".to_string(),
            descriptor_extension: "desc".to_string(),
            type_urls: UrlPrefixes::default(),
            default_sources: Vec::new(),
            include_well_known: true,
        }
    }
}

impl KnownTypesConfig {
    /// Load a JSON config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, plus sources from `SPINE_DESCRIPTOR_PATH` and the prefix
    /// from `SPINE_TYPE_URL_PREFIX`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(paths) = env::var_os(DESCRIPTOR_PATH_ENV) {
            config
                .default_sources
                .extend(env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()));
        }
        if let Ok(prefix) = env::var(TYPE_URL_PREFIX_ENV) {
            if !prefix.is_empty() {
                config.type_urls.default_prefix = prefix;
            }
        }
        config
    }
}

/// Type URL prefixes, chosen by the longest matching proto package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlPrefixes {
    pub default_prefix: String,
    pub by_package: BTreeMap<String, String>,
}

impl Default for UrlPrefixes {
    fn default() -> Self {
        Self {
            default_prefix: DEFAULT_TYPE_URL_PREFIX.to_string(),
            by_package: BTreeMap::new(),
        }
    }
}

impl UrlPrefixes {
    pub fn with_package(mut self, package: &str, prefix: &str) -> Self {
        self.by_package
            .insert(package.to_string(), prefix.to_string());
        self
    }

    pub fn prefix_for(&self, package: &str) -> &str {
        self.by_package
            .iter()
            .filter(|(candidate, _)| {
                package == candidate.as_str()
                    || package
                        .strip_prefix(candidate.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            })
            .max_by_key(|(candidate, _)| candidate.len())
            .map(|(_, prefix)| prefix.as_str())
            .unwrap_or(&self.default_prefix)
    }
}
