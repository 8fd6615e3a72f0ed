//! Build configuration model.
//!
//! Loaded by `crossbuild-config`; each module section is kept as an opaque
//! JSON mapping and deserialized by the module that owns it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::{Error, Result, Target};

/// A complete build definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Build name; keys the cache slot.
    pub name: String,
    /// Targets to build for.
    pub targets: Vec<Target>,
    /// Module sections in declaration order.
    pub modules: Vec<ModuleConfig>,
    /// Directories (relative to `root`) that feed the source fingerprint.
    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,
    /// Version file bumped by the `version` module.
    #[serde(default)]
    pub version: Option<VersionConfig>,
    /// Directory containing the configuration file.
    pub root: PathBuf,
}

impl BuildConfig {
    /// Resolve a path from the configuration against the project root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn module(&self, name: &str) -> Option<&ModuleConfig> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Deserialize the section of module `name` into its typed settings.
    pub fn settings<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let section = self
            .module(name)
            .ok_or_else(|| Error::NotConfigured(name.to_string()))?;
        section.settings()
    }

    /// Absolute path of the version file, if one is configured.
    pub fn version_path(&self) -> Option<PathBuf> {
        self.version.as_ref().map(|v| self.resolve(&v.path))
    }
}

/// Opaque per-module configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub name: String,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

impl ModuleConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: serde_json::Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.config.insert(key.to_string(), value.into());
        self
    }

    pub fn settings<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(serde_json::Value::Object(self.config.clone())).map_err(|e| {
            let message = e.to_string();
            match message
                .strip_prefix("missing field `")
                .and_then(|rest| rest.split_once('`'))
            {
                Some((field, _)) => Error::MissingField {
                    module: self.name.clone(),
                    field: field.to_string(),
                },
                None => Error::InvalidConfig {
                    module: self.name.clone(),
                    message,
                },
            }
        })
    }
}

/// Accept either a single value or a list for a `Vec` setting.
///
/// A KDL child with one argument converts to a scalar, so list settings such
/// as `args "x"` must tolerate that form.
pub fn one_or_many<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        One(T),
        Many(Vec<T>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

/// Version file settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionConfig {
    pub path: PathBuf,
    pub kind: VersionKind,
}

/// How the version file is bumped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionKind {
    /// Integer build counter, incremented by one.
    #[default]
    BuildInt,
    /// Dotted version whose last component is incremented.
    Semver,
    /// Random build token.
    BuildStr,
}

impl fmt::Display for VersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VersionKind::BuildInt => "buildint",
            VersionKind::Semver => "semver",
            VersionKind::BuildStr => "buildstr",
        };
        f.write_str(s)
    }
}

impl FromStr for VersionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "buildint" => Ok(VersionKind::BuildInt),
            "semver" => Ok(VersionKind::Semver),
            "buildstr" => Ok(VersionKind::BuildStr),
            other => Err(Error::InvalidConfig {
                module: "version".to_string(),
                message: format!("unknown version type: {other}"),
            }),
        }
    }
}
