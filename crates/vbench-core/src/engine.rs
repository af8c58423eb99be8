//! Engine descriptors: `<engine_dir>/<name>/config.json`.
//!
//! Each descriptor maps a container role (`server`, `client`, ...) to the
//! image, environment and hostname used to run it. The harness only reads
//! the hostname and environment; container lifecycle lives elsewhere.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerConf {
    #[serde(skip)]
    pub engine: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub dockerfile: Option<String>,
    #[serde(default)]
    pub environment: Option<IndexMap<String, Value>>,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
}

impl ContainerConf {
    /// Directory holding the engine's build files.
    pub fn dockerfile_path(&self, engine_dir: &Path) -> PathBuf {
        engine_dir.join(&self.engine)
    }

    /// Environment value rendered as a string (numbers and booleans included).
    pub fn env_var(&self, key: &str) -> Option<String> {
        self.environment.as_ref()?.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineDescriptor {
    pub name: String,
    containers: BTreeMap<String, ContainerConf>,
}

impl EngineDescriptor {
    pub fn from_name(engine_dir: &Path, name: &str) -> Result<Self> {
        let path = engine_dir.join(name).join("config.json");
        let raw = fs::read_to_string(&path)
            .map_err(|source| Error::Io { path: path.display().to_string(), source })?;
        Self::from_json(name, &raw).map_err(|e| match e {
            Error::Json { source, .. } => Error::Json { location: path.display().to_string(), source },
            other => other,
        })
    }

    pub fn from_json(name: &str, raw: &str) -> Result<Self> {
        let mut containers: BTreeMap<String, ContainerConf> = serde_json::from_str(raw)
            .map_err(|source| Error::Json { location: format!("engine '{}'", name), source })?;
        for conf in containers.values_mut() {
            conf.engine = name.to_string();
        }
        Ok(Self { name: name.to_string(), containers })
    }

    pub fn get_config(&self, container_name: &str) -> Option<&ContainerConf> {
        self.containers.get(container_name)
    }

    pub fn container_names(&self) -> impl Iterator<Item = &str> {
        self.containers.keys().map(String::as_str)
    }
}
