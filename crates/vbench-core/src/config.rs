use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(dir: &Path) -> Result<Self> {
        let env_name = env::var("VBENCH_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(dir.join("vbench.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("vbench.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("vbench.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("vbench.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("VBENCH_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::Configuration(format!("Failed to get '{}': {}", key, e)))
    }

    /// Like `get`, but a missing section yields `T::default()`.
    pub fn get_or_default<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.figment.find_value(key).is_err() {
            return Ok(T::default());
        }
        self.get(key)
    }

    fn validate(&self) -> Result<()> {
        if let Ok(batch_size) = self.figment.extract_inner::<usize>("upload.batch_size") {
            if batch_size == 0 {
                return Err(Error::Configuration("upload.batch_size must be positive".to_string()));
            }
        }
        Ok(())
    }
}

fn default_distance() -> String { "cosine".to_string() }
fn default_engine_dir() -> String { "engine".to_string() }
fn default_container() -> String { "server".to_string() }

/// Run-level knobs under `[run]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_distance")]
    pub distance: String,
    #[serde(default)]
    pub records: Option<String>,
    #[serde(default = "default_engine_dir")]
    pub engine_dir: String,
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default = "default_container")]
    pub container: String,
    #[serde(default)]
    pub skip_index: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            distance: default_distance(),
            records: None,
            engine_dir: default_engine_dir(),
            engine: None,
            container: default_container(),
            skip_index: false,
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
