//! Settings, read from a TOML file with environment variable overrides.
//!
//! Every section has defaults, so an empty file (or no file) is a valid configuration.
use crate::{ColumnAliases, Result, SourceConfig};
use qu::ick_use::*;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub source: SourceConfig,
    pub columns: ColumnAliases,
    /// Named datasets, each loaded from one or more files. Relative paths are relative to
    /// `app.data_dir`.
    pub datasets: Datasets,
    pub cache: CacheConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub description: String,
    pub version: String,
    pub data_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            name: "Vacivida Dashboard".into(),
            description: "Dashboard de Análise de Vacinação".into(),
            version: "1.0.0".into(),
            data_dir: "./data".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Datasets(pub BTreeMap<String, Vec<PathBuf>>);

impl Default for Datasets {
    fn default() -> Self {
        Datasets(
            [
                ("dose", "prod.vcvd_dose.csv"),
                ("bioquimica", "prod.vcvd_bioquimica.csv"),
                ("hemograma", "prod.vcvd_hemograma.csv"),
            ]
            .into_iter()
            .map(|(name, file)| (name.to_string(), vec![PathBuf::from(file)]))
            .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a loaded dataset is reused, in seconds.
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: 3600,
            max_entries: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Default name of the filtered CSV download.
    pub file_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            file_name: "dados_filtrados.csv".into(),
        }
    }
}

impl Config {
    /// Read the config file at `path`, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        fn inner(path: &Path) -> Result<Config> {
            let text = fs::read_to_string(path)?;
            Ok(Config::parse(&text)?)
        }
        let path = path.as_ref();
        let mut config = inner(path)
            .with_context(|| format!("unable to load config from \"{}\"", path.display()))?;
        config.apply_env();
        Ok(config)
    }

    /// The defaults, with environment overrides.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    fn apply_env(&mut self) {
        self.apply_overrides(|name| env::var(name).ok());
    }

    /// Override `app` settings from the variables `APP_NAME`, `APP_DESCRIPTION`, `APP_VERSION`
    /// and `DATA_DIR`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let app = &mut self.app;
        if let Some(v) = lookup("APP_NAME") {
            app.name = v;
        }
        if let Some(v) = lookup("APP_DESCRIPTION") {
            app.description = v;
        }
        if let Some(v) = lookup("APP_VERSION") {
            app.version = v;
        }
        if let Some(v) = lookup("DATA_DIR") {
            event!(Level::DEBUG, "data directory overridden to \"{}\"", v);
            app.data_dir = v.into();
        }
    }

    /// The files of the named dataset, resolved against the data directory.
    pub fn dataset_paths(&self, name: &str) -> Result<Vec<PathBuf>> {
        let files = match self.datasets.0.get(name) {
            Some(files) => files,
            None => bail!(
                "no dataset called \"{}\" (known datasets: {})",
                name,
                self.dataset_names().join(", ")
            ),
        };
        ensure!(!files.is_empty(), "dataset \"{}\" has no files", name);
        Ok(files
            .iter()
            .map(|file| self.app.data_dir.join(file))
            .collect())
    }

    pub fn dataset_names(&self) -> Vec<&str> {
        self.datasets.0.keys().map(|k| k.as_str()).collect()
    }
}
