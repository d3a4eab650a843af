//! Configuration for the geo databases.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::language::{LanguageMap, LanguageRule};
use crate::{Error, Result};

/// Default result cache capacity (number of addresses).
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Name of the directory tree below the data root.
pub const DATA_DIR_NAME: &str = "geo-db";

/// Which database answers lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Whole dataset held in memory
    Memory,
    /// Directory tree on disk
    #[default]
    Sharded,
}

/// Geo database configuration.
///
/// Loaded from YAML or JSON. Every key is optional:
///
/// ```yaml
/// data_root: /var/lib/gipstore
/// csv_file: geo-db.csv.gz
/// backend: sharded
/// cache_capacity: 10000
/// languages:
///   - { country: BE, state: Wallonia, language: fr }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// Directory holding the dataset and the `geo-db` tree
    #[serde(alias = "geo-db")]
    pub data_root: PathBuf,
    /// Dataset file, relative to `data_root` unless absolute
    #[serde(alias = "geo-db-csv")]
    pub csv_file: String,
    pub backend: Backend,
    /// Result cache capacity, 0 disables the cache
    pub cache_capacity: usize,
    /// Rules added to the built-in language map
    pub languages: Vec<LanguageRule>,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            csv_file: "geo-db.csv".to_string(),
            backend: Backend::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            languages: Vec::new(),
        }
    }
}

impl GeoConfig {
    /// Configuration rooted at `data_root` with defaults elsewhere.
    pub fn with_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            ..Self::default()
        }
    }

    /// Load from a file; `.json` files are parsed as JSON, anything else
    /// as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let config = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_yaml_str(&content)?
        };
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()
    }

    fn validate(self) -> Result<Self> {
        if self.csv_file.trim().is_empty() {
            return Err(Error::Config("csv_file must not be empty".to_string()));
        }
        if let Some(rule) = self
            .languages
            .iter()
            .find(|r| r.country.is_empty() || r.language.is_empty())
        {
            return Err(Error::Config(format!(
                "language rule needs country and language: {:?}",
                rule
            )));
        }
        Ok(self)
    }

    /// Root of the sharded directory tree.
    pub fn data_dir(&self) -> PathBuf {
        self.data_root.join(DATA_DIR_NAME)
    }

    /// Location of the dataset file.
    pub fn csv_path(&self) -> PathBuf {
        self.data_root.join(&self.csv_file)
    }

    /// Built-in language map extended with the configured rules.
    pub fn language_map(&self) -> LanguageMap {
        let mut map = LanguageMap::with_defaults();
        map.apply(&self.languages);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GeoConfig::default();
        assert_eq!(config.data_dir(), Path::new("./geo-db"));
        assert_eq!(config.csv_path(), Path::new("./geo-db.csv"));
        assert_eq!(config.backend, Backend::Sharded);
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn test_yaml() {
        let yaml = r#"
data_root: /srv/geo
csv_file: dataset.csv.gz
backend: memory
languages:
  - country: BE
    state: Wallonia
    language: fr
  - country: NL
    language: nl
"#;
        let config = GeoConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.data_dir(), Path::new("/srv/geo/geo-db"));
        assert_eq!(config.csv_path(), Path::new("/srv/geo/dataset.csv.gz"));
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert_eq!(config.languages[1].state, "");

        let map = config.language_map();
        assert_eq!(map.lookup("BE", "Wallonia"), "fr");
        assert_eq!(map.lookup("CH", "Vaud"), "fr");
    }

    #[test]
    fn test_legacy_keys() {
        let config = GeoConfig::from_yaml_str("geo-db: /opt/data\ngeo-db-csv: ip.csv\n").unwrap();
        assert_eq!(config.csv_path(), Path::new("/opt/data/ip.csv"));
    }

    #[test]
    fn test_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geo.json");
        fs::write(&path, r#"{"data_root": "/tmp/x", "cache_capacity": 0}"#).unwrap();

        let config = GeoConfig::load(&path).unwrap();
        assert_eq!(config.data_root, PathBuf::from("/tmp/x"));
        assert_eq!(config.cache_capacity, 0);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            GeoConfig::from_yaml_str("csv_file: ''"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            GeoConfig::from_yaml_str("languages: [{country: '', language: fr}]"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            GeoConfig::from_yaml_str("backend: [1, 2]"),
            Err(Error::Yaml(_))
        ));
    }
}
