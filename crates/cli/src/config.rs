use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use handset_core::AnalyticsConfig;

/// CLI configuration loaded from TOML file.
///
/// ```toml
/// catalog = "/data/phones.json"
///
/// [analytics.segmentation]
/// restarts = 20
/// seed = 42
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Default catalog path when `--catalog` is not given
    #[serde(default)]
    pub catalog: Option<String>,

    /// Analysis tunables. Keys left out keep their environment or built-in value.
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

impl CliConfig {
    /// Return the default config directory path: ~/.config/handset/
    pub fn default_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("could not determine user config directory")?
            .join("handset");
        Ok(config_dir)
    }

    /// Return the default config file path.
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.toml"))
    }

    /// Load config from the given path, or the default path, layered over
    /// `base` (usually `AnalyticsConfig::from_env()`).
    /// A missing default file yields `base` unchanged; a missing explicit
    /// path is an error.
    pub fn load(path: Option<&str>, base: AnalyticsConfig) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if !config_path.exists() {
            if path.is_some() {
                anyhow::bail!("config file not found: {}", config_path.display());
            }
            debug!(?config_path, "Config file not found, using environment and defaults");
            return Ok(Self {
                catalog: None,
                analytics: base,
            });
        }

        debug!(?config_path, "Loading config");
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read config: {}", config_path.display()))?;
        Self::from_toml(&content, base)
            .with_context(|| format!("failed to parse config: {}", config_path.display()))
    }

    /// Parse TOML text, letting every key it sets win over `base`.
    pub fn from_toml(content: &str, base: AnalyticsConfig) -> Result<Self> {
        let overlay: toml::Value = toml::from_str(content)?;

        let mut merged = toml::Value::try_from(Self {
            catalog: None,
            analytics: base,
        })
        .context("failed to serialize base config")?;
        merge(&mut merged, overlay);

        let config: Self = merged.try_into()?;
        Ok(config)
    }

    /// Resolve the catalog path.
    /// Priority: cli_override > config file.
    pub fn resolve_catalog(&self, cli_override: Option<&str>) -> Result<PathBuf> {
        cli_override
            .or(self.catalog.as_deref())
            .map(PathBuf::from)
            .context("no catalog given: pass --catalog or set `catalog` in the config file")
    }
}

/// Recursively overwrite `base` with every value present in `overlay`.
fn merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handset_core::config::DistanceSpace;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert!(config.catalog.is_none());
        assert_eq!(config.analytics.similarity.top_k, 5);
    }

    #[test]
    fn test_toml_overrides_only_given_keys() {
        let mut base = AnalyticsConfig::default();
        base.segmentation.restarts = 25;
        base.anomaly.outlier_z = 3.0;

        let toml_str = r#"
            catalog = "phones.json"

            [analytics.segmentation]
            seed = 42

            [analytics.anomaly]
            outlier_z = 2.5

            [analytics.similarity]
            distance_space = "normalized"
        "#;
        let config = CliConfig::from_toml(toml_str, base).unwrap();
        assert_eq!(config.catalog.as_deref(), Some("phones.json"));
        assert_eq!(config.analytics.segmentation.seed, Some(42));
        assert_eq!(config.analytics.segmentation.restarts, 25);
        assert_eq!(config.analytics.anomaly.outlier_z, 2.5);
        assert_eq!(config.analytics.similarity.distance_space, DistanceSpace::Normalized);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[analytics.similarity]\ntop_k = 9\n").unwrap();

        let config = CliConfig::load(path.to_str(), AnalyticsConfig::default()).unwrap();
        assert_eq!(config.analytics.similarity.top_k, 9);
        assert_eq!(config.analytics.segmentation.restarts, 10);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(CliConfig::load(path.to_str(), AnalyticsConfig::default()).is_err());
    }

    #[test]
    fn test_bad_toml_is_error() {
        assert!(CliConfig::from_toml("[analytics", AnalyticsConfig::default()).is_err());
        assert!(CliConfig::from_toml(
            "[analytics.similarity]\ntop_k = \"many\"\n",
            AnalyticsConfig::default()
        )
        .is_err());
    }

    #[test]
    fn test_resolve_catalog() {
        let config = CliConfig {
            catalog: Some("from-file.json".to_string()),
            analytics: AnalyticsConfig::default(),
        };
        assert_eq!(
            config.resolve_catalog(Some("flag.json")).unwrap(),
            PathBuf::from("flag.json")
        );
        assert_eq!(config.resolve_catalog(None).unwrap(), PathBuf::from("from-file.json"));
        assert!(CliConfig::default().resolve_catalog(None).is_err());
    }
}
