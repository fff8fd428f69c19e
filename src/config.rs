// ⚙️ Configuration - grocery.toml plus environment overrides

use crate::error::{GroceryError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Selects the config file
pub const CONFIG_ENV: &str = "GROCERY_CONFIG";

/// Overrides `storage.database_path`
pub const DATABASE_ENV: &str = "GROCERY_DB";

pub const DEFAULT_CONFIG_FILE: &str = "grocery.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroceryConfig {
    pub storage: StorageConfig,
    pub categories: CategoryConfig,
    pub logging: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            database_path: PathBuf::from("grocery.db"),
        }
    }
}

/// Category rules file; built-in rules when unset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    pub rules_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "grocery_list=info".to_string(),
            json: false,
        }
    }
}

impl GroceryConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| GroceryError::Config {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| GroceryError::Config {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Resolve the effective configuration.
    ///
    /// An explicit `config_path` must exist. Without one the default file
    /// is used when present, else built-in defaults. `database_override`
    /// replaces the configured database path.
    pub fn resolve(config_path: Option<&Path>, database_override: Option<&str>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE)?,
            None => Self::default(),
        };

        if let Some(db) = database_override.map(str::trim).filter(|db| !db.is_empty()) {
            config.storage.database_path = PathBuf::from(db);
        }

        config.validate()?;
        Ok(config)
    }

    /// `resolve` driven by `GROCERY_CONFIG` and `GROCERY_DB`
    pub fn load() -> Result<Self> {
        let config_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let database_override = std::env::var(DATABASE_ENV).ok();
        Self::resolve(config_path.as_deref(), database_override.as_deref())
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.database_path.as_os_str().is_empty() {
            return Err(GroceryError::Config {
                message: "storage.database_path must not be empty".to_string(),
            });
        }
        if self.logging.level.trim().is_empty() {
            return Err(GroceryError::Config {
                message: "logging.level must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = GroceryConfig::from_toml_str("").unwrap();
        assert_eq!(config, GroceryConfig::default());
        assert_eq!(config.storage.database_path, PathBuf::from("grocery.db"));
        assert!(config.categories.rules_path.is_none());
        assert!(!config.logging.json);
    }

    #[test]
    fn test_partial_file() {
        let config = GroceryConfig::from_toml_str(
            r#"
            [storage]
            database_path = "/var/lib/grocery/lists.db"

            [logging]
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(
            config.storage.database_path,
            PathBuf::from("/var/lib/grocery/lists.db")
        );
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "grocery_list=info");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = GroceryConfig::from_toml_str("[storage\ndatabase_path = 1").unwrap_err();
        assert!(matches!(err, GroceryError::Config { .. }));
    }

    #[test]
    fn test_resolve_from_file_with_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[storage]\ndatabase_path = \"from-file.db\"\n\n[categories]\nrules_path = \"rules.json\""
        )
        .unwrap();

        let config = GroceryConfig::resolve(Some(file.path()), None).unwrap();
        assert_eq!(config.storage.database_path, PathBuf::from("from-file.db"));
        assert_eq!(config.categories.rules_path, Some(PathBuf::from("rules.json")));

        let config = GroceryConfig::resolve(Some(file.path()), Some("override.db")).unwrap();
        assert_eq!(config.storage.database_path, PathBuf::from("override.db"));

        // Blank override is ignored
        let config = GroceryConfig::resolve(Some(file.path()), Some("  ")).unwrap();
        assert_eq!(config.storage.database_path, PathBuf::from("from-file.db"));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let err = GroceryConfig::resolve(Some(Path::new("/nonexistent/grocery.toml")), None)
            .unwrap_err();
        assert!(matches!(err, GroceryError::Config { .. }));
    }

    #[test]
    fn test_validate_rejects_empty_level() {
        let config = GroceryConfig {
            logging: LogConfig {
                level: " ".to_string(),
                json: false,
            },
            ..GroceryConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
