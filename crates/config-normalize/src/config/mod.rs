//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 hash of the configuration, recorded alongside the
    /// applied migration.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = "
target:
  host: localhost
  database: airbyte
  user: docker
  password: docker
";

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.target.port, 5432);
        assert_eq!(config.target.schema, "public");
        assert_eq!(config.target.ssl_mode, "disable");
        assert_eq!(config.migration.source_table, "airbyte_configs");
        assert_eq!(config.migration.history_schema, "_config_normalize");
        assert!(config.migration.verify_after_run);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", MINIMAL).unwrap();
        file.write_all(b"migration:\n  verify_after_run: false\n").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(!config.migration.verify_after_run);
    }

    #[test]
    fn test_missing_required_field_is_yaml_error() {
        let err = Config::from_yaml("target:\n  host: localhost\n").unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_hash_is_stable() {
        let a = Config::from_yaml(MINIMAL).unwrap();
        let b = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash().len(), 64);
    }
}
