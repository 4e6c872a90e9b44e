//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Target validation
    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }
    if config.target.r#type != "postgres" {
        return Err(MigrateError::Config(format!(
            "target.type must be 'postgres', got '{}'",
            config.target.r#type
        )));
    }
    match config.target.ssl_mode.as_str() {
        "disable" | "prefer" => {}
        other => {
            return Err(MigrateError::Config(format!(
                "target.ssl_mode must be 'disable' or 'prefer', got '{}'",
                other
            )))
        }
    }
    check_identifier("target.schema", &config.target.schema)?;

    // Migration config validation
    check_identifier("migration.source_table", &config.migration.source_table)?;
    check_identifier("migration.history_schema", &config.migration.history_schema)?;
    if config.migration.history_schema == config.target.schema {
        return Err(MigrateError::Config(
            "migration.history_schema must differ from target.schema".into(),
        ));
    }
    if config.migration.max_connections == 0 {
        return Err(MigrateError::Config(
            "migration.max_connections must be at least 1".into(),
        ));
    }

    Ok(())
}

/// Identifiers are spliced into DDL, so restrict them to plain names.
fn check_identifier(field: &str, value: &str) -> Result<()> {
    let mut chars = value.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest || value.len() > 63 {
        return Err(MigrateError::Config(format!(
            "{} must be a plain identifier of at most 63 characters, got '{}'",
            field, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MigrationConfig, TargetConfig};

    fn valid_config() -> Config {
        Config {
            target: TargetConfig {
                r#type: "postgres".to_string(),
                host: "localhost".to_string(),
                port: 5432,
                database: "airbyte".to_string(),
                user: "docker".to_string(),
                password: "password".to_string(),
                schema: "public".to_string(),
                ssl_mode: "disable".to_string(),
            },
            migration: MigrationConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_target_host() {
        let mut config = valid_config();
        config.target.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_wrong_target_type() {
        let mut config = valid_config();
        config.target.r#type = "mssql".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_tls_ssl_mode_rejected() {
        let mut config = valid_config();
        config.target.ssl_mode = "require".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_schema_must_be_plain_identifier() {
        let mut config = valid_config();
        config.target.schema = "public\"; DROP TABLE x; --".to_string();
        assert!(validate(&config).is_err());

        config.target.schema = "1public".to_string();
        assert!(validate(&config).is_err());

        config.target.schema = "_tenant_1".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_history_schema_cannot_equal_target_schema() {
        let mut config = valid_config();
        config.migration.history_schema = "public".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_single_connection_accepted() {
        let mut config = valid_config();
        config.migration.max_connections = 1;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_connections_rejected() {
        let mut config = valid_config();
        config.migration.max_connections = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.target);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_456"),
            "Debug output should not contain actual password value"
        );
    }
}
