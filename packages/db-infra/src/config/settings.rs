//! Tool configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use crate::config::connection::DatabaseTarget;
use crate::error::SafeMigrateError;

pub const DEFAULT_MYSQLDUMP: &str = "mysqldump";
pub const DEFAULT_MYSQL: &str = "mysql";
pub const DEFAULT_SQL_DIR: &str = "data/sql";
pub const DEFAULT_LOCK_DIR: &str = "data";
/// Unix epoch seconds.
pub const DEFAULT_DATE_FORMAT: &str = "U";

/// External client binary plus the extra arguments configured for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientBinary {
    pub path: String,
    pub extra_args: Vec<String>,
}

/// Configuration passed explicitly into the orchestrator and the plain tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeMigrateConfig {
    pub mysqldump: ClientBinary,
    pub mysql: ClientBinary,
    /// Base directory for generated backups and relative `--target` paths.
    pub sql_dir: PathBuf,
    /// Directory holding `<env>.lck` files for disabled environments.
    pub lock_dir: PathBuf,
    pub date_format: String,
}

impl Default for SafeMigrateConfig {
    fn default() -> Self {
        Self {
            mysqldump: ClientBinary {
                path: DEFAULT_MYSQLDUMP.to_string(),
                extra_args: Vec::new(),
            },
            mysql: ClientBinary {
                path: DEFAULT_MYSQL.to_string(),
                extra_args: Vec::new(),
            },
            sql_dir: PathBuf::from(DEFAULT_SQL_DIR),
            lock_dir: PathBuf::from(DEFAULT_LOCK_DIR),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl SafeMigrateConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, SafeMigrateError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SafeMigrateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mysqldump = ClientBinary {
            path: var("SAFE_MIGRATE_MYSQLDUMP_PATH").unwrap_or_else(|| DEFAULT_MYSQLDUMP.to_string()),
            extra_args: split_args("SAFE_MIGRATE_MYSQLDUMP_ARGS", var("SAFE_MIGRATE_MYSQLDUMP_ARGS"))?,
        };
        let mysql = ClientBinary {
            path: var("SAFE_MIGRATE_MYSQL_PATH").unwrap_or_else(|| DEFAULT_MYSQL.to_string()),
            extra_args: split_args("SAFE_MIGRATE_MYSQL_ARGS", var("SAFE_MIGRATE_MYSQL_ARGS"))?,
        };

        let date_format = var("SAFE_MIGRATE_DATE_FORMAT").unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
        crate::orchestrate::backup_path::validate_date_format(&date_format)?;

        Ok(Self {
            mysqldump,
            mysql,
            sql_dir: var("SAFE_MIGRATE_SQL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SQL_DIR)),
            lock_dir: var("SAFE_MIGRATE_LOCK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCK_DIR)),
            date_format,
        })
    }
}

/// Resolve the database target from `DATABASE_URL`, falling back to a
/// PDO-style `DATABASE_DSN` with `DATABASE_USER`/`DATABASE_PASSWORD`.
pub fn database_target_from_env() -> Result<DatabaseTarget, SafeMigrateError> {
    database_target_from_lookup(|key| env::var(key).ok())
}

pub fn database_target_from_lookup<F>(lookup: F) -> Result<DatabaseTarget, SafeMigrateError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
        return DatabaseTarget::parse_url(&url);
    }
    if let Some(dsn) = lookup("DATABASE_DSN").filter(|v| !v.is_empty()) {
        return Ok(DatabaseTarget::parse_dsn(
            &dsn,
            lookup("DATABASE_USER"),
            lookup("DATABASE_PASSWORD"),
        ));
    }
    Err(SafeMigrateError::config(
        "Required environment variable 'DATABASE_URL' (or 'DATABASE_DSN') is not set",
    ))
}

fn split_args(key: &str, raw: Option<String>) -> Result<Vec<String>, SafeMigrateError> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) => shell_words::split(&raw)
            .map_err(|e| SafeMigrateError::config(format!("{key} could not be parsed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::connection::EngineKind;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = SafeMigrateConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, SafeMigrateConfig::default());
        assert_eq!(config.mysqldump.path, "mysqldump");
        assert_eq!(config.mysql.path, "mysql");
        assert_eq!(config.date_format, "U");
    }

    #[test]
    fn extra_arguments_are_split_shell_style() {
        let config = SafeMigrateConfig::from_lookup(lookup_from(&[
            ("SAFE_MIGRATE_MYSQLDUMP_ARGS", "--single-transaction --routines --where='id > 1'"),
            ("SAFE_MIGRATE_MYSQL_PATH", "/usr/local/bin/mysql"),
        ]))
        .unwrap();
        assert_eq!(
            config.mysqldump.extra_args,
            vec!["--single-transaction", "--routines", "--where=id > 1"]
        );
        assert_eq!(config.mysql.path, "/usr/local/bin/mysql");
        assert!(config.mysql.extra_args.is_empty());
    }

    #[test]
    fn unbalanced_quotes_are_a_config_error() {
        let err = SafeMigrateConfig::from_lookup(lookup_from(&[(
            "SAFE_MIGRATE_MYSQL_ARGS",
            "--init-command='SET x=1",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("SAFE_MIGRATE_MYSQL_ARGS"));
    }

    #[test]
    fn invalid_date_format_is_rejected_up_front() {
        let err = SafeMigrateConfig::from_lookup(lookup_from(&[(
            "SAFE_MIGRATE_DATE_FORMAT",
            "[not-a-component]",
        )]))
        .unwrap_err();
        assert!(matches!(err, SafeMigrateError::Config { .. }));
    }

    #[test]
    fn database_url_wins_over_dsn() {
        let target = database_target_from_lookup(lookup_from(&[
            ("DATABASE_URL", "mysql://u:p@h:1/a"),
            ("DATABASE_DSN", "mysql:host=other;dbname=b"),
        ]))
        .unwrap();
        assert_eq!(target.descriptor.database(), Some("a"));
    }

    #[test]
    fn dsn_uses_separate_credentials() {
        let target = database_target_from_lookup(lookup_from(&[
            ("DATABASE_DSN", "mysql:host=db;dbname=shop"),
            ("DATABASE_USER", "deploy"),
            ("DATABASE_PASSWORD", "pw"),
        ]))
        .unwrap();
        assert_eq!(target.engine, EngineKind::MySql);
        assert_eq!(target.descriptor.username(), Some("deploy"));
        assert_eq!(target.descriptor.password(), Some("pw"));
    }

    #[test]
    fn missing_connection_is_a_config_error() {
        let err = database_target_from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }
}
