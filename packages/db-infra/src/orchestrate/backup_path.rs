//! Where backups are written.

use std::fs;
use std::path::{Path, PathBuf};

use time::format_description;
use time::OffsetDateTime;

use crate::error::SafeMigrateError;

/// Date format meaning "Unix epoch seconds".
pub const EPOCH_SECONDS: &str = "U";

/// Parts appended to the timestamp of a generated filename.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackupName<'a> {
    /// Environment name, plus `.tmp` for backups that will be deleted.
    pub suffix: Option<&'a str>,
    /// Database name, only given when it differs from the default connection.
    pub database: Option<&'a str>,
}

/// Suffix used by the safe-migrate flow: `<env>` or `<env>.tmp`.
pub fn migrate_suffix(env: &str, keep_backup: bool) -> String {
    if keep_backup {
        env.to_string()
    } else {
        format!("{env}.tmp")
    }
}

pub fn validate_date_format(date_format: &str) -> Result<(), SafeMigrateError> {
    if date_format == EPOCH_SECONDS {
        return Ok(());
    }
    format_description::parse(date_format).map(|_| ()).map_err(|e| {
        SafeMigrateError::config(format!("invalid backup date format '{date_format}': {e}"))
    })
}

pub fn format_timestamp(now: OffsetDateTime, date_format: &str) -> Result<String, SafeMigrateError> {
    if date_format == EPOCH_SECONDS {
        return Ok(now.unix_timestamp().to_string());
    }
    let items = format_description::parse(date_format).map_err(|e| {
        SafeMigrateError::config(format!("invalid backup date format '{date_format}': {e}"))
    })?;
    now.format(items.as_slice())
        .map_err(|e| SafeMigrateError::config(format!("failed to format backup timestamp: {e}")))
}

/// Resolve the file a backup is written to.
///
/// `base_dir` is created when missing. A relative `target` is taken relative
/// to `base_dir` and its parent directories are created. When the resolved
/// path is a directory a `<timestamp>[_<suffix>][_<database>].sql` filename is
/// generated inside it.
pub fn resolve_backup_path(
    base_dir: &Path,
    target: Option<&Path>,
    name: &BackupName<'_>,
    date_format: &str,
    now: OffsetDateTime,
) -> Result<PathBuf, SafeMigrateError> {
    create_dirs(base_dir)?;

    let mut path = base_dir.to_path_buf();

    if let Some(target) = target {
        let candidate = if target.is_absolute() {
            target.to_path_buf()
        } else {
            base_dir.join(target)
        };
        if let Some(parent) = candidate.parent() {
            create_dirs(parent)?;
        }
        path = candidate;
    }

    if path.is_dir() {
        let mut filename = format_timestamp(now, date_format)?;
        if let Some(suffix) = name.suffix.filter(|s| !s.is_empty()) {
            filename.push('_');
            filename.push_str(suffix);
        }
        if let Some(database) = name.database.filter(|s| !s.is_empty()) {
            filename.push('_');
            filename.push_str(database);
        }
        filename.push_str(".sql");
        path = path.join(filename);
    }

    Ok(path)
}

fn create_dirs(dir: &Path) -> Result<(), SafeMigrateError> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir)
        .map_err(|e| SafeMigrateError::io(format!("failed to create directory {}", dir.display()), e))
}
