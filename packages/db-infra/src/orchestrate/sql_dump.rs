use std::path::PathBuf;

use tracing::{error, info};

use crate::config::connection::DatabaseTarget;
use crate::config::settings::SafeMigrateConfig;
use crate::error::SafeMigrateError;
use crate::infra::mysql::{DumpEngine, DumpSpec};
use crate::infra::process::ProcessRunner;
use crate::orchestrate::backup_path::{resolve_backup_path, BackupName};
use crate::orchestrate::clock::Clock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlDumpOptions {
    pub target: Option<PathBuf>,
    /// Dump another database on the same server.
    pub database: Option<String>,
    pub env: String,
}

/// Export the database to a resolved path and return that path.
pub async fn dump_database(
    config: &SafeMigrateConfig,
    runner: &dyn ProcessRunner,
    clock: &dyn Clock,
    target: &DatabaseTarget,
    options: &SqlDumpOptions,
) -> Result<PathBuf, SafeMigrateError> {
    if !target.engine.is_mysql() {
        return Err(SafeMigrateError::UnsupportedEngine {
            engine: target.engine.to_string(),
        });
    }

    let override_db = options
        .database
        .as_deref()
        .filter(|db| !db.is_empty() && Some(*db) != target.descriptor.database());
    let connection = match override_db {
        Some(db) => target.descriptor.with_database(Some(db.to_string())),
        None => target.descriptor.clone(),
    };

    let path = resolve_backup_path(
        &config.sql_dir,
        options.target.as_deref(),
        &BackupName {
            suffix: Some(&options.env),
            database: override_db,
        },
        &config.date_format,
        clock.now(),
    )?;

    info!("Dumping database to {}", path.display());
    let spec = DumpSpec {
        executable: &config.mysqldump.path,
        extra_arguments: &config.mysqldump.extra_args,
        connection: &connection,
        target_path: &path,
    };
    if let Err(e) = DumpEngine::new(runner).export_to(&spec).await {
        error!("Dumping MySQL database failed: {e}");
        return Err(e);
    }
    info!("Database dump completed");

    Ok(path)
}
