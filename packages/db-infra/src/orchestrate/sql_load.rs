use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info};
use walkdir::WalkDir;

use crate::config::connection::DatabaseTarget;
use crate::config::settings::SafeMigrateConfig;
use crate::error::{ConfirmStage, SafeMigrateError};
use crate::infra::db::DatabaseAdmin;
use crate::infra::mysql::{RestoreEngine, RestoreSpec};
use crate::infra::process::ProcessRunner;
use crate::orchestrate::prompt::Prompter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlLoadOptions {
    /// Files, or directories searched recursively for `*.sql`.
    pub paths: Vec<PathBuf>,
    /// Import on top of the existing database instead of replacing it.
    pub append: bool,
    pub no_confirmation: bool,
    pub env: String,
}

/// Expand `paths` into the SQL files to import.
///
/// Files are taken as given. Directories contribute every `*.sql` file below
/// them, sorted by file name at each level. Symlinks inside a directory are
/// not followed.
pub fn collect_sql_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, SafeMigrateError> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            files.extend(walk_sql_files(path)?);
        } else {
            return Err(SafeMigrateError::SourceMissing { path: path.clone() });
        }
    }
    if files.is_empty() {
        return Err(SafeMigrateError::NoSqlFiles);
    }
    Ok(files)
}

fn walk_sql_files(dir: &Path) -> Result<Vec<PathBuf>, SafeMigrateError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            SafeMigrateError::io(format!("failed to read directory {}", dir.display()), e.into())
        })?;
        // symlinks are not followed, so a link back up the tree is skipped
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "sql") {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

/// Load SQL files into the database, dropping and recreating it first unless
/// appending. Returns the imported files in order.
pub async fn load_database(
    config: &SafeMigrateConfig,
    runner: &dyn ProcessRunner,
    admin: &dyn DatabaseAdmin,
    prompter: &dyn Prompter,
    target: &DatabaseTarget,
    options: &SqlLoadOptions,
) -> Result<Vec<PathBuf>, SafeMigrateError> {
    if !target.engine.is_mysql() {
        return Err(SafeMigrateError::UnsupportedEngine {
            engine: target.engine.to_string(),
        });
    }

    let files = collect_sql_files(&options.paths)?;

    if !options.append {
        if !options.no_confirmation && !prompter.confirm(&load_warning(&options.env), false) {
            info!("Task aborted");
            return Err(SafeMigrateError::ConfirmationDeclined {
                stage: ConfirmStage::Load,
            });
        }
        admin.drop_database().await?;
        admin.create_database().await?;
    }

    let engine = RestoreEngine::new(runner);
    for file in &files {
        info!("Loading {}", file.display());
        let spec = RestoreSpec {
            executable: &config.mysql.path,
            extra_arguments: &config.mysql.extra_args,
            connection: &target.descriptor,
            source_path: file,
        };
        if let Err(e) = engine.import_from(&spec).await {
            error!("Loading {} failed: {e}", file.display());
            return Err(e);
        }
    }
    info!("Loaded {} file(s)", files.len());

    Ok(files)
}

fn load_warning(env: &str) -> Vec<String> {
    vec![
        format!("The database in the {env} environment will be dropped and recreated before loading."),
        "Any data not contained in the files being loaded will be lost.".to_string(),
        String::new(),
        "Are you sure you want to proceed? (y/N)".to_string(),
    ]
}
