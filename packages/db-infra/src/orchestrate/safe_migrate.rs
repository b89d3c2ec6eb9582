//! Backup, migrate, and restore on failure or dry run.
//!
//! MySQL commits DDL implicitly, so a failed migration cannot be rolled back
//! by a transaction. The database is dumped first and reloaded from that dump
//! whenever the migration reports errors or the run is a dry run.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::config::connection::DatabaseTarget;
use crate::config::settings::SafeMigrateConfig;
use crate::error::{ConfirmStage, SafeMigrateError};
use crate::infra::db::{DatabaseAdmin, MigrationEngine, MigrationFailure};
use crate::infra::mysql::{DumpEngine, DumpSpec, RestoreEngine, RestoreSpec};
use crate::infra::process::ProcessRunner;
use crate::orchestrate::backup_path::{migrate_suffix, resolve_backup_path, BackupName};
use crate::orchestrate::clock::Clock;
use crate::orchestrate::env_toggle::EnvToggle;
use crate::orchestrate::prompt::Prompter;
use crate::orchestrate::report::log_migration_errors;
use crate::orchestrate::restore::drop_and_restore;

/// Options of one safe-migrate run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeMigrateOptions {
    /// Explicit target version; wins over `up`/`down`.
    pub version: Option<i64>,
    /// Backup file or directory, relative to the SQL directory unless absolute.
    pub target: Option<PathBuf>,
    pub no_confirmation: bool,
    pub keep_backup: bool,
    pub disable_env: bool,
    pub dry_run: bool,
    pub up: bool,
    pub down: bool,
    pub env: String,
    /// Render migration errors with their traces.
    pub verbose: bool,
}

impl Default for SafeMigrateOptions {
    fn default() -> Self {
        Self {
            version: None,
            target: None,
            no_confirmation: false,
            keep_backup: false,
            disable_env: false,
            dry_run: false,
            up: false,
            down: false,
            env: "dev".to_string(),
            verbose: false,
        }
    }
}

/// The dump a run took; deleted in cleanup unless `keep`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub path: PathBuf,
    pub keep: bool,
}

impl BackupArtifact {
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// What happened after a backup was taken and the migration attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub from_version: i64,
    pub to_version: i64,
    pub dry_run: bool,
    pub restored: bool,
    pub backup: BackupArtifact,
    pub errors: Vec<MigrationFailure>,
}

impl MigrationOutcome {
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Target equals current version; nothing was touched.
    AlreadyAtVersion { version: i64 },
    Completed(MigrationOutcome),
    /// The engine still reports errors after the database was restored.
    MigrationFailed(MigrationOutcome),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::AlreadyAtVersion { .. } | RunOutcome::Completed(_) => 0,
            RunOutcome::MigrationFailed(_) => 1,
        }
    }
}

/// Explicit version, else current ± 1 for `up`/`down`, else latest.
pub fn resolve_target_version(current: i64, latest: i64, options: &SafeMigrateOptions) -> i64 {
    if let Some(version) = options.version {
        version
    } else if options.up {
        current + 1
    } else if options.down {
        current - 1
    } else {
        latest
    }
}

/// Collaborators of the safe-migrate flow.
pub struct SafeMigrate<'a> {
    pub config: &'a SafeMigrateConfig,
    pub runner: &'a dyn ProcessRunner,
    pub admin: &'a dyn DatabaseAdmin,
    pub prompter: &'a dyn Prompter,
    pub env_toggle: &'a dyn EnvToggle,
    pub clock: &'a dyn Clock,
}

impl<'a> SafeMigrate<'a> {
    pub async fn run(
        &self,
        engine: &mut dyn MigrationEngine,
        options: &SafeMigrateOptions,
    ) -> Result<RunOutcome, SafeMigrateError> {
        let from = engine.current_version().await?;
        let to = resolve_target_version(from, engine.latest_version(), options);

        if from == to {
            info!("Already at migration version {to}");
            return Ok(RunOutcome::AlreadyAtVersion { version: to });
        }

        let target = engine.connection().clone();
        if !target.engine.is_mysql() {
            error!("Database connection must be MySQL");
            return Err(SafeMigrateError::UnsupportedEngine {
                engine: target.engine.to_string(),
            });
        }

        if options.disable_env {
            if let Err(e) = self.env_toggle.set_enabled(&options.env, false) {
                error!("Disabling failed, task aborting: {e}");
                return Err(e);
            }
        }

        let result = self.backup_and_migrate(engine, &target, from, to, options).await;

        // every exit path re-enables the environment
        if options.disable_env {
            if let Err(e) = self.env_toggle.set_enabled(&options.env, true) {
                error!("Re-enabling environment failed: {e}");
            }
        }

        result
    }

    async fn backup_and_migrate(
        &self,
        engine: &mut dyn MigrationEngine,
        target: &DatabaseTarget,
        from: i64,
        to: i64,
        options: &SafeMigrateOptions,
    ) -> Result<RunOutcome, SafeMigrateError> {
        let mut no_confirmation = options.no_confirmation;

        if options.dry_run && !no_confirmation {
            if !self.prompter.confirm(&dry_run_warning(&options.env), false) {
                info!("Task aborted");
                return Err(SafeMigrateError::ConfirmationDeclined {
                    stage: ConfirmStage::DryRun,
                });
            }
            no_confirmation = true;
        }

        let suffix = migrate_suffix(&options.env, options.keep_backup);
        let backup = BackupArtifact {
            path: resolve_backup_path(
                &self.config.sql_dir,
                options.target.as_deref(),
                &BackupName {
                    suffix: Some(&suffix),
                    database: None,
                },
                &self.config.date_format,
                self.clock.now(),
            )?,
            keep: options.keep_backup,
        };

        info!("Dumping database to {}", backup.path.display());
        let dump = DumpSpec {
            executable: &self.config.mysqldump.path,
            extra_arguments: &self.config.mysqldump.extra_args,
            connection: &target.descriptor,
            target_path: &backup.path,
        };
        if let Err(e) = DumpEngine::new(self.runner).export_to(&dump).await {
            error!("Dumping MySQL database failed: {e}");
            return Err(e);
        }
        info!("Database dump completed");

        info!(
            "Migrating from version {from} to {to}{}",
            if options.dry_run { " (dry run)" } else { "" }
        );
        if let Err(e) = engine.migrate(to, options.dry_run).await {
            warn!(error = %e, "migration call failed; using the engine's recorded errors");
        }

        let mut restored = false;
        if engine.has_errors() || options.dry_run {
            if !no_confirmation
                && !self
                    .prompter
                    .confirm(&restore_warning(&options.env, &backup.path), true)
            {
                info!("Database restore task aborted");
                info!("Database backup at {} has not been deleted", backup.path.display());
                log_migration_errors(engine.errors(), options.verbose);
                info!("Task aborted");
                return Err(SafeMigrateError::ConfirmationDeclined {
                    stage: ConfirmStage::Restore,
                });
            }

            let restore = RestoreSpec {
                executable: &self.config.mysql.path,
                extra_arguments: &self.config.mysql.extra_args,
                connection: &target.descriptor,
                source_path: &backup.path,
            };
            if let Err(e) = drop_and_restore(self.admin, &RestoreEngine::new(self.runner), &restore).await {
                log_migration_errors(engine.errors(), options.verbose);
                error!("Database restore failed: {e}");
                error!("Database backup at {} has not been deleted", backup.path.display());
                return Err(SafeMigrateError::RestoreFailed {
                    backup_path: backup.path.clone(),
                    source: Box::new(e),
                });
            }
            restored = true;
            info!("Database restored successfully");
        }

        if !backup.keep {
            info!("Deleting backup file");
            remove_backup(&backup.path);
        }

        let outcome = MigrationOutcome {
            from_version: from,
            to_version: to,
            dry_run: options.dry_run,
            restored,
            backup,
            errors: engine.errors().to_vec(),
        };

        if !outcome.succeeded() {
            log_migration_errors(&outcome.errors, options.verbose);
            return Ok(RunOutcome::MigrationFailed(outcome));
        }

        if options.dry_run {
            info!("Dry run complete, database restored to version {from}");
        } else {
            info!("Migration complete");
        }
        Ok(RunOutcome::Completed(outcome))
    }
}

fn remove_backup(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "failed to delete backup file");
    }
}

fn dry_run_warning(env: &str) -> Vec<String> {
    vec![
        "As MySQL auto commits on an alter table the database will be backed up prior to".to_string(),
        "attempting the migration and the backup restored once complete.".to_string(),
        format!(
            "There is the possibility of data loss from writes made while this runs. It is set to run in the {env} environment."
        ),
        String::new(),
        "Are you sure you want to proceed? (y/N)".to_string(),
    ]
}

fn restore_warning(env: &str, backup_path: &Path) -> Vec<String> {
    vec![
        "The migration needs to be reverted and the database can be restored to its previous state.".to_string(),
        format!(
            "To complete the restore the database in the {env} environment will be dropped and the backup file (located at {}) will be used to restore it.",
            backup_path.display()
        ),
        String::new(),
        "Are you sure you want to proceed? (Y/n)".to_string(),
    ]
}
