pub mod backup_path;
pub mod clock;
pub mod env_toggle;
pub mod prompt;
pub mod report;
pub mod restore;
pub mod safe_migrate;
pub mod sql_dump;
pub mod sql_load;

pub use backup_path::{migrate_suffix, resolve_backup_path, BackupName};
pub use clock::{Clock, SystemClock};
pub use env_toggle::{EnvToggle, LockFileToggle};
pub use prompt::{ConsolePrompter, Prompter};
pub use report::{log_migration_errors, render_migration_errors};
pub use restore::drop_and_restore;
pub use safe_migrate::{
    resolve_target_version, BackupArtifact, MigrationOutcome, RunOutcome, SafeMigrate,
    SafeMigrateOptions,
};
pub use sql_dump::{dump_database, SqlDumpOptions};
pub use sql_load::{collect_sql_files, load_database, SqlLoadOptions};
