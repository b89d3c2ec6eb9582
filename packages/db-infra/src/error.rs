use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Point at which an operator declined to continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmStage {
    /// Dry-run warning shown before any backup is taken.
    DryRun,
    /// Drop-and-restore confirmation after a failed or dry-run migration.
    Restore,
    /// Drop-and-load confirmation of the plain load task.
    Load,
}

impl fmt::Display for ConfirmStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmStage::DryRun => f.write_str("dry-run"),
            ConfirmStage::Restore => f.write_str("restore"),
            ConfirmStage::Load => f.write_str("load"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SafeMigrateError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database connection must be MySQL (found {engine})")]
    UnsupportedEngine { engine: String },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("mysqldump failed (exit code {exit_code}). Command returned: {}", .output.join("\n"))]
    DumpFailed { exit_code: i32, output: Vec<String> },

    #[error("Writing dump to {} failed: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("MySQL import failed (exit code {exit_code}). Command returned: {}", .output.join("\n"))]
    ImportFailed { exit_code: i32, output: Vec<String> },

    #[error("SQL file to import does not exist: {}", .path.display())]
    SourceMissing { path: PathBuf },

    #[error("Database restore failed, backup preserved at {}: {source}", .backup_path.display())]
    RestoreFailed {
        backup_path: PathBuf,
        #[source]
        source: Box<SafeMigrateError>,
    },

    #[error("Task aborted: {stage} confirmation declined")]
    ConfirmationDeclined { stage: ConfirmStage },

    #[error("Toggling environment '{env}' failed: {message}")]
    EnvToggle { env: String, message: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("There are no files to load data from")]
    NoSqlFiles,

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl SafeMigrateError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit status the CLI reports for this error.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Infrastructure failure raised by a migration engine's `migrate` call.
///
/// Kept apart from `SafeMigrateError` because the orchestrator swallows it and
/// consults the engine's accumulated failures instead.
#[derive(Debug, Error)]
#[error("migration engine error: {message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
