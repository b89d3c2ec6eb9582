use std::path::Path;

use tracing::{debug, warn};

use crate::config::connection::ConnectionDescriptor;
use crate::error::SafeMigrateError;
use crate::infra::mysql::args::connection_args;
use crate::infra::process::{CommandSpec, ProcessRunner};

/// Inputs for a single `mysqldump` run.
#[derive(Debug, Clone, Copy)]
pub struct DumpSpec<'a> {
    pub executable: &'a str,
    pub extra_arguments: &'a [String],
    pub connection: &'a ConnectionDescriptor,
    pub target_path: &'a Path,
}

/// Exports a database to a SQL file with `mysqldump`.
pub struct DumpEngine<'r> {
    runner: &'r dyn ProcessRunner,
}

impl<'r> DumpEngine<'r> {
    pub fn new(runner: &'r dyn ProcessRunner) -> Self {
        Self { runner }
    }

    pub fn command(spec: &DumpSpec<'_>) -> CommandSpec {
        CommandSpec::new(
            spec.executable,
            connection_args(spec.connection, spec.extra_arguments),
        )
        .stdout_to(spec.target_path)
    }

    /// Stream a dump into `spec.target_path`.
    ///
    /// On a nonzero exit the partially written target is removed so that no
    /// incomplete file can later be mistaken for a restore point.
    pub async fn export_to(&self, spec: &DumpSpec<'_>) -> Result<(), SafeMigrateError> {
        let command = Self::command(spec);
        let result = self.runner.run(&command).await?;

        if !result.success() {
            if let Err(e) = std::fs::remove_file(spec.target_path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        path = %spec.target_path.display(),
                        error = %e,
                        "failed to remove incomplete dump"
                    );
                }
            }
            return Err(SafeMigrateError::DumpFailed {
                exit_code: result.exit_code,
                output: result.output_lines,
            });
        }

        for line in &result.output_lines {
            debug!(target: "mysqldump", "{line}");
        }

        Ok(())
    }
}
