use std::path::Path;

use tracing::debug;

use crate::config::connection::ConnectionDescriptor;
use crate::error::SafeMigrateError;
use crate::infra::mysql::args::connection_args;
use crate::infra::process::{CommandSpec, ProcessRunner};

/// Inputs for a single `mysql` import.
#[derive(Debug, Clone, Copy)]
pub struct RestoreSpec<'a> {
    pub executable: &'a str,
    pub extra_arguments: &'a [String],
    pub connection: &'a ConnectionDescriptor,
    pub source_path: &'a Path,
}

/// Replays a SQL file into a database through the `mysql` client.
pub struct RestoreEngine<'r> {
    runner: &'r dyn ProcessRunner,
}

impl<'r> RestoreEngine<'r> {
    pub fn new(runner: &'r dyn ProcessRunner) -> Self {
        Self { runner }
    }

    pub fn command(spec: &RestoreSpec<'_>) -> CommandSpec {
        CommandSpec::new(
            spec.executable,
            connection_args(spec.connection, spec.extra_arguments),
        )
        .stdin_from(spec.source_path)
    }

    pub async fn import_from(&self, spec: &RestoreSpec<'_>) -> Result<(), SafeMigrateError> {
        if !spec.source_path.is_file() {
            return Err(SafeMigrateError::SourceMissing {
                path: spec.source_path.to_path_buf(),
            });
        }

        let result = self.runner.run(&Self::command(spec)).await?;
        if !result.success() {
            return Err(SafeMigrateError::ImportFailed {
                exit_code: result.exit_code,
                output: result.output_lines,
            });
        }

        for line in &result.output_lines {
            debug!(target: "mysql", "{line}");
        }

        Ok(())
    }
}
