//! Subprocess execution for the MySQL client binaries.
//!
//! Commands are always spawned directly with a discrete argv vector. No shell
//! sits in between, so credentials and paths containing quotes, semicolons or
//! whitespace reach the child process as literal arguments.

use std::fmt;
use std::fs::File;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::error::SafeMigrateError;

/// A command to run, with optional stdin/stdout file redirection.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// File fed to the child's stdin.
    pub stdin: Option<PathBuf>,
    /// File the child's stdout is streamed into instead of being captured.
    pub stdout: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            stdin: None,
            stdout: None,
        }
    }

    pub fn stdin_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }
}

/// Renders the command line for logs with `--password=` values masked.
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.starts_with("--password=") {
                f.write_str(" --password=***")?;
            } else {
                write!(f, " {arg:?}")?;
            }
        }
        if let Some(path) = &self.stdin {
            write!(f, " < {}", path.display())?;
        }
        if let Some(path) = &self.stdout {
            write!(f, " > {}", path.display())?;
        }
        Ok(())
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandSpec({self})")
    }
}

/// Exit status and captured output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_code: i32,
    /// Interleaved stdout and stderr lines, in arrival order.
    pub output_lines: Vec<String>,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands to completion.
///
/// A nonzero exit is reported through `CommandResult`, not as an error; the
/// caller decides what it means.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandResult, SafeMigrateError>;
}

/// `ProcessRunner` backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandResult, SafeMigrateError> {
        debug!(command = %spec, "spawning");

        let mut command = Command::new(&spec.program);
        command.args(&spec.args);

        match &spec.stdin {
            Some(path) => {
                let file = File::open(path).map_err(|e| match e.kind() {
                    ErrorKind::NotFound => SafeMigrateError::SourceMissing { path: path.clone() },
                    _ => SafeMigrateError::io(format!("failed to open {}", path.display()), e),
                })?;
                command.stdin(Stdio::from(file));
            }
            None => {
                command.stdin(Stdio::null());
            }
        }

        match &spec.stdout {
            Some(path) => {
                let file = File::create(path).map_err(|source| SafeMigrateError::WriteFailed {
                    path: path.clone(),
                    source,
                })?;
                command.stdout(Stdio::from(file));
            }
            None => {
                command.stdout(Stdio::piped());
            }
        }
        command.stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|source| SafeMigrateError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let stdout = child.stdout.take().map(BufReader::new);
        let stderr = child.stderr.take().map(BufReader::new);
        let output_lines = collect_interleaved(stdout, stderr)
            .await
            .map_err(|e| SafeMigrateError::io(format!("failed reading output of {}", spec.program), e))?;

        let status = child
            .wait()
            .await
            .map_err(|e| SafeMigrateError::io(format!("failed waiting for {}", spec.program), e))?;

        // killed by a signal has no code
        let exit_code = status.code().unwrap_or(-1);
        debug!(program = %spec.program, exit_code, lines = output_lines.len(), "process exited");

        Ok(CommandResult {
            exit_code,
            output_lines,
        })
    }
}

/// Read both streams until EOF, recording lines in the order they arrive.
///
/// Each stream keeps its own buffer across iterations so bytes read by a
/// branch that loses the `select!` race are not dropped.
async fn collect_interleaved<A, B>(
    mut stdout: Option<A>,
    mut stderr: Option<B>,
) -> std::io::Result<Vec<String>>
where
    A: AsyncBufRead + Unpin,
    B: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();
    let mut stdout_open = stdout.is_some();
    let mut stderr_open = stderr.is_some();
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();

    while stdout_open || stderr_open {
        tokio::select! {
            line = next_line(&mut stdout, &mut stdout_buf), if stdout_open => match line? {
                Some(line) => lines.push(line),
                None => stdout_open = false,
            },
            line = next_line(&mut stderr, &mut stderr_buf), if stderr_open => match line? {
                Some(line) => lines.push(line),
                None => stderr_open = false,
            },
        }
    }

    Ok(lines)
}

async fn next_line<R>(reader: &mut Option<R>, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let Some(reader) = reader.as_mut() else {
        return Ok(None);
    };
    if reader.read_until(b'\n', buf).await? == 0 && buf.is_empty() {
        return Ok(None);
    }
    let mut line = std::mem::take(buf);
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
    Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}
