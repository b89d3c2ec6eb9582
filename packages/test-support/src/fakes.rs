//! In-memory stand-ins for the seams of the safe-migrate flow.
//!
//! `InMemoryServer` plays the database: `FakeRunner` dumps it into the dump
//! target file and imports stdin files into it, `FakeAdmin` empties it and
//! `FakeEngine` mutates it when migrating. A backup/restore round trip can
//! therefore be checked by comparing server contents.

use std::collections::VecDeque;
use std::fs;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use db_infra::config::{ConnectionDescriptor, DatabaseTarget, EngineKind};
use db_infra::infra::db::{DatabaseAdmin, MigrationEngine, MigrationFailure};
use db_infra::infra::process::{CommandResult, CommandSpec, ProcessRunner};
use db_infra::orchestrate::{Clock, EnvToggle, Prompter};
use db_infra::{EngineError, SafeMigrateError};
use time::OffsetDateTime;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A MySQL target with credentials and a database name.
pub fn mysql_target() -> DatabaseTarget {
    DatabaseTarget {
        engine: EngineKind::MySql,
        descriptor: ConnectionDescriptor::new(
            Some("db.internal".to_string()),
            Some("3306".to_string()),
            Some("app".to_string()),
            Some("app_user".to_string()),
            Some("s3cr3t".to_string()),
        ),
    }
}

#[derive(Debug, Default)]
struct ServerState {
    exists: bool,
    contents: String,
}

/// Shared database state; clones see the same server.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl InMemoryServer {
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                exists: true,
                contents: contents.into(),
            })),
        }
    }

    pub fn contents(&self) -> String {
        lock(&self.state).contents.clone()
    }

    pub fn exists(&self) -> bool {
        lock(&self.state).exists
    }

    pub fn append(&self, sql: &str) {
        lock(&self.state).contents.push_str(sql);
    }

    fn drop_database(&self) {
        let mut state = lock(&self.state);
        state.exists = false;
        state.contents.clear();
    }

    fn create_database(&self) {
        lock(&self.state).exists = true;
    }
}

/// `ProcessRunner` that emulates `mysqldump` and `mysql` against an
/// `InMemoryServer`.
///
/// A command with a stdout file is treated as a dump, one with a stdin file
/// as an import.
#[derive(Debug, Default)]
pub struct FakeRunner {
    server: InMemoryServer,
    dump_exit_code: i32,
    import_exit_code: i32,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub fn new(server: InMemoryServer) -> Self {
        Self {
            server,
            ..Self::default()
        }
    }

    /// Make every dump exit with `code` after writing a partial file.
    pub fn failing_dump(mut self, code: i32) -> Self {
        self.dump_exit_code = code;
        self
    }

    /// Make every import exit with `code` without touching the server.
    pub fn failing_import(mut self, code: i32) -> Self {
        self.import_exit_code = code;
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        lock(&self.calls).clone()
    }

    pub fn dump_calls(&self) -> Vec<CommandSpec> {
        self.calls().into_iter().filter(|c| c.stdout.is_some()).collect()
    }

    pub fn import_calls(&self) -> Vec<CommandSpec> {
        self.calls().into_iter().filter(|c| c.stdin.is_some()).collect()
    }

    fn dump(&self, spec: &CommandSpec) -> Result<CommandResult, SafeMigrateError> {
        let Some(path) = &spec.stdout else {
            return Ok(CommandResult {
                exit_code: 0,
                output_lines: Vec::new(),
            });
        };
        if self.dump_exit_code != 0 {
            fs::write(path, "-- partial dump\n").map_err(|source| SafeMigrateError::WriteFailed {
                path: path.clone(),
                source,
            })?;
            return Ok(CommandResult {
                exit_code: self.dump_exit_code,
                output_lines: vec!["mysqldump: Got error: 1045: Access denied".to_string()],
            });
        }
        fs::write(path, self.server.contents()).map_err(|source| SafeMigrateError::WriteFailed {
            path: path.clone(),
            source,
        })?;
        Ok(CommandResult {
            exit_code: 0,
            output_lines: Vec::new(),
        })
    }

    fn import(&self, spec: &CommandSpec) -> Result<CommandResult, SafeMigrateError> {
        let Some(path) = &spec.stdin else {
            return Ok(CommandResult {
                exit_code: 0,
                output_lines: Vec::new(),
            });
        };
        let sql = fs::read_to_string(path)
            .map_err(|_| SafeMigrateError::SourceMissing { path: path.clone() })?;
        if self.import_exit_code != 0 {
            return Ok(CommandResult {
                exit_code: self.import_exit_code,
                output_lines: vec!["ERROR 1049 (42000): Unknown database".to_string()],
            });
        }
        self.server.append(&sql);
        Ok(CommandResult {
            exit_code: 0,
            output_lines: Vec::new(),
        })
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandResult, SafeMigrateError> {
        lock(&self.calls).push(spec.clone());
        if spec.stdout.is_some() {
            self.dump(spec)
        } else {
            self.import(spec)
        }
    }
}

/// `DatabaseAdmin` that empties or recreates the `InMemoryServer`.
#[derive(Debug, Default)]
pub struct FakeAdmin {
    server: InMemoryServer,
    fail_drop: bool,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeAdmin {
    pub fn new(server: InMemoryServer) -> Self {
        Self {
            server,
            ..Self::default()
        }
    }

    pub fn failing_drop(mut self) -> Self {
        self.fail_drop = true;
        self
    }

    /// `"drop"`/`"create"` in call order.
    pub fn calls(&self) -> Vec<&'static str> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl DatabaseAdmin for FakeAdmin {
    async fn drop_database(&self) -> Result<(), SafeMigrateError> {
        lock(&self.calls).push("drop");
        if self.fail_drop {
            return Err(SafeMigrateError::database("DROP DATABASE failed: access denied"));
        }
        self.server.drop_database();
        Ok(())
    }

    async fn create_database(&self) -> Result<(), SafeMigrateError> {
        lock(&self.calls).push("create");
        self.server.create_database();
        Ok(())
    }
}

/// Scripted `MigrationEngine`.
///
/// `migrate` appends a marker to the server, moves the current version to
/// the target and then reports the scripted failures.
#[derive(Debug)]
pub struct FakeEngine {
    target: DatabaseTarget,
    server: InMemoryServer,
    current: i64,
    latest: i64,
    failures: Vec<MigrationFailure>,
    call_error: Option<String>,
    errors: Vec<MigrationFailure>,
    migrate_calls: Vec<(i64, bool)>,
}

impl FakeEngine {
    pub fn new(server: InMemoryServer, current: i64, latest: i64) -> Self {
        Self {
            target: mysql_target(),
            server,
            current,
            latest,
            failures: Vec::new(),
            call_error: None,
            errors: Vec::new(),
            migrate_calls: Vec::new(),
        }
    }

    pub fn with_target(mut self, target: DatabaseTarget) -> Self {
        self.target = target;
        self
    }

    /// Failures recorded by the next `migrate`.
    pub fn failing_with(mut self, failures: Vec<MigrationFailure>) -> Self {
        self.failures = failures;
        self
    }

    /// Make `migrate` also return an `EngineError`.
    pub fn erroring_call(mut self, message: impl Into<String>) -> Self {
        self.call_error = Some(message.into());
        self
    }

    pub fn migrate_calls(&self) -> &[(i64, bool)] {
        &self.migrate_calls
    }
}

#[async_trait]
impl MigrationEngine for FakeEngine {
    fn connection(&self) -> &DatabaseTarget {
        &self.target
    }

    async fn current_version(&self) -> Result<i64, SafeMigrateError> {
        Ok(self.current)
    }

    fn latest_version(&self) -> i64 {
        self.latest
    }

    async fn migrate(&mut self, target: i64, dry_run: bool) -> Result<(), EngineError> {
        self.migrate_calls.push((target, dry_run));
        self.server.append(&format!("-- migrated to {target}\n"));
        self.current = target;
        self.errors.extend(self.failures.drain(..));
        match &self.call_error {
            Some(message) => Err(EngineError::new(message.clone())),
            None => Ok(()),
        }
    }

    fn errors(&self) -> &[MigrationFailure] {
        &self.errors
    }
}

/// Answers confirmations from a queue; falls back to the prompt default once
/// the queue is empty.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<bool>>,
    prompts: Mutex<Vec<(Vec<String>, bool)>>,
}

impl ScriptedPrompter {
    pub fn answering(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every prompt shown, with its default.
    pub fn prompts(&self) -> Vec<(Vec<String>, bool)> {
        lock(&self.prompts).clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, message: &[String], default: bool) -> bool {
        lock(&self.prompts).push((message.to_vec(), default));
        lock(&self.answers).pop_front().unwrap_or(default)
    }
}

/// Records `(env, enabled)` toggles.
#[derive(Debug, Default)]
pub struct RecordingEnvToggle {
    fail_disable: bool,
    calls: Mutex<Vec<(String, bool)>>,
}

impl RecordingEnvToggle {
    pub fn failing_disable() -> Self {
        Self {
            fail_disable: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, bool)> {
        lock(&self.calls).clone()
    }
}

impl EnvToggle for RecordingEnvToggle {
    fn set_enabled(&self, env: &str, enabled: bool) -> Result<(), SafeMigrateError> {
        lock(&self.calls).push((env.to_string(), enabled));
        if self.fail_disable && !enabled {
            return Err(SafeMigrateError::EnvToggle {
                env: env.to_string(),
                message: "lock directory is read-only".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl FixedClock {
    pub fn at_unix(seconds: i64) -> Self {
        Self(OffsetDateTime::from_unix_timestamp(seconds).unwrap_or(OffsetDateTime::UNIX_EPOCH))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}
