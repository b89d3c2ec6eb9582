#![allow(dead_code)]

// tests/common/mod.rs
use std::path::PathBuf;

use db_infra::{SafeMigrate, SafeMigrateConfig};
use tempfile::TempDir;
use test_support::{
    FakeAdmin, FakeRunner, FixedClock, InMemoryServer, RecordingEnvToggle, ScriptedPrompter,
};

// Logging is auto-installed for every test binary
#[ctor::ctor]
fn init_logging() {
    test_support::logging::init();
}

/// 2023-11-14T22:13:20Z
pub const NOW: i64 = 1_700_000_000;

/// Scratch directories plus one fake per seam, all sharing one in-memory
/// server.
pub struct Harness {
    pub dir: TempDir,
    pub config: SafeMigrateConfig,
    pub server: InMemoryServer,
    pub runner: FakeRunner,
    pub admin: FakeAdmin,
    pub prompter: ScriptedPrompter,
    pub toggle: RecordingEnvToggle,
    pub clock: FixedClock,
}

impl Harness {
    pub fn new(seed: &str) -> Self {
        Self::with_prompter(seed, ScriptedPrompter::default())
    }

    pub fn with_prompter(seed: &str, prompter: ScriptedPrompter) -> Self {
        let dir = tempfile::tempdir().expect("create scratch dir");
        let config = SafeMigrateConfig {
            sql_dir: dir.path().join("sql"),
            lock_dir: dir.path().join("lock"),
            ..SafeMigrateConfig::default()
        };
        let server = InMemoryServer::with_contents(seed);
        Self {
            dir,
            config,
            runner: FakeRunner::new(server.clone()),
            admin: FakeAdmin::new(server.clone()),
            server,
            prompter,
            toggle: RecordingEnvToggle::default(),
            clock: FixedClock::at_unix(NOW),
        }
    }

    pub fn with_runner(mut self, build: impl FnOnce(InMemoryServer) -> FakeRunner) -> Self {
        self.runner = build(self.server.clone());
        self
    }

    pub fn with_admin(mut self, build: impl FnOnce(InMemoryServer) -> FakeAdmin) -> Self {
        self.admin = build(self.server.clone());
        self
    }

    pub fn with_toggle(mut self, toggle: RecordingEnvToggle) -> Self {
        self.toggle = toggle;
        self
    }

    pub fn sql_dir(&self) -> PathBuf {
        self.config.sql_dir.clone()
    }

    pub fn safe_migrate(&self) -> SafeMigrate<'_> {
        SafeMigrate {
            config: &self.config,
            runner: &self.runner,
            admin: &self.admin,
            prompter: &self.prompter,
            env_toggle: &self.toggle,
            clock: &self.clock,
        }
    }
}
