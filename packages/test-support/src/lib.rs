//! Fakes and helpers for exercising the safe-migrate flow without a MySQL
//! server or client binaries.

pub mod fakes;
pub mod logging;

pub use fakes::{
    mysql_target, FakeAdmin, FakeEngine, FakeRunner, FixedClock, InMemoryServer,
    RecordingEnvToggle, ScriptedPrompter,
};
