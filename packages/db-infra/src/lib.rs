//! Backup-protected schema migrations for MySQL.
//!
//! A full `mysqldump` is taken before migrating; when the migration reports
//! errors (or on a dry run) the database is dropped, recreated and reloaded
//! from that dump. Used by the `safe-migrate` CLI.

pub mod config;
pub mod error;
pub mod infra;
pub mod orchestrate;

pub use config::{ClientBinary, DatabaseTarget, EngineKind, SafeMigrateConfig};
pub use error::{EngineError, SafeMigrateError};
pub use orchestrate::{RunOutcome, SafeMigrate, SafeMigrateOptions};
