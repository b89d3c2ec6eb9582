use std::marker::PhantomData;

use async_trait::async_trait;
use migration::{MigrationName, MigratorTrait};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr};
use tracing::{error, info};

use crate::config::connection::{DatabaseTarget, EngineKind};
use crate::error::{EngineError, SafeMigrateError};

/// One error accumulated by a migration engine during `migrate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFailure {
    /// Name of the migration that failed, when known.
    pub migration: Option<String>,
    pub message: String,
    /// Verbose rendering of the underlying error.
    pub trace: Option<String>,
}

impl MigrationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            migration: None,
            message: message.into(),
            trace: None,
        }
    }
}

/// The versioned migration engine the orchestrator drives.
///
/// Domain failures are accumulated and read back through `errors()`; the
/// `Err` of `migrate` only signals that the call itself did not complete.
#[async_trait]
pub trait MigrationEngine: Send {
    fn connection(&self) -> &DatabaseTarget;

    async fn current_version(&self) -> Result<i64, SafeMigrateError>;

    fn latest_version(&self) -> i64;

    async fn migrate(&mut self, target: i64, dry_run: bool) -> Result<(), EngineError>;

    fn errors(&self) -> &[MigrationFailure];

    fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }
}

/// `MigrationEngine` over a sea-orm-migration `MigratorTrait`.
///
/// Version `n` means the first `n` migrations returned by
/// `M::migrations()` are applied. sea-orm has no dry-run mode of its own, so a
/// dry run applies the migrations for real and relies on the orchestrator's
/// restore.
pub struct SeaOrmEngine<M> {
    conn: DatabaseConnection,
    target: DatabaseTarget,
    errors: Vec<MigrationFailure>,
    _migrator: PhantomData<fn() -> M>,
}

impl<M: MigratorTrait + 'static> SeaOrmEngine<M> {
    /// The engine kind reported by `connection()` comes from the live
    /// connection's backend, not from the URL scheme.
    pub fn new(conn: DatabaseConnection, target: DatabaseTarget) -> Self {
        let engine = backend_kind(conn.get_database_backend());
        Self {
            conn,
            target: DatabaseTarget {
                engine,
                descriptor: target.descriptor,
            },
            errors: Vec::new(),
            _migrator: PhantomData,
        }
    }

    async fn applied_count(&self) -> Result<i64, DbErr> {
        match M::get_applied_migrations(&self.conn).await {
            Ok(migrations) => Ok(migrations.len() as i64),
            Err(DbErr::Exec(_)) => Ok(0), // Migration table doesn't exist yet
            Err(e) => Err(e),
        }
    }

    /// Name of the migration that was being applied (or reverted) when a
    /// step failed, inferred from how many ended up applied.
    async fn failing_migration(&self, moving_up: bool) -> Option<String> {
        let applied = self.applied_count().await.ok()?;
        let index = if moving_up { applied } else { applied - 1 };
        let index = usize::try_from(index).ok()?;
        M::migrations().get(index).map(|m| m.name().to_string())
    }

    fn record(&mut self, failure: MigrationFailure) -> EngineError {
        error!(
            migration = failure.migration.as_deref().unwrap_or("-"),
            "❌ {}", failure.message
        );
        let err = EngineError::new(failure.message.clone());
        self.errors.push(failure);
        err
    }
}

#[async_trait]
impl<M: MigratorTrait + 'static> MigrationEngine for SeaOrmEngine<M> {
    fn connection(&self) -> &DatabaseTarget {
        &self.target
    }

    async fn current_version(&self) -> Result<i64, SafeMigrateError> {
        self.applied_count()
            .await
            .map_err(|e| SafeMigrateError::database(format!("failed to get applied migrations: {e}")))
    }

    fn latest_version(&self) -> i64 {
        M::migrations().len() as i64
    }

    async fn migrate(&mut self, target: i64, dry_run: bool) -> Result<(), EngineError> {
        let latest = self.latest_version();
        if !(0..=latest).contains(&target) {
            return Err(self.record(MigrationFailure::new(format!(
                "Migration version {target} does not exist (available: 0..={latest})"
            ))));
        }

        let current = match self.applied_count().await {
            Ok(current) => current,
            Err(e) => {
                return Err(self.record(MigrationFailure {
                    migration: None,
                    message: format!("failed to get applied migrations: {e}"),
                    trace: Some(format!("{e:?}")),
                }))
            }
        };

        info!(
            "▶ runner has {} migration(s) defined, {} applied, target {}{}",
            latest,
            current,
            target,
            if dry_run { " (dry run)" } else { "" }
        );

        let moving_up = target > current;
        let steps = u32::try_from((target - current).unsigned_abs()).unwrap_or(u32::MAX);
        let result = if moving_up {
            M::up(&self.conn, Some(steps)).await
        } else if target < current {
            M::down(&self.conn, Some(steps)).await
        } else {
            Ok(())
        };

        match result {
            Ok(()) => {
                if let Ok(applied) = self.applied_count().await {
                    info!("▶ AFTER: {} applied", applied);
                }
                Ok(())
            }
            Err(e) => {
                let migration = self.failing_migration(moving_up).await;
                Err(self.record(MigrationFailure {
                    migration,
                    message: e.to_string(),
                    trace: Some(format!("{e:?}")),
                }))
            }
        }
    }

    fn errors(&self) -> &[MigrationFailure] {
        &self.errors
    }
}

#[allow(unreachable_patterns)]
fn backend_kind(backend: DatabaseBackend) -> EngineKind {
    match backend {
        DatabaseBackend::MySql => EngineKind::MySql,
        DatabaseBackend::Postgres => EngineKind::Postgres,
        DatabaseBackend::Sqlite => EngineKind::Sqlite,
        other => EngineKind::Other(format!("{other:?}").to_lowercase()),
    }
}
