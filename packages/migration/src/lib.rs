pub use sea_orm_migration::prelude::*;

mod m20250823_000001_init; // keep filename + module name in sync
mod m20250901_000002_account_events;

/// Ordered migration list; version `n` means the first `n` are applied.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250823_000001_init::Migration),
            Box::new(m20250901_000002_account_events::Migration),
        ]
    }
}
