use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::connection::DatabaseTarget;
use crate::error::SafeMigrateError;
use crate::infra::db::core::connect_server;

/// Drops and recreates the target database ahead of an import.
#[async_trait]
pub trait DatabaseAdmin: Send + Sync {
    async fn drop_database(&self) -> Result<(), SafeMigrateError>;
    async fn create_database(&self) -> Result<(), SafeMigrateError>;
}

/// `DatabaseAdmin` issuing statements over a server-level MySQL connection.
pub struct SeaOrmAdmin {
    conn: DatabaseConnection,
    database: String,
}

impl SeaOrmAdmin {
    pub fn new(conn: DatabaseConnection, database: impl Into<String>) -> Self {
        Self {
            conn,
            database: database.into(),
        }
    }

    async fn execute(&self, sql: String) -> Result<(), SafeMigrateError> {
        self.conn
            .execute(Statement::from_string(DatabaseBackend::MySql, sql.clone()))
            .await
            .map_err(|e| SafeMigrateError::database(format!("{sql} failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl DatabaseAdmin for SeaOrmAdmin {
    async fn drop_database(&self) -> Result<(), SafeMigrateError> {
        info!(database = %self.database, "Dropping database");
        self.execute(drop_database_sql(&self.database)).await
    }

    async fn create_database(&self) -> Result<(), SafeMigrateError> {
        info!(database = %self.database, "Creating empty database");
        self.execute(create_database_sql(&self.database)).await
    }
}

/// `SeaOrmAdmin` that opens its server connection on first use.
///
/// Runs that never drop the database (already at the target version, or a
/// rejected engine) never connect to the server.
pub struct LazyServerAdmin {
    target: DatabaseTarget,
    admin: OnceCell<SeaOrmAdmin>,
}

impl LazyServerAdmin {
    pub fn new(target: DatabaseTarget) -> Self {
        Self {
            target,
            admin: OnceCell::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.admin.initialized()
    }

    async fn admin(&self) -> Result<&SeaOrmAdmin, SafeMigrateError> {
        self.admin
            .get_or_try_init(|| async {
                let database = self
                    .target
                    .descriptor
                    .database()
                    .ok_or_else(|| SafeMigrateError::config("database connection has no database name"))?
                    .to_string();
                let conn = connect_server(&self.target).await?;
                Ok::<_, SafeMigrateError>(SeaOrmAdmin::new(conn, database))
            })
            .await
    }
}

#[async_trait]
impl DatabaseAdmin for LazyServerAdmin {
    async fn drop_database(&self) -> Result<(), SafeMigrateError> {
        self.admin().await?.drop_database().await
    }

    async fn create_database(&self) -> Result<(), SafeMigrateError> {
        self.admin().await?.create_database().await
    }
}

/// Quote a MySQL identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

pub fn drop_database_sql(database: &str) -> String {
    format!("DROP DATABASE IF EXISTS {}", quote_identifier(database))
}

pub fn create_database_sql(database: &str) -> String {
    format!("CREATE DATABASE {}", quote_identifier(database))
}
