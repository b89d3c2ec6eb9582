use std::future::Future;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::{info, warn};

use crate::config::connection::{DatabaseTarget, EngineKind};
use crate::error::SafeMigrateError;

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_INTERVAL_MS: u64 = 500;

async fn retry_connection<T, F, Fut>(
    mut connect_fn: F,
    max_attempts: u32,
    interval_ms: u64,
) -> Result<T, SafeMigrateError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SafeMigrateError>>,
{
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match connect_fn().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(
                        "connection_retry=success attempts={} interval_ms={}",
                        attempt, interval_ms
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                last_error = Some(e);
                if attempt < max_attempts {
                    warn!(
                        "connection_retry=failed attempt={} max_attempts={} interval_ms={}",
                        attempt, max_attempts, interval_ms
                    );
                    tokio::time::sleep(Duration::from_millis(interval_ms)).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        SafeMigrateError::database("no error recorded after max attempts (this should not happen)")
    }))
}

/// Open a single-connection pool.
///
/// One connection keeps session state (selected schema, temporary tables)
/// stable across the statements of a run. Network engines are retried a few
/// times; file and in-memory SQLite are not.
pub async fn connect(url: &str, engine: &EngineKind) -> Result<DatabaseConnection, SafeMigrateError> {
    let mut opt = ConnectOptions::new(url.to_string());
    opt.min_connections(1)
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .sqlx_logging(false);

    let connect_once = || {
        let opt = opt.clone();
        async move {
            Database::connect(opt).await.map_err(|e| {
                SafeMigrateError::database(format!(
                    "failed to connect to {}: {}",
                    sanitize_db_url(url),
                    e
                ))
            })
        }
    };

    match engine {
        EngineKind::Sqlite => connect_once().await,
        _ => retry_connection(connect_once, CONNECT_ATTEMPTS, CONNECT_INTERVAL_MS).await,
    }
}

/// Connection to the database the migrations run against.
pub async fn connect_database(target: &DatabaseTarget) -> Result<DatabaseConnection, SafeMigrateError> {
    connect(&target.url(), &target.engine).await
}

/// Server-level connection used for `DROP DATABASE` / `CREATE DATABASE`.
pub async fn connect_server(target: &DatabaseTarget) -> Result<DatabaseConnection, SafeMigrateError> {
    connect(&target.server_url(), &target.engine).await
}

/// Sanitize database URL by masking password in connection strings.
/// Used for logging and error messages.
pub fn sanitize_db_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);

    match authority.rfind('@') {
        Some(at) => {
            let userinfo = &authority[..at];
            let host = &authority[at + 1..];
            match userinfo.split_once(':') {
                Some((user, _)) => format!("{scheme}://{user}:***@{host}{tail}"),
                None => url.to_string(),
            }
        }
        None => url.to_string(),
    }
}
