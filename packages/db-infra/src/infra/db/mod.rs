pub mod admin;
pub mod core;
pub mod engine;

pub use admin::{DatabaseAdmin, LazyServerAdmin, SeaOrmAdmin};
pub use core::{connect, connect_database, connect_server, sanitize_db_url};
pub use engine::{MigrationEngine, MigrationFailure, SeaOrmEngine};
