pub mod connection;
pub mod settings;

pub use connection::{ConnectionDescriptor, DatabaseTarget, EngineKind};
pub use settings::{database_target_from_env, ClientBinary, SafeMigrateConfig};
