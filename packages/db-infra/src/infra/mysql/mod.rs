//! Drivers for the `mysqldump` / `mysql` command-line client pair.

pub mod args;
pub mod dump;
pub mod restore;

pub use args::connection_args;
pub use dump::{DumpEngine, DumpSpec};
pub use restore::{RestoreEngine, RestoreSpec};
