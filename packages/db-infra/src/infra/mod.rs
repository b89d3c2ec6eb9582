pub mod db;
pub mod mysql;
pub mod process;

pub use process::{CommandResult, CommandSpec, ProcessRunner, TokioProcessRunner};
