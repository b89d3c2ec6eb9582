use crate::config::connection::ConnectionDescriptor;

/// Argument vector shared by `mysqldump` and `mysql`.
///
/// Order: `--user`, `--password`, `--host`, `--port`, the configured extra
/// arguments, then the database name as a bare positional. Flags whose value
/// is absent are omitted. Each entry becomes exactly one argv token.
pub fn connection_args(connection: &ConnectionDescriptor, extra_arguments: &[String]) -> Vec<String> {
    let mut args = Vec::with_capacity(5 + extra_arguments.len());

    if let Some(user) = connection.username() {
        args.push(format!("--user={user}"));
    }
    if let Some(password) = connection.password() {
        args.push(format!("--password={password}"));
    }
    if let Some(host) = connection.host() {
        args.push(format!("--host={host}"));
    }
    if let Some(port) = connection.port() {
        args.push(format!("--port={port}"));
    }

    args.extend(extra_arguments.iter().cloned());

    if let Some(database) = connection.database() {
        args.push(database.to_string());
    }

    args
}
