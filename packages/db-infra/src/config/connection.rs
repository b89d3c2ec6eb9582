//! Connection descriptors parsed from a database URL or a PDO-style DSN.

use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::SafeMigrateError;

/// Characters escaped in the userinfo and path parts of a generated URL.
const URL_COMPONENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Database engine family named by a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineKind {
    MySql,
    Postgres,
    Sqlite,
    Other(String),
}

impl EngineKind {
    pub fn from_scheme(scheme: &str) -> Self {
        match scheme.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => EngineKind::MySql,
            "postgres" | "postgresql" | "pgsql" => EngineKind::Postgres,
            "sqlite" => EngineKind::Sqlite,
            other => EngineKind::Other(other.to_string()),
        }
    }

    pub fn is_mysql(&self) -> bool {
        matches!(self, EngineKind::MySql)
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::MySql => f.write_str("mysql"),
            EngineKind::Postgres => f.write_str("postgres"),
            EngineKind::Sqlite => f.write_str("sqlite"),
            EngineKind::Other(name) if name.is_empty() => f.write_str("unknown"),
            EngineKind::Other(name) => f.write_str(name),
        }
    }
}

/// Where and as whom the client binaries connect.
///
/// Every field is optional. An absent (or empty) field means the matching
/// command-line flag is omitted, never that a default is substituted.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    host: Option<String>,
    port: Option<String>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl ConnectionDescriptor {
    pub fn new(
        host: Option<String>,
        port: Option<String>,
        database: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        Self {
            host: non_empty(host),
            port: non_empty(port),
            database: non_empty(database),
            username: non_empty(username),
            password: non_empty(password),
        }
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Copy of this descriptor pointed at another database on the same server.
    pub fn with_database(&self, database: Option<String>) -> Self {
        Self {
            database: non_empty(database),
            ..self.clone()
        }
    }

    /// Connection URL for the given scheme, including the database name.
    pub fn to_url(&self, scheme: &str) -> String {
        let mut url = self.server_url(scheme);
        if let Some(db) = self.database() {
            url.push_str(&utf8_percent_encode(db, URL_COMPONENT).to_string());
        }
        url
    }

    /// Connection URL for the server only, used for `DROP`/`CREATE DATABASE`.
    pub fn server_url(&self, scheme: &str) -> String {
        let mut url = format!("{scheme}://");
        if let Some(user) = self.username() {
            url.push_str(&utf8_percent_encode(user, URL_COMPONENT).to_string());
            if let Some(password) = self.password() {
                url.push(':');
                url.push_str(&utf8_percent_encode(password, URL_COMPONENT).to_string());
            }
            url.push('@');
        }
        url.push_str(self.host().unwrap_or("localhost"));
        if let Some(port) = self.port() {
            url.push(':');
            url.push_str(port);
        }
        url.push('/');
        url
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// A descriptor together with the engine family it was declared for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub engine: EngineKind,
    pub descriptor: ConnectionDescriptor,
}

impl DatabaseTarget {
    /// Parse `scheme://[user[:password]@]host[:port][/database][?params]`.
    pub fn parse_url(url: &str) -> Result<Self, SafeMigrateError> {
        let (scheme, rest) = url.split_once("://").ok_or_else(|| {
            SafeMigrateError::config(format!(
                "database URL must look like scheme://host/database, got '{}'",
                crate::infra::db::sanitize_db_url(url)
            ))
        })?;

        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };

        let (userinfo, hostport) = match authority.rfind('@') {
            Some(idx) => (Some(&authority[..idx]), &authority[idx + 1..]),
            None => (None, authority),
        };

        let (username, password) = match userinfo {
            Some(info) => match info.split_once(':') {
                Some((user, pass)) => (Some(decode(user)?), Some(decode(pass)?)),
                None => (Some(decode(info)?), None),
            },
            None => (None, None),
        };

        let (host, port) = split_host_port(hostport);
        let database = if path.is_empty() {
            None
        } else {
            Some(decode(path)?)
        };

        Ok(Self {
            engine: EngineKind::from_scheme(scheme),
            descriptor: ConnectionDescriptor::new(host, port, database, username, password),
        })
    }

    /// Parse a PDO-style DSN such as `mysql:host=db;port=3306;dbname=app`.
    ///
    /// Keys other than `host`, `port` and `dbname` are ignored. A DSN with no
    /// prefix yields an empty descriptor of unknown engine.
    pub fn parse_dsn(dsn: &str, username: Option<String>, password: Option<String>) -> Self {
        let Some((prefix, body)) = dsn.split_once(':') else {
            return Self {
                engine: EngineKind::Other(String::new()),
                descriptor: ConnectionDescriptor::new(None, None, None, username, password),
            };
        };

        let mut host = None;
        let mut port = None;
        let mut database = None;
        for part in body.split(';') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            match key.trim() {
                "host" => host = Some(value.to_string()),
                "port" => port = Some(value.to_string()),
                "dbname" => database = Some(value.to_string()),
                _ => {}
            }
        }

        Self {
            engine: EngineKind::from_scheme(prefix.trim()),
            descriptor: ConnectionDescriptor::new(host, port, database, username, password),
        }
    }

    /// URL used to open sea-orm connections to the database itself.
    pub fn url(&self) -> String {
        self.descriptor.to_url(&self.scheme())
    }

    /// URL used to open a server-level connection without selecting a database.
    pub fn server_url(&self) -> String {
        self.descriptor.server_url(&self.scheme())
    }

    fn scheme(&self) -> String {
        match &self.engine {
            EngineKind::MySql => "mysql".to_string(),
            EngineKind::Postgres => "postgres".to_string(),
            EngineKind::Sqlite => "sqlite".to_string(),
            EngineKind::Other(name) => name.clone(),
        }
    }
}

fn split_host_port(hostport: &str) -> (Option<String>, Option<String>) {
    // bracketed IPv6 literal
    if let Some(stripped) = hostport.strip_prefix('[') {
        if let Some((host, rest)) = stripped.split_once(']') {
            let port = rest.strip_prefix(':').map(str::to_string);
            return (Some(host.to_string()), port);
        }
    }
    match hostport.rsplit_once(':') {
        Some((host, port)) => (Some(host.to_string()), Some(port.to_string())),
        None => (Some(hostport.to_string()), None),
    }
}

fn decode(part: &str) -> Result<String, SafeMigrateError> {
    percent_decode_str(part)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| SafeMigrateError::config(format!("invalid percent-encoding in database URL: {e}")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
