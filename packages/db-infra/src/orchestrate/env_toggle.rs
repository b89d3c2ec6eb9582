//! Disabling an environment for the duration of a migration.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::SafeMigrateError;

/// Marks an environment as unavailable while the database is being changed.
pub trait EnvToggle: Send + Sync {
    fn set_enabled(&self, env: &str, enabled: bool) -> Result<(), SafeMigrateError>;
}

/// Marks a disabled environment with a `<lock_dir>/<env>.lck` file.
///
/// Applications check for the file and serve a maintenance response while it
/// exists.
#[derive(Debug, Clone)]
pub struct LockFileToggle {
    lock_dir: PathBuf,
}

impl LockFileToggle {
    pub fn new(lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            lock_dir: lock_dir.into(),
        }
    }

    pub fn lock_path(&self, env: &str) -> Result<PathBuf, SafeMigrateError> {
        let valid = !env.is_empty()
            && env
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(SafeMigrateError::EnvToggle {
                env: env.to_string(),
                message: "environment names may only contain letters, digits, '_' and '-'"
                    .to_string(),
            });
        }
        Ok(self.lock_dir.join(format!("{env}.lck")))
    }

    pub fn is_disabled(&self, env: &str) -> bool {
        self.lock_path(env).map(|p| p.exists()).unwrap_or(false)
    }
}

impl EnvToggle for LockFileToggle {
    fn set_enabled(&self, env: &str, enabled: bool) -> Result<(), SafeMigrateError> {
        let path = self.lock_path(env)?;
        let failed = |e: std::io::Error| SafeMigrateError::EnvToggle {
            env: env.to_string(),
            message: format!("{}: {e}", path.display()),
        };

        if enabled {
            match fs::remove_file(&path) {
                Ok(()) => info!(env, "Environment enabled"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(failed(e)),
            }
        } else {
            ensure_dir(&self.lock_dir).map_err(failed)?;
            fs::write(&path, b"").map_err(failed)?;
            info!(env, "Environment disabled");
        }
        Ok(())
    }
}

fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir)
}
