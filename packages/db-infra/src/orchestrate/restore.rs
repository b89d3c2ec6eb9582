use tracing::info;

use crate::error::SafeMigrateError;
use crate::infra::db::DatabaseAdmin;
use crate::infra::mysql::{RestoreEngine, RestoreSpec};

/// Drop the database, recreate it empty and import `spec.source_path`.
///
/// The source is checked first so that a missing backup never leads to a
/// dropped database.
pub async fn drop_and_restore(
    admin: &dyn DatabaseAdmin,
    restore: &RestoreEngine<'_>,
    spec: &RestoreSpec<'_>,
) -> Result<(), SafeMigrateError> {
    if !spec.source_path.is_file() {
        return Err(SafeMigrateError::SourceMissing {
            path: spec.source_path.to_path_buf(),
        });
    }

    admin.drop_database().await?;
    admin.create_database().await?;

    info!("Importing {}", spec.source_path.display());
    restore.import_from(spec).await
}
