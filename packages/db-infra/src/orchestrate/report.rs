use tracing::error;

use crate::infra::db::MigrationFailure;

/// Lines describing accumulated migration errors.
///
/// Verbose mode includes each error's trace; terse mode is a bulleted list of
/// messages.
pub fn render_migration_errors(errors: &[MigrationFailure], verbose: bool) -> Vec<String> {
    if verbose {
        let mut lines = vec!["The following errors occurred:".to_string()];
        for failure in errors {
            match &failure.migration {
                Some(name) => lines.push(format!("[{name}] {}", failure.message)),
                None => lines.push(failure.message.clone()),
            }
            if let Some(trace) = &failure.trace {
                lines.extend(trace.lines().map(|l| format!("    {l}")));
            }
        }
        lines
    } else {
        let mut lines = vec![
            "The following migration errors occurred:".to_string(),
            String::new(),
        ];
        lines.extend(errors.iter().map(|f| format!(" - {}", f.message)));
        lines
    }
}

pub fn log_migration_errors(errors: &[MigrationFailure], verbose: bool) {
    if errors.is_empty() {
        return;
    }
    for line in render_migration_errors(errors, verbose) {
        error!("{line}");
    }
}
