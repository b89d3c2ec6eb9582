mod common;

use std::fs;

use common::Harness;
use db_infra::config::{ConnectionDescriptor, DatabaseTarget, EngineKind};
use db_infra::error::ConfirmStage;
use db_infra::infra::db::MigrationFailure;
use db_infra::{RunOutcome, SafeMigrateError, SafeMigrateOptions};
use test_support::{FakeAdmin, FakeEngine, FakeRunner, RecordingEnvToggle, ScriptedPrompter};

const SEED: &str = "CREATE TABLE `t` (`v` text);\nINSERT INTO `t` VALUES ('it''s; \"quoted\"');\n";

fn options() -> SafeMigrateOptions {
    SafeMigrateOptions::default()
}

fn failure(message: &str) -> MigrationFailure {
    MigrationFailure {
        migration: Some("m20250901_000002_account_events".to_string()),
        message: message.to_string(),
        trace: None,
    }
}

#[tokio::test]
async fn test_already_at_target_touches_nothing() {
    let h = Harness::new(SEED);
    let mut engine = FakeEngine::new(h.server.clone(), 5, 5);

    let outcome = h.safe_migrate().run(&mut engine, &options()).await.unwrap();

    assert_eq!(outcome, RunOutcome::AlreadyAtVersion { version: 5 });
    assert_eq!(outcome.exit_code(), 0);
    assert!(h.runner.calls().is_empty());
    assert!(h.prompter.prompts().is_empty());
    assert!(h.toggle.calls().is_empty());
    assert!(engine.migrate_calls().is_empty());
}

#[tokio::test]
async fn test_non_mysql_connection_spawns_nothing() {
    let h = Harness::new(SEED);
    let postgres = DatabaseTarget {
        engine: EngineKind::Postgres,
        descriptor: ConnectionDescriptor::new(
            Some("localhost".to_string()),
            None,
            Some("app".to_string()),
            None,
            None,
        ),
    };
    let mut engine = FakeEngine::new(h.server.clone(), 1, 2).with_target(postgres);

    let err = h
        .safe_migrate()
        .run(&mut engine, &SafeMigrateOptions { disable_env: true, ..options() })
        .await
        .unwrap_err();

    assert!(matches!(err, SafeMigrateError::UnsupportedEngine { ref engine } if engine == "postgres"));
    assert_eq!(err.exit_code(), 1);
    assert!(h.runner.calls().is_empty());
    assert!(h.toggle.calls().is_empty());
    assert!(engine.migrate_calls().is_empty());
}

#[tokio::test]
async fn test_successful_migration_deletes_temporary_backup() {
    let h = Harness::new(SEED);
    let mut engine = FakeEngine::new(h.server.clone(), 1, 2);

    let outcome = h.safe_migrate().run(&mut engine, &options()).await.unwrap();

    let RunOutcome::Completed(result) = outcome else {
        panic!("expected Completed, got {outcome:?}");
    };
    assert_eq!((result.from_version, result.to_version), (1, 2));
    assert!(!result.restored);
    assert_eq!(result.backup.path, h.sql_dir().join("1700000000_dev.tmp.sql"));
    assert!(!result.backup.exists());
    assert!(h.prompter.prompts().is_empty());
    assert!(h.admin.calls().is_empty());
    assert_eq!(h.server.contents(), format!("{SEED}-- migrated to 2\n"));
}

#[tokio::test]
async fn test_dry_run_restores_after_successful_migration() {
    let h = Harness::with_prompter(SEED, ScriptedPrompter::answering([true]));
    let mut engine = FakeEngine::new(h.server.clone(), 1, 2);

    let outcome = h
        .safe_migrate()
        .run(&mut engine, &SafeMigrateOptions { dry_run: true, ..options() })
        .await
        .unwrap();

    let RunOutcome::Completed(result) = outcome else {
        panic!("expected Completed, got {outcome:?}");
    };
    assert!(result.dry_run);
    assert!(result.restored);
    assert_eq!(engine.migrate_calls(), &[(2, true)]);
    assert_eq!(h.admin.calls(), vec!["drop", "create"]);
    assert_eq!(h.server.contents(), SEED);

    // only the dry-run warning is shown; the restore is implied
    let prompts = h.prompter.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(!prompts[0].1, "dry-run confirmation defaults to no");
}

#[tokio::test]
async fn test_declined_dry_run_takes_no_backup_and_reenables_env() {
    let h = Harness::with_prompter(SEED, ScriptedPrompter::answering([false]));
    let mut engine = FakeEngine::new(h.server.clone(), 1, 2);
    let opts = SafeMigrateOptions {
        dry_run: true,
        disable_env: true,
        env: "staging".to_string(),
        ..options()
    };

    let err = h.safe_migrate().run(&mut engine, &opts).await.unwrap_err();

    assert!(matches!(
        err,
        SafeMigrateError::ConfirmationDeclined { stage: ConfirmStage::DryRun }
    ));
    assert_eq!(err.exit_code(), 1);
    assert!(h.runner.calls().is_empty());
    assert!(engine.migrate_calls().is_empty());
    assert_eq!(
        h.toggle.calls(),
        vec![("staging".to_string(), false), ("staging".to_string(), true)]
    );
    assert!(h.prompter.prompts()[0].0.iter().any(|l| l.contains("staging environment")));
}

#[tokio::test]
async fn test_disable_failure_aborts_before_backup() {
    let h = Harness::new(SEED).with_toggle(RecordingEnvToggle::failing_disable());
    let mut engine = FakeEngine::new(h.server.clone(), 1, 2);

    let err = h
        .safe_migrate()
        .run(&mut engine, &SafeMigrateOptions { disable_env: true, ..options() })
        .await
        .unwrap_err();

    assert!(matches!(err, SafeMigrateError::EnvToggle { .. }));
    assert!(h.runner.calls().is_empty());
    assert_eq!(h.toggle.calls(), vec![("dev".to_string(), false)]);
}

#[tokio::test]
async fn test_migration_errors_restore_and_report_failure() {
    let h = Harness::new(SEED);
    let mut engine = FakeEngine::new(h.server.clone(), 1, 2)
        .failing_with(vec![failure("Duplicate column name 'kind'")]);

    let outcome = h
        .safe_migrate()
        .run(&mut engine, &SafeMigrateOptions { disable_env: true, ..options() })
        .await
        .unwrap();

    assert_eq!(outcome.exit_code(), 1);
    let RunOutcome::MigrationFailed(result) = outcome else {
        panic!("expected MigrationFailed, got {outcome:?}");
    };
    assert!(result.restored);
    assert_eq!(result.errors.len(), 1);
    assert!(!result.backup.exists());
    assert_eq!(h.server.contents(), SEED);

    let prompts = h.prompter.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].1, "restore confirmation defaults to yes");
    assert_eq!(
        h.toggle.calls(),
        vec![("dev".to_string(), false), ("dev".to_string(), true)]
    );
}

#[tokio::test]
async fn test_declined_restore_keeps_backup() {
    let h = Harness::with_prompter(SEED, ScriptedPrompter::answering([false]));
    let mut engine =
        FakeEngine::new(h.server.clone(), 1, 2).failing_with(vec![failure("boom")]);

    let err = h.safe_migrate().run(&mut engine, &options()).await.unwrap_err();

    assert!(matches!(
        err,
        SafeMigrateError::ConfirmationDeclined { stage: ConfirmStage::Restore }
    ));
    let backup = h.sql_dir().join("1700000000_dev.tmp.sql");
    assert_eq!(fs::read_to_string(&backup).unwrap(), SEED);
    assert!(h.admin.calls().is_empty());
    assert!(h.server.contents().ends_with("-- migrated to 2\n"));
}

#[tokio::test]
async fn test_restore_failure_keeps_backup() {
    let h = Harness::new(SEED).with_runner(|server| FakeRunner::new(server).failing_import(1));
    let mut engine =
        FakeEngine::new(h.server.clone(), 1, 2).failing_with(vec![failure("boom")]);
    let opts = SafeMigrateOptions {
        no_confirmation: true,
        disable_env: true,
        ..options()
    };

    let err = h.safe_migrate().run(&mut engine, &opts).await.unwrap_err();

    assert_eq!(err.exit_code(), 1);
    let SafeMigrateError::RestoreFailed { backup_path, source } = err else {
        panic!("expected RestoreFailed, got {err:?}");
    };
    assert!(matches!(*source, SafeMigrateError::ImportFailed { exit_code: 1, .. }));
    assert_eq!(fs::read_to_string(&backup_path).unwrap(), SEED);
    assert_eq!(h.toggle.calls().last(), Some(&("dev".to_string(), true)));
}

#[tokio::test]
async fn test_drop_failure_keeps_backup() {
    let h = Harness::new(SEED).with_admin(|server| FakeAdmin::new(server).failing_drop());
    let mut engine =
        FakeEngine::new(h.server.clone(), 1, 2).failing_with(vec![failure("boom")]);

    let err = h
        .safe_migrate()
        .run(&mut engine, &SafeMigrateOptions { no_confirmation: true, ..options() })
        .await
        .unwrap_err();

    let SafeMigrateError::RestoreFailed { backup_path, source } = err else {
        panic!("expected RestoreFailed, got {err:?}");
    };
    assert!(matches!(*source, SafeMigrateError::Database { .. }));
    assert!(backup_path.is_file());
    assert!(h.runner.import_calls().is_empty());
}

#[tokio::test]
async fn test_dump_failure_skips_migration() {
    let h = Harness::new(SEED).with_runner(|server| FakeRunner::new(server).failing_dump(2));
    let mut engine = FakeEngine::new(h.server.clone(), 1, 2);

    let err = h.safe_migrate().run(&mut engine, &options()).await.unwrap_err();

    let SafeMigrateError::DumpFailed { exit_code, output } = err else {
        panic!("expected DumpFailed, got {err:?}");
    };
    assert_eq!(exit_code, 2);
    assert!(output[0].contains("Access denied"));
    assert!(engine.migrate_calls().is_empty());
    assert_eq!(fs::read_dir(h.sql_dir()).unwrap().count(), 0, "partial dump removed");
    assert_eq!(h.server.contents(), SEED);
}

#[tokio::test]
async fn test_keep_backup_retains_file_without_tmp_marker() {
    let h = Harness::new(SEED);
    let mut engine = FakeEngine::new(h.server.clone(), 1, 2);

    let outcome = h
        .safe_migrate()
        .run(&mut engine, &SafeMigrateOptions { keep_backup: true, ..options() })
        .await
        .unwrap();

    let RunOutcome::Completed(result) = outcome else {
        panic!("expected Completed, got {outcome:?}");
    };
    assert_eq!(result.backup.path, h.sql_dir().join("1700000000_dev.sql"));
    assert!(result.backup.keep);
    assert_eq!(fs::read_to_string(&result.backup.path).unwrap(), SEED);
}

#[tokio::test]
async fn test_round_trip_restores_identical_contents() {
    let h = Harness::new(SEED);
    let mut engine = FakeEngine::new(h.server.clone(), 3, 4);
    let opts = SafeMigrateOptions {
        dry_run: true,
        no_confirmation: true,
        keep_backup: true,
        target: Some("round-trip/before.sql".into()),
        ..options()
    };

    let outcome = h.safe_migrate().run(&mut engine, &opts).await.unwrap();

    let RunOutcome::Completed(result) = outcome else {
        panic!("expected Completed, got {outcome:?}");
    };
    assert_eq!(result.backup.path, h.sql_dir().join("round-trip/before.sql"));
    assert_eq!(fs::read_to_string(&result.backup.path).unwrap(), SEED);
    assert_eq!(h.server.contents(), SEED);
    assert!(h.prompter.prompts().is_empty());
}

#[tokio::test]
async fn test_up_moves_exactly_one_version() {
    let h = Harness::new(SEED);
    let mut engine = FakeEngine::new(h.server.clone(), 5, 9);

    let outcome = h
        .safe_migrate()
        .run(&mut engine, &SafeMigrateOptions { up: true, ..options() })
        .await
        .unwrap();

    assert_eq!(engine.migrate_calls(), &[(6, false)]);
    assert!(matches!(outcome, RunOutcome::Completed(ref r) if r.to_version == 6));
}

#[tokio::test]
async fn test_down_and_explicit_version() {
    let h = Harness::new(SEED);

    let mut engine = FakeEngine::new(h.server.clone(), 5, 9);
    h.safe_migrate()
        .run(&mut engine, &SafeMigrateOptions { down: true, ..options() })
        .await
        .unwrap();
    assert_eq!(engine.migrate_calls(), &[(4, false)]);

    let mut engine = FakeEngine::new(h.server.clone(), 5, 9);
    h.safe_migrate()
        .run(
            &mut engine,
            &SafeMigrateOptions {
                version: Some(2),
                up: true,
                ..options()
            },
        )
        .await
        .unwrap();
    assert_eq!(engine.migrate_calls(), &[(2, false)]);
}

#[tokio::test]
async fn test_engine_call_error_without_recorded_failures_is_not_fatal() {
    let h = Harness::new(SEED);
    let mut engine = FakeEngine::new(h.server.clone(), 1, 2).erroring_call("connection reset");

    let outcome = h.safe_migrate().run(&mut engine, &options()).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Completed(ref r) if !r.restored));
}

#[tokio::test]
async fn test_credentials_reach_argv_literally() {
    let h = Harness::new(SEED);
    let target = DatabaseTarget {
        engine: EngineKind::MySql,
        descriptor: ConnectionDescriptor::new(
            None,
            None,
            Some("app; DROP".to_string()),
            Some("o'brien".to_string()),
            Some("p\"a;ss 'w".to_string()),
        ),
    };
    let mut engine = FakeEngine::new(h.server.clone(), 1, 2).with_target(target);

    h.safe_migrate().run(&mut engine, &options()).await.unwrap();

    let dump = &h.runner.dump_calls()[0];
    assert_eq!(
        dump.args,
        vec![
            "--user=o'brien".to_string(),
            "--password=p\"a;ss 'w".to_string(),
            "app; DROP".to_string(),
        ]
    );
    assert!(!dump.to_string().contains("p\"a;ss"), "password masked in display");
}
