use chrono::Utc;
use docmove::changeset::{ChangesetStatus, ChangesetType};
use docmove::errors::ErrorKind;
use docmove::orchestrator::RunState;
use docmove_int_test::test_util::{cleanup, create_test_context, run_test};
use serde_json::json;
use std::fs;

// ==================== Full Run ====================

#[test]
fn test_full_run_applies_catalogue_in_order() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_catalogue()?;
            let orchestrator = ctx.builder().build()?;

            let report = orchestrator.migrate()?;
            assert_eq!(report.state(), RunState::Done);
            assert_eq!(
                report.applied(),
                vec![
                    "V0__create_indexes.n1ql",
                    "V0.1__insert_users",
                    "V1__user_views.json",
                    "V2__user_search.fts",
                ]
            );

            let records = orchestrator.ledger().load_applied()?;
            assert_eq!(records.len(), 4);
            for record in records.values() {
                assert_eq!(record.status, Some(ChangesetStatus::Success));
                assert_eq!(record.runner.as_deref(), Some(orchestrator.config().owner()));
                assert!(record.duration_ms.is_some());
                assert!(record.applied_at.is_some_and(|at| at <= Utc::now()));
                assert_eq!(record.checksum.len(), 64);
            }
            assert_eq!(
                records["V0.1__insert_users"].changeset_type,
                ChangesetType::Documents
            );
            assert_eq!(records["V0.1__insert_users"].description, "insert users");

            let bucket = ctx.bucket();
            assert_eq!(ctx.memory().index_names(), vec!["#primary", "idx_user_name"]);
            assert_eq!(
                bucket.get("titi")?.map(|d| d.content["email"].clone()),
                Some(json!("titi@example.com"))
            );
            assert!(bucket.get("toto")?.is_some());
            assert!(bucket.get_design_document("user views")?.is_some());
            assert_eq!(
                bucket.get_search_index("user search")?.map(|d| d["sourceName"].clone()),
                Some(json!("default"))
            );

            let lock = orchestrator.lock_coordinator().current()?;
            assert!(lock.is_some_and(|l| !l.is_locked()));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_second_run_is_noop() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_catalogue()?;
            ctx.builder().build()?.migrate()?;
            let statements = ctx.memory().executed_statements();
            let ledger_before = ctx.builder().build()?.ledger().load_applied()?;

            let report = ctx.builder().build()?.migrate()?;
            assert!(report.outcomes().is_empty());
            assert_eq!(ctx.memory().executed_statements(), statements);

            let ledger_after = ctx.builder().build()?.ledger().load_applied()?;
            assert_eq!(ledger_before, ledger_after);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_new_changeset_applied_on_next_run() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_catalogue()?;
            ctx.builder().build()?.migrate()?;

            ctx.write_query_script(
                "V3__add_admin",
                r#"INSERT INTO `${bucket}` (KEY, VALUE) VALUES ("admin", {"type": "user", "name": "admin"});"#,
            )?;
            let orchestrator = ctx.builder().build()?;
            assert_eq!(
                orchestrator
                    .pending()?
                    .iter()
                    .map(|c| c.script().to_string())
                    .collect::<Vec<_>>(),
                vec!["V3__add_admin.n1ql"]
            );

            let report = orchestrator.migrate()?;
            assert_eq!(report.applied(), vec!["V3__add_admin.n1ql"]);
            assert!(ctx.bucket().get("admin")?.is_some());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_placeholders_are_substituted() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_query_script(
                "V1__env_index",
                "CREATE INDEX idx_${env} ON `${bucket}`(${field});",
            )?;
            ctx.builder()
                .placeholder("env", "staging")
                .placeholder("field", "name")
                .build()?
                .migrate()?;

            assert_eq!(
                ctx.memory().index_fields("idx_staging"),
                Some(vec!["name".to_string()])
            );
            Ok(())
        },
        cleanup,
    )
}

// ==================== Dry Run ====================

#[test]
fn test_pending_does_not_mutate() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_catalogue()?;
            let orchestrator = ctx.builder().build()?;

            let pending = orchestrator.pending()?;
            assert_eq!(pending.len(), 4);
            assert_eq!(pending[1].version().as_str(), "0.1");
            assert_eq!(ctx.memory().document_count(), 0);
            assert!(ctx.memory().executed_statements().is_empty());
            assert!(orchestrator.lock_coordinator().current()?.is_none());
            Ok(())
        },
        cleanup,
    )
}

// ==================== Configuration Errors ====================

#[test]
fn test_unknown_extension_fails_without_mutation() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_catalogue()?;
            ctx.write_file("toto.toto", "???")?;
            let orchestrator = ctx.builder().build()?;

            let report = orchestrator.run();
            assert_eq!(report.state(), RunState::Failed);
            let err = report.error().expect("run should fail");
            assert_eq!(err.kind(), &ErrorKind::UnknownChangesetType);
            assert!(err.kind().is_configuration());

            assert!(orchestrator.ledger().load_applied()?.is_empty());
            assert!(orchestrator.lock_coordinator().current()?.is_none());
            assert_eq!(ctx.memory().document_count(), 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_invalid_name_fails_without_mutation() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_catalogue()?;
            ctx.write_file("create_more_indexes.n1ql", "CREATE PRIMARY INDEX ON `default`;")?;

            let err = ctx.builder().build()?.migrate().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidChangesetName);
            assert_eq!(ctx.memory().document_count(), 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_missing_root_fails() {
    run_test(
        create_test_context,
        |ctx| {
            let missing = ctx.changesets_path().join("does-not-exist");
            let err = ctx
                .builder()
                .changesets_path(&missing)
                .build()?
                .migrate()
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidPath);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_hidden_entries_are_ignored() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_catalogue()?;
            ctx.write_file(".DS_Store", "")?;
            fs::create_dir(ctx.changesets_path().join(".git"))?;

            let report = ctx.builder().build()?.migrate()?;
            assert_eq!(report.applied().len(), 4);
            Ok(())
        },
        cleanup,
    )
}
