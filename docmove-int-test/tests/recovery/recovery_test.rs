use docmove::changeset::ChangesetStatus;
use docmove::errors::ErrorKind;
use docmove::orchestrator::RunState;
use docmove_int_test::test_util::{cleanup, create_test_context, run_test};
use serde_json::json;
use std::fs;

// ==================== Drift ====================

#[test]
fn test_drift_detected_before_any_execution() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_catalogue()?;
            ctx.builder().build()?.migrate()?;
            let statements = ctx.memory().executed_statements();

            ctx.write_query_script(
                "V0__create_indexes",
                "CREATE PRIMARY INDEX ON `${bucket}`;\nCREATE INDEX idx_user_name ON `${bucket}`(name);",
            )?;
            ctx.write_query_script("V3__more", "CREATE INDEX idx_email ON `${bucket}`(email);")?;

            let orchestrator = ctx.builder().build()?;
            let report = orchestrator.run();
            assert_eq!(report.state(), RunState::Failed);
            let err = report.error().expect("drift should fail the run");
            assert_eq!(err.kind(), &ErrorKind::DriftDetected);
            assert!(err.message().contains("V0__create_indexes.n1ql"));

            assert!(report.outcomes().is_empty());
            assert_eq!(ctx.memory().executed_statements(), statements);
            assert!(orchestrator.ledger().record("V3__more.n1ql")?.is_none());
            assert!(!orchestrator.lock_coordinator().current()?.unwrap().is_locked());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_drift_in_documents_folder() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_catalogue()?;
            ctx.builder().build()?.migrate()?;

            ctx.write_documents("V0.1__insert_users", &[("tata", json!({"name": "tata"}))])?;
            let err = ctx.builder().build()?.pending().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::DriftDetected);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_renamed_document_is_drift() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_catalogue()?;
            ctx.builder().build()?.migrate()?;

            let folder = ctx.changesets_path().join("V0.1__insert_users");
            fs::rename(folder.join("titi.json"), folder.join("tutu.json"))?;
            let err = ctx.builder().build()?.pending().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::DriftDetected);
            assert!(err.message().contains("V0.1__insert_users"));
            Ok(())
        },
        cleanup,
    )
}

// ==================== Partial Failure ====================

#[test]
fn test_third_of_four_fails() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_query_script("V1__first", "CREATE INDEX idx_a ON `${bucket}`(a);")?;
            ctx.write_documents("V2__second", &[("doc1", json!({"n": 1}))])?;
            ctx.write_query_script(
                "V3__third",
                "CREATE INDEX idx_c ON `${bucket}`(c);\nDROP INDEX `${bucket}`.`does_not_exist`;",
            )?;
            ctx.write_query_script("V4__fourth", "CREATE INDEX idx_d ON `${bucket}`(d);")?;

            let orchestrator = ctx.builder().build()?;
            let report = orchestrator.run();
            assert_eq!(report.state(), RunState::Failed);
            assert_eq!(
                report.error().map(|e| e.kind().clone()),
                Some(ErrorKind::ExecutionError)
            );
            let statuses: Vec<_> = report.outcomes().iter().map(|o| o.status).collect();
            assert_eq!(
                statuses,
                vec![
                    ChangesetStatus::Success,
                    ChangesetStatus::Success,
                    ChangesetStatus::Failed
                ]
            );

            let ledger = orchestrator.ledger();
            assert!(ledger.record("V1__first.n1ql")?.unwrap().is_success());
            assert!(ledger.record("V2__second")?.unwrap().is_success());
            let failed = ledger.record("V3__third.n1ql")?.unwrap();
            assert!(failed.is_failed());
            assert!(failed.error.is_some());
            assert!(ledger.record("V4__fourth.n1ql")?.is_none());

            // the statement before the failing one stays applied
            assert_eq!(ctx.memory().index_names(), vec!["idx_a", "idx_c"]);
            assert!(!orchestrator.lock_coordinator().current()?.unwrap().is_locked());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_failed_changeset_requires_acknowledgement() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_query_script("V1__first", "CREATE INDEX idx_a ON `${bucket}`(a);")?;
            ctx.write_query_script("V2__broken", "DROP INDEX `${bucket}`.`does_not_exist`;")?;
            ctx.write_query_script("V3__third", "CREATE INDEX idx_c ON `${bucket}`(c);")?;
            assert!(ctx.builder().build()?.migrate().is_err());

            // fixing the script is not enough
            ctx.write_query_script("V2__broken", "CREATE INDEX idx_b ON `${bucket}`(b);")?;
            let err = ctx.builder().build()?.migrate().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::FailedChangeset);
            assert!(err.message().contains("V2__broken.n1ql"));
            assert_eq!(ctx.memory().index_names(), vec!["idx_a"]);

            let report = ctx.builder().retry_failed(true).build()?.migrate()?;
            assert_eq!(report.applied(), vec!["V2__broken.n1ql", "V3__third.n1ql"]);
            assert_eq!(ctx.memory().index_names(), vec!["idx_a", "idx_b", "idx_c"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_interrupted_changeset_requires_acknowledgement() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_catalogue()?;
            let orchestrator = ctx.builder().build()?;

            // a run that crashed while applying the first changeset
            let first = orchestrator.pending()?.remove(0);
            orchestrator.ledger().record_start(&first)?;
            assert!(orchestrator
                .ledger()
                .record(first.script())?
                .unwrap()
                .is_interrupted());

            let err = orchestrator.migrate().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::FailedChangeset);
            assert!(err.message().contains("interrupted"));

            let report = ctx.builder().retry_failed(true).build()?.migrate()?;
            assert_eq!(report.applied().len(), 4);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_documents_cannot_overwrite_bookkeeping() {
    run_test(
        create_test_context,
        |ctx| {
            let folder = ctx.write_documents("V1__seed", &[("user::1", json!({"name": "one"}))])?;
            fs::write(
                folder.join("docmove::lock.json"),
                r#"{"locked": false, "lockedAt": "2000-01-01T00:00:00Z", "owner": "nobody"}"#,
            )?;
            fs::write(
                folder.join("changelog::V2__forged.n1ql.json"),
                r#"{"status": "SUCCESS"}"#,
            )?;

            let orchestrator = ctx.builder().build()?;
            let report = orchestrator.run();
            assert_eq!(report.state(), RunState::Failed);
            let err = report.error().expect("reserved keys should fail the run");
            assert_eq!(err.kind(), &ErrorKind::ExecutionError);
            assert_eq!(err.root_cause().kind(), &ErrorKind::ValidationError);

            let records = orchestrator.ledger().load_applied()?;
            assert_eq!(records.keys().collect::<Vec<_>>(), vec!["V1__seed"]);
            assert!(records["V1__seed"].is_failed());
            assert!(ctx.bucket().get("user::1")?.is_none());

            let lock = orchestrator.lock_coordinator().current()?.unwrap();
            assert!(!lock.is_locked());
            assert_eq!(lock.owner(), orchestrator.config().owner());
            Ok(())
        },
        cleanup,
    )
}

// ==================== Out Of Order ====================

#[test]
fn test_out_of_order_changeset_is_skipped() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_catalogue()?;
            ctx.builder().build()?.migrate()?;

            ctx.write_query_script("V0.5__late_index", "CREATE INDEX idx_late ON `${bucket}`(late);")?;
            let orchestrator = ctx.builder().build()?;
            let report = orchestrator.migrate()?;
            assert_eq!(report.outcomes().len(), 1);
            assert_eq!(report.outcomes()[0].status, ChangesetStatus::Skipped);
            assert!(orchestrator
                .ledger()
                .record("V0.5__late_index.n1ql")?
                .unwrap()
                .is_skipped());
            assert!(ctx.memory().index_fields("idx_late").is_none());

            let report = ctx.builder().allow_out_of_order(true).build()?.migrate()?;
            assert_eq!(report.applied(), vec!["V0.5__late_index.n1ql"]);
            assert!(ctx.memory().index_fields("idx_late").is_some());
            Ok(())
        },
        cleanup,
    )
}
