use docmove::changeset::ChangesetStatus;
use docmove::errors::{ErrorKind, MoveResult};
use docmove::lock::LockCoordinator;
use docmove::orchestrator::{RunReport, RunState};
use docmove_int_test::test_util::{cleanup, create_test_context, run_test};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn test_concurrent_runs_apply_once() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_catalogue()?;
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let orchestrator = ctx
                        .builder()
                        .lock_timeout(Duration::from_secs(10))
                        .lock_retry_interval(Duration::from_millis(5))
                        .build();
                    let barrier = barrier.clone();
                    thread::spawn(move || -> MoveResult<RunReport> {
                        let orchestrator = orchestrator?;
                        barrier.wait();
                        Ok(orchestrator.run())
                    })
                })
                .collect();

            let reports: Vec<RunReport> = handles
                .into_iter()
                .map(|h| h.join().expect("migration thread panicked"))
                .collect::<MoveResult<_>>()?;

            let applied: Vec<usize> = reports.iter().map(|r| r.applied().len()).collect();
            assert!(applied.contains(&4), "one run should apply everything: {:?}", applied);
            assert!(applied.contains(&0), "the other run should apply nothing: {:?}", applied);
            for report in &reports {
                match report.state() {
                    RunState::Done => {}
                    RunState::Failed => assert_eq!(
                        report.error().map(|e| e.kind().clone()),
                        Some(ErrorKind::LockTimeout)
                    ),
                    other => panic!("unexpected terminal state {}", other),
                }
            }

            // every statement of the query script ran exactly once
            assert_eq!(ctx.memory().executed_statements().len(), 2);
            let records = ctx.builder().build()?.ledger().load_applied()?;
            assert!(records
                .values()
                .all(|r| r.status == Some(ChangesetStatus::Success)));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_held_lock_times_out() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_catalogue()?;
            let coordinator = LockCoordinator::new(ctx.bucket());
            let _held = coordinator.acquire_guard("other-deployer", Duration::ZERO)?;

            let report = ctx
                .builder()
                .lock_timeout(Duration::from_millis(150))
                .lock_retry_interval(Duration::from_millis(10))
                .build()?
                .run();

            assert_eq!(report.state(), RunState::Failed);
            let err = report.error().expect("run should time out");
            assert_eq!(err.kind(), &ErrorKind::LockTimeout);
            assert!(err.message().contains("other-deployer"));
            assert!(ctx.memory().executed_statements().is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_waiting_run_proceeds_after_release() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_catalogue()?;
            let coordinator = LockCoordinator::new(ctx.bucket());
            let held = coordinator.acquire_guard("other-deployer", Duration::ZERO)?;

            let releaser = thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                held.release()
            });

            let report = ctx
                .builder()
                .lock_timeout(Duration::from_secs(10))
                .lock_retry_interval(Duration::from_millis(10))
                .build()?
                .migrate()?;
            releaser.join().expect("releaser panicked")?;

            assert_eq!(report.applied().len(), 4);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unbounded_lock_wait() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_catalogue()?;
            let coordinator = LockCoordinator::new(ctx.bucket());
            let held = coordinator.acquire_guard("other-deployer", Duration::ZERO)?;

            let releaser = thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                held.release()
            });

            let report = ctx
                .builder()
                .lock_timeout(Duration::MAX)
                .lock_retry_interval(Duration::MAX)
                .build()?
                .run();
            releaser.join().expect("releaser panicked")?;

            assert_eq!(report.state(), RunState::Done);
            assert_eq!(report.applied().len(), 4);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_stale_lock_is_reclaimed() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_catalogue()?;
            let coordinator = LockCoordinator::new(ctx.bucket());
            // a deployer that died holding the lock
            let crashed = coordinator.acquire("crashed-deployer", Duration::ZERO)?;
            thread::sleep(Duration::from_millis(60));

            let orchestrator = ctx
                .builder()
                .stale_lock_threshold(Duration::from_millis(50))
                .build()?;
            let report = orchestrator.migrate()?;
            assert_eq!(report.applied().len(), 4);

            let lock = coordinator.current()?.expect("lock document should exist");
            assert!(!lock.is_locked());
            assert_eq!(lock.owner(), orchestrator.config().owner());

            // the crashed deployer no longer owns the lock
            let err = coordinator.release(crashed).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::LockNotOwned);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_live_lock_is_not_reclaimed_without_threshold() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_catalogue()?;
            let coordinator = LockCoordinator::new(ctx.bucket());
            let _held = coordinator.acquire("slow-deployer", Duration::ZERO)?;
            thread::sleep(Duration::from_millis(20));

            let err = ctx.builder().build()?.migrate().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::LockTimeout);

            assert!(coordinator.force_release()?);
            assert_eq!(ctx.builder().build()?.migrate()?.applied().len(), 4);
            Ok(())
        },
        cleanup,
    )
}
