#![allow(clippy::manual_async_fn)]

mod common;

use common::{Call, RecordingConnection, expect_err, row, run, unwrap_outcome};
use sqlport::prelude::*;
use sqlport::LockStrategy;

const SELECT: &str = "select a.id, a.version, a.balance from accounts a where a.owner = ?";

fn accounts() -> EntityLockInfo {
    EntityLockInfo::new("accounts", ["id"]).versioned("version")
}

fn account_row(id: i64, version: i32) -> Row {
    row(
        &["id", "version", "balance"],
        vec![Value::BigInt(id), Value::Int(version), Value::Text("10.00".into())],
    )
}

fn sqlite() -> SessionConfig {
    SessionConfig::new(Dialect::Sqlite)
}

#[test]
fn upgrade_without_hint_syntax_selects_then_locks() {
    let cx = Cx::for_testing();
    run(async {
        let conn = RecordingConnection::new().with_rows(vec![account_row(7, 3)]);
        let uow = UnitOfWork::new(conn, sqlite());
        let request = LockRequest::new(LockMode::UPGRADE, "a");

        let rows = unwrap_outcome(
            uow.select_with_lock(&cx, &accounts(), request, SELECT, &[Value::Int(1)])
                .await,
        )
        .unwrap();
        assert_eq!(rows.len(), 1);

        assert_eq!(
            uow.connection().calls(),
            vec![
                Call::Query {
                    sql: SELECT.to_string(),
                    params: vec![Value::Int(1)],
                },
                Call::Execute {
                    sql: "update accounts set version = version where id = ? and version = ?"
                        .to_string(),
                    params: vec![Value::BigInt(7), Value::Int(3)],
                },
            ]
        );
    });
}

#[test]
fn vanished_row_is_an_optimistic_lock_failure() {
    let cx = Cx::for_testing();
    run(async {
        let conn = RecordingConnection::new().with_rows(vec![account_row(7, 3)]);
        conn.script_execute(0);
        let uow = UnitOfWork::new(conn, sqlite());
        let request = LockRequest::new(LockMode::UPGRADE, "a");

        let err = expect_err(
            uow.select_with_lock(&cx, &accounts(), request, SELECT, &[])
                .await,
        );
        assert!(err.is_optimistic_lock_failure());
        assert!(!err.is_connection_error());
        let Error::StaleState(stale) = &err else {
            panic!("expected stale state, got {err}");
        };
        assert_eq!(stale.table, "accounts");
        assert_eq!(stale.identifier, "7");
    });
}

#[test]
fn connection_failure_during_lock_is_not_stale_state() {
    let cx = Cx::for_testing();
    run(async {
        let conn = RecordingConnection::new().with_rows(vec![account_row(1, 1)]);
        conn.fail_next(Error::Connection(sqlport::ConnectionError {
            kind: sqlport::ConnectionErrorKind::Disconnected,
            message: "server closed the connection".to_string(),
            source: None,
        }));
        let uow = UnitOfWork::new(conn, sqlite());
        let err = expect_err(
            uow.select_with_lock(&cx, &accounts(), LockRequest::new(LockMode::UPGRADE, "a"), SELECT, &[])
                .await,
        );
        assert!(err.is_connection_error());
        assert!(!err.is_optimistic_lock_failure());
    });
}

#[test]
fn force_increment_bumps_version_in_fallback() {
    let cx = Cx::for_testing();
    run(async {
        let conn = RecordingConnection::new().with_rows(vec![account_row(2, 5)]);
        let uow = UnitOfWork::new(conn, sqlite());
        let request = LockRequest::new(LockMode::PessimisticForceIncrement, "a");
        unwrap_outcome(
            uow.select_with_lock(&cx, &accounts(), request, SELECT, &[])
                .await,
        )
        .unwrap();
        let calls = uow.connection().calls();
        assert_eq!(
            calls[1].sql(),
            "update accounts set version = version + 1 where id = ? and version = ?"
        );
    });
}

#[test]
fn sybase_upgrade_uses_holdlock_hint_only() {
    let cx = Cx::for_testing();
    run(async {
        let conn = RecordingConnection::new().with_rows(vec![account_row(7, 3)]);
        let uow = UnitOfWork::new(conn, SessionConfig::new(Dialect::SybaseAse));
        let request = LockRequest::new(LockMode::UPGRADE, "a");
        unwrap_outcome(
            uow.select_with_lock(&cx, &accounts(), request, SELECT, &[])
                .await,
        )
        .unwrap();

        let calls = uow.connection().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].sql(),
            "select a.id, a.version, a.balance from accounts a holdlock where a.owner = ?"
        );
    });
}

#[test]
fn postgres_appends_for_update() {
    let cx = Cx::for_testing();
    run(async {
        let uow = UnitOfWork::new(RecordingConnection::new(), SessionConfig::new(Dialect::Postgres));
        let request = LockRequest::new(LockMode::PessimisticWrite, "a").timeout(LockTimeout::NoWait);
        unwrap_outcome(
            uow.select_with_lock(&cx, &accounts(), request, SELECT, &[])
                .await,
        )
        .unwrap();
        assert_eq!(
            uow.connection().calls()[0].sql(),
            format!("{SELECT} for update nowait")
        );
    });
}

#[test]
fn optimistic_modes_run_select_unchanged() {
    let cx = Cx::for_testing();
    run(async {
        let conn = RecordingConnection::new().with_rows(vec![account_row(1, 1)]);
        let uow = UnitOfWork::new(conn, sqlite());
        for mode in [LockMode::None, LockMode::Read, LockMode::Optimistic] {
            unwrap_outcome(
                uow.select_with_lock(&cx, &accounts(), LockRequest::new(mode, "a"), SELECT, &[])
                    .await,
            )
            .unwrap();
        }
        let calls = uow.connection().calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|c| matches!(c, Call::Query { sql, .. } if sql == SELECT)));
    });
}

#[test]
fn inspector_sees_select_and_lock_statement() {
    let cx = Cx::for_testing();
    run(async {
        let conn = RecordingConnection::new().with_rows(vec![account_row(7, 3)]);
        let uow = UnitOfWork::<RecordingConnection>::builder()
            .config(sqlite())
            .inspector(InspectorHandle::scoped(CommentInspector::new("lock")))
            .build_with(conn);
        unwrap_outcome(
            uow.select_with_lock(&cx, &accounts(), LockRequest::new(LockMode::UPGRADE, "a"), SELECT, &[])
                .await,
        )
        .unwrap();
        let calls = uow.connection().calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.sql().starts_with("/* lock */ ")));
    });
}

#[test]
fn missing_identifier_column_is_reported() {
    let cx = Cx::for_testing();
    run(async {
        let conn = RecordingConnection::new()
            .with_rows(vec![row(&["balance"], vec![Value::Text("1".into())])]);
        let uow = UnitOfWork::new(conn, sqlite());
        let err = expect_err(
            uow.select_with_lock(&cx, &accounts(), LockRequest::new(LockMode::UPGRADE, "a"), SELECT, &[])
                .await,
        );
        assert!(matches!(err, Error::Protocol(_)));
        assert!(err.to_string().contains("id"));
    });
}

#[test]
fn every_dialect_resolves_upgrade() {
    for dialect in Dialect::ALL {
        let strategy = LockStrategy::resolve(
            dialect.capabilities(),
            &LockRequest::new(LockMode::UPGRADE, "a"),
        );
        let expect_fallback = dialect == Dialect::Sqlite;
        assert_eq!(
            matches!(strategy, LockStrategy::SelectThenLock { .. }),
            expect_fallback,
            "{dialect}"
        );
    }
}

#[test]
fn hint_without_matching_table_fails_before_querying() {
    let cx = Cx::for_testing();
    run(async {
        let conn = RecordingConnection::new().with_rows(vec![account_row(7, 3)]);
        let uow = UnitOfWork::new(conn, SessionConfig::new(Dialect::SqlServer));
        let err = expect_err(
            uow.select_with_lock(
                &cx,
                &accounts(),
                LockRequest::new(LockMode::UPGRADE, "a"),
                "select * from (select id, version from accounts) a where a.id = ?",
                &[Value::BigInt(7)],
            )
            .await,
        );
        assert!(matches!(err, Error::Protocol(_)));
        assert!(!err.is_optimistic_lock_failure());
        assert_eq!(uow.connection().call_count(), 0);
    });
}
