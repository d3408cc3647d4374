#![allow(clippy::manual_async_fn)]

mod common;

use common::{Call, RecordingConnection, run, unwrap_outcome};
use sqlport::prelude::*;

fn email_key() -> UniqueKey {
    UniqueKey::new("UK_EMAIL", "users").column(Column::new("email"))
}

#[test]
fn drop_without_if_exists_support() {
    let cx = Cx::for_testing();
    run(async {
        let uow = UnitOfWork::new(
            RecordingConnection::new(),
            SessionConfig::new(Dialect::SybaseAse),
        );
        assert!(unwrap_outcome(uow.drop_unique_key(&cx, &email_key()).await).unwrap());
        assert_eq!(
            uow.connection().calls(),
            vec![Call::Execute {
                sql: "alter table users drop constraint UK_EMAIL".to_string(),
                params: vec![],
            }]
        );
    });
}

#[test]
fn drop_with_if_exists_before_name() {
    let cx = Cx::for_testing();
    run(async {
        let uow = UnitOfWork::new(
            RecordingConnection::new(),
            SessionConfig::new(Dialect::Postgres),
        );
        unwrap_outcome(uow.drop_unique_key(&cx, &email_key()).await).unwrap();
        assert_eq!(
            uow.connection().calls()[0].sql(),
            "alter table users drop constraint if exists UK_EMAIL"
        );
    });
}

#[test]
fn add_constraint_through_unit_of_work() {
    let cx = Cx::for_testing();
    run(async {
        let uow = UnitOfWork::new(
            RecordingConnection::new(),
            SessionConfig::new(Dialect::Mysql),
        );
        let key = UniqueKey::new("`uk_order`", "orders")
            .column(Column::new("customer_id"))
            .ordered_column(Column::new("`number`"), SortOrder::Desc);
        assert_eq!(uow.unique_delegate(), UniqueDelegate::AlterTable);
        unwrap_outcome(uow.add_unique_key(&cx, &key).await).unwrap();
        assert_eq!(
            uow.connection().calls()[0].sql(),
            "alter table orders add constraint `uk_order` unique (customer_id, `number` desc)"
        );
    });
}

#[test]
fn inline_dialect_executes_nothing() {
    let cx = Cx::for_testing();
    run(async {
        let uow = UnitOfWork::new(
            RecordingConnection::new(),
            SessionConfig::new(Dialect::Sqlite),
        );
        assert_eq!(uow.unique_delegate(), UniqueDelegate::Inline);
        assert!(!unwrap_outcome(uow.add_unique_key(&cx, &email_key()).await).unwrap());
        assert!(!unwrap_outcome(uow.drop_unique_key(&cx, &email_key()).await).unwrap());
        assert_eq!(uow.connection().call_count(), 0);
    });
}

#[test]
fn config_from_json_selects_dialect_behavior() {
    let config =
        SessionConfig::from_json(r#"{"dialect": "mariadb", "batch_size": 30}"#).unwrap();
    let uow = UnitOfWork::new(RecordingConnection::new(), config);
    assert_eq!(uow.capabilities().name, "mariadb");
    let sql = uow
        .unique_delegate()
        .drop_unique_key_command(&email_key(), uow.capabilities());
    assert_eq!(sql, "alter table users drop index if exists UK_EMAIL");
}

#[test]
fn capability_lookup_by_name() {
    let caps = Dialect::H2.capabilities();
    assert_eq!(
        caps.capability_named("supportsIfExistsBeforeConstraintName")
            .unwrap()
            .as_flag(),
        Some(true)
    );
    let err = caps.capability_named("supportsTimeTravel").unwrap_err();
    assert!(matches!(err, Error::Capability(_)));
}
