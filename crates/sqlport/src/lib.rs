//! sqlport: portable SQL generation and batched execution.
//!
//! The workspace lets persistence code emit backend-correct SQL for row locking,
//! unique-constraint DDL and statement batching without knowing which relational
//! backend it talks to. Backend differences live in one capability row per dialect.
//!
//! # Crates
//!
//! - `sqlport-core`: dialect capabilities, schema model, `Connection`, `Lockable`,
//!   statement inspectors and the error type.
//! - `sqlport-schema`: unique-constraint DDL.
//! - `sqlport-query`: lock strategy resolution and locking selects.
//! - `sqlport-session`: session configuration and the statement batcher.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlport::prelude::*;
//!
//! let config = SessionConfig::from_json(r#"{"dialect": "sybase_ase", "batch_size": 20}"#)?;
//! let mut uow = UnitOfWork::new(connection, config);
//!
//! let rows = uow
//!     .select_with_lock(&cx, &account_lock_info, LockRequest::new(LockMode::UPGRADE, "a"), sql, &params)
//!     .await;
//! ```

pub mod unit_of_work;

pub use sqlport_core::{
    BatchError, BatchRowCounts, Capability, CapabilityValue, Column, CommentInspector,
    Connection, ConnectionError, ConnectionErrorKind, Cx, Dialect, DialectCapabilities,
    EntityLockInfo, Error, Identifier, InspectorHandle, Lockable, Outcome, QualifiedName,
    QueryError, QueryErrorKind, RegexInspector, Result, Row, SortOrder, StaleStateError,
    StatementInspector, StatementKind, Table, UniqueKey, Value,
};
pub use sqlport_query::{LockMode, LockRequest, LockStrategy, LockTimeout, LockingQuery};
pub use sqlport_schema::UniqueDelegate;
pub use sqlport_session::{
    BatchConfig, BatchStats, Batcher, Expectation, SessionConfig, StatementOutcome,
};
pub use unit_of_work::{UnitOfWork, UnitOfWorkBuilder};

/// Everything needed for typical use.
pub mod prelude {
    pub use crate::{
        BatchRowCounts, Column, CommentInspector, Connection, Cx, Dialect, EntityLockInfo, Error,
        Expectation, InspectorHandle, LockMode, LockRequest, LockTimeout, Lockable, Outcome,
        QualifiedName, Result, Row, SessionConfig, SortOrder, StatementInspector,
        StatementOutcome, Table, UniqueDelegate, UniqueKey, UnitOfWork, Value,
    };
}
