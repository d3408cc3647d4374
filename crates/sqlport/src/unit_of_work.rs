//! A unit of work: one connection, one dialect, one batcher.
//!
//! This is the handle persistence code holds while it writes. It owns the single
//! logical connection of the unit of work and routes DDL, locking selects and batched
//! statements through the dialect's capability row and the configured inspector.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlport::prelude::*;
//!
//! let mut uow = UnitOfWork::builder()
//!     .config(SessionConfig::new(Dialect::SqlServer).batch_size(50))
//!     .inspector(InspectorHandle::scoped(CommentInspector::new("import-job")))
//!     .build_with(connection);
//!
//! uow.add_to_batch(&cx, "insert into users (id) values (?)", vec![1.into()]).await;
//! let outcomes = uow.execute_batch(&cx).await;
//! ```

use asupersync::{Cx, Outcome};
use sqlport_core::{
    Connection, DialectCapabilities, Error, InspectorHandle, Lockable, Row, UniqueKey, Value,
};
use sqlport_query::{LockRequest, LockingQuery};
use sqlport_schema::UniqueDelegate;
use sqlport_session::{BatchStats, Batcher, Expectation, SessionConfig, StatementOutcome};

/// The connection and statement pipeline of one unit of work.
#[derive(Debug)]
pub struct UnitOfWork<C: Connection> {
    connection: C,
    config: SessionConfig,
    caps: &'static DialectCapabilities,
    unique: UniqueDelegate,
    batcher: Batcher,
}

impl<C: Connection> UnitOfWork<C> {
    /// Create a unit of work with the given configuration and no inspector.
    pub fn new(connection: C, config: SessionConfig) -> Self {
        UnitOfWorkBuilder::new().config(config).build_with(connection)
    }

    #[must_use]
    pub fn builder() -> UnitOfWorkBuilder {
        UnitOfWorkBuilder::new()
    }

    #[must_use]
    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &'static DialectCapabilities {
        self.caps
    }

    pub fn stats(&self) -> BatchStats {
        self.batcher.stats()
    }

    /// Statements added but not yet sent to the backend.
    pub fn pending(&self) -> usize {
        self.batcher.pending()
    }

    /// Outcomes collected since the last `execute_batch` or `abort_batch`, including
    /// those of automatic flushes.
    pub fn batch_outcomes(&self) -> &[StatementOutcome] {
        self.batcher.pending_outcomes()
    }

    /// Consume the unit of work and return the connection.
    ///
    /// This does not flush. Statements still queued, and outcomes not yet collected by
    /// [`execute_batch`](Self::execute_batch), are discarded with a warning; call
    /// `execute_batch` first to send them.
    pub fn into_connection(mut self) -> C {
        let pending = self.batcher.pending();
        if pending > 0 {
            tracing::warn!(pending, "Unit of work closed with unexecuted statements; discarding");
        }
        self.batcher.abort_batch();
        self.connection
    }

    // ------------------------------------------------------------------------
    // DDL
    // ------------------------------------------------------------------------

    pub fn unique_delegate(&self) -> UniqueDelegate {
        self.unique
    }

    /// Create a unique constraint. Returns `false` when the dialect declares
    /// uniqueness inline and there was nothing to execute.
    pub async fn add_unique_key(&self, cx: &Cx, key: &UniqueKey) -> Outcome<bool, Error> {
        let sql = self.unique.add_unique_key_command(key, self.caps);
        self.execute_ddl(cx, &sql).await
    }

    /// Drop a unique constraint. Returns `false` when there was nothing to execute.
    pub async fn drop_unique_key(&self, cx: &Cx, key: &UniqueKey) -> Outcome<bool, Error> {
        let sql = self.unique.drop_unique_key_command(key, self.caps);
        self.execute_ddl(cx, &sql).await
    }

    async fn execute_ddl(&self, cx: &Cx, sql: &str) -> Outcome<bool, Error> {
        if sql.is_empty() {
            return Outcome::Ok(false);
        }
        let sql = self.batcher.inspector().apply(sql);
        tracing::debug!(sql = %sql, "Executing DDL");
        self.connection.execute(cx, &sql, &[]).await.map(|_| true)
    }

    // ------------------------------------------------------------------------
    // Locking
    // ------------------------------------------------------------------------

    /// Run a select with the requested row lock on the entity's root table.
    pub async fn select_with_lock<L: Lockable + ?Sized>(
        &self,
        cx: &Cx,
        lockable: &L,
        request: LockRequest,
        sql: &str,
        params: &[Value],
    ) -> Outcome<Vec<Row>, Error> {
        LockingQuery::new(self.caps, lockable, request)
            .inspector(self.batcher.inspector())
            .execute(cx, &self.connection, sql, params)
            .await
    }

    // ------------------------------------------------------------------------
    // Batching
    // ------------------------------------------------------------------------

    pub async fn add_to_batch(
        &mut self,
        cx: &Cx,
        sql: &str,
        bindings: Vec<Value>,
    ) -> Outcome<(), Error> {
        self.batcher
            .add_to_batch(cx, &self.connection, sql, bindings)
            .await
    }

    pub async fn add_to_batch_expecting(
        &mut self,
        cx: &Cx,
        sql: &str,
        bindings: Vec<Value>,
        expectation: Expectation,
    ) -> Outcome<(), Error> {
        self.batcher
            .add_to_batch_expecting(cx, &self.connection, sql, bindings, expectation)
            .await
    }

    pub async fn execute_batch(&mut self, cx: &Cx) -> Outcome<Vec<StatementOutcome>, Error> {
        self.batcher.execute_batch(cx, &self.connection).await
    }

    pub fn abort_batch(&mut self) {
        self.batcher.abort_batch();
    }
}

/// Builder for [`UnitOfWork`].
#[derive(Debug, Default)]
pub struct UnitOfWorkBuilder {
    config: SessionConfig,
    inspector: InspectorHandle,
}

impl UnitOfWorkBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Statement inspector for this unit of work; either shared or scoped.
    #[must_use]
    pub fn inspector(mut self, inspector: InspectorHandle) -> Self {
        self.inspector = inspector;
        self
    }

    pub fn build_with<C: Connection>(self, connection: C) -> UnitOfWork<C> {
        let caps = self.config.dialect.capabilities();
        let batcher = self
            .config
            .batch_config()
            .create_batcher_with_inspector(self.inspector);
        tracing::debug!(
            dialect = caps.name,
            batch_size = batcher.batch_size(),
            "Unit of work opened"
        );
        UnitOfWork {
            connection,
            caps,
            unique: UniqueDelegate::for_dialect(caps),
            batcher,
            config: self.config,
        }
    }
}
