//! Statement batching.
//!
//! Statements are grouped while consecutive submissions share the same SQL text.
//! A group is flushed when it reaches the batch size, when a statement with
//! different text arrives, or when [`Batcher::execute_batch`] is called. Every
//! submitted statement yields exactly one [`StatementOutcome`], in submission order,
//! across all flushes since the previous `execute_batch` or `abort_batch`.

use crate::BatchConfig;
use asupersync::{Cx, Outcome};
use regex::Regex;
use serde::Serialize;
use sqlport_core::{
    BatchError, BatchRowCounts, Connection, Error, InspectorHandle, StaleStateError,
    StatementKind, Value,
};
use std::sync::OnceLock;

/// The result of one batched statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementOutcome {
    /// The statement ran and affected this many rows.
    Applied { rows: u64 },
    /// The statement ran but the backend did not say what it affected.
    Unknown,
    /// The statement's group failed during its flush. Entries ahead of the failing
    /// position may have been applied before the backend gave up.
    Failed,
}

impl StatementOutcome {
    pub fn rows(self) -> Option<u64> {
        match self {
            StatementOutcome::Applied { rows } => Some(rows),
            StatementOutcome::Unknown | StatementOutcome::Failed => None,
        }
    }

    pub fn is_unknown(self) -> bool {
        self == StatementOutcome::Unknown
    }

    pub fn is_failed(self) -> bool {
        self == StatementOutcome::Failed
    }
}

/// What a statement is expected to affect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expectation {
    /// Any row count is accepted.
    #[default]
    None,
    /// Exactly this many rows, e.g. `1` for a versioned update.
    RowCount(u64),
}

/// Counters for one batcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BatchStats {
    /// Backend round-trips made by flushes.
    pub flushes: u64,
    /// Statements executed.
    pub statements: u64,
    /// Statements whose outcome was reported as unknown.
    pub unknown_outcomes: u64,
    /// Flushes that failed.
    pub failed_flushes: u64,
    /// Statements recorded as failed.
    pub failed_statements: u64,
    /// Statements discarded by `abort_batch`.
    pub aborted_statements: u64,
}

// ============================================================================
// Batch Groups
// ============================================================================

/// Consecutive statements with identical text.
#[derive(Debug)]
struct BatchGroup {
    sql: String,
    kind: StatementKind,
    table: Option<String>,
    bindings: Vec<Vec<Value>>,
    expectations: Vec<Expectation>,
}

impl BatchGroup {
    fn new(sql: &str) -> Self {
        let (kind, table) = classify(sql);
        Self {
            sql: sql.to_string(),
            kind,
            table,
            bindings: Vec::new(),
            expectations: Vec::new(),
        }
    }

    fn push(&mut self, bindings: Vec<Value>, expectation: Expectation) {
        self.bindings.push(bindings);
        self.expectations.push(expectation);
    }

    fn len(&self) -> usize {
        self.bindings.len()
    }

    fn wrap_error(&self, sql: &str, source: Error) -> Error {
        let position = match &source {
            Error::Query(q) => q.batch_index,
            _ => None,
        };
        Error::Batch(BatchError {
            kind: self.kind,
            table: self.table.clone(),
            position,
            batch_size: self.len(),
            sql: sql.to_string(),
            source: Box::new(source),
        })
    }
}

fn statement_shape() -> Option<&'static Regex> {
    static SHAPE: OnceLock<Option<Regex>> = OnceLock::new();
    SHAPE
        .get_or_init(|| {
            Regex::new(r"(?i)^\s*(insert\s+into|update|delete\s+from|delete)\s+([^\s(]+)").ok()
        })
        .as_ref()
}

/// Statement kind and target table, as far as the text reveals them.
fn classify(sql: &str) -> (StatementKind, Option<String>) {
    let Some(caps) = statement_shape().and_then(|re| re.captures(sql)) else {
        return (StatementKind::Other, None);
    };
    let verb = caps[1].to_ascii_lowercase();
    let kind = if verb.starts_with("insert") {
        StatementKind::Insert
    } else if verb.starts_with("update") {
        StatementKind::Update
    } else {
        StatementKind::Delete
    };
    (kind, caps.get(2).map(|m| m.as_str().to_string()))
}

// ============================================================================
// Batcher
// ============================================================================

/// Groups and executes the statements of one unit of work.
#[derive(Debug)]
pub struct Batcher {
    config: BatchConfig,
    inspector: InspectorHandle,
    current: Option<BatchGroup>,
    outcomes: Vec<StatementOutcome>,
    stats: BatchStats,
}

impl Batcher {
    pub fn new(config: BatchConfig, inspector: InspectorHandle) -> Self {
        Self {
            config,
            inspector,
            current: None,
            outcomes: Vec::new(),
            stats: BatchStats::default(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    /// Statements added but not yet flushed.
    pub fn pending(&self) -> usize {
        self.current.as_ref().map_or(0, BatchGroup::len)
    }

    /// Outcomes collected since the last `execute_batch` or `abort_batch`.
    pub fn pending_outcomes(&self) -> &[StatementOutcome] {
        &self.outcomes
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    /// The inspector applied to every flushed statement.
    pub fn inspector(&self) -> &InspectorHandle {
        &self.inspector
    }

    fn bound(&self) -> usize {
        self.config.batch_size.max(1)
    }

    /// Add a statement with no row-count expectation.
    pub async fn add_to_batch<C: Connection>(
        &mut self,
        cx: &Cx,
        conn: &C,
        sql: &str,
        bindings: Vec<Value>,
    ) -> Outcome<(), Error> {
        self.add_to_batch_expecting(cx, conn, sql, bindings, Expectation::None)
            .await
    }

    /// Add a statement, flushing as needed.
    ///
    /// When `sql` differs from the text of the pending group, the pending group is
    /// flushed first; if that flush fails the new statement stays queued.
    #[tracing::instrument(level = "trace", skip(self, cx, conn, bindings))]
    pub async fn add_to_batch_expecting<C: Connection>(
        &mut self,
        cx: &Cx,
        conn: &C,
        sql: &str,
        bindings: Vec<Value>,
        expectation: Expectation,
    ) -> Outcome<(), Error> {
        if let Some(group) = self.current.as_mut().filter(|g| g.sql == sql) {
            group.push(bindings, expectation);
        } else {
            let mut group = BatchGroup::new(sql);
            group.push(bindings, expectation);
            if let Some(previous) = self.current.replace(group) {
                tracing::debug!(
                    previous = %previous.sql,
                    next = %sql,
                    "Statement shape changed; flushing pending batch"
                );
                match self.flush(cx, conn, previous).await {
                    Outcome::Ok(()) => {}
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
            }
        }

        if self.pending() >= self.bound() {
            if let Some(full) = self.current.take() {
                return self.flush(cx, conn, full).await;
            }
        }
        Outcome::Ok(())
    }

    /// Flush pending statements and return the outcome of every statement added since
    /// the previous `execute_batch` or `abort_batch`.
    ///
    /// On failure the collected outcomes, including the [`StatementOutcome::Failed`]
    /// entries of the failed group, are kept and returned by the next successful call.
    #[tracing::instrument(level = "debug", skip(self, cx, conn))]
    pub async fn execute_batch<C: Connection>(
        &mut self,
        cx: &Cx,
        conn: &C,
    ) -> Outcome<Vec<StatementOutcome>, Error> {
        if let Some(group) = self.current.take() {
            match self.flush(cx, conn, group).await {
                Outcome::Ok(()) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        let outcomes = std::mem::take(&mut self.outcomes);
        tracing::info!(
            statements = outcomes.len(),
            flushes = self.stats.flushes,
            unknown = outcomes.iter().filter(|o| o.is_unknown()).count(),
            "Batch executed"
        );
        Outcome::Ok(outcomes)
    }

    /// Discard unflushed statements and uncollected outcomes. Nothing is sent to the
    /// backend.
    pub fn abort_batch(&mut self) {
        let dropped = self.pending();
        self.current = None;
        self.outcomes.clear();
        self.stats.aborted_statements += dropped as u64;
        tracing::debug!(dropped, "Batch aborted");
    }

    async fn flush<C: Connection>(
        &mut self,
        cx: &Cx,
        conn: &C,
        group: BatchGroup,
    ) -> Outcome<(), Error> {
        let size = group.len();
        if size == 0 {
            return Outcome::Ok(());
        }
        let sql = self.inspector.apply(&group.sql).into_owned();
        tracing::debug!(
            kind = %group.kind,
            table = group.table.as_deref().unwrap_or(""),
            size,
            "Flushing batch"
        );
        tracing::trace!(sql = %sql, "Batch statement");

        self.stats.flushes += 1;
        let result = if self.config.is_batching() {
            conn.execute_batch(cx, &sql, &group.bindings).await
        } else {
            execute_each(cx, conn, &sql, &group.bindings).await
        };
        let counts = match result {
            Outcome::Ok(counts) => counts,
            Outcome::Err(e) => {
                self.stats.failed_flushes += 1;
                self.stats.failed_statements += size as u64;
                self.outcomes
                    .extend(std::iter::repeat_n(StatementOutcome::Failed, size));
                return Outcome::Err(group.wrap_error(&sql, e));
            }
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        self.stats.statements += size as u64;

        let outcomes: Vec<StatementOutcome> = match counts {
            _ if self.config.is_batching() && !self.config.reports_row_counts => {
                tracing::debug!(size, "Dialect reports no per-statement batch counts");
                vec![StatementOutcome::Unknown; size]
            }
            BatchRowCounts::PerStatement(counts) if counts.len() == size => counts
                .into_iter()
                .map(|rows| StatementOutcome::Applied { rows })
                .collect(),
            BatchRowCounts::PerStatement(counts) => {
                tracing::warn!(
                    expected = size,
                    reported = counts.len(),
                    "Backend reported a row count vector of the wrong length; outcomes unknown"
                );
                vec![StatementOutcome::Unknown; size]
            }
            BatchRowCounts::Aggregate(total) => {
                tracing::warn!(
                    size,
                    total = ?total,
                    "Backend reported no per-statement row counts; outcomes unknown"
                );
                vec![StatementOutcome::Unknown; size]
            }
        };

        self.stats.unknown_outcomes += outcomes.iter().filter(|o| o.is_unknown()).count() as u64;
        let checked = if self.config.check_row_counts {
            check_expectations(&group, &outcomes)
        } else {
            Ok(())
        };
        self.outcomes.extend(outcomes);
        match checked {
            Ok(()) => Outcome::Ok(()),
            Err(e) => {
                self.stats.failed_flushes += 1;
                Outcome::Err(e)
            }
        }
    }
}

impl Drop for Batcher {
    fn drop(&mut self) {
        let pending = self.pending();
        if pending > 0 {
            tracing::warn!(pending, "Batcher dropped with unexecuted statements");
        }
    }
}

/// Execute each binding set as its own statement.
async fn execute_each<C: Connection>(
    cx: &Cx,
    conn: &C,
    sql: &str,
    bindings: &[Vec<Value>],
) -> Outcome<BatchRowCounts, Error> {
    let mut counts = Vec::with_capacity(bindings.len());
    for (index, params) in bindings.iter().enumerate() {
        match conn.execute(cx, sql, params).await {
            Outcome::Ok(n) => counts.push(n),
            Outcome::Err(Error::Query(q)) => {
                return Outcome::Err(Error::Query(q.with_batch_index(index)));
            }
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    }
    Outcome::Ok(BatchRowCounts::PerStatement(counts))
}

/// Unknown counts are never checked.
fn check_expectations(group: &BatchGroup, outcomes: &[StatementOutcome]) -> Result<(), Error> {
    for (position, (outcome, expectation)) in outcomes.iter().zip(&group.expectations).enumerate()
    {
        if let (StatementOutcome::Applied { rows }, Expectation::RowCount(expected)) =
            (outcome, expectation)
        {
            if rows != expected {
                return Err(Error::StaleState(StaleStateError {
                    table: group.table.clone().unwrap_or_default(),
                    identifier: format!("batch position {position}"),
                    message: format!(
                        "{} affected {rows} rows, expected {expected}",
                        group.kind
                    ),
                }));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_statements() {
        assert_eq!(
            classify("insert into users (id, name) values (?, ?)"),
            (StatementKind::Insert, Some("users".to_string()))
        );
        assert_eq!(
            classify("  UPDATE app.accounts set balance = ? where id = ?"),
            (StatementKind::Update, Some("app.accounts".to_string()))
        );
        assert_eq!(
            classify("delete from orders where id = ?"),
            (StatementKind::Delete, Some("orders".to_string()))
        );
        assert_eq!(
            classify("delete orders where id = ?"),
            (StatementKind::Delete, Some("orders".to_string()))
        );
        assert_eq!(classify("select 1"), (StatementKind::Other, None));
    }

    #[test]
    fn test_expectation_mismatch_is_stale_state() {
        let mut group = BatchGroup::new("update accounts set v = v + 1 where id = ?");
        group.push(vec![Value::Int(1)], Expectation::RowCount(1));
        group.push(vec![Value::Int(2)], Expectation::RowCount(1));
        let outcomes = [
            StatementOutcome::Applied { rows: 1 },
            StatementOutcome::Applied { rows: 0 },
        ];
        let err = check_expectations(&group, &outcomes).unwrap_err();
        assert!(err.is_optimistic_lock_failure());
        assert!(err.to_string().contains("batch position 1"));
    }

    #[test]
    fn test_unknown_counts_are_not_checked() {
        let mut group = BatchGroup::new("delete from t where id = ?");
        group.push(vec![Value::Int(1)], Expectation::RowCount(1));
        assert!(check_expectations(&group, &[StatementOutcome::Unknown]).is_ok());
    }

    #[test]
    fn test_abort_without_pending_is_noop() {
        let mut batcher = BatchConfig::default().create_batcher();
        batcher.abort_batch();
        assert_eq!(batcher.pending(), 0);
        assert_eq!(batcher.stats(), BatchStats::default());
    }
}
