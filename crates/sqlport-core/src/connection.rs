//! The backend connection contract.
//!
//! A `Connection` is the single logical connection of one unit of work. Drivers
//! implement it; the core only ever prepares, binds and executes through it.

use crate::{Error, Row, Value};
use asupersync::{Cx, Outcome};
use std::future::Future;

/// Row counts reported by a backend for one batch execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchRowCounts {
    /// One count per submitted binding set, in submission order.
    PerStatement(Vec<u64>),
    /// The backend only reported a total (or nothing at all) for the whole batch.
    Aggregate(Option<u64>),
}

/// A database connection.
///
/// All operations take a [`Cx`] and return an [`Outcome`] so cancellation and panics
/// propagate without being mistaken for database errors.
pub trait Connection: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Execute one statement text once per binding set, in a single round-trip where
    /// the backend supports it.
    ///
    /// The default implementation executes the bindings one by one and reports a
    /// count per statement. A failure is tagged with the index of the failing entry.
    fn execute_batch(
        &self,
        cx: &Cx,
        sql: &str,
        bindings: &[Vec<Value>],
    ) -> impl Future<Output = Outcome<BatchRowCounts, Error>> + Send {
        async move {
            let mut counts = Vec::with_capacity(bindings.len());
            for (index, params) in bindings.iter().enumerate() {
                match self.execute(cx, sql, params).await {
                    Outcome::Ok(n) => counts.push(n),
                    Outcome::Err(Error::Query(mut q)) => {
                        q.batch_index.get_or_insert(index);
                        return Outcome::Err(Error::Query(q));
                    }
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
            }
            Outcome::Ok(BatchRowCounts::PerStatement(counts))
        }
    }
}
