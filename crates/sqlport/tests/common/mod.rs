#![allow(dead_code)]

use asupersync::runtime::RuntimeBuilder;
use sqlport::prelude::*;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> std::result::Result<T, String> {
    match outcome {
        Outcome::Ok(v) => Ok(v),
        Outcome::Err(e) => Err(format!("unexpected error: {e}")),
        Outcome::Cancelled(r) => Err(format!("cancelled: {r:?}")),
        Outcome::Panicked(p) => Err(format!("panicked: {p:?}")),
    }
}

pub fn expect_err<T>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Err(e) => e,
        other => panic!(
            "expected an error, got {:?}",
            unwrap_outcome(other).map(|_| ())
        ),
    }
}

/// Drive an async test body to completion on a current-thread runtime.
pub fn run(test: impl Future<Output = ()>) {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    rt.block_on(test);
}

/// One backend call as seen by the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Query { sql: String, params: Vec<Value> },
    Execute { sql: String, params: Vec<Value> },
    Batch { sql: String, bindings: Vec<Vec<Value>> },
}

impl Call {
    pub fn sql(&self) -> &str {
        match self {
            Call::Query { sql, .. } | Call::Execute { sql, .. } | Call::Batch { sql, .. } => sql,
        }
    }
}

/// A connection that records every call and answers from scripted responses.
///
/// Unscripted executions report one affected row per statement; unscripted queries
/// return no rows.
#[derive(Debug, Default)]
pub struct RecordingConnection {
    calls: Mutex<Vec<Call>>,
    rows: Mutex<Vec<Row>>,
    execute_counts: Mutex<VecDeque<u64>>,
    batch_counts: Mutex<VecDeque<BatchRowCounts>>,
    failures: Mutex<VecDeque<Error>>,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(self, rows: Vec<Row>) -> Self {
        *self.rows.lock().unwrap() = rows;
        self
    }

    pub fn script_execute(&self, count: u64) {
        self.execute_counts.lock().unwrap().push_back(count);
    }

    pub fn script_batch(&self, counts: BatchRowCounts) {
        self.batch_counts.lock().unwrap().push_back(counts);
    }

    /// The next `execute` or `execute_batch` fails with `error`.
    pub fn fail_next(&self, error: Error) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn take_failure(&self) -> Option<Error> {
        self.failures.lock().unwrap().pop_front()
    }
}

impl Connection for RecordingConnection {
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        self.record(Call::Query {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        let rows = self.rows.lock().unwrap().clone();
        async move { Outcome::Ok(rows) }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        self.record(Call::Execute {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        let result = match self.take_failure() {
            Some(e) => Outcome::Err(e),
            None => Outcome::Ok(self.execute_counts.lock().unwrap().pop_front().unwrap_or(1)),
        };
        async move { result }
    }

    fn execute_batch(
        &self,
        _cx: &Cx,
        sql: &str,
        bindings: &[Vec<Value>],
    ) -> impl Future<Output = Outcome<BatchRowCounts, Error>> + Send {
        self.record(Call::Batch {
            sql: sql.to_string(),
            bindings: bindings.to_vec(),
        });
        let result = match self.take_failure() {
            Some(e) => Outcome::Err(e),
            None => Outcome::Ok(
                self.batch_counts
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| BatchRowCounts::PerStatement(vec![1; bindings.len()])),
            ),
        };
        async move { result }
    }
}

pub fn row(columns: &[&str], values: Vec<Value>) -> Row {
    let columns: Arc<[String]> = columns.iter().map(|c| (*c).to_string()).collect();
    Row::new(columns, values)
}

/// A connection implementing only `query` and `execute`, so batches run through the
/// trait's default `execute_batch`.
#[derive(Debug, Default)]
pub struct ExecuteOnlyConnection {
    executed: Mutex<Vec<Vec<Value>>>,
    counts: Mutex<VecDeque<u64>>,
    fail_at: Mutex<Option<(usize, Error)>>,
}

impl ExecuteOnlyConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_execute(&self, count: u64) {
        self.counts.lock().unwrap().push_back(count);
    }

    /// The `index`-th execution (zero based) fails with `error`.
    pub fn fail_at(&self, index: usize, error: Error) {
        *self.fail_at.lock().unwrap() = Some((index, error));
    }

    pub fn executed(&self) -> Vec<Vec<Value>> {
        self.executed.lock().unwrap().clone()
    }
}

impl Connection for ExecuteOnlyConnection {
    fn query(
        &self,
        _cx: &Cx,
        _sql: &str,
        _params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        async move { Outcome::Ok(Vec::new()) }
    }

    fn execute(
        &self,
        _cx: &Cx,
        _sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let index = {
            let mut executed = self.executed.lock().unwrap();
            executed.push(params.to_vec());
            executed.len() - 1
        };
        let failure = {
            let mut slot = self.fail_at.lock().unwrap();
            if slot.as_ref().is_some_and(|(at, _)| *at == index) {
                slot.take().map(|(_, e)| e)
            } else {
                None
            }
        };
        let result = match failure {
            Some(e) => Outcome::Err(e),
            None => Outcome::Ok(self.counts.lock().unwrap().pop_front().unwrap_or(1)),
        };
        async move { result }
    }
}
