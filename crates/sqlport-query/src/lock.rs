//! Pessimistic and optimistic row locking.
//!
//! A [`LockRequest`] is resolved against a dialect's capability row into a
//! [`LockStrategy`]. Dialects with hint syntax lock through an inline table hint,
//! dialects with a locking clause append it to the select, and everything else falls
//! back to selecting first and then locking each returned row with a dedicated
//! statement ([`LockingQuery`]).

use asupersync::{Cx, Outcome};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use sqlport_core::{
    Connection, DialectCapabilities, Error, InspectorHandle, Lockable, ProtocolError, Row,
    StaleStateError, Value,
};
use std::fmt;
use std::sync::OnceLock;

// ============================================================================
// Lock Modes
// ============================================================================

/// How strongly a row should be locked when it is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// No lock.
    #[default]
    None,
    /// Read at the isolation level of the connection.
    Read,
    /// Check the version at commit time.
    Optimistic,
    /// Check the version and increment it at commit time.
    OptimisticForceIncrement,
    /// Shared row lock.
    PessimisticRead,
    /// Exclusive row lock.
    #[serde(alias = "upgrade")]
    PessimisticWrite,
    /// Exclusive row lock that also increments the version.
    PessimisticForceIncrement,
}

impl LockMode {
    /// Legacy name of [`LockMode::PessimisticWrite`].
    pub const UPGRADE: LockMode = LockMode::PessimisticWrite;

    /// Whether the mode requires a database lock at read time.
    pub const fn is_pessimistic(self) -> bool {
        matches!(
            self,
            LockMode::PessimisticRead
                | LockMode::PessimisticWrite
                | LockMode::PessimisticForceIncrement
        )
    }

    pub const fn increments_version(self) -> bool {
        matches!(
            self,
            LockMode::OptimisticForceIncrement | LockMode::PessimisticForceIncrement
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            LockMode::None => "none",
            LockMode::Read => "read",
            LockMode::Optimistic => "optimistic",
            LockMode::OptimisticForceIncrement => "optimistic_force_increment",
            LockMode::PessimisticRead => "pessimistic_read",
            LockMode::PessimisticWrite => "pessimistic_write",
            LockMode::PessimisticForceIncrement => "pessimistic_force_increment",
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when the row is already locked by someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockTimeout {
    /// Wait as long as the backend allows.
    #[default]
    Wait,
    /// Fail immediately.
    NoWait,
    /// Skip rows that are locked.
    SkipLocked,
    /// Wait at most this many milliseconds.
    Millis(u32),
}

/// A lock to apply to one aliased table of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    pub mode: LockMode,
    pub alias: String,
    pub timeout: LockTimeout,
}

impl LockRequest {
    pub fn new(mode: LockMode, alias: impl Into<String>) -> Self {
        Self {
            mode,
            alias: alias.into(),
            timeout: LockTimeout::Wait,
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: LockTimeout) -> Self {
        self.timeout = timeout;
        self
    }
}

// ============================================================================
// Strategy Resolution
// ============================================================================

/// How a lock request is carried out on a given dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStrategy {
    /// The mode needs no SQL.
    None,
    /// Inline hint placed right after the aliased table reference.
    TableHint { hint: &'static str },
    /// Clause appended to the end of the select.
    ForUpdate { clause: String },
    /// Run the select unchanged, then lock every returned row.
    SelectThenLock { mode: LockMode },
}

impl LockStrategy {
    /// Resolve a request for a dialect. Pure; no state is kept between calls.
    pub fn resolve(caps: &DialectCapabilities, request: &LockRequest) -> Self {
        let mode = request.mode;
        if !mode.is_pessimistic() {
            return LockStrategy::None;
        }
        let read = mode == LockMode::PessimisticRead;

        if let Some(hints) = caps.lock_hints {
            let hint = if read {
                hints.read
            } else {
                match request.timeout {
                    LockTimeout::NoWait => hints.write_no_wait.unwrap_or(hints.write),
                    LockTimeout::SkipLocked => hints.write_skip_locked.unwrap_or(hints.write),
                    LockTimeout::Wait | LockTimeout::Millis(_) => hints.write,
                }
            };
            return LockStrategy::TableHint { hint };
        }

        if let Some(clauses) = caps.for_update {
            let mut clause = String::from(if read { clauses.read } else { clauses.write });
            let suffix = match request.timeout {
                LockTimeout::Wait => None,
                LockTimeout::NoWait | LockTimeout::Millis(0) => {
                    clauses.no_wait.map(str::to_string)
                }
                LockTimeout::SkipLocked => clauses.skip_locked.map(str::to_string),
                LockTimeout::Millis(ms) => clauses
                    .wait
                    .map(|template| template.replace("{}", &ms.div_ceil(1000).to_string())),
            };
            if let Some(suffix) = suffix {
                clause.push_str(&suffix);
            }
            return LockStrategy::ForUpdate { clause };
        }

        LockStrategy::SelectThenLock { mode }
    }

    /// Apply the strategy to a select whose locked table is aliased `alias`.
    ///
    /// Hints go after the first table reference that uses the alias in the
    /// `from` clause; locking clauses go at the end. The other strategies leave the
    /// text unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] when a hint is required but no table reference in
    /// the `from` clause carries `alias` (a derived table, say). The select would
    /// otherwise run without any lock.
    pub fn apply_to_select(&self, sql: &str, alias: &str) -> Result<String, Error> {
        match self {
            LockStrategy::TableHint { hint } => insert_table_hint(sql, alias, hint),
            LockStrategy::ForUpdate { clause } => Ok(format!("{sql}{clause}")),
            LockStrategy::None | LockStrategy::SelectThenLock { .. } => Ok(sql.to_string()),
        }
    }
}

fn from_keyword() -> Option<&'static Regex> {
    static FROM: OnceLock<Option<Regex>> = OnceLock::new();
    FROM.get_or_init(|| {
        RegexBuilder::new(r"\bfrom\b")
            .case_insensitive(true)
            .build()
            .ok()
    })
    .as_ref()
}

fn hint_target_missing(alias: &str, source: Option<regex::Error>) -> Error {
    Error::Protocol(ProtocolError {
        message: format!("cannot place lock hint: no table aliased {alias} in the from clause"),
        source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
    })
}

fn insert_table_hint(sql: &str, alias: &str, hint: &str) -> Result<String, Error> {
    let Some(from) = from_keyword().and_then(|re| re.find(sql)) else {
        return Err(hint_target_missing(alias, None));
    };
    let table_ref = format!(
        r#"[A-Za-z_\["`][\w.\]"`]*\s+(?:as\s+)?{}\b"#,
        regex::escape(alias)
    );
    let re = RegexBuilder::new(&table_ref)
        .case_insensitive(true)
        .build()
        .map_err(|e| hint_target_missing(alias, Some(e)))?;
    let tail = &sql[from.end()..];
    for m in re.find_iter(tail) {
        // `a.id` is a column reference, not the table
        if tail[m.end()..].starts_with('.') {
            continue;
        }
        let at = from.end() + m.end();
        return Ok(format!("{} {}{}", &sql[..at], hint, &sql[at..]));
    }
    tracing::warn!(alias = %alias, "Locked alias not found in from clause");
    Err(hint_target_missing(alias, None))
}

// ============================================================================
// Locking Query Execution
// ============================================================================

/// A select that takes row locks on the root table of a [`Lockable`] entity.
pub struct LockingQuery<'a, L: Lockable + ?Sized> {
    caps: &'a DialectCapabilities,
    lockable: &'a L,
    request: LockRequest,
    inspector: Option<&'a InspectorHandle>,
}

impl<'a, L: Lockable + ?Sized> LockingQuery<'a, L> {
    pub fn new(caps: &'a DialectCapabilities, lockable: &'a L, request: LockRequest) -> Self {
        Self {
            caps,
            lockable,
            request,
            inspector: None,
        }
    }

    /// Pass every statement through this inspector before execution.
    #[must_use]
    pub fn inspector(mut self, inspector: &'a InspectorHandle) -> Self {
        self.inspector = Some(inspector);
        self
    }

    pub fn strategy(&self) -> LockStrategy {
        LockStrategy::resolve(self.caps, &self.request)
    }

    fn prepare(&self, sql: &str) -> String {
        match self.inspector {
            Some(inspector) => inspector.apply(sql).into_owned(),
            None => sql.to_string(),
        }
    }

    /// Run `sql` with the requested lock and return its rows.
    ///
    /// With the select-then-lock fallback the returned rows must carry the root
    /// identifier columns (and the version column for versioned entities).
    #[tracing::instrument(level = "debug", skip(self, cx, conn, params), fields(mode = %self.request.mode))]
    pub async fn execute<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        sql: &str,
        params: &[Value],
    ) -> Outcome<Vec<Row>, Error> {
        let strategy = self.strategy();
        let alias = self.lockable.root_table_alias(&self.request.alias);
        let locked_sql = match strategy.apply_to_select(sql, &alias) {
            Ok(locked) => self.prepare(&locked),
            Err(e) => return Outcome::Err(e),
        };
        tracing::trace!(sql = %locked_sql, strategy = ?strategy, "Executing locking select");

        let rows = match conn.query(cx, &locked_sql, params).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let LockStrategy::SelectThenLock { mode } = strategy else {
            return Outcome::Ok(rows);
        };

        let lock_sql = self.prepare(&self.lock_statement(mode));
        for row in &rows {
            let params = match self.lock_params(row) {
                Ok(params) => params,
                Err(e) => return Outcome::Err(e),
            };
            match conn.execute(cx, &lock_sql, &params).await {
                Outcome::Ok(0) => return Outcome::Err(self.stale_state(row)),
                Outcome::Ok(_) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }

        tracing::debug!(
            table = self.lockable.root_table_name(),
            rows = rows.len(),
            "Locked rows after select"
        );
        Outcome::Ok(rows)
    }

    /// `update <root> set ... where <ids> = ? [and <version> = ?]`.
    ///
    /// The update touches nothing but takes the row's write lock. Force-increment
    /// modes bump the version instead.
    pub fn lock_statement(&self, mode: LockMode) -> String {
        let ids = self.lockable.root_table_identifier_column_names();
        let version = self.lockable.version_column_name();
        let assignment = match (version, mode.increments_version()) {
            (Some(v), true) => format!("{v} = {v} + 1"),
            (Some(v), false) => format!("{v} = {v}"),
            (None, _) => ids
                .first()
                .map(|id| format!("{id} = {id}"))
                .unwrap_or_default(),
        };

        let mut index = 0;
        let mut predicates: Vec<String> = ids
            .iter()
            .map(|id| {
                index += 1;
                format!("{id} = {}", self.caps.placeholder.render(index))
            })
            .collect();
        if let Some(v) = version {
            index += 1;
            predicates.push(format!("{v} = {}", self.caps.placeholder.render(index)));
        }

        format!(
            "update {} set {} where {}",
            self.lockable.root_table_name(),
            assignment,
            predicates.join(" and ")
        )
    }

    fn lock_params(&self, row: &Row) -> Result<Vec<Value>, Error> {
        let version = self.lockable.version_column_name();
        self.lockable
            .root_table_identifier_column_names()
            .iter()
            .map(String::as_str)
            .chain(version)
            .map(|column| {
                row.get_named(column).cloned().ok_or_else(|| {
                    Error::Protocol(ProtocolError {
                        message: format!(
                            "locked row from {} lacks column {column}",
                            self.lockable.root_table_name()
                        ),
                        source: None,
                    })
                })
            })
            .collect()
    }

    fn stale_state(&self, row: &Row) -> Error {
        let identifier = self
            .lockable
            .root_table_identifier_column_names()
            .iter()
            .filter_map(|c| row.get_named(c))
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        tracing::debug!(
            table = self.lockable.root_table_name(),
            identifier = %identifier,
            "Lock statement matched no row"
        );
        Error::StaleState(StaleStateError {
            table: self.lockable.root_table_name().to_string(),
            identifier,
            message: "row was updated or deleted by another transaction".to_string(),
        })
    }
}
