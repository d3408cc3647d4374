//! Unit-of-work configuration and batched statement execution for sqlport.
//!
//! A unit of work owns one [`Batcher`]. The batcher groups same-text statements,
//! flushes them through the unit of work's `Connection` and reports one
//! [`StatementOutcome`] per statement, in submission order.
//!
//! # Example
//!
//! ```ignore
//! let config = SessionConfig::from_json(r#"{"dialect": "postgres", "batch_size": 50}"#)?;
//! let mut batcher = config.batch_config().create_batcher();
//!
//! batcher.add_to_batch(&cx, &conn, "insert into users (id) values ($1)", vec![1.into()]).await;
//! batcher.add_to_batch(&cx, &conn, "insert into users (id) values ($1)", vec![2.into()]).await;
//!
//! let outcomes = batcher.execute_batch(&cx, &conn).await;
//! ```

pub mod batch;

pub use batch::{BatchStats, Batcher, Expectation, StatementOutcome};

use serde::{Deserialize, Serialize};
use sqlport_core::{Dialect, Error, InspectorHandle, Result};

// ============================================================================
// Session Configuration
// ============================================================================

/// Configuration for a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Backend the unit of work talks to.
    pub dialect: Dialect,
    /// Maximum statements per batch. `0` or `1` executes every statement directly.
    pub batch_size: usize,
    /// Whether batched row counts are checked against each statement's expectation.
    pub check_row_counts: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            batch_size: 0,
            check_row_counts: true,
        }
    }
}

impl SessionConfig {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Custom(format!("invalid session configuration: {e}")))
    }

    #[must_use]
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    #[must_use]
    pub fn check_row_counts(mut self, check: bool) -> Self {
        self.check_row_counts = check;
        self
    }

    /// Batch settings for this configuration, adjusted to what the dialect reports.
    pub fn batch_config(&self) -> BatchConfig {
        let caps = self.dialect.capabilities();
        BatchConfig {
            batch_size: self.batch_size,
            check_row_counts: self.check_row_counts,
            reports_row_counts: caps.reports_batch_row_counts,
        }
    }
}

// ============================================================================
// Batch Configuration
// ============================================================================

/// Effective batch settings for one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub check_row_counts: bool,
    /// Whether the backend's batch execution reports a trustworthy count per statement.
    /// When `false`, every batched statement's outcome is unknown.
    pub reports_row_counts: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 0,
            check_row_counts: true,
            reports_row_counts: true,
        }
    }
}

impl BatchConfig {
    /// Whether statements are grouped at all.
    pub fn is_batching(&self) -> bool {
        self.batch_size > 1
    }

    /// A batcher without a statement inspector.
    pub fn create_batcher(&self) -> Batcher {
        Batcher::new(*self, InspectorHandle::None)
    }

    /// A batcher that passes every statement through `inspector` before execution.
    pub fn create_batcher_with_inspector(&self, inspector: InspectorHandle) -> Batcher {
        Batcher::new(*self, inspector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_disables_batching() {
        let config = SessionConfig::default();
        assert_eq!(config.dialect, Dialect::Postgres);
        assert!(!config.batch_config().is_batching());
    }

    #[test]
    fn test_from_json() {
        let config =
            SessionConfig::from_json(r#"{"dialect": "sybase_ase", "batch_size": 25}"#).unwrap();
        assert_eq!(config.dialect, Dialect::SybaseAse);
        assert_eq!(config.batch_size, 25);
        assert!(config.check_row_counts);
    }

    #[test]
    fn test_from_json_rejects_unknown_dialect() {
        let err = SessionConfig::from_json(r#"{"dialect": "informix"}"#).unwrap_err();
        assert!(err.to_string().contains("invalid session configuration"));
    }

    #[test]
    fn test_builder_and_batch_config() {
        let config = SessionConfig::new(Dialect::Oracle)
            .batch_size(10)
            .check_row_counts(false);
        let batch = config.batch_config();
        assert_eq!(batch.batch_size, 10);
        assert!(!batch.check_row_counts);
        assert!(batch.is_batching());
        assert!(!batch.reports_row_counts);
        assert_eq!(batch.create_batcher().batch_size(), 10);
    }

    #[test]
    fn test_batch_config_follows_dialect_row_count_reporting() {
        for dialect in Dialect::ALL {
            let batch = SessionConfig::new(dialect).batch_size(20).batch_config();
            assert_eq!(batch.batch_size, 20, "{dialect}");
            assert_eq!(
                batch.reports_row_counts,
                !matches!(dialect, Dialect::Oracle | Dialect::Mariadb),
                "{dialect}"
            );
        }
    }

    #[test]
    fn test_default_batch_config_trusts_row_counts() {
        let batch = BatchConfig::default();
        assert!(batch.reports_row_counts);
        assert!(batch.check_row_counts);
        assert!(!batch.is_batching());
    }
}
