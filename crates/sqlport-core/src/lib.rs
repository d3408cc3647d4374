//! Core types and traits for sqlport.
//!
//! `sqlport-core` is the **foundation layer** of the workspace. It defines the
//! contracts and data types every other crate builds on.
//!
//! # Role In The Architecture
//!
//! - **Dialect capability table**: one immutable, process-wide [`DialectCapabilities`]
//!   row per backend. Strategies read these rows instead of branching on the backend.
//! - **Schema model**: [`Table`], [`Column`] and [`UniqueKey`] as resolved by the mapping
//!   layer, plus dialect-aware [`Identifier`] quoting.
//! - **Contracts**: [`Connection`] (implemented by drivers), [`Lockable`] (implemented by
//!   entity metadata) and [`StatementInspector`] (implemented by applications).
//! - **Structured concurrency**: re-exports `Cx` and `Outcome` from asupersync so every
//!   backend call is cancel-correct.
//!
//! # Who Uses This Crate
//!
//! - `sqlport-schema` renders unique-constraint DDL from the schema model.
//! - `sqlport-query` resolves lock hints and runs the select-then-lock fallback.
//! - `sqlport-session` batches statements and executes them through `Connection`.

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod dialect;
pub mod error;
pub mod identifiers;
pub mod inspector;
pub mod lockable;
pub mod row;
pub mod table;
pub mod value;

pub use connection::{BatchRowCounts, Connection};
pub use dialect::{
    Capability, CapabilityValue, Dialect, DialectCapabilities, ForUpdateClauses, LockHints,
    PlaceholderStyle,
};
pub use error::{
    BatchError, CapabilityError, ConnectionError, ConnectionErrorKind, Error, ProtocolError,
    QueryError, QueryErrorKind, Result, StaleStateError, StatementKind,
};
pub use identifiers::{Identifier, QualifiedName};
pub use inspector::{CommentInspector, InspectorHandle, RegexInspector, StatementInspector};
pub use lockable::{EntityLockInfo, Lockable};
pub use row::Row;
pub use table::{Column, SortOrder, Table, UniqueKey};
pub use value::Value;
