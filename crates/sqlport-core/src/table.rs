//! Resolved table, column and unique-key model.
//!
//! These structures are produced by the mapping layer and only read here.

use crate::dialect::DialectCapabilities;
use crate::identifiers::{Identifier, QualifiedName};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub name: Identifier,
    /// Single-column uniqueness declared on the column itself.
    pub unique: bool,
}

impl Column {
    pub fn new(name: impl Into<Identifier>) -> Self {
        Self {
            name: name.into(),
            unique: false,
        }
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// The raw column name.
    pub fn raw_name(&self) -> &str {
        self.name.text()
    }

    /// The column name as it must appear in SQL for this dialect.
    pub fn quoted_name(&self, caps: &DialectCapabilities) -> String {
        self.name.render(caps)
    }
}

/// A table: qualified name plus columns in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: QualifiedName,
    pub columns: Vec<Column>,
    pub unique_keys: Vec<UniqueKey>,
}

impl Table {
    pub fn new(name: impl Into<QualifiedName>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            unique_keys: Vec::new(),
        }
    }

    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn unique_key(mut self, key: UniqueKey) -> Self {
        self.unique_keys.push(key);
        self
    }

    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.raw_name() == name)
    }
}

/// Per-column sort order inside a unique key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub const fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A named unique constraint over columns of one table.
///
/// Column order is significant and independent of the table's declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub name: Identifier,
    pub table: QualifiedName,
    pub columns: Vec<Column>,
    /// Sort order keyed by raw column name. Columns without an entry are unsorted.
    pub column_order: HashMap<String, SortOrder>,
}

impl UniqueKey {
    pub fn new(name: impl Into<Identifier>, table: impl Into<QualifiedName>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: Vec::new(),
            column_order: HashMap::new(),
        }
    }

    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn ordered_column(mut self, column: Column, order: SortOrder) -> Self {
        self.column_order.insert(column.raw_name().to_string(), order);
        self.columns.push(column);
        self
    }

    pub fn order_of(&self, column: &Column) -> Option<SortOrder> {
        self.column_order.get(column.raw_name()).copied()
    }

    /// Whether the key has exactly one column and that column is `name`.
    pub fn is_single_column(&self, name: &str) -> bool {
        self.columns.len() == 1 && self.columns[0].raw_name() == name
    }
}
