//! The lockable-entity contract.
//!
//! Row locks are always taken on the root table of an entity hierarchy. A `Lockable`
//! tells the lock strategies which table that is, how it is aliased in a query, and
//! which columns identify (and version) a row.

/// What a locking strategy needs to know about a mapped entity.
pub trait Lockable {
    /// The root table name, as it must appear in SQL.
    fn root_table_name(&self) -> &str;

    /// The SQL alias of the root table given the driving alias of the query.
    fn root_table_alias(&self, driving_alias: &str) -> String;

    /// Identifier column names on the root table, in key order.
    fn root_table_identifier_column_names(&self) -> &[String];

    /// Version column on the root table, for versioned entities.
    fn version_column_name(&self) -> Option<&str>;
}

/// Plain-data [`Lockable`] for callers that already hold resolved metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityLockInfo {
    pub root_table: String,
    pub identifier_columns: Vec<String>,
    pub version_column: Option<String>,
    /// Suffix appended to the driving alias for the root table (joined inheritance
    /// hierarchies alias the root table separately). Empty for single-table entities.
    pub root_alias_suffix: String,
}

impl EntityLockInfo {
    pub fn new<I, S>(root_table: impl Into<String>, identifier_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root_table: root_table.into(),
            identifier_columns: identifier_columns.into_iter().map(Into::into).collect(),
            version_column: None,
            root_alias_suffix: String::new(),
        }
    }

    #[must_use]
    pub fn versioned(mut self, column: impl Into<String>) -> Self {
        self.version_column = Some(column.into());
        self
    }

    #[must_use]
    pub fn root_alias_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.root_alias_suffix = suffix.into();
        self
    }
}

impl Lockable for EntityLockInfo {
    fn root_table_name(&self) -> &str {
        &self.root_table
    }

    fn root_table_alias(&self, driving_alias: &str) -> String {
        format!("{driving_alias}{}", self.root_alias_suffix)
    }

    fn root_table_identifier_column_names(&self) -> &[String] {
        &self.identifier_columns
    }

    fn version_column_name(&self) -> Option<&str> {
        self.version_column.as_deref()
    }
}
