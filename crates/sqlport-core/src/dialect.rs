//! Dialect capability tables.
//!
//! Each supported backend is described by one immutable [`DialectCapabilities`] row.
//! Strategies consult these rows instead of branching on the backend, so adding a
//! backend means adding a row. The rows are `static` and shared by every session.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// PostgreSQL
    #[default]
    Postgres,
    /// MySQL 8+
    Mysql,
    /// MariaDB 10.6+
    Mariadb,
    /// SQLite 3
    Sqlite,
    /// Microsoft SQL Server 2016+
    SqlServer,
    /// SAP (Sybase) Adaptive Server Enterprise
    SybaseAse,
    /// Oracle Database
    Oracle,
    /// H2
    H2,
    /// IBM Db2 for LUW
    Db2,
}

impl Dialect {
    pub const ALL: [Dialect; 9] = [
        Dialect::Postgres,
        Dialect::Mysql,
        Dialect::Mariadb,
        Dialect::Sqlite,
        Dialect::SqlServer,
        Dialect::SybaseAse,
        Dialect::Oracle,
        Dialect::H2,
        Dialect::Db2,
    ];

    /// The capability row for this backend.
    pub fn capabilities(self) -> &'static DialectCapabilities {
        match self {
            Dialect::Postgres => &POSTGRES,
            Dialect::Mysql => &MYSQL,
            Dialect::Mariadb => &MARIADB,
            Dialect::Sqlite => &SQLITE,
            Dialect::SqlServer => &SQL_SERVER,
            Dialect::SybaseAse => &SYBASE_ASE,
            Dialect::Oracle => &ORACLE,
            Dialect::H2 => &H2,
            Dialect::Db2 => &DB2,
        }
    }

    pub fn name(self) -> &'static str {
        self.capabilities().name
    }

    /// Placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        self.capabilities().placeholder.render(index)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::Mysql),
            "mariadb" => Ok(Dialect::Mariadb),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "sqlserver" | "sql_server" | "mssql" => Ok(Dialect::SqlServer),
            "sybase" | "sybase_ase" | "ase" => Ok(Dialect::SybaseAse),
            "oracle" => Ok(Dialect::Oracle),
            "h2" => Ok(Dialect::H2),
            "db2" => Ok(Dialect::Db2),
            other => Err(Error::unknown_dialect(other)),
        }
    }
}

/// Bind parameter marker syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1, $2, ...`
    Dollar,
    /// `?`
    Question,
    /// `:1, :2, ...`
    Colon,
}

impl PlaceholderStyle {
    pub fn render(self, index: usize) -> String {
        match self {
            PlaceholderStyle::Dollar => format!("${index}"),
            PlaceholderStyle::Question => "?".to_string(),
            PlaceholderStyle::Colon => format!(":{index}"),
        }
    }
}

/// Table-level lock hints, appended directly after a table reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockHints {
    pub read: &'static str,
    pub write: &'static str,
    pub write_no_wait: Option<&'static str>,
    pub write_skip_locked: Option<&'static str>,
}

/// Trailing row-locking clauses (`for update` and friends).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForUpdateClauses {
    pub read: &'static str,
    pub write: &'static str,
    pub no_wait: Option<&'static str>,
    pub skip_locked: Option<&'static str>,
    /// Wait-timeout suffix; `{}` is replaced with whole seconds.
    pub wait: Option<&'static str>,
}

/// One backend's SQL syntax variations and feature support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectCapabilities {
    pub dialect: Dialect,
    pub name: &'static str,
    pub open_quote: char,
    pub close_quote: char,
    pub placeholder: PlaceholderStyle,
    pub alter_table_string: &'static str,
    pub drop_unique_key_string: &'static str,
    pub supports_if_exists_before_table_name: bool,
    pub supports_if_exists_after_table_name: bool,
    pub supports_if_exists_before_constraint_name: bool,
    pub supports_if_exists_after_constraint_name: bool,
    /// `false` means uniqueness must be declared inline in `create table`.
    pub supports_alter_table_add_constraint: bool,
    pub lock_hints: Option<LockHints>,
    pub for_update: Option<ForUpdateClauses>,
    /// `false` when batched executions only report an aggregate (or no) row count.
    pub reports_batch_row_counts: bool,
}

impl DialectCapabilities {
    /// Quote an identifier, doubling any embedded closing quote character.
    pub fn quote(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 2);
        out.push(self.open_quote);
        for c in name.chars() {
            if c == self.close_quote {
                out.push(c);
            }
            out.push(c);
        }
        out.push(self.close_quote);
        out
    }

    /// `alter table <name>` prefix for the given (already rendered) table name.
    pub fn alter_table(&self, table_name: &str) -> String {
        format!("{}{}", self.alter_table_string, table_name)
    }

    /// Look up a capability by its enum tag.
    pub fn capability(&self, capability: Capability) -> CapabilityValue {
        use Capability as C;
        use CapabilityValue as V;
        match capability {
            C::OpenQuote => V::Char(self.open_quote),
            C::CloseQuote => V::Char(self.close_quote),
            C::AlterTableString => V::Text(Some(self.alter_table_string)),
            C::DropUniqueKeyString => V::Text(Some(self.drop_unique_key_string)),
            C::SupportsIfExistsBeforeTableName => V::Flag(self.supports_if_exists_before_table_name),
            C::SupportsIfExistsAfterTableName => V::Flag(self.supports_if_exists_after_table_name),
            C::SupportsIfExistsBeforeConstraintName => {
                V::Flag(self.supports_if_exists_before_constraint_name)
            }
            C::SupportsIfExistsAfterConstraintName => {
                V::Flag(self.supports_if_exists_after_constraint_name)
            }
            C::SupportsAlterTableAddConstraint => V::Flag(self.supports_alter_table_add_constraint),
            C::SupportsLockHints => V::Flag(self.lock_hints.is_some()),
            C::SupportsForUpdate => V::Flag(self.for_update.is_some()),
            C::WriteLockHint => V::Text(self.lock_hints.map(|h| h.write)),
            C::ReadLockHint => V::Text(self.lock_hints.map(|h| h.read)),
            C::ForUpdateString => V::Text(self.for_update.map(|f| f.write)),
            C::ReportsBatchRowCounts => V::Flag(self.reports_batch_row_counts),
        }
    }

    /// Look up a capability by name.
    ///
    /// Names are matched ignoring case and underscores, so both
    /// `supports_if_exists_before_constraint_name` and
    /// `supportsIfExistsBeforeConstraintName` work. Unknown names are an error.
    pub fn capability_named(&self, name: &str) -> Result<CapabilityValue> {
        Ok(self.capability(name.parse()?))
    }
}

/// Every capability a dialect row defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    OpenQuote,
    CloseQuote,
    AlterTableString,
    DropUniqueKeyString,
    SupportsIfExistsBeforeTableName,
    SupportsIfExistsAfterTableName,
    SupportsIfExistsBeforeConstraintName,
    SupportsIfExistsAfterConstraintName,
    SupportsAlterTableAddConstraint,
    SupportsLockHints,
    SupportsForUpdate,
    WriteLockHint,
    ReadLockHint,
    ForUpdateString,
    ReportsBatchRowCounts,
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let cap = match key.as_str() {
            "openquote" => Capability::OpenQuote,
            "closequote" => Capability::CloseQuote,
            "altertablestring" => Capability::AlterTableString,
            "dropuniquekeystring" => Capability::DropUniqueKeyString,
            "supportsifexistsbeforetablename" => Capability::SupportsIfExistsBeforeTableName,
            "supportsifexistsaftertablename" => Capability::SupportsIfExistsAfterTableName,
            "supportsifexistsbeforeconstraintname" | "supportsifexistsbeforename" => {
                Capability::SupportsIfExistsBeforeConstraintName
            }
            "supportsifexistsafterconstraintname" | "supportsifexistsaftername" => {
                Capability::SupportsIfExistsAfterConstraintName
            }
            "supportsaltertableaddconstraint" => Capability::SupportsAlterTableAddConstraint,
            "supportslockhints" => Capability::SupportsLockHints,
            "supportsforupdate" => Capability::SupportsForUpdate,
            "writelockhint" => Capability::WriteLockHint,
            "readlockhint" => Capability::ReadLockHint,
            "forupdatestring" => Capability::ForUpdateString,
            "reportsbatchrowcounts" => Capability::ReportsBatchRowCounts,
            _ => return Err(Error::unknown_capability(s)),
        };
        Ok(cap)
    }
}

/// The value of one capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityValue {
    Flag(bool),
    Char(char),
    Text(Option<&'static str>),
}

impl CapabilityValue {
    pub const fn as_flag(self) -> Option<bool> {
        match self {
            CapabilityValue::Flag(b) => Some(b),
            _ => None,
        }
    }
}

// ============================================================================
// Capability rows
// ============================================================================

pub static POSTGRES: DialectCapabilities = DialectCapabilities {
    dialect: Dialect::Postgres,
    name: "postgres",
    open_quote: '"',
    close_quote: '"',
    placeholder: PlaceholderStyle::Dollar,
    alter_table_string: "alter table ",
    drop_unique_key_string: " drop constraint ",
    supports_if_exists_before_table_name: true,
    supports_if_exists_after_table_name: false,
    supports_if_exists_before_constraint_name: true,
    supports_if_exists_after_constraint_name: false,
    supports_alter_table_add_constraint: true,
    lock_hints: None,
    for_update: Some(ForUpdateClauses {
        read: " for share",
        write: " for update",
        no_wait: Some(" nowait"),
        skip_locked: Some(" skip locked"),
        wait: None,
    }),
    reports_batch_row_counts: true,
};

pub static MYSQL: DialectCapabilities = DialectCapabilities {
    dialect: Dialect::Mysql,
    name: "mysql",
    open_quote: '`',
    close_quote: '`',
    placeholder: PlaceholderStyle::Question,
    alter_table_string: "alter table ",
    drop_unique_key_string: " drop index ",
    supports_if_exists_before_table_name: true,
    supports_if_exists_after_table_name: false,
    supports_if_exists_before_constraint_name: false,
    supports_if_exists_after_constraint_name: false,
    supports_alter_table_add_constraint: true,
    lock_hints: None,
    for_update: Some(ForUpdateClauses {
        read: " for share",
        write: " for update",
        no_wait: Some(" nowait"),
        skip_locked: Some(" skip locked"),
        wait: None,
    }),
    reports_batch_row_counts: true,
};

pub static MARIADB: DialectCapabilities = DialectCapabilities {
    dialect: Dialect::Mariadb,
    name: "mariadb",
    open_quote: '`',
    close_quote: '`',
    placeholder: PlaceholderStyle::Question,
    alter_table_string: "alter table ",
    drop_unique_key_string: " drop index ",
    supports_if_exists_before_table_name: true,
    supports_if_exists_after_table_name: false,
    supports_if_exists_before_constraint_name: true,
    supports_if_exists_after_constraint_name: false,
    supports_alter_table_add_constraint: true,
    lock_hints: None,
    for_update: Some(ForUpdateClauses {
        read: " lock in share mode",
        write: " for update",
        no_wait: Some(" nowait"),
        skip_locked: Some(" skip locked"),
        wait: Some(" wait {}"),
    }),
    // Bulk execution reports SUCCESS_NO_INFO for every entry.
    reports_batch_row_counts: false,
};

pub static SQLITE: DialectCapabilities = DialectCapabilities {
    dialect: Dialect::Sqlite,
    name: "sqlite",
    open_quote: '"',
    close_quote: '"',
    placeholder: PlaceholderStyle::Question,
    alter_table_string: "alter table ",
    drop_unique_key_string: " drop constraint ",
    supports_if_exists_before_table_name: true,
    supports_if_exists_after_table_name: false,
    supports_if_exists_before_constraint_name: false,
    supports_if_exists_after_constraint_name: false,
    supports_alter_table_add_constraint: false,
    lock_hints: None,
    for_update: None,
    reports_batch_row_counts: true,
};

pub static SQL_SERVER: DialectCapabilities = DialectCapabilities {
    dialect: Dialect::SqlServer,
    name: "sqlserver",
    open_quote: '[',
    close_quote: ']',
    placeholder: PlaceholderStyle::Question,
    alter_table_string: "alter table ",
    drop_unique_key_string: " drop constraint ",
    supports_if_exists_before_table_name: true,
    supports_if_exists_after_table_name: false,
    supports_if_exists_before_constraint_name: true,
    supports_if_exists_after_constraint_name: false,
    supports_alter_table_add_constraint: true,
    lock_hints: Some(LockHints {
        read: "with (holdlock, rowlock)",
        write: "with (updlock, holdlock, rowlock)",
        write_no_wait: Some("with (updlock, holdlock, rowlock, nowait)"),
        write_skip_locked: Some("with (updlock, rowlock, readpast)"),
    }),
    for_update: None,
    reports_batch_row_counts: true,
};

pub static SYBASE_ASE: DialectCapabilities = DialectCapabilities {
    dialect: Dialect::SybaseAse,
    name: "sybase_ase",
    open_quote: '[',
    close_quote: ']',
    placeholder: PlaceholderStyle::Question,
    alter_table_string: "alter table ",
    drop_unique_key_string: " drop constraint ",
    supports_if_exists_before_table_name: false,
    supports_if_exists_after_table_name: false,
    supports_if_exists_before_constraint_name: false,
    supports_if_exists_after_constraint_name: false,
    supports_alter_table_add_constraint: true,
    lock_hints: Some(LockHints {
        read: "holdlock",
        write: "holdlock",
        write_no_wait: None,
        write_skip_locked: Some("readpast"),
    }),
    for_update: None,
    reports_batch_row_counts: true,
};

pub static ORACLE: DialectCapabilities = DialectCapabilities {
    dialect: Dialect::Oracle,
    name: "oracle",
    open_quote: '"',
    close_quote: '"',
    placeholder: PlaceholderStyle::Colon,
    alter_table_string: "alter table ",
    drop_unique_key_string: " drop constraint ",
    supports_if_exists_before_table_name: false,
    supports_if_exists_after_table_name: false,
    supports_if_exists_before_constraint_name: false,
    supports_if_exists_after_constraint_name: false,
    supports_alter_table_add_constraint: true,
    lock_hints: None,
    for_update: Some(ForUpdateClauses {
        read: " for update",
        write: " for update",
        no_wait: Some(" nowait"),
        skip_locked: Some(" skip locked"),
        wait: Some(" wait {}"),
    }),
    // Prepared batches report SUCCESS_NO_INFO instead of per-row counts.
    reports_batch_row_counts: false,
};

pub static H2: DialectCapabilities = DialectCapabilities {
    dialect: Dialect::H2,
    name: "h2",
    open_quote: '"',
    close_quote: '"',
    placeholder: PlaceholderStyle::Question,
    alter_table_string: "alter table ",
    drop_unique_key_string: " drop constraint ",
    supports_if_exists_before_table_name: true,
    supports_if_exists_after_table_name: false,
    supports_if_exists_before_constraint_name: true,
    supports_if_exists_after_constraint_name: false,
    supports_alter_table_add_constraint: true,
    lock_hints: None,
    for_update: Some(ForUpdateClauses {
        read: " for update",
        write: " for update",
        no_wait: None,
        skip_locked: None,
        wait: None,
    }),
    reports_batch_row_counts: true,
};

pub static DB2: DialectCapabilities = DialectCapabilities {
    dialect: Dialect::Db2,
    name: "db2",
    open_quote: '"',
    close_quote: '"',
    placeholder: PlaceholderStyle::Question,
    alter_table_string: "alter table ",
    drop_unique_key_string: " drop constraint ",
    supports_if_exists_before_table_name: false,
    supports_if_exists_after_table_name: false,
    supports_if_exists_before_constraint_name: false,
    supports_if_exists_after_constraint_name: false,
    supports_alter_table_add_constraint: true,
    lock_hints: None,
    for_update: Some(ForUpdateClauses {
        read: " for read only with rs use and keep share locks",
        write: " for read only with rs use and keep update locks",
        no_wait: None,
        skip_locked: Some(" skip locked data"),
        wait: None,
    }),
    reports_batch_row_counts: true,
};
