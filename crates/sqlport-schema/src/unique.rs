//! Unique-constraint DDL.
//!
//! Backends either declare uniqueness inline while creating a table, or add and drop
//! named constraints with `alter table`. The choice is made once per dialect by
//! [`UniqueDelegate::for_dialect`]; every rendering method is pure.

use serde::{Deserialize, Serialize};
use sqlport_core::{Column, DialectCapabilities, Table, UniqueKey};

/// How unique constraints are expressed in DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniqueDelegate {
    /// Uniqueness is part of `create table`; no separate commands are emitted.
    Inline,
    /// Named constraints are added and dropped with `alter table`.
    AlterTable,
}

impl UniqueDelegate {
    /// Pick the delegate a dialect needs.
    pub fn for_dialect(caps: &DialectCapabilities) -> Self {
        if caps.supports_alter_table_add_constraint {
            UniqueDelegate::AlterTable
        } else {
            UniqueDelegate::Inline
        }
    }

    /// Fragment appended to a column definition in `create table`.
    pub fn column_definition_fragment(self, column: &Column) -> &'static str {
        match self {
            UniqueDelegate::Inline if column.unique => " unique",
            _ => "",
        }
    }

    /// Fragment appended to the column list of `create table`, one
    /// `, unique (...)` per key. Keys already declared on their single column are
    /// skipped.
    pub fn table_creation_fragment(self, table: &Table, caps: &DialectCapabilities) -> String {
        if self == UniqueDelegate::AlterTable {
            return String::new();
        }
        let mut fragment = String::new();
        for key in &table.unique_keys {
            let declared_inline = table
                .columns
                .iter()
                .any(|c| c.unique && key.is_single_column(c.raw_name()));
            if declared_inline {
                continue;
            }
            fragment.push_str(", ");
            fragment.push_str(&unique_constraint_sql(key, caps));
        }
        if !fragment.is_empty() {
            tracing::debug!(
                table = %table.name.render(caps),
                keys = table.unique_keys.len(),
                "Rendered inline unique constraints"
            );
        }
        fragment
    }

    /// `alter table <T> add constraint <name> unique (...)`, or an empty string when
    /// uniqueness is inline.
    pub fn add_unique_key_command(self, key: &UniqueKey, caps: &DialectCapabilities) -> String {
        if self == UniqueDelegate::Inline {
            return String::new();
        }
        let sql = format!(
            "{} add constraint {} {}",
            caps.alter_table(&key.table.render(caps)),
            key.name.render(caps),
            unique_constraint_sql(key, caps)
        );
        tracing::trace!(dialect = caps.name, sql = %sql, "Generated add unique constraint");
        sql
    }

    /// The command dropping the key's constraint, or an empty string when uniqueness
    /// is inline.
    ///
    /// `if exists` is placed before the constraint name when the dialect supports
    /// that, otherwise after it when supported, otherwise omitted.
    pub fn drop_unique_key_command(self, key: &UniqueKey, caps: &DialectCapabilities) -> String {
        if self == UniqueDelegate::Inline {
            return String::new();
        }
        let mut sql = caps.alter_table(&key.table.render(caps));
        sql.push_str(caps.drop_unique_key_string);
        let before = caps.supports_if_exists_before_constraint_name;
        if before {
            sql.push_str("if exists ");
        }
        sql.push_str(&key.name.render(caps));
        if !before && caps.supports_if_exists_after_constraint_name {
            sql.push_str(" if exists");
        }
        tracing::trace!(dialect = caps.name, sql = %sql, "Generated drop unique constraint");
        sql
    }
}

/// `unique (c1 [order], c2 [order], ...)` in key column order.
fn unique_constraint_sql(key: &UniqueKey, caps: &DialectCapabilities) -> String {
    let columns: Vec<String> = key
        .columns
        .iter()
        .map(|column| match key.order_of(column) {
            Some(order) => format!("{} {}", column.quoted_name(caps), order),
            None => column.quoted_name(caps),
        })
        .collect();
    format!("unique ({})", columns.join(", "))
}
