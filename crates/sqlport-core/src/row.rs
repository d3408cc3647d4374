//! Result rows returned by [`Connection::query`](crate::Connection::query).

use crate::Value;
use std::sync::Arc;

/// A single result row: column names shared across the result set plus values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row. `values` must line up with `columns`.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Look up a value by column name (case-insensitive, as most backends fold case).
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|i| self.values.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_lookup_ignores_case() {
        let cols: Arc<[String]> = vec!["ID".to_string(), "name".to_string()].into();
        let row = Row::new(cols, vec![Value::BigInt(1), Value::from("a")]);
        assert_eq!(row.get_named("id"), Some(&Value::BigInt(1)));
        assert_eq!(row.get_named("NAME"), Some(&Value::from("a")));
        assert_eq!(row.get_named("missing"), None);
        assert_eq!(row.len(), 2);
    }
}
