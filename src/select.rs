//! Compiled query output.

use std::fmt;

/// Result of compiling one CQL query.
///
/// Renders as `WHERE <where> ORDER BY <orderBy>`, leaving out empty clauses.
/// Sorting by a field of another table adds `LEFT OUTER JOIN`s; the
/// rendering then is a complete `SELECT <table>.* FROM <table> <joins> ...`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlSelect {
    where_clause: String,
    order_by: String,
    table: String,
    joins: String,
}

impl SqlSelect {
    pub fn new(where_clause: impl Into<String>, order_by: impl Into<String>) -> Self {
        Self {
            where_clause: where_clause.into(),
            order_by: order_by.into(),
            ..Self::default()
        }
    }

    /// Attach the join chain needed by the ORDER BY terms.
    pub fn with_joins(mut self, table: impl Into<String>, joins: impl Into<String>) -> Self {
        self.table = table.into();
        self.joins = joins.into();
        self
    }

    /// Boolean SQL expression, without the `WHERE` keyword.
    pub fn where_clause(&self) -> &str {
        &self.where_clause
    }

    /// Comma separated ORDER BY terms, without the `ORDER BY` keywords.
    pub fn order_by(&self) -> &str {
        &self.order_by
    }

    /// `LEFT OUTER JOIN ...` clauses, empty unless sorting by a foreign field.
    pub fn joins(&self) -> &str {
        &self.joins
    }
}

impl fmt::Display for SqlSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::with_capacity(4);
        if !self.joins.is_empty() {
            parts.push(format!("SELECT {}.* FROM {}", self.table, self.table));
            parts.push(self.joins.clone());
        }
        if !self.where_clause.is_empty() {
            parts.push(format!("WHERE {}", self.where_clause));
        }
        if !self.order_by.is_empty() {
            parts.push(format!("ORDER BY {}", self.order_by));
        }
        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        assert_eq!(SqlSelect::new("true", "").to_string(), "WHERE true");
        assert_eq!(SqlSelect::new("", "a DESC").to_string(), "ORDER BY a DESC");
        assert_eq!(SqlSelect::new("x", "a, b").to_string(), "WHERE x ORDER BY a, b");
        assert_eq!(SqlSelect::new("", "").to_string(), "");
    }

    #[test]
    fn test_render_with_joins() {
        let select = SqlSelect::new("true", "b.x")
            .with_joins("a", "LEFT OUTER JOIN b ON b.aId = a.id");
        assert_eq!(
            select.to_string(),
            "SELECT a.* FROM a LEFT OUTER JOIN b ON b.aId = a.id WHERE true ORDER BY b.x"
        );
        assert_eq!(select.joins(), "LEFT OUTER JOIN b ON b.aId = a.id");
    }
}
