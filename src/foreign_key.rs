//! Foreign-key paths between tables.
//!
//! A dotted CQL index `alias.field` whose alias names a foreign-key
//! relationship is searched in the other table: through nested
//! `IN ( SELECT ... )` subqueries when filtering, through a chain of
//! `LEFT OUTER JOIN`s when sorting.

use crate::error::{CqlError, CqlResult};
use crate::schema::{ForeignKeyConfig, SchemaModel};
use std::collections::{HashSet, VecDeque};
use std::fmt;

/// One foreign key: `table.column` references the primary key of `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FkHop {
    pub table: String,
    pub column: String,
    pub target: String,
}

/// Which way the relationship is walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FkDirection {
    /// The current table holds the key. Hops run from the current table outwards.
    ToParent,
    /// The other table holds the key. Hops run from the other table towards the current one.
    ToChild,
}

/// Foreign keys connecting the current table with an aliased table.
#[derive(Debug, Clone, PartialEq)]
pub struct FkPath {
    pub direction: FkDirection,
    pub hops: Vec<FkHop>,
}

/// `LEFT OUTER JOIN` clauses, at most one per table, in order of first use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinChain {
    tables: Vec<String>,
    clauses: Vec<String>,
}

impl JoinChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, table: &str, clause: String) {
        if !self.tables.iter().any(|t| t == table) {
            self.tables.push(table.to_string());
            self.clauses.push(clause);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn render(&self) -> String {
        self.clauses.join(" ")
    }
}

fn pk_column(schema: &SchemaModel, table: &str) -> String {
    schema
        .table(table)
        .map(|t| t.pk_column.clone())
        .unwrap_or_else(|| "id".to_string())
}

impl FkPath {
    /// Table the referenced field lives in.
    pub fn destination(&self) -> &str {
        match self.direction {
            FkDirection::ToParent => self.hops.last().map(|h| h.target.as_str()),
            FkDirection::ToChild => self.hops.first().map(|h| h.table.as_str()),
        }
        .unwrap_or_default()
    }

    /// Wrap `inner`, a predicate on the destination table, into subqueries
    /// selecting rows of the current table.
    pub fn subquery(&self, schema: &SchemaModel, inner: &str) -> String {
        let mut sql = inner.to_string();
        match self.direction {
            FkDirection::ToParent => {
                for hop in self.hops.iter().rev() {
                    sql = format!(
                        "{}.{} IN ( SELECT {} FROM {} WHERE {})",
                        hop.table,
                        hop.column,
                        pk_column(schema, &hop.target),
                        hop.target,
                        sql
                    );
                }
            }
            FkDirection::ToChild => {
                for hop in &self.hops {
                    sql = format!(
                        "{}.{} IN ( SELECT {} FROM {} WHERE {})",
                        hop.target,
                        pk_column(schema, &hop.target),
                        hop.column,
                        hop.table,
                        sql
                    );
                }
            }
        }
        sql
    }

    /// Append the joins reaching the destination table.
    pub fn add_joins(&self, schema: &SchemaModel, chain: &mut JoinChain) {
        match self.direction {
            FkDirection::ToParent => {
                for hop in &self.hops {
                    chain.add(
                        &hop.target,
                        format!(
                            "LEFT OUTER JOIN {} ON {}.{} = {}.{}",
                            hop.target,
                            hop.table,
                            hop.column,
                            hop.target,
                            pk_column(schema, &hop.target)
                        ),
                    );
                }
            }
            FkDirection::ToChild => {
                for hop in self.hops.iter().rev() {
                    chain.add(
                        &hop.table,
                        format!(
                            "LEFT OUTER JOIN {} ON {}.{} = {}.{}",
                            hop.table,
                            hop.table,
                            hop.column,
                            hop.target,
                            pk_column(schema, &hop.target)
                        ),
                    );
                }
            }
        }
    }
}

impl fmt::Display for FkPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hops: Vec<String> = self
            .hops
            .iter()
            .map(|h| format!("{}.{} -> {}", h.table, h.column, h.target))
            .collect();
        write!(f, "{}", hops.join(", "))
    }
}

/// Find the foreign keys linking `table` with the table known as `alias`.
///
/// Keys held by `table` (`targetTableAlias`) are tried before keys pointing
/// at it (`tableAlias`). Returns `None` if neither direction is enabled.
pub fn find_path(schema: &SchemaModel, table: &str, alias: &str) -> CqlResult<Option<FkPath>> {
    if let Some(hops) = to_parent(schema, table, alias)? {
        return Ok(Some(FkPath {
            direction: FkDirection::ToParent,
            hops,
        }));
    }
    if let Some(hops) = to_child(schema, table, alias)? {
        return Ok(Some(FkPath {
            direction: FkDirection::ToChild,
            hops,
        }));
    }
    Ok(None)
}

fn checked_hop(table: &str, fk: &ForeignKeyConfig, alias: &str) -> CqlResult<FkHop> {
    let column = fk.column.clone().ok_or_else(|| {
        CqlError::validation(format!(
            "No foreignKey for table {} with alias {}: fieldName is missing",
            table, alias
        ))
    })?;
    let target = fk.target_table.clone().ok_or_else(|| {
        CqlError::validation(format!(
            "Missing target table for table {} field {}",
            table, column
        ))
    })?;
    Ok(FkHop {
        table: table.to_string(),
        column,
        target,
    })
}

fn usable_hop(table: &str, fk: &ForeignKeyConfig) -> Option<FkHop> {
    Some(FkHop {
        table: table.to_string(),
        column: fk.column.clone()?,
        target: fk.target_table.clone()?,
    })
}

/// Shortest chain of keys from `source` to a key whose `targetTableAlias` is `alias`.
fn to_parent(schema: &SchemaModel, source: &str, alias: &str) -> CqlResult<Option<Vec<FkHop>>> {
    let mut queue = VecDeque::from([(source.to_string(), Vec::<FkHop>::new())]);
    let mut visited = HashSet::from([source.to_string()]);
    while let Some((table, hops)) = queue.pop_front() {
        let Some(config) = schema.table(&table) else {
            continue;
        };
        for fk in &config.foreign_keys {
            if fk.target_table_alias.as_deref() == Some(alias) {
                let mut path = hops.clone();
                path.push(checked_hop(&table, fk, alias)?);
                return Ok(Some(path));
            }
        }
        for fk in &config.foreign_keys {
            if let Some(hop) = usable_hop(&table, fk) {
                if visited.insert(hop.target.clone()) {
                    let mut next = hops.clone();
                    let target = hop.target.clone();
                    next.push(hop);
                    queue.push_back((target, next));
                }
            }
        }
    }
    Ok(None)
}

/// Shortest chain of keys starting at a key whose `tableAlias` is `alias`
/// and ending at `target`.
fn to_child(schema: &SchemaModel, target: &str, alias: &str) -> CqlResult<Option<Vec<FkHop>>> {
    let mut best: Option<Vec<FkHop>> = None;
    for table in schema.tables() {
        for fk in &table.foreign_keys {
            if fk.table_alias.as_deref() != Some(alias) {
                continue;
            }
            let first = checked_hop(&table.name, fk, alias)?;
            let Some(tail) = chain(schema, &first.target, target) else {
                continue;
            };
            let mut path = vec![first];
            path.extend(tail);
            if best.as_ref().is_none_or(|b| path.len() < b.len()) {
                best = Some(path);
            }
        }
    }
    Ok(best)
}

/// Shortest chain of keys leading from `from` to `to`, empty if they are the same table.
fn chain(schema: &SchemaModel, from: &str, to: &str) -> Option<Vec<FkHop>> {
    let mut queue = VecDeque::from([(from.to_string(), Vec::<FkHop>::new())]);
    let mut visited = HashSet::from([from.to_string()]);
    while let Some((table, hops)) = queue.pop_front() {
        if table == to {
            return Some(hops);
        }
        let Some(config) = schema.table(&table) else {
            continue;
        };
        for fk in &config.foreign_keys {
            if let Some(hop) = usable_hop(&table, fk) {
                if visited.insert(hop.target.clone()) {
                    let mut next = hops.clone();
                    let target = hop.target.clone();
                    next.push(hop);
                    queue.push_back((target, next));
                }
            }
        }
    }
    None
}
