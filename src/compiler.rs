//! Expression tree compiler.
//!
//! Entry point of the crate: [`Cql2Pg`] turns a [`CqlNode`] into a
//! [`SqlSelect`]. Boolean trees are walked with an explicit work stack and
//! same-operator chains are flattened, so a long `OR` list costs no stack
//! depth.
//!
//! Operands that compiled to `true` or `false` are folded away. A `NOT`
//! whose left side is `true` renders as `NOT (r)` instead of
//! `(true) AND NOT (r)`.

use crate::ast::{BooleanOp, CqlNode, CqlTerm};
use crate::error::{CqlError, CqlResult};
use crate::resolver::{self, TableContext};
pub use crate::resolver::DEFAULT_JSON_COLUMN;
use crate::schema::SchemaModel;
use crate::select::SqlSelect;
use crate::sort::compile_sort;
use crate::sql::is_identifier;
use crate::term::{self, Fragment};
use std::sync::Arc;

/// Compiles CQL trees against one table.
///
/// Immutable once built; share it between threads freely. Replacing the
/// schema swaps the `Arc`, compilations in flight keep the old one.
#[derive(Debug, Clone)]
pub struct Cql2Pg {
    table: String,
    json_column: String,
    server_choice_indexes: Vec<String>,
    schema: Arc<SchemaModel>,
}

enum Task<'n> {
    Visit(&'n CqlNode),
    Combine(BooleanOp, usize),
}

impl Cql2Pg {
    /// Create a compiler for `table` or `table.column`.
    ///
    /// The JSON column defaults to `jsonb`.
    pub fn new(field: &str) -> CqlResult<Self> {
        let field = field.trim();
        if field.is_empty() {
            return Err(CqlError::field("field name must not be blank"));
        }
        if field.contains('\'') || field.contains('"') {
            return Err(CqlError::field(format!(
                "field name must not contain quotes: {}",
                field
            )));
        }
        let (table, json_column) = match field.split_once('.') {
            Some((table, column)) => (table, column),
            None => (field, DEFAULT_JSON_COLUMN),
        };
        for part in [table, json_column] {
            if !is_identifier(part) {
                return Err(CqlError::field(format!("invalid field name: {}", field)));
            }
        }
        Ok(Self {
            table: table.to_string(),
            json_column: json_column.to_string(),
            server_choice_indexes: Vec::new(),
            schema: Arc::new(SchemaModel::default()),
        })
    }

    pub fn with_schema(mut self, schema: Arc<SchemaModel>) -> Self {
        self.schema = schema;
        self
    }

    pub fn set_schema(&mut self, schema: Arc<SchemaModel>) {
        self.schema = schema;
    }

    pub fn with_server_choice_indexes<I, S>(mut self, indexes: I) -> CqlResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_server_choice_indexes(indexes)?;
        Ok(self)
    }

    /// Indexes searched by terms without an explicit index.
    pub fn set_server_choice_indexes<I, S>(&mut self, indexes: I) -> CqlResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut checked = Vec::new();
        for index in indexes {
            let index = index.into();
            if index.trim().is_empty() {
                return Err(CqlError::server_choice(
                    "serverChoiceIndex must not be blank",
                ));
            }
            if index.contains('\'') || index.contains('"') {
                return Err(CqlError::server_choice(format!(
                    "serverChoiceIndex must not contain quotes: {}",
                    index
                )));
            }
            checked.push(index);
        }
        self.server_choice_indexes = checked;
        Ok(())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// `table.column`
    pub fn field(&self) -> String {
        format!("{}.{}", self.table, self.json_column)
    }

    pub fn schema(&self) -> &SchemaModel {
        &self.schema
    }

    pub fn server_choice_indexes(&self) -> &[String] {
        &self.server_choice_indexes
    }

    /// Compile a query into its WHERE and ORDER BY parts.
    pub fn to_sql(&self, node: &CqlNode) -> CqlResult<SqlSelect> {
        let schema: &SchemaModel = &self.schema;
        let mut ctx = TableContext::new(schema, &self.table, &self.json_column);

        let (query, plan) = match node {
            CqlNode::Sort { subtree, keys } => {
                let query = subtree
                    .as_deref()
                    .ok_or_else(|| CqlError::validation("CQL: empty query before sortBy"))?;
                (query, Some(compile_sort(keys, &ctx, schema)?))
            }
            other => (other, None),
        };
        if let Some(plan) = &plan {
            ctx.qualify_columns = !plan.joins().is_empty();
        }

        let where_clause = self.compile(query, &ctx)?;
        let select = match plan {
            Some(plan) if !plan.joins().is_empty() => {
                SqlSelect::new(where_clause.sql(), plan.order_by())
                    .with_joins(self.table.as_str(), plan.joins().render())
            }
            Some(plan) => SqlSelect::new(where_clause.sql(), plan.order_by()),
            None => SqlSelect::new(where_clause.sql(), ""),
        };
        if has_masked_term(query) {
            tracing::debug!("compiled query with masked values");
        } else {
            tracing::debug!("compiled query to {}", select);
        }
        Ok(select)
    }

    /// Compile a query and return the WHERE expression only.
    pub fn to_where(&self, node: &CqlNode) -> CqlResult<String> {
        Ok(self.to_sql(node)?.where_clause().to_string())
    }

    /// Describe how an index name is searched.
    pub fn explain(&self, index: &str) -> CqlResult<String> {
        let ctx = TableContext::new(&self.schema, &self.table, &self.json_column);
        Ok(resolver::resolve(index, &ctx, &self.schema)?.to_string())
    }

    fn compile(&self, root: &CqlNode, ctx: &TableContext<'_>) -> CqlResult<Fragment> {
        let mut tasks = vec![Task::Visit(root)];
        let mut results: Vec<Fragment> = Vec::new();
        while let Some(task) = tasks.pop() {
            match task {
                Task::Visit(node) => match node {
                    CqlNode::Term(term) => results.push(self.compile_term(term, ctx)?),
                    CqlNode::Boolean { op, .. } => {
                        let operands = operands(node)?;
                        tasks.push(Task::Combine(*op, operands.len()));
                        tasks.extend(operands.into_iter().rev().map(Task::Visit));
                    }
                    CqlNode::Sort { .. } => {
                        return Err(CqlError::validation(
                            "CQL: sortBy is only allowed at the end of a query",
                        ));
                    }
                    CqlNode::Prox { .. } => {
                        return Err(CqlError::unsupported(format!(
                            "CQL: Proximity search is not supported: {}",
                            node
                        )));
                    }
                    CqlNode::Prefix { .. } => {
                        return Err(CqlError::unsupported(format!(
                            "CQL: Prefix assignment is not supported: {}",
                            node
                        )));
                    }
                },
                Task::Combine(op, count) => {
                    let at = results.len().saturating_sub(count);
                    let operands = results.split_off(at);
                    results.push(combine(op, operands));
                }
            }
        }
        results
            .pop()
            .ok_or_else(|| CqlError::validation("CQL: empty query"))
    }

    fn compile_term(&self, term: &CqlTerm, ctx: &TableContext<'_>) -> CqlResult<Fragment> {
        if term.is_all_records() {
            return Ok(Fragment::True);
        }
        if !term.is_server_choice() {
            return term::translate(term, &term.index, ctx, &self.schema);
        }
        if self.server_choice_indexes.is_empty() {
            return Err(CqlError::validation(
                "cql.serverChoice requested, but no serverChoiceIndexes defined",
            ));
        }
        let mut fragments = Vec::with_capacity(self.server_choice_indexes.len());
        for index in &self.server_choice_indexes {
            fragments.push(term::translate(term, index, ctx, &self.schema)?);
        }
        Ok(combine(BooleanOp::Or, fragments))
    }
}

/// Operands of a boolean node, with nested nodes of the same associative
/// operator flattened in left to right order.
fn operands(node: &CqlNode) -> CqlResult<Vec<&CqlNode>> {
    let CqlNode::Boolean { op, .. } = node else {
        return Ok(vec![node]);
    };
    let op = *op;
    let mut out = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        match current {
            CqlNode::Boolean {
                op: inner,
                left,
                right,
            } if *inner == op && (op != BooleanOp::Not || std::ptr::eq(current, node)) => {
                let left = left.as_deref().ok_or_else(|| {
                    CqlError::validation(format!("CQL: {} is missing its left operand", inner))
                })?;
                let right = right.as_deref().ok_or_else(|| {
                    CqlError::validation(format!("CQL: {} is missing its right operand", inner))
                })?;
                stack.push(right);
                stack.push(left);
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// True if any term of the tree carries `/masked`.
fn has_masked_term(node: &CqlNode) -> bool {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        match current {
            CqlNode::Term(term) => {
                let masked = term
                    .relation
                    .modifiers
                    .iter()
                    .any(|m| m.name.eq_ignore_ascii_case("masked"));
                if masked {
                    return true;
                }
            }
            CqlNode::Boolean { left, right, .. } | CqlNode::Prox { left, right, .. } => {
                stack.extend(left.as_deref());
                stack.extend(right.as_deref());
            }
            CqlNode::Sort { subtree, .. } | CqlNode::Prefix { subtree, .. } => {
                stack.extend(subtree.as_deref());
            }
        }
    }
    false
}

fn render(kept: Vec<Fragment>, separator: &str, empty: Fragment) -> Fragment {
    match kept.len() {
        0 => empty,
        1 => kept.into_iter().next().unwrap_or(empty),
        _ => {
            let parts: Vec<String> = kept.iter().map(|f| format!("({})", f.sql())).collect();
            Fragment::Sql(parts.join(separator))
        }
    }
}

/// Combine operand fragments, folding `true` and `false`.
fn combine(op: BooleanOp, operands: Vec<Fragment>) -> Fragment {
    match op {
        BooleanOp::Or => {
            if operands
                .iter()
                .any(|f| matches!(f, Fragment::True | Fragment::Defined(_)))
                && operands.len() > 1
            {
                return Fragment::True;
            }
            let kept = operands
                .into_iter()
                .filter(|f| *f != Fragment::False)
                .collect();
            render(kept, " OR ", Fragment::False)
        }
        BooleanOp::And => {
            if operands.contains(&Fragment::False) {
                return Fragment::False;
            }
            let kept = operands
                .into_iter()
                .filter(|f| *f != Fragment::True)
                .collect();
            render(kept, " AND ", Fragment::True)
        }
        BooleanOp::Not => {
            let mut operands = operands.into_iter();
            let left = operands.next().unwrap_or(Fragment::True);
            let right = operands.next().unwrap_or(Fragment::False);
            match (left, right) {
                (Fragment::False, _) => Fragment::False,
                (_, Fragment::True) => Fragment::False,
                (left, Fragment::False) => left,
                (Fragment::True, right) => Fragment::Sql(format!("NOT ({})", right.sql())),
                (left, right) => {
                    Fragment::Sql(format!("({}) AND NOT ({})", left.sql(), right.sql()))
                }
            }
        }
    }
}
