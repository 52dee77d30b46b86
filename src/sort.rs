//! Sort clause compilation.

use crate::ast::{ALL_RECORDS, SERVER_CHOICE, SortKey};
use crate::error::{CqlError, CqlResult};
use crate::foreign_key::JoinChain;
use crate::modifiers::{CqlModifiers, SortDirection};
use crate::resolver::{self, FieldIndex, ResolvedIndex, TableContext};
use crate::schema::SchemaModel;
use crate::sql::truncated;
use crate::term::{Folding, is_numeric, uses_truncation};

#[derive(Debug, Clone, PartialEq)]
enum OrderExpr {
    /// UUID column, qualified once joins are present.
    Column {
        table: String,
        column: String,
        qualify: bool,
    },
    Paths(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
struct OrderItem {
    expr: OrderExpr,
    descending: bool,
}

/// ORDER BY terms of a `sortBy` clause and the joins they need.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortPlan {
    items: Vec<OrderItem>,
    joins: JoinChain,
}

impl SortPlan {
    pub fn joins(&self) -> &JoinChain {
        &self.joins
    }

    /// Comma separated ORDER BY terms.
    pub fn order_by(&self) -> String {
        let qualify_all = !self.joins.is_empty();
        let mut terms = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let suffix = if item.descending { " DESC" } else { "" };
            match &item.expr {
                OrderExpr::Column {
                    table,
                    column,
                    qualify,
                } => {
                    if *qualify || qualify_all {
                        terms.push(format!("{}.{}{}", table, column, suffix));
                    } else {
                        terms.push(format!("{}{}", column, suffix));
                    }
                }
                OrderExpr::Paths(paths) => {
                    for path in paths {
                        terms.push(format!("{}{}", path, suffix));
                    }
                }
            }
        }
        terms.join(", ")
    }
}

/// Compile the keys of a `sortBy` clause.
pub fn compile_sort<'a>(
    keys: &[SortKey],
    ctx: &TableContext<'a>,
    schema: &'a SchemaModel,
) -> CqlResult<SortPlan> {
    let mut plan = SortPlan::default();
    for key in keys {
        if key.index.eq_ignore_ascii_case(SERVER_CHOICE) || key.index.eq_ignore_ascii_case(ALL_RECORDS)
        {
            return Err(CqlError::validation(format!(
                "CQL: Cannot sort by {}",
                key.index
            )));
        }
        let modifiers = CqlModifiers::from_sort_key(key)?;
        let expr = match resolver::resolve(&key.index, ctx, schema)? {
            ResolvedIndex::Uuid { column, .. } => OrderExpr::Column {
                table: ctx.table.clone(),
                column,
                qualify: false,
            },
            ResolvedIndex::Field(field) => OrderExpr::Paths(sort_paths(&field, &modifiers)),
            ResolvedIndex::CrossTable(reference) => {
                reference.path.add_joins(schema, &mut plan.joins);
                let inner = ctx.related(schema, reference.path.destination());
                match resolver::resolve(&reference.field, &inner, schema)? {
                    ResolvedIndex::Uuid { column, .. } => OrderExpr::Column {
                        table: inner.table.clone(),
                        column,
                        qualify: true,
                    },
                    ResolvedIndex::Field(field) => {
                        OrderExpr::Paths(sort_paths(&field, &modifiers))
                    }
                    ResolvedIndex::CrossTable(_) => {
                        return Err(CqlError::validation(format!(
                            "CQL: Cannot sort by {}",
                            key.index
                        )));
                    }
                }
            }
        };
        tracing::debug!("sort key {} compiled to {:?}", key.index, expr);
        plan.items.push(OrderItem {
            expr,
            descending: modifiers.direction == SortDirection::Descending,
        });
    }
    Ok(plan)
}

fn sort_paths(field: &FieldIndex, modifiers: &CqlModifiers) -> Vec<String> {
    if is_numeric(field, modifiers) {
        let path = field
            .json_path
            .clone()
            .unwrap_or_else(|| format!("({})::numeric", field.text_path));
        return vec![path];
    }
    let folded = Folding::new(field, modifiers).path(&field.text_path);
    if uses_truncation(field) {
        vec![truncated(&folded), folded]
    } else {
        vec![folded]
    }
}
