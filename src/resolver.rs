//! Index resolution.
//!
//! Maps a CQL index name to the SQL it is searched with: a JSON path, a
//! compound or `sqlExpression` text, a UUID column, or a reference into
//! another table reached through foreign keys.

use crate::foreign_key::{self, FkPath};
use crate::schema::{IndexConfig, SchemaModel, TableConfig};
use crate::sql::{compound_path, json_path, json_text_path};
use crate::error::CqlResult;
use std::fmt;

/// Default name of the JSON column.
pub const DEFAULT_JSON_COLUMN: &str = "jsonb";

/// Placeholder of a `sqlExpression` replaced by the table name.
pub const TABLE_ALIAS_PLACEHOLDER: &str = "${tableAlias}";

/// The table a term or sort key is compiled against.
#[derive(Debug, Clone)]
pub struct TableContext<'a> {
    pub table: String,
    /// Name of the JSON column, usually `jsonb`.
    pub json_column: String,
    pub config: Option<&'a TableConfig>,
    /// Qualify UUID columns with the table name, needed once joins exist.
    pub qualify_columns: bool,
}

impl<'a> TableContext<'a> {
    pub fn new(schema: &'a SchemaModel, table: &str, json_column: &str) -> Self {
        Self {
            table: table.to_string(),
            json_column: json_column.to_string(),
            config: schema.table(table),
            qualify_columns: false,
        }
    }

    /// Context of another table reached through a foreign key.
    ///
    /// The schema names no JSON column per table, so related tables always
    /// use [`DEFAULT_JSON_COLUMN`].
    pub fn related(&self, schema: &'a SchemaModel, table: &str) -> Self {
        Self {
            qualify_columns: true,
            ..Self::new(schema, table, DEFAULT_JSON_COLUMN)
        }
    }

    /// `table.jsonb`
    pub fn json_column_sql(&self) -> String {
        format!("{}.{}", self.table, self.json_column)
    }

    pub fn pk_column(&self) -> &str {
        self.config.map(|c| c.pk_column.as_str()).unwrap_or("id")
    }

    /// A UUID column, qualified when required.
    pub fn column_sql(&self, column: &str) -> String {
        if self.qualify_columns {
            format!("{}.{}", self.table, column)
        } else {
            column.to_string()
        }
    }

    fn index(&self, field: &str) -> Option<&'a IndexConfig> {
        self.config.and_then(|c| c.index(field))
    }
}

/// A text-searchable field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldIndex {
    pub name: String,
    /// Text expression, e.g. `tab.jsonb->'a'->>'b'`.
    pub text_path: String,
    /// JSON expression, absent for compound and `sqlExpression` indexes.
    pub json_path: Option<String>,
    /// `text_path` is a verbatim `sqlExpression` and is never wrapped in folding functions.
    pub expression: bool,
    pub config: IndexConfig,
}

/// A field reference into another table.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossTableRef {
    pub alias: String,
    /// Field name inside the other table.
    pub field: String,
    pub path: FkPath,
}

/// Result of resolving an index name.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedIndex {
    /// Primary key or foreign key column.
    Uuid { name: String, column: String },
    Field(FieldIndex),
    CrossTable(CrossTableRef),
}

/// Resolve `field` within `ctx`.
pub fn resolve(field: &str, ctx: &TableContext<'_>, schema: &SchemaModel) -> CqlResult<ResolvedIndex> {
    if let Some(config) = ctx.index(field) {
        return Ok(resolve_config(field, config.clone(), ctx));
    }

    if let Some((prefix, leaf)) = field.rsplit_once('.') {
        let alias = prefix.rsplit('.').next().unwrap_or(prefix);
        if let Some(path) = foreign_key::find_path(schema, &ctx.table, alias)? {
            tracing::debug!(
                "{} resolved to {} of table {}",
                field,
                leaf,
                path.destination()
            );
            return Ok(ResolvedIndex::CrossTable(CrossTableRef {
                alias: alias.to_string(),
                field: leaf.to_string(),
                path,
            }));
        }
        if schema.table(alias).is_some() {
            tracing::warn!(
                "No foreign key from {} to {} is enabled, searching {} as a nested JSON path",
                ctx.table,
                alias,
                field
            );
        }
    }

    if field == "id" {
        return Ok(ResolvedIndex::Uuid {
            name: field.to_string(),
            column: ctx.pk_column().to_string(),
        });
    }
    Ok(resolve_config(field, IndexConfig::plain(field), ctx))
}

fn resolve_config(field: &str, config: IndexConfig, ctx: &TableContext<'_>) -> ResolvedIndex {
    if config.kind.is_uuid() {
        return ResolvedIndex::Uuid {
            name: field.to_string(),
            column: config.column().to_string(),
        };
    }
    let column = ctx.json_column_sql();
    let (text_path, json, expression) = if let Some(expr) = &config.sql_expression {
        (expr.replace(TABLE_ALIAS_PLACEHOLDER, &ctx.table), None, true)
    } else if config.is_compound() {
        (compound_path(&column, &config.paths), None, false)
    } else {
        let path = config.paths.first().map(String::as_str).unwrap_or(field);
        (
            json_text_path(&column, path),
            Some(json_path(&column, path)),
            false,
        )
    };
    ResolvedIndex::Field(FieldIndex {
        name: field.to_string(),
        text_path,
        json_path: json,
        expression,
        config,
    })
}

impl fmt::Display for ResolvedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedIndex::Uuid { name, column } => {
                write!(f, "{}: uuid column {}", name, column)
            }
            ResolvedIndex::Field(field) => {
                let c = &field.config;
                write!(f, "{}: {:?} {}", field.name, c.kind, field.text_path)?;
                let mut flags = Vec::new();
                flags.push(if c.case_sensitive { "case-sensitive" } else { "case-insensitive" });
                if c.remove_accents {
                    flags.push("accent-folded");
                }
                if c.numeric {
                    flags.push("numeric");
                }
                if c.full_text {
                    flags.push("full text index");
                }
                if c.trigram {
                    flags.push("trigram index");
                }
                if c.truncated {
                    flags.push("btree index (600 chars)");
                }
                write!(f, " [{}]", flags.join(", "))
            }
            ResolvedIndex::CrossTable(r) => {
                write!(
                    f,
                    "{}.{}: {} of table {} via {}",
                    r.alias,
                    r.field,
                    r.field,
                    r.path.destination(),
                    r.path
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::IndexKind;

    fn schema() -> SchemaModel {
        SchemaModel::from_json(
            r#"{"tables":[
              {"tableName":"users",
               "index":[{"fieldName":"keys","multiFieldNames":"key1,key2"},
                        {"fieldName":"expr","sqlExpression":"lower(${tableAlias}.jsonb->>'e')"}],
               "fullTextIndex":[{"fieldName":"name"}]},
              {"tableName":"groups","pkColumnName":"gid"}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_plain_path() {
        let schema = schema();
        let ctx = TableContext::new(&schema, "users", "user_data");
        match resolve("address.zip", &ctx, &schema).unwrap() {
            ResolvedIndex::Field(f) => {
                assert_eq!(f.text_path, "users.user_data->'address'->>'zip'");
                assert_eq!(f.json_path.as_deref(), Some("users.user_data->'address'->'zip'"));
                assert_eq!(f.config.kind, IndexKind::PlainPath);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_full_text_field() {
        let schema = schema();
        let ctx = TableContext::new(&schema, "users", "jsonb");
        match resolve("name", &ctx, &schema).unwrap() {
            ResolvedIndex::Field(f) => {
                assert_eq!(f.config.kind, IndexKind::FullText);
                assert!(f.config.full_text);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_compound_and_expression() {
        let schema = schema();
        let ctx = TableContext::new(&schema, "users", "jsonb");
        match resolve("keys", &ctx, &schema).unwrap() {
            ResolvedIndex::Field(f) => {
                assert_eq!(
                    f.text_path,
                    "concat_space_sql(users.jsonb->>'key1' , users.jsonb->>'key2')"
                );
                assert_eq!(f.json_path, None);
            }
            other => panic!("unexpected {:?}", other),
        }
        match resolve("expr", &ctx, &schema).unwrap() {
            ResolvedIndex::Field(f) => {
                assert_eq!(f.text_path, "lower(users.jsonb->>'e')");
                assert!(f.expression);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_primary_key() {
        let schema = schema();
        let ctx = TableContext::new(&schema, "groups", "jsonb");
        assert_eq!(
            resolve("id", &ctx, &schema).unwrap(),
            ResolvedIndex::Uuid {
                name: "id".to_string(),
                column: "gid".to_string()
            }
        );
        let ctx = TableContext::new(&schema, "unknown", "jsonb");
        assert_eq!(
            resolve("id", &ctx, &schema).unwrap(),
            ResolvedIndex::Uuid {
                name: "id".to_string(),
                column: "id".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_prefix_is_nested_path() {
        let schema = schema();
        let ctx = TableContext::new(&schema, "users", "jsonb");
        match resolve("groups.name", &ctx, &schema).unwrap() {
            ResolvedIndex::Field(f) => assert_eq!(f.text_path, "users.jsonb->'groups'->>'name'"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_column_sql() {
        let schema = schema();
        let mut ctx = TableContext::new(&schema, "users", "jsonb");
        assert_eq!(ctx.column_sql("id"), "id");
        ctx.qualify_columns = true;
        assert_eq!(ctx.column_sql("id"), "users.id");
        assert_eq!(ctx.json_column_sql(), "users.jsonb");
    }

    #[test]
    fn test_related_uses_default_column() {
        let schema = schema();
        let ctx = TableContext::new(&schema, "users", "user_data");
        let groups = ctx.related(&schema, "groups");
        assert!(groups.qualify_columns);
        assert_eq!(groups.json_column_sql(), "groups.jsonb");
        assert_eq!(ctx.json_column_sql(), "users.user_data");
    }
}
