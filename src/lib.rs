//! # cql2pg
//!
//! Compiles parsed CQL (Contextual Query Language) trees into PostgreSQL
//! predicates over a JSONB column.
//!
//! Every user supplied value is escaped before it is spliced into SQL, so
//! the output is safe to append to `SELECT * FROM <table>`.
//!
//! ## Quick Example
//!
//! ```
//! use cql2pg::prelude::*;
//!
//! let compiler = Cql2Pg::new("users.jsonb").unwrap();
//! let query = CqlNode::term("name", "==", "Jo*")
//!     .sort_by(vec![SortKey::new("name").modifier("sort.descending")]);
//!
//! let sql = compiler.to_sql(&query).unwrap();
//! assert_eq!(
//!     sql.where_clause(),
//!     "lower(f_unaccent(users.jsonb->>'name')) LIKE lower(f_unaccent('Jo%'))"
//! );
//! assert_eq!(sql.order_by(), "lower(f_unaccent(users.jsonb->>'name')) DESC");
//! ```
//!
//! ## Relations
//!
//! | Relation          | Translation                      |
//! |-------------------|----------------------------------|
//! | `=` `adj`         | full text phrase                 |
//! | `all` `any`       | full text, words ANDed / ORed    |
//! | `==` `<>`         | `LIKE` with `*` and `?` masks    |
//! | `<` `<=` `>` `>=` | folded string or numeric compare |

pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod foreign_key;
pub mod modifiers;
pub mod resolver;
pub mod schema;
pub mod select;
pub mod sort;
pub mod sql;
pub mod term;

pub mod prelude {
    pub use crate::ast::{BooleanOp, CqlNode, CqlRelation, CqlTerm, Modifier, SortKey};
    pub use crate::compiler::Cql2Pg;
    pub use crate::error::*;
    pub use crate::schema::{DbSchema, SchemaModel};
    pub use crate::select::SqlSelect;
}

/// Compile `node` against `field` (`table` or `table.column`) without a schema.
///
/// # Example
///
/// ```
/// use cql2pg::{ast::CqlNode, to_sql};
///
/// let sql = to_sql("users", &CqlNode::term("cql.allRecords", "=", "1")).unwrap();
/// assert_eq!(sql.to_string(), "WHERE true");
/// ```
pub fn to_sql(field: &str, node: &ast::CqlNode) -> error::CqlResult<select::SqlSelect> {
    compiler::Cql2Pg::new(field)?.to_sql(node)
}
