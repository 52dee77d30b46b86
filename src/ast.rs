//! CQL abstract syntax tree.
//!
//! Trees are produced by an external CQL parser (or deserialized from JSON
//! by the CLI) and are never mutated by the compiler.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index name a parser assigns to a term without an explicit field.
pub const SERVER_CHOICE: &str = "cql.serverChoice";
/// Index name that matches every record.
pub const ALL_RECORDS: &str = "cql.allRecords";

/// A node of a parsed CQL query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CqlNode {
    /// A leaf: `index relation value`.
    Term(CqlTerm),
    /// `left AND right`, `left OR right`, `left NOT right`.
    Boolean {
        op: BooleanOp,
        left: Option<Box<CqlNode>>,
        right: Option<Box<CqlNode>>,
    },
    /// `subtree sortBy key1 key2 ...`
    Sort {
        subtree: Option<Box<CqlNode>>,
        keys: Vec<SortKey>,
    },
    /// Proximity search. Never supported.
    Prox {
        left: Option<Box<CqlNode>>,
        right: Option<Box<CqlNode>>,
        #[serde(default)]
        modifiers: Vec<Modifier>,
    },
    /// Prefix assignment `>dc="uri" subtree`. Never supported.
    Prefix {
        name: Option<String>,
        uri: String,
        subtree: Option<Box<CqlNode>>,
    },
}

/// Boolean operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BooleanOp {
    And,
    Or,
    Not,
}

impl fmt::Display for BooleanOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BooleanOp::And => write!(f, "AND"),
            BooleanOp::Or => write!(f, "OR"),
            BooleanOp::Not => write!(f, "NOT"),
        }
    }
}

/// A search clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CqlTerm {
    pub index: String,
    pub relation: CqlRelation,
    pub value: String,
}

/// Relation with its modifiers, e.g. `==/ignoreCase/@lang=eng`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CqlRelation {
    pub base: String,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
}

/// A relation or sort modifier: `/name`, or `/name<comparison><value>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// One key of a `sortBy` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub index: String,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
}

impl Modifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comparison: None,
            value: None,
        }
    }

    pub fn with_value(
        name: impl Into<String>,
        comparison: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            comparison: Some(comparison.into()),
            value: Some(value.into()),
        }
    }
}

impl CqlTerm {
    pub fn new(index: impl Into<String>, relation: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            relation: CqlRelation {
                base: relation.into(),
                modifiers: Vec::new(),
            },
            value: value.into(),
        }
    }

    /// Add a plain modifier such as `ignoreCase` or `number`.
    pub fn modifier(mut self, name: impl Into<String>) -> Self {
        self.relation.modifiers.push(Modifier::new(name));
        self
    }

    /// Add a valued modifier such as `@lang=eng`.
    pub fn modifier_value(
        mut self,
        name: impl Into<String>,
        comparison: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.relation
            .modifiers
            .push(Modifier::with_value(name, comparison, value));
        self
    }

    /// True if the term omits its index.
    pub fn is_server_choice(&self) -> bool {
        self.index.eq_ignore_ascii_case(SERVER_CHOICE)
    }

    /// True if the term is `cql.allRecords=...`.
    pub fn is_all_records(&self) -> bool {
        self.index.eq_ignore_ascii_case(ALL_RECORDS)
    }
}

impl SortKey {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            modifiers: Vec::new(),
        }
    }

    pub fn modifier(mut self, name: impl Into<String>) -> Self {
        self.modifiers.push(Modifier::new(name));
        self
    }
}

impl From<CqlTerm> for CqlNode {
    fn from(term: CqlTerm) -> Self {
        CqlNode::Term(term)
    }
}

impl CqlNode {
    /// `index relation value`
    pub fn term(index: impl Into<String>, relation: impl Into<String>, value: impl Into<String>) -> Self {
        CqlNode::Term(CqlTerm::new(index, relation, value))
    }

    /// A term without an index, resolved against the server-choice indexes.
    pub fn bare(value: impl Into<String>) -> Self {
        CqlNode::term(SERVER_CHOICE, "=", value)
    }

    fn boolean(op: BooleanOp, left: CqlNode, right: CqlNode) -> Self {
        CqlNode::Boolean {
            op,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        }
    }

    pub fn and(self, right: CqlNode) -> Self {
        Self::boolean(BooleanOp::And, self, right)
    }

    pub fn or(self, right: CqlNode) -> Self {
        Self::boolean(BooleanOp::Or, self, right)
    }

    pub fn not(self, right: CqlNode) -> Self {
        Self::boolean(BooleanOp::Not, self, right)
    }

    /// Wrap this query in a `sortBy` clause.
    pub fn sort_by(self, keys: Vec<SortKey>) -> Self {
        CqlNode::Sort {
            subtree: Some(Box::new(self)),
            keys,
        }
    }
}

fn write_modifiers(f: &mut fmt::Formatter<'_>, modifiers: &[Modifier]) -> fmt::Result {
    for m in modifiers {
        write!(f, "/{}", m.name)?;
        if let (Some(cmp), Some(value)) = (&m.comparison, &m.value) {
            write!(f, "{}{}", cmp, value)?;
        }
    }
    Ok(())
}

impl fmt::Display for CqlTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_server_choice() {
            write!(f, "{} {}", self.index, self.relation.base)?;
            write_modifiers(f, &self.relation.modifiers)?;
            write!(f, " ")?;
        }
        write!(f, "\"{}\"", self.value.replace('"', "\\\""))
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, node: &Option<Box<CqlNode>>) -> fmt::Result {
    match node {
        Some(n) => write!(f, "{}", n),
        None => write!(f, "<missing>"),
    }
}

impl fmt::Display for CqlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CqlNode::Term(term) => write!(f, "{}", term),
            CqlNode::Boolean { op, left, right } => {
                write!(f, "(")?;
                write_operand(f, left)?;
                write!(f, " {} ", op)?;
                write_operand(f, right)?;
                write!(f, ")")
            }
            CqlNode::Sort { subtree, keys } => {
                write_operand(f, subtree)?;
                write!(f, " sortBy")?;
                for key in keys {
                    write!(f, " {}", key.index)?;
                    write_modifiers(f, &key.modifiers)?;
                }
                Ok(())
            }
            CqlNode::Prox { left, right, modifiers } => {
                write!(f, "(")?;
                write_operand(f, left)?;
                write!(f, " PROX")?;
                write_modifiers(f, modifiers)?;
                write!(f, " ")?;
                write_operand(f, right)?;
                write!(f, ")")
            }
            CqlNode::Prefix { name, uri, subtree } => {
                match name {
                    Some(n) => write!(f, ">{}=\"{}\" ", n, uri)?,
                    None => write!(f, ">\"{}\" ", uri)?,
                }
                write_operand(f, subtree)
            }
        }
    }
}
