//! Term translation.
//!
//! Compiles one search clause `index relation value` into a boolean SQL
//! expression. The strategy is picked from the relation, the modifiers and
//! the resolved index: full text, LIKE, string or numeric comparison, UUID
//! ranges, array-of-objects matching, or a subquery into another table.

use crate::ast::{CqlTerm, Modifier};
use crate::error::{CqlError, CqlResult};
use crate::modifiers::{CqlModifiers, TermFormat};
use crate::resolver::{self, FieldIndex, ResolvedIndex, TableContext};
use crate::schema::{IndexConfig, SchemaModel};
use crate::sql::{
    TRUNCATE_LENGTH, cql2like, cql2string, has_cql_wildcard, is_postgres_number, json_text_path,
    quote_literal, truncated, wrap_in_lower_unaccent,
};
use std::sync::LazyLock;

use regex::Regex;

const UUID_LOW: &str = "00000000-0000-0000-0000-000000000000";
const UUID_HIGH: &str = "ffffffff-ffff-ffff-ffff-ffffffffffff";

static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("static regex")
});

/// Alias of an array element inside `jsonb_array_elements`.
const ARRAY_ELEMENT: &str = "elem";

/// A compiled boolean expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    True,
    False,
    Sql(String),
    /// "Field is defined" written as a bare `*`. Makes a disjunction match everything.
    Defined(String),
}

impl Fragment {
    pub fn sql(&self) -> &str {
        match self {
            Fragment::True => "true",
            Fragment::False => "false",
            Fragment::Sql(s) | Fragment::Defined(s) => s,
        }
    }
}

/// Translate `term`, searching the index `index` of the table in `ctx`.
///
/// `index` differs from `term.index` for server-choice terms.
pub fn translate<'a>(
    term: &CqlTerm,
    index: &str,
    ctx: &TableContext<'a>,
    schema: &'a SchemaModel,
) -> CqlResult<Fragment> {
    match resolver::resolve(index, ctx, schema)? {
        ResolvedIndex::Uuid { name, column } => uuid_term(term, &name, &ctx.column_sql(&column)),
        ResolvedIndex::Field(field) => {
            let modifiers = CqlModifiers::from_term(term)?;
            if modifiers.relation_modifiers.is_empty() {
                field_term(term, &field, &modifiers)
            } else {
                array_term(term, &field, &modifiers)
            }
        }
        ResolvedIndex::CrossTable(reference) => {
            let inner_ctx = ctx.related(schema, reference.path.destination());
            // no related row can match false; true still needs a related row
            let inner = match translate(term, &reference.field, &inner_ctx, schema)? {
                Fragment::False => return Ok(Fragment::False),
                other => other,
            };
            Ok(Fragment::Sql(reference.path.subquery(schema, inner.sql())))
        }
    }
}

pub(crate) fn is_numeric(field: &FieldIndex, modifiers: &CqlModifiers) -> bool {
    match modifiers.format {
        TermFormat::Number => true,
        TermFormat::String => false,
        TermFormat::Default => field.config.numeric,
    }
}

fn field_term(term: &CqlTerm, field: &FieldIndex, modifiers: &CqlModifiers) -> CqlResult<Fragment> {
    let relation = term.relation.base.to_ascii_lowercase();
    let numeric = is_numeric(field, modifiers);
    tracing::debug!(
        "term {} {} {} on {}",
        field.name,
        relation,
        if modifiers.is_masked() { "****" } else { term.value.as_str() },
        field.text_path
    );
    if relation == "=" {
        if let Some(fragment) = defined_term(term, field) {
            return Ok(fragment);
        }
    }
    match relation.as_str() {
        "=" if numeric => numeric_term(term, field, "="),
        "=" if modifiers.case_sensitive_or(field.config.case_sensitive) => {
            like_term(term, field, modifiers, false)
        }
        "=" | "adj" | "all" | "any" => full_text_term(term, field, &relation, modifiers),
        "==" if numeric => numeric_term(term, field, "="),
        "<>" if numeric => numeric_term(term, field, "<>"),
        "==" => like_term(term, field, modifiers, false),
        "<>" => like_term(term, field, modifiers, true),
        "<" | "<=" | ">" | ">=" if numeric => numeric_term(term, field, &relation),
        "<" | "<=" | ">" | ">=" => compare_term(term, field, &relation, modifiers),
        _ => Err(unsupported_relation(&term.relation.base)),
    }
}

fn unsupported_relation(relation: &str) -> CqlError {
    CqlError::validation(format!("CQL: Relation {} not implemented", relation))
}

/// `path ~ ''`, true for every row where the field is a string.
fn defined(field: &FieldIndex) -> String {
    format!("{} ~ ''", field.text_path)
}

/// A blank or all-`*` value only asks for the field to exist.
///
/// Every search strategy answers it the same way. A `*` marks the result
/// [`Fragment::Defined`]; a blank value stays plain SQL.
fn defined_term(term: &CqlTerm, field: &FieldIndex) -> Option<Fragment> {
    let mut star = false;
    for word in term.value.split_whitespace() {
        if !word.chars().all(|c| c == '*') {
            return None;
        }
        star = true;
    }
    let sql = defined(field);
    Some(if star {
        Fragment::Defined(sql)
    } else {
        Fragment::Sql(sql)
    })
}

/// Case and accent folding for a path and for a literal.
pub(crate) struct Folding {
    lower: bool,
    unaccent: bool,
    /// The path is a verbatim `sqlExpression`.
    expression: bool,
}

impl Folding {
    pub(crate) fn new(field: &FieldIndex, modifiers: &CqlModifiers) -> Self {
        Self {
            lower: !modifiers.case_sensitive_or(field.config.case_sensitive),
            unaccent: modifiers.remove_accents_or(field.config.remove_accents),
            expression: field.expression,
        }
    }

    pub(crate) fn path(&self, path: &str) -> String {
        if self.expression {
            path.to_string()
        } else {
            wrap_in_lower_unaccent(path, self.lower, self.unaccent)
        }
    }

    fn value(&self, value: &str) -> String {
        wrap_in_lower_unaccent(&quote_literal(value), self.lower, self.unaccent)
    }
}

/// True if filtering should go through the 600 character btree prefix.
pub(crate) fn uses_truncation(field: &FieldIndex) -> bool {
    field.config.truncated && !field.config.trigram && !field.expression
}

fn like_term(
    term: &CqlTerm,
    field: &FieldIndex,
    modifiers: &CqlModifiers,
    negate: bool,
) -> CqlResult<Fragment> {
    let folding = Folding::new(field, modifiers);
    let path = folding.path(&field.text_path);
    let value = folding.value(&cql2like(&term.value));
    let like = if uses_truncation(field) {
        let left_path = truncated(&path);
        format!(
            "CASE WHEN length({v}) <= {n} THEN {lp} LIKE {v} ELSE {lp} LIKE {lv} AND {p} LIKE {v} END",
            v = value,
            n = TRUNCATE_LENGTH,
            lp = left_path,
            lv = truncated(&value),
            p = path
        )
    } else {
        format!("{} LIKE {}", path, value)
    };
    Ok(Fragment::Sql(if negate {
        format!("NOT ({})", like)
    } else {
        like
    }))
}

fn compare_term(
    term: &CqlTerm,
    field: &FieldIndex,
    relation: &str,
    modifiers: &CqlModifiers,
) -> CqlResult<Fragment> {
    if has_cql_wildcard(&term.value) {
        return Err(CqlError::validation(format!(
            "CQL: Wildcards are not supported with relation {}",
            relation
        )));
    }
    let folding = Folding::new(field, modifiers);
    let path = folding.path(&field.text_path);
    let value = folding.value(&cql2string(&term.value));
    let comparison = format!("{} {} {}", path, relation, value);
    if !uses_truncation(field) {
        return Ok(Fragment::Sql(comparison));
    }
    // the prefix comparison can only prune, the full comparison decides
    let prefix_op = if relation.starts_with('<') { "<=" } else { ">=" };
    Ok(Fragment::Sql(format!(
        "{} {} {} AND {}",
        truncated(&path),
        prefix_op,
        truncated(&value),
        comparison
    )))
}

fn numeric_term(term: &CqlTerm, field: &FieldIndex, op: &str) -> CqlResult<Fragment> {
    let value = cql2string(term.value.trim());
    if !is_postgres_number(&value) {
        return Err(CqlError::validation(format!(
            "CQL: {} requires a number, got '{}'",
            field.name, term.value
        )));
    }
    Ok(Fragment::Sql(format!(
        "({})::numeric {} {}::numeric",
        field.text_path,
        op,
        quote_literal(&value)
    )))
}

/// One word of a full text query as a quoted tsquery lexeme.
fn ft_lexeme(word: &str) -> CqlResult<String> {
    let mut lexeme = String::with_capacity(word.len());
    let mut prefix = false;
    let mut chars = word.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => lexeme.push(chars.next().unwrap_or('\\')),
            '?' => {
                return Err(CqlError::validation(
                    "CQL: single character mask unsupported (?)",
                ));
            }
            '^' => return Err(CqlError::validation("CQL: anchoring unsupported (^)")),
            '*' => {
                if chars.clone().all(|rest| rest == '*') {
                    prefix = true;
                    break;
                }
                return Err(CqlError::validation(
                    "CQL: only right truncation supported",
                ));
            }
            _ => lexeme.push(c),
        }
    }
    let mut quoted = String::with_capacity(lexeme.len() + 4);
    quoted.push('\'');
    for c in lexeme.chars() {
        match c {
            '\'' => quoted.push_str("''"),
            '\\' => quoted.push_str("\\\\"),
            _ => quoted.push(c),
        }
    }
    quoted.push('\'');
    if prefix {
        quoted.push_str(":*");
    }
    Ok(quoted)
}

fn full_text_term(
    term: &CqlTerm,
    field: &FieldIndex,
    relation: &str,
    modifiers: &CqlModifiers,
) -> CqlResult<Fragment> {
    if let Some(fragment) = defined_term(term, field) {
        return Ok(fragment);
    }
    let lexemes = term
        .value
        .split_whitespace()
        .filter(|word| !word.chars().all(|c| c == '*'))
        .map(ft_lexeme)
        .collect::<CqlResult<Vec<_>>>()?;
    if !field.config.full_text {
        tracing::warn!("Doing full text search on {} without a full text index", field.name);
    }

    let unaccent = modifiers.remove_accents_or(field.config.remove_accents);
    let vector_path = if field.expression {
        field.text_path.clone()
    } else {
        wrap_in_lower_unaccent(&field.text_path, false, unaccent)
    };
    let queries: Vec<String> = lexemes
        .iter()
        .map(|lexeme| {
            format!(
                "to_tsquery('simple', {})",
                wrap_in_lower_unaccent(&quote_literal(lexeme), false, unaccent)
            )
        })
        .collect();
    let query = if queries.len() == 1 {
        queries.concat()
    } else {
        let joiner = match relation {
            "all" => " && ",
            "any" => " || ",
            _ => " <-> ",
        };
        format!("({})", queries.join(joiner))
    };
    Ok(Fragment::Sql(format!(
        "to_tsvector('simple', {}) @@ {}",
        vector_path, query
    )))
}

/// Match elements of an array of objects, restricted by `/@key=value` modifiers.
fn array_term(term: &CqlTerm, field: &FieldIndex, modifiers: &CqlModifiers) -> CqlResult<Fragment> {
    let array = field.config.array.as_ref();
    let subfield = array.and_then(|a| a.subfield.as_deref()).ok_or_else(|| {
        CqlError::validation(format!("CQL: No arraySubfield defined for index {}", field.name))
    })?;
    let allowed: &[String] = array.map(|a| a.modifiers.as_slice()).unwrap_or_default();
    let json_path = field.json_path.as_deref().ok_or_else(|| {
        CqlError::validation(format!(
            "CQL: Relation modifiers need a plain JSON path, index {} has none",
            field.name
        ))
    })?;

    let mut conditions = Vec::with_capacity(modifiers.relation_modifiers.len() + 1);
    for modifier in &modifiers.relation_modifiers {
        conditions.push(relation_modifier_condition(modifier, allowed)?);
    }

    let element = FieldIndex {
        name: format!("{}.{}", field.name, subfield),
        text_path: json_text_path(ARRAY_ELEMENT, subfield),
        json_path: None,
        expression: false,
        config: IndexConfig {
            array: None,
            ..field.config.clone()
        },
    };
    let element_modifiers = CqlModifiers {
        relation_modifiers: Vec::new(),
        ..modifiers.clone()
    };
    match field_term(term, &element, &element_modifiers)? {
        Fragment::False => return Ok(Fragment::False),
        Fragment::True => {}
        Fragment::Sql(sql) | Fragment::Defined(sql) => conditions.push(sql),
    }
    Ok(Fragment::Sql(format!(
        "EXISTS (SELECT 1 FROM jsonb_array_elements({}) AS {} WHERE {})",
        json_path,
        ARRAY_ELEMENT,
        conditions.join(" AND ")
    )))
}

fn relation_modifier_condition(modifier: &Modifier, allowed: &[String]) -> CqlResult<String> {
    let key = modifier.name.trim_start_matches('@');
    let declared = allowed
        .iter()
        .find(|a| a.eq_ignore_ascii_case(key))
        .ok_or_else(|| {
            CqlError::unsupported(format!("CQL: Unsupported relation modifier {}", modifier.name))
        })?;
    match (modifier.comparison.as_deref(), modifier.value.as_deref()) {
        (Some("="), Some(value)) => Ok(format!(
            "{} = {}",
            json_text_path(ARRAY_ELEMENT, declared),
            quote_literal(&cql2string(value))
        )),
        _ => Err(CqlError::unsupported(format!(
            "CQL: Unsupported comparison for relation modifier {}",
            modifier.name
        ))),
    }
}

fn is_uuid(value: &str) -> bool {
    UUID.is_match(value)
}

/// True if `prefix` can start a UUID.
fn is_uuid_prefix(prefix: &str) -> bool {
    prefix.len() <= UUID_LOW.len()
        && prefix.chars().zip(UUID_LOW.chars()).all(|(c, t)| {
            if t == '-' {
                c == '-'
            } else {
                c.is_ascii_hexdigit()
            }
        })
}

fn uuid_term(term: &CqlTerm, name: &str, column: &str) -> CqlResult<Fragment> {
    if let Some(modifier) = term.relation.modifiers.first() {
        return Err(CqlError::unsupported(format!(
            "Unsupported modifier {} for {}",
            modifier.name, name
        )));
    }
    let relation = term.relation.base.to_ascii_lowercase();
    let value = term.value.as_str();
    match relation.as_str() {
        "=" | "==" | "adj" | "all" | "any" => uuid_equality(value, name, column, &relation, false),
        "<>" => uuid_equality(value, name, column, &relation, true),
        "<" | "<=" | ">" | ">=" => {
            if !is_uuid(value) {
                return Err(CqlError::validation(format!(
                    "Invalid UUID after {} comparator {}: {}",
                    name, relation, value
                )));
            }
            Ok(Fragment::Sql(format!(
                "{}{}{}",
                column,
                relation,
                quote_literal(value)
            )))
        }
        _ => Err(unsupported_relation(&term.relation.base)),
    }
}

fn uuid_equality(
    value: &str,
    name: &str,
    column: &str,
    relation: &str,
    negate: bool,
) -> CqlResult<Fragment> {
    if value.is_empty() {
        // "" is any value for = and no value for ==
        return Ok(match (negate, relation == "==") {
            (true, _) => Fragment::True,
            (false, true) => Fragment::False,
            (false, false) => Fragment::True,
        });
    }
    if value.chars().all(|c| c == '*') {
        return Ok(if negate { Fragment::False } else { Fragment::True });
    }

    let prefix = value.trim_end_matches('*');
    if prefix.contains('*') || (prefix.len() < value.len() && !is_uuid_prefix(prefix)) {
        return Err(CqlError::validation(format!(
            "CQL: only right truncation supported for {}: {}",
            name, value
        )));
    }
    if prefix.len() < value.len() {
        let low = format!("{}{}", prefix, &UUID_LOW[prefix.len()..]);
        let high = format!("{}{}", prefix, &UUID_HIGH[prefix.len()..]);
        return Ok(Fragment::Sql(format!(
            "({} {}BETWEEN {} AND {})",
            column,
            if negate { "NOT " } else { "" },
            quote_literal(&low),
            quote_literal(&high)
        )));
    }

    if !is_uuid(value) {
        return Ok(Fragment::Sql(if negate {
            format!("true /* {} <> invalid UUID */", name)
        } else {
            format!("false /* {} == invalid UUID */", name)
        }));
    }
    let op = if negate { "<>" } else { "=" };
    Ok(Fragment::Sql(format!("{}{}{}", column, op, quote_literal(value))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(name: &str) -> FieldIndex {
        FieldIndex {
            name: name.to_string(),
            text_path: format!("tab.jsonb->>'{}'", name),
            json_path: Some(format!("tab.jsonb->'{}'", name)),
            expression: false,
            config: IndexConfig::plain(name),
        }
    }

    fn run(term: &CqlTerm, field: &FieldIndex) -> CqlResult<String> {
        let modifiers = CqlModifiers::from_term(term)?;
        let fragment = if modifiers.relation_modifiers.is_empty() {
            field_term(term, field, &modifiers)?
        } else {
            array_term(term, field, &modifiers)?
        };
        Ok(fragment.sql().to_string())
    }

    #[test]
    fn test_like() {
        let field = plain("name");
        assert_eq!(
            run(&CqlTerm::new("name", "==", "Jo*"), &field).unwrap(),
            "lower(f_unaccent(tab.jsonb->>'name')) LIKE lower(f_unaccent('Jo%'))"
        );
        assert_eq!(
            run(&CqlTerm::new("name", "<>", "x").modifier("respectCase").modifier("respectAccents"), &field)
                .unwrap(),
            "NOT (tab.jsonb->>'name' LIKE 'x')"
        );
    }

    #[test]
    fn test_like_truncated() {
        let mut field = plain("keys");
        field.config.truncated = true;
        assert_eq!(
            run(&CqlTerm::new("keys", "==", "x"), &field).unwrap(),
            "CASE WHEN length(lower(f_unaccent('x'))) <= 600 \
             THEN left(lower(f_unaccent(tab.jsonb->>'keys')),600) LIKE lower(f_unaccent('x')) \
             ELSE left(lower(f_unaccent(tab.jsonb->>'keys')),600) LIKE left(lower(f_unaccent('x')),600) \
             AND lower(f_unaccent(tab.jsonb->>'keys')) LIKE lower(f_unaccent('x')) END"
        );
        field.config.trigram = true;
        assert_eq!(
            run(&CqlTerm::new("keys", "==", "x"), &field).unwrap(),
            "lower(f_unaccent(tab.jsonb->>'keys')) LIKE lower(f_unaccent('x'))"
        );
    }

    #[test]
    fn test_full_text() {
        let field = plain("title");
        assert_eq!(
            run(&CqlTerm::new("title", "=", "Boston"), &field).unwrap(),
            "to_tsvector('simple', f_unaccent(tab.jsonb->>'title')) @@ to_tsquery('simple', f_unaccent('''Boston'''))"
        );
        assert_eq!(
            run(&CqlTerm::new("title", "adj", "in Chicago*"), &field).unwrap(),
            "to_tsvector('simple', f_unaccent(tab.jsonb->>'title')) @@ \
             (to_tsquery('simple', f_unaccent('''in''')) <-> to_tsquery('simple', f_unaccent('''Chicago'':*')))"
        );
        assert_eq!(
            run(&CqlTerm::new("title", "all", "a b").modifier("respectAccents"), &field).unwrap(),
            "to_tsvector('simple', tab.jsonb->>'title') @@ \
             (to_tsquery('simple', '''a''') && to_tsquery('simple', '''b'''))"
        );
        assert!(
            run(&CqlTerm::new("title", "any", "a b"), &field)
                .unwrap()
                .contains(" || ")
        );
    }

    #[test]
    fn test_full_text_quote() {
        let field = plain("title");
        assert_eq!(
            run(&CqlTerm::new("title", "=", "it's"), &field).unwrap(),
            "to_tsvector('simple', f_unaccent(tab.jsonb->>'title')) @@ to_tsquery('simple', f_unaccent('''it''''s'''))"
        );
    }

    #[test]
    fn test_full_text_wildcards() {
        let field = plain("title");
        for value in ["", " ", "*", " * * "] {
            assert_eq!(
                run(&CqlTerm::new("title", "=", value), &field).unwrap(),
                "tab.jsonb->>'title' ~ ''"
            );
        }
        let err = run(&CqlTerm::new("title", "=", "a?c"), &field).unwrap_err();
        assert!(err.to_string().contains("single character mask"));
        let err = run(&CqlTerm::new("title", "=", "*abc"), &field).unwrap_err();
        assert!(err.to_string().contains("only right truncation"));
        assert!(run(&CqlTerm::new("title", "=", "abc**"), &field).unwrap().contains("'''abc'':*'"));
        assert!(run(&CqlTerm::new("title", "=", "a\\?c"), &field).unwrap().contains("'''a?c'''"));
    }

    #[test]
    fn test_case_sensitive_equals_uses_like() {
        let field = plain("code");
        assert_eq!(
            run(&CqlTerm::new("code", "=", "AB").modifier("respectCase"), &field).unwrap(),
            "f_unaccent(tab.jsonb->>'code') LIKE f_unaccent('AB')"
        );
    }

    #[test]
    fn test_case_sensitive_wildcards() {
        let mut field = plain("code");
        field.config.case_sensitive = true;
        for value in ["", " ", "*", "**", " * "] {
            assert_eq!(
                run(&CqlTerm::new("code", "=", value), &field).unwrap(),
                "tab.jsonb->>'code' ~ ''",
                "{:?}",
                value
            );
            assert_eq!(
                run(&CqlTerm::new("name", "=", value).modifier("respectCase"), &plain("name")).unwrap(),
                "tab.jsonb->>'name' ~ ''",
                "{:?}",
                value
            );
        }

        let modifiers = CqlModifiers::default();
        let star = field_term(&CqlTerm::new("code", "=", "*"), &field, &modifiers).unwrap();
        assert!(matches!(star, Fragment::Defined(_)));
        let blank = field_term(&CqlTerm::new("code", "=", ""), &field, &modifiers).unwrap();
        assert!(matches!(blank, Fragment::Sql(_)));
        assert!(
            run(&CqlTerm::new("code", "==", "*"), &field)
                .unwrap()
                .ends_with("LIKE f_unaccent('%')")
        );
    }

    #[test]
    fn test_numeric_wildcard_is_defined() {
        let mut field = plain("copies");
        field.config.numeric = true;
        assert_eq!(
            run(&CqlTerm::new("copies", "=", "*"), &field).unwrap(),
            "tab.jsonb->>'copies' ~ ''"
        );
    }

    #[test]
    fn test_compare() {
        let field = plain("name");
        assert_eq!(
            run(&CqlTerm::new("name", "<", "m"), &field).unwrap(),
            "lower(f_unaccent(tab.jsonb->>'name')) < lower(f_unaccent('m'))"
        );
        let mut truncated_field = plain("name");
        truncated_field.config.truncated = true;
        assert_eq!(
            run(&CqlTerm::new("name", ">=", "m"), &truncated_field).unwrap(),
            "left(lower(f_unaccent(tab.jsonb->>'name')),600) >= left(lower(f_unaccent('m')),600) \
             AND lower(f_unaccent(tab.jsonb->>'name')) >= lower(f_unaccent('m'))"
        );
        let err = run(&CqlTerm::new("name", "<", "m*"), &field).unwrap_err();
        assert!(matches!(err, CqlError::QueryValidation(_)));
    }

    #[test]
    fn test_numeric() {
        let field = plain("zip");
        assert_eq!(
            run(&CqlTerm::new("zip", "<", "2").modifier("number"), &field).unwrap(),
            "(tab.jsonb->>'zip')::numeric < '2'::numeric"
        );
        assert_eq!(
            run(&CqlTerm::new("zip", "=", "4e0").modifier("number"), &field).unwrap(),
            "(tab.jsonb->>'zip')::numeric = '4e0'::numeric"
        );
        let err = run(&CqlTerm::new("zip", "=", "four").modifier("number"), &field).unwrap_err();
        assert!(matches!(err, CqlError::QueryValidation(_)));

        let mut numeric_field = plain("copies");
        numeric_field.config.numeric = true;
        assert_eq!(
            run(&CqlTerm::new("copies", "<>", "3"), &numeric_field).unwrap(),
            "(tab.jsonb->>'copies')::numeric <> '3'::numeric"
        );
        assert!(
            run(&CqlTerm::new("copies", "==", "3").modifier("string"), &numeric_field)
                .unwrap()
                .contains("LIKE")
        );
    }

    #[test]
    fn test_unsupported_relation() {
        let err = run(&CqlTerm::new("name", "encloses", "x"), &plain("name")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Query validation error: CQL: Relation encloses not implemented"
        );
    }

    #[test]
    fn test_expression_is_not_wrapped() {
        let mut field = plain("f");
        field.text_path = "(jsonb->>'f')".to_string();
        field.json_path = None;
        field.expression = true;
        field.config.case_sensitive = true;
        field.config.remove_accents = false;
        assert_eq!(run(&CqlTerm::new("f", "==", "x"), &field).unwrap(), "(jsonb->>'f') LIKE 'x'");
    }

    fn array_field() -> FieldIndex {
        let mut field = plain("identifiers");
        field.config.array = Some(crate::schema::ArraySchema {
            subfield: Some("value".to_string()),
            modifiers: vec!["type".to_string(), "lang".to_string()],
        });
        field
    }

    #[test]
    fn test_array_modifiers() {
        let term = CqlTerm::new("identifiers", "==", "123")
            .modifier_value("@type", "=", "isbn")
            .modifier_value("@lang", "=", "it's");
        assert_eq!(
            run(&term, &array_field()).unwrap(),
            "EXISTS (SELECT 1 FROM jsonb_array_elements(tab.jsonb->'identifiers') AS elem \
             WHERE elem->>'type' = 'isbn' AND elem->>'lang' = 'it''s' \
             AND lower(f_unaccent(elem->>'value')) LIKE lower(f_unaccent('123')))"
        );
    }

    #[test]
    fn test_array_modifier_only() {
        let term = CqlTerm::new("identifiers", "=", "*").modifier_value("@type", "=", "isbn");
        assert_eq!(
            run(&term, &array_field()).unwrap(),
            "EXISTS (SELECT 1 FROM jsonb_array_elements(tab.jsonb->'identifiers') AS elem \
             WHERE elem->>'type' = 'isbn' AND elem->>'value' ~ '')"
        );
    }

    #[test]
    fn test_array_modifier_errors() {
        let term = CqlTerm::new("identifiers", "=", "x").modifier_value("@foo", "=", "y");
        let err = run(&term, &array_field()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "CQL feature unsupported: CQL: Unsupported relation modifier @foo"
        );

        let term = CqlTerm::new("identifiers", "=", "x").modifier_value("@lang", "<", "1");
        let err = run(&term, &array_field()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "CQL feature unsupported: CQL: Unsupported comparison for relation modifier @lang"
        );

        let term = CqlTerm::new("name", "=", "x").modifier_value("@lang", "=", "en");
        let err = run(&term, &plain("name")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Query validation error: CQL: No arraySubfield defined for index name"
        );
    }

    fn uuid(term: CqlTerm) -> CqlResult<String> {
        Ok(uuid_term(&term, "id", "id")?.sql().to_string())
    }

    #[test]
    fn test_uuid_exact() {
        let id = "11111111-1111-1111-1111-111111111111";
        assert_eq!(uuid(CqlTerm::new("id", "=", id)).unwrap(), format!("id='{}'", id));
        assert_eq!(uuid(CqlTerm::new("id", "==", id)).unwrap(), format!("id='{}'", id));
        assert_eq!(uuid(CqlTerm::new("id", "<>", id)).unwrap(), format!("id<>'{}'", id));
        assert_eq!(uuid(CqlTerm::new("id", ">", id)).unwrap(), format!("id>'{}'", id));
    }

    #[test]
    fn test_uuid_wildcards() {
        assert_eq!(uuid(CqlTerm::new("id", "=", "*")).unwrap(), "true");
        assert_eq!(uuid(CqlTerm::new("id", "==", "**")).unwrap(), "true");
        assert_eq!(uuid(CqlTerm::new("id", "=", "")).unwrap(), "true");
        assert_eq!(uuid(CqlTerm::new("id", "==", "")).unwrap(), "false");
        assert_eq!(uuid(CqlTerm::new("id", "<>", "*")).unwrap(), "false");
        assert_eq!(uuid(CqlTerm::new("id", "<>", "")).unwrap(), "true");
    }

    #[test]
    fn test_uuid_right_truncation() {
        assert_eq!(
            uuid(CqlTerm::new("id", "=", "1111*")).unwrap(),
            "(id BETWEEN '11110000-0000-0000-0000-000000000000' AND '1111ffff-ffff-ffff-ffff-ffffffffffff')"
        );
        assert_eq!(
            uuid(CqlTerm::new("id", "<>", "11111111-2**")).unwrap(),
            "(id NOT BETWEEN '11111111-2000-0000-0000-000000000000' AND '11111111-2fff-ffff-ffff-ffffffffffff')"
        );
    }

    #[test]
    fn test_uuid_bad_truncation() {
        for value in ["*1", "*1*", "11*11", "1111111x*", "11111111x*"] {
            let err = uuid(CqlTerm::new("id", "=", value)).unwrap_err();
            assert!(
                err.to_string().contains("only right truncation supported for id"),
                "{}",
                value
            );
        }
    }

    #[test]
    fn test_uuid_invalid() {
        assert_eq!(
            uuid(CqlTerm::new("id", "=", "x0') OR 1=1--")).unwrap(),
            "false /* id == invalid UUID */"
        );
        assert_eq!(
            uuid(CqlTerm::new("id", "<>", "abc")).unwrap(),
            "true /* id <> invalid UUID */"
        );
        let err = uuid(CqlTerm::new("id", "<", "abc")).unwrap_err();
        assert!(err.to_string().contains("Invalid UUID after id comparator"));
        let err = uuid(CqlTerm::new("id", "=", "*").modifier("ignoreCase")).unwrap_err();
        assert!(matches!(err, CqlError::FeatureUnsupported(_)));
    }
}
