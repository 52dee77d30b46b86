//! SQL text primitives.
//!
//! Every user supplied literal reaches the generated SQL through
//! [`quote_literal`].

use std::sync::LazyLock;

use regex::Regex;

/// Length of the btree-indexed prefix of a string value.
pub const TRUNCATE_LENGTH: usize = 600;

static POSTGRES_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+|\d+\.\d*|\.\d+)(?:[eE][+-]?\d+)?$").expect("static regex")
});

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]{0,48}$").expect("static regex"));

/// Quote a value as a Postgres string literal.
///
/// Single quotes are doubled. A value containing a backslash is written as an
/// escape string (`E'...'`) with doubled backslashes, so the result reads the
/// same whatever `standard_conforming_strings` is set to. NUL characters are
/// dropped because Postgres text cannot hold them.
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 3);
    if value.contains('\\') {
        out.push('E');
    }
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            '\0' => {}
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Wrap `term` in `lower(...)` and/or `f_unaccent(...)`.
pub fn wrap_in_lower_unaccent(term: &str, lower: bool, unaccent: bool) -> String {
    match (lower, unaccent) {
        (true, true) => format!("lower(f_unaccent({}))", term),
        (true, false) => format!("lower({})", term),
        (false, true) => format!("f_unaccent({})", term),
        (false, false) => term.to_string(),
    }
}

/// `left(term,600)`
pub fn truncated(term: &str) -> String {
    format!("left({},{})", term, TRUNCATE_LENGTH)
}

/// Convert a CQL search string into a LIKE pattern.
///
/// `*` becomes `%`, `?` becomes `_`. Literal `%` and `_` are escaped.
/// A backslash keeps `*`, `?` and `\` literal and is dropped before any
/// other character. A trailing backslash matches a backslash.
pub fn cql2like(cql: &str) -> String {
    let mut like = String::with_capacity(cql.len() + 4);
    let mut chars = cql.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next @ ('*' | '?' | '%' | '_')) => {
                    like.push('\\');
                    like.push(next);
                }
                Some('\\') | None => like.push_str("\\\\"),
                Some(next) => like.push(next),
            },
            '*' => like.push('%'),
            '?' => like.push('_'),
            '%' | '_' => {
                like.push('\\');
                like.push(c);
            }
            _ => like.push(c),
        }
    }
    like
}

/// Remove CQL backslash escapes, keeping masking characters literal.
pub fn cql2string(cql: &str) -> String {
    let mut out = String::with_capacity(cql.len());
    let mut chars = cql.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(chars.next().unwrap_or('\\'));
        } else {
            out.push(c);
        }
    }
    out
}

/// True if `cql` contains an unescaped `*` or `?`.
pub fn has_cql_wildcard(cql: &str) -> bool {
    let mut chars = cql.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '*' | '?' => return true,
            _ => {}
        }
    }
    false
}

/// True if `s` is a valid Postgres numeric constant such as `4`, `4.0`, `.5` or `4e0`.
pub fn is_postgres_number(s: &str) -> bool {
    POSTGRES_NUMBER.is_match(s)
}

/// True if `s` can be spliced into SQL as an unquoted table or column name.
pub fn is_identifier(s: &str) -> bool {
    IDENTIFIER.is_match(s)
}

/// `column->'a'->'b'->>'c'` for the dotted field `a.b.c`.
pub fn json_text_path(column: &str, field: &str) -> String {
    json_path_with(column, field, "->>")
}

/// `column->'a'->'b'->'c'` for the dotted field `a.b.c`.
pub fn json_path(column: &str, field: &str) -> String {
    json_path_with(column, field, "->")
}

fn json_path_with(column: &str, field: &str, last: &str) -> String {
    let segments: Vec<&str> = field.split('.').collect();
    let mut path = String::from(column);
    for (i, segment) in segments.iter().enumerate() {
        path.push_str(if i + 1 == segments.len() { last } else { "->" });
        path.push_str(&quote_literal(segment));
    }
    path
}

/// Text expression for one entry of a multi-field index.
///
/// `a.b` gives a plain text path, `a[*]` concatenates the array elements and
/// `a[*].v` concatenates the `v` values of an array of objects.
pub fn multi_field_path(column: &str, field: &str) -> String {
    match field.split_once("[*]") {
        None => json_text_path(column, field),
        Some((array, rest)) => {
            let array_path = json_path(column, array);
            match rest.strip_prefix('.') {
                Some(key) if !key.is_empty() => format!(
                    "concat_array_object_values({},{})",
                    array_path,
                    quote_literal(key)
                ),
                _ => format!("concat_array_object({})", array_path),
            }
        }
    }
}

/// `concat_space_sql(p1 , p2 , ...)` over the fields of a compound index.
pub fn compound_path(column: &str, fields: &[String]) -> String {
    let parts: Vec<String> = fields
        .iter()
        .map(|f| multi_field_path(column, f.trim()))
        .collect();
    format!("concat_space_sql({})", parts.join(" , "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("abc"), "'abc'");
        assert_eq!(quote_literal("a'b"), "'a''b'");
        assert_eq!(quote_literal(""), "''");
        assert_eq!(quote_literal("a\\b"), "E'a\\\\b'");
        assert_eq!(quote_literal("a\0b"), "'ab'");
    }

    #[test]
    fn test_quote_literal_injection() {
        let payloads = [
            "x0') OR 1=1--",
            "'; DROP TABLE users; --",
            "\\'; select 1; --",
            "a\\",
            "''''",
        ];
        for payload in payloads {
            let quoted = quote_literal(payload);
            let body = quoted.trim_start_matches('E');
            let inner = &body[1..body.len() - 1];
            // every quote inside the literal is doubled
            assert_eq!(inner.replace("''", "").find('\''), None, "{}", quoted);
            // backslashes come in pairs
            assert_eq!(inner.replace("\\\\", "").find('\\'), None, "{}", quoted);
        }
    }

    #[test]
    fn test_wrap_in_lower_unaccent() {
        assert_eq!(wrap_in_lower_unaccent("x", false, false), "x");
        assert_eq!(wrap_in_lower_unaccent("x", true, false), "lower(x)");
        assert_eq!(wrap_in_lower_unaccent("x", false, true), "f_unaccent(x)");
        assert_eq!(wrap_in_lower_unaccent("x", true, true), "lower(f_unaccent(x))");
    }

    #[test]
    fn test_cql2like() {
        assert_eq!(cql2like(""), "");
        assert_eq!(cql2like("abc"), "abc");
        assert_eq!(cql2like("a*b?c"), "a%b_c");
        assert_eq!(cql2like("50%_off"), "50\\%\\_off");
        assert_eq!(cql2like("\\*\\?"), "\\*\\?");
        assert_eq!(cql2like("\\\\"), "\\\\");
        assert_eq!(cql2like("a\\"), "a\\\\");
        assert_eq!(cql2like("\\x\\%"), "x\\%");
        assert_eq!(cql2like("it's"), "it's");
    }

    #[test]
    fn test_cql2string() {
        assert_eq!(cql2string("a\\*b"), "a*b");
        assert_eq!(cql2string("a\\\\"), "a\\");
        assert_eq!(cql2string("a\\"), "a\\");
    }

    #[test]
    fn test_has_cql_wildcard() {
        assert!(has_cql_wildcard("ab*"));
        assert!(has_cql_wildcard("a?"));
        assert!(!has_cql_wildcard("a\\*"));
        assert!(!has_cql_wildcard("plain"));
    }

    #[test]
    fn test_is_postgres_number() {
        for n in ["4", "4.0", "4e0", "+4", "-4.", ".5", "1E-3"] {
            assert!(is_postgres_number(n), "{}", n);
        }
        for n in ["", ".", "e5", "4e", "1,5", "0x10", "4 "] {
            assert!(!is_postgres_number(n), "{}", n);
        }
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("holdings_record"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier("a'b"));
        assert!(!is_identifier(&"a".repeat(50)));
    }

    #[test]
    fn test_json_paths() {
        assert_eq!(json_text_path("tab.jsonb", "a"), "tab.jsonb->>'a'");
        assert_eq!(json_text_path("tab.jsonb", "a.b"), "tab.jsonb->'a'->>'b'");
        assert_eq!(json_path("tab.jsonb", "a.b"), "tab.jsonb->'a'->'b'");
        assert_eq!(
            json_text_path("tab.jsonb", "a'bc.'xyz'"),
            "tab.jsonb->'a''bc'->>'''xyz'''"
        );
    }

    #[test]
    fn test_compound_path() {
        let fields = vec!["key1".to_string(), " key2".to_string()];
        assert_eq!(
            compound_path("tablea.jsonb", &fields),
            "concat_space_sql(tablea.jsonb->>'key1' , tablea.jsonb->>'key2')"
        );
        let fields = vec!["a[*]".to_string(), "b[*].v".to_string()];
        assert_eq!(
            compound_path("tbl.jsonb", &fields),
            "concat_space_sql(concat_array_object(tbl.jsonb->'a') , concat_array_object_values(tbl.jsonb->'b','v'))"
        );
    }
}
