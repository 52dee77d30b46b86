//! Resolution of CQL relation and sort modifiers.

use crate::ast::{CqlTerm, Modifier, SortKey};
use crate::error::{CqlError, CqlResult};

/// How a value is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TermFormat {
    /// Decided by the schema.
    #[default]
    Default,
    /// `/string`
    String,
    /// `/number`
    Number,
}

/// Sort direction of a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Masking of a term value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Masking {
    #[default]
    None,
    /// The value is kept out of logs.
    Masked,
}

/// Flags resolved from the modifiers of one term or sort key.
///
/// Case and accent flags are `None` unless a modifier overrides the
/// schema default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CqlModifiers {
    pub case_sensitive: Option<bool>,
    pub remove_accents: Option<bool>,
    pub format: TermFormat,
    pub direction: SortDirection,
    pub masking: Masking,
    /// Array relation modifiers, the ones whose name starts with `@`.
    pub relation_modifiers: Vec<Modifier>,
}

impl CqlModifiers {
    /// Resolve the modifiers of a search term.
    pub fn from_term(term: &CqlTerm) -> CqlResult<Self> {
        Self::parse(&term.relation.modifiers, true)
    }

    /// Resolve the modifiers of a sort key.
    pub fn from_sort_key(key: &SortKey) -> CqlResult<Self> {
        Self::parse(&key.modifiers, false)
    }

    fn parse(modifiers: &[Modifier], allow_relation_modifiers: bool) -> CqlResult<Self> {
        let mut resolved = CqlModifiers::default();
        for modifier in modifiers {
            if modifier.name.starts_with('@') {
                if !allow_relation_modifiers {
                    return Err(CqlError::unsupported(format!(
                        "CQL: Unsupported sort modifier {}",
                        modifier.name
                    )));
                }
                resolved.relation_modifiers.push(modifier.clone());
                continue;
            }
            match modifier.name.to_ascii_lowercase().as_str() {
                "ignorecase" => resolved.case_sensitive = Some(false),
                "respectcase" => resolved.case_sensitive = Some(true),
                "ignoreaccents" => resolved.remove_accents = Some(true),
                "respectaccents" => resolved.remove_accents = Some(false),
                "string" => resolved.format = TermFormat::String,
                "number" => resolved.format = TermFormat::Number,
                "sort.ascending" => resolved.direction = SortDirection::Ascending,
                "sort.descending" => resolved.direction = SortDirection::Descending,
                "masked" => resolved.masking = Masking::Masked,
                "unmasked" | "substring" | "regexp" => {
                    return Err(CqlError::unsupported(format!(
                        "CQL: Unsupported masking modifier {}",
                        modifier.name
                    )));
                }
                _ => {
                    return Err(CqlError::unsupported(format!(
                        "CQL: Unsupported modifier {}",
                        modifier.name
                    )));
                }
            }
        }
        Ok(resolved)
    }

    /// Case sensitivity after applying the schema default.
    pub fn case_sensitive_or(&self, default: bool) -> bool {
        self.case_sensitive.unwrap_or(default)
    }

    /// Accent folding after applying the schema default.
    pub fn remove_accents_or(&self, default: bool) -> bool {
        self.remove_accents.unwrap_or(default)
    }

    pub fn is_masked(&self) -> bool {
        self.masking == Masking::Masked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let m = CqlModifiers::from_term(&CqlTerm::new("a", "=", "b")).unwrap();
        assert_eq!(m, CqlModifiers::default());
        assert!(!m.case_sensitive_or(false));
        assert!(m.remove_accents_or(true));
    }

    #[test]
    fn test_overrides() {
        let term = CqlTerm::new("a", "==", "b")
            .modifier("respectCase")
            .modifier("respectAccents")
            .modifier("number")
            .modifier("masked");
        let m = CqlModifiers::from_term(&term).unwrap();
        assert_eq!(m.case_sensitive, Some(true));
        assert_eq!(m.remove_accents, Some(false));
        assert_eq!(m.format, TermFormat::Number);
        assert!(m.is_masked());
    }

    #[test]
    fn test_later_modifier_wins() {
        let term = CqlTerm::new("a", "==", "b")
            .modifier("respectCase")
            .modifier("ignoreCase");
        let m = CqlModifiers::from_term(&term).unwrap();
        assert_eq!(m.case_sensitive, Some(false));
    }

    #[test]
    fn test_relation_modifiers_collected() {
        let term = CqlTerm::new("identifiers", "=", "x").modifier_value("@type", "=", "isbn");
        let m = CqlModifiers::from_term(&term).unwrap();
        assert_eq!(m.relation_modifiers.len(), 1);
        assert_eq!(m.relation_modifiers[0].name, "@type");
    }

    #[test]
    fn test_unsupported_masking() {
        for name in ["unmasked", "substring", "regexp"] {
            let term = CqlTerm::new("a", "=", "b").modifier(name);
            let err = CqlModifiers::from_term(&term).unwrap_err();
            assert!(matches!(err, CqlError::FeatureUnsupported(_)));
            assert!(err.to_string().contains(name));
        }
    }

    #[test]
    fn test_unknown_modifier() {
        let term = CqlTerm::new("a", "=", "b").modifier("fuzzy");
        let err = CqlModifiers::from_term(&term).unwrap_err();
        assert_eq!(
            err.to_string(),
            "CQL feature unsupported: CQL: Unsupported modifier fuzzy"
        );
    }

    #[test]
    fn test_sort_key() {
        let key = SortKey::new("title").modifier("sort.descending").modifier("string");
        let m = CqlModifiers::from_sort_key(&key).unwrap();
        assert_eq!(m.direction, SortDirection::Descending);
        assert_eq!(m.format, TermFormat::String);
    }
}
