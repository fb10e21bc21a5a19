//! Title pattern parsing and per-namespace case folding.
//!
//! Patterns use `%` for any run of characters and `_` for exactly one, with
//! `\` making the following character literal. A literal space also matches
//! exactly one character, since titles are stored with spaces as `_`.
//!
//! Stored titles have their first character upper-cased in namespaces that
//! capitalize, so a pattern must be folded the same way before it can match
//! there. When the namespaces in scope disagree on that policy the pattern is
//! split into one [`TitleCondition`] per policy group, to be OR-combined.
//!
//! Matching is compiled to SQLite `GLOB` syntax, which is case-sensitive and
//! lets a bracket class (`[*]`) carry a literal wildcard character.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::NamespaceId;

/// Per-namespace first-letter capitalization rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapitalizationPolicy {
    /// Whether namespaces capitalize unless overridden.
    pub default_capitalize: bool,
    pub overrides: BTreeMap<NamespaceId, bool>,
}

impl CapitalizationPolicy {
    pub fn new(default_capitalize: bool) -> Self {
        Self {
            default_capitalize,
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_override(mut self, namespace: NamespaceId, capitalize: bool) -> Self {
        self.overrides.insert(namespace, capitalize);
        self
    }

    pub fn capitalizes(&self, namespace: NamespaceId) -> bool {
        self.overrides
            .get(&namespace)
            .copied()
            .unwrap_or(self.default_capitalize)
    }

    /// Overridden namespaces whose policy actually differs from the default.
    fn deviating(&self) -> BTreeSet<NamespaceId> {
        self.overrides
            .iter()
            .filter(|(_, capitalize)| **capitalize != self.default_capitalize)
            .map(|(ns, _)| *ns)
            .collect()
    }
}

/// Upper-case the first character of `s`.
pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyChar,
    AnyRun,
}

/// A parsed wildcard title pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitlePattern {
    tokens: Vec<Token>,
}

impl TitlePattern {
    /// Parse a raw pattern. Blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let mut tokens = Vec::with_capacity(raw.len());
        let mut chars = raw.chars();
        while let Some(c) = chars.next() {
            let token = match c {
                '\\' => Token::Literal(chars.next().unwrap_or('\\')),
                '%' => Token::AnyRun,
                '_' | ' ' => Token::AnyChar,
                other => Token::Literal(other),
            };
            tokens.push(token);
        }
        Some(Self { tokens })
    }

    /// Fold the leading literal the way capitalizing namespaces store it.
    pub fn capitalized(&self) -> Self {
        match self.tokens.first() {
            Some(Token::Literal(c)) => {
                let mut tokens: Vec<Token> = c.to_uppercase().map(Token::Literal).collect();
                tokens.extend_from_slice(&self.tokens[1..]);
                Self { tokens }
            }
            _ => self.clone(),
        }
    }

    /// Fold according to a namespace capitalization flag.
    pub fn folded(&self, capitalize: bool) -> Self {
        if capitalize {
            self.capitalized()
        } else {
            self.clone()
        }
    }

    /// Compile to a SQLite `GLOB` pattern.
    pub fn to_glob(&self) -> String {
        let mut glob = String::with_capacity(self.tokens.len() + 4);
        for token in &self.tokens {
            match token {
                Token::AnyRun => glob.push('*'),
                Token::AnyChar => glob.push('?'),
                Token::Literal(c @ ('*' | '?' | '[')) => {
                    glob.push('[');
                    glob.push(*c);
                    glob.push(']');
                }
                Token::Literal(c) => glob.push(*c),
            }
        }
        glob
    }
}

/// Which namespaces a title condition applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceSubset {
    /// No restriction beyond the query's own namespace filter.
    Any,
    Only(BTreeSet<NamespaceId>),
    Except(BTreeSet<NamespaceId>),
}

/// One folded pattern and the namespaces it should be matched in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleCondition {
    pub pattern: TitlePattern,
    pub namespaces: NamespaceSubset,
}

/// Split a pattern into per-policy title conditions.
///
/// Returns an empty list for a blank pattern. Otherwise:
/// - scoped, one shared policy: one condition with [`NamespaceSubset::Any`],
///   since the scope is already enforced by the namespace filter;
/// - scoped, mixed policies: one condition per policy group;
/// - unscoped, no deviating overrides: one condition over every namespace;
/// - unscoped with deviating overrides: a default-policy condition excluding
///   them and an override condition limited to them.
pub fn normalize(
    pattern: &str,
    scope: Option<&BTreeSet<NamespaceId>>,
    policy: &CapitalizationPolicy,
) -> Vec<TitleCondition> {
    let Some(parsed) = TitlePattern::parse(pattern) else {
        return Vec::new();
    };

    match scope {
        Some(namespaces) => {
            let (capitalized, sensitive): (BTreeSet<NamespaceId>, BTreeSet<NamespaceId>) =
                namespaces.iter().copied().partition(|ns| policy.capitalizes(*ns));

            if capitalized.is_empty() || sensitive.is_empty() {
                return vec![TitleCondition {
                    pattern: parsed.folded(sensitive.is_empty()),
                    namespaces: NamespaceSubset::Any,
                }];
            }

            [(true, capitalized), (false, sensitive)]
                .into_iter()
                .filter(|(_, group)| !group.is_empty())
                .map(|(capitalize, group)| TitleCondition {
                    pattern: parsed.folded(capitalize),
                    namespaces: NamespaceSubset::Only(group),
                })
                .collect()
        }
        None => {
            let deviating = policy.deviating();
            if deviating.is_empty() {
                return vec![TitleCondition {
                    pattern: parsed.folded(policy.default_capitalize),
                    namespaces: NamespaceSubset::Any,
                }];
            }

            vec![
                TitleCondition {
                    pattern: parsed.folded(policy.default_capitalize),
                    namespaces: NamespaceSubset::Except(deviating.clone()),
                },
                TitleCondition {
                    pattern: parsed.folded(!policy.default_capitalize),
                    namespaces: NamespaceSubset::Only(deviating),
                },
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(raw: &str) -> String {
        TitlePattern::parse(raw).unwrap().to_glob()
    }

    #[test]
    fn test_wildcards_compile_to_glob() {
        assert_eq!(glob("Page%"), "Page*");
        assert_eq!(glob("Pag_1"), "Pag?1");
        assert_eq!(glob("%ncaps%"), "*ncaps*");
    }

    #[test]
    fn test_spaces_match_single_character() {
        assert_eq!(glob("Should not show"), "Should?not?show");
    }

    #[test]
    fn test_pattern_is_trimmed() {
        assert_eq!(glob("  Page%  "), "Page*");
        assert!(TitlePattern::parse("   ").is_none());
    }

    #[test]
    fn test_escaped_wildcards_stay_literal() {
        assert_eq!(glob("\\%PositiveTest%"), "%PositiveTest*");
        assert_eq!(glob("a\\_b"), "a_b");
        assert_eq!(glob("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_glob_metacharacters_are_bracketed() {
        assert_eq!(glob("What?*"), "What[?][*]");
        assert_eq!(glob("[draft]%"), "[[]draft]*");
    }

    #[test]
    fn test_capitalize_first_literal_only() {
        let p = TitlePattern::parse("uncaps%").unwrap();
        assert_eq!(p.capitalized().to_glob(), "Uncaps*");
        let p = TitlePattern::parse("%ncaps").unwrap();
        assert_eq!(p.capitalized().to_glob(), "*ncaps");
        let p = TitlePattern::parse("\\%x").unwrap();
        assert_eq!(p.capitalized().to_glob(), "%x");
    }

    #[test]
    fn test_capitalize_non_ascii() {
        let p = TitlePattern::parse("ülemiste").unwrap();
        assert_eq!(p.capitalized().to_glob(), "Ülemiste");
        let p = TitlePattern::parse("你好").unwrap();
        assert_eq!(p.capitalized().to_glob(), "你好");
        assert_eq!(capitalize_first("にほんご"), "にほんご");
        assert_eq!(capitalize_first("ülemiste"), "Ülemiste");
        assert_eq!(capitalize_first(""), "");
    }

    #[test]
    fn test_blank_pattern_yields_no_conditions() {
        let policy = CapitalizationPolicy::new(true);
        assert!(normalize("  ", None, &policy).is_empty());
    }

    #[test]
    fn test_unscoped_uniform_policy() {
        let policy = CapitalizationPolicy::new(true).with_override(2, true);
        let conditions = normalize("page%", None, &policy);
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].pattern.to_glob(), "Page*");
        assert_eq!(conditions[0].namespaces, NamespaceSubset::Any);
    }

    #[test]
    fn test_unscoped_case_sensitive_default() {
        let policy = CapitalizationPolicy::new(false);
        let conditions = normalize("uncapsTarget", None, &policy);
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].pattern.to_glob(), "uncapsTarget");
    }

    #[test]
    fn test_unscoped_with_overrides_splits() {
        let policy = CapitalizationPolicy::new(false)
            .with_override(2, true)
            .with_override(4, true)
            .with_override(8, true);
        let conditions = normalize("u%", None, &policy);
        assert_eq!(conditions.len(), 2);

        assert_eq!(conditions[0].pattern.to_glob(), "u*");
        assert_eq!(
            conditions[0].namespaces,
            NamespaceSubset::Except(BTreeSet::from([2, 4, 8]))
        );
        assert_eq!(conditions[1].pattern.to_glob(), "U*");
        assert_eq!(
            conditions[1].namespaces,
            NamespaceSubset::Only(BTreeSet::from([2, 4, 8]))
        );
    }

    #[test]
    fn test_scoped_uniform_policy() {
        let policy = CapitalizationPolicy::new(true).with_override(12, false);
        let scope = BTreeSet::from([0, 2]);
        let conditions = normalize("nuke%", Some(&scope), &policy);
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].pattern.to_glob(), "Nuke*");
        assert_eq!(conditions[0].namespaces, NamespaceSubset::Any);

        let scope = BTreeSet::from([12]);
        let conditions = normalize("Nuke%", Some(&scope), &policy);
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].pattern.to_glob(), "Nuke*");
        assert_eq!(conditions[0].namespaces, NamespaceSubset::Any);
    }

    #[test]
    fn test_scoped_mixed_policy() {
        let policy = CapitalizationPolicy::new(false).with_override(0, true);
        let scope = BTreeSet::from([0, 12]);
        let conditions = normalize("uncapsTarget%", Some(&scope), &policy);
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].pattern.to_glob(), "UncapsTarget*");
        assert_eq!(
            conditions[0].namespaces,
            NamespaceSubset::Only(BTreeSet::from([0]))
        );
        assert_eq!(conditions[1].pattern.to_glob(), "uncapsTarget*");
        assert_eq!(
            conditions[1].namespaces,
            NamespaceSubset::Only(BTreeSet::from([12]))
        );
    }
}
