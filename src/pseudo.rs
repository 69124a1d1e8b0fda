//==================================================
// File: pseudo.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Grouping keys for identifiers without a hierarchical separator
// Objective: Let flat names like Zend_Db_Table or fooBar share one cache bucket
//==================================================

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::trie::Binding;

//==================================================
// Section 1.0 - Policy
//==================================================

/// Where a camel-case word ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaseBoundary {
    /// Never split on case; the whole identifier is the key.
    Disabled,
    Uppercase,
    #[default]
    UppercaseOrDigit,
}

/// How a leading run of capitals (`HTTPClient`) is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AcronymMode {
    /// The first boundary wins: `HTTPClient` -> `H`.
    Split,
    /// The run stays together: `HTTPClient` -> `HTTP`.
    #[default]
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PseudoPrefixPolicy {
    /// Use the text before the first underscore when one is present.
    pub underscore: bool,
    pub case_boundary: CaseBoundary,
    pub acronyms: AcronymMode,
}

impl Default for PseudoPrefixPolicy {
    fn default() -> Self {
        Self {
            underscore: true,
            case_boundary: CaseBoundary::default(),
            acronyms: AcronymMode::default(),
        }
    }
}

impl PseudoPrefixPolicy {
    /// Stable textual form, folded into the configuration fingerprint.
    pub fn describe(&self) -> String {
        format!(
            "underscore={};case={:?};acronyms={:?}",
            self.underscore, self.case_boundary, self.acronyms
        )
    }

    /// Group key for a flat identifier.
    ///
    /// The boundary search starts at the second character, so a leading
    /// capital or digit belongs to the key. Falls back to the whole
    /// identifier when no boundary exists.
    pub fn derive<'a>(&self, identifier: &'a str) -> &'a str {
        if self.underscore {
            if let Some(idx) = identifier.find('_') {
                if idx > 0 {
                    return &identifier[..idx];
                }
            }
        }
        match self.boundary(identifier) {
            Some(idx) => &identifier[..idx],
            None => identifier,
        }
    }

    fn is_boundary_char(&self, ch: char) -> bool {
        match self.case_boundary {
            CaseBoundary::Disabled => false,
            CaseBoundary::Uppercase => ch.is_uppercase(),
            CaseBoundary::UppercaseOrDigit => ch.is_uppercase() || ch.is_ascii_digit(),
        }
    }

    fn boundary(&self, identifier: &str) -> Option<usize> {
        let chars: Vec<(usize, char)> = identifier.char_indices().collect();
        let mut i = 1;
        while i < chars.len() {
            let (idx, ch) = chars[i];
            if self.is_boundary_char(ch) {
                let in_capital_run = ch.is_uppercase() && chars[i - 1].1.is_uppercase();
                if self.acronyms == AcronymMode::Merge && in_capital_run {
                    // the run ends before the capital that starts a lowercase tail
                    let next_lower = chars.get(i + 1).is_some_and(|(_, c)| c.is_lowercase());
                    if !next_lower {
                        i += 1;
                        continue;
                    }
                }
                return Some(idx);
            }
            i += 1;
        }
        None
    }
}

//==================================================
// Section 2.0 - Group bindings
//==================================================

/// Flat map from pseudo-prefix group key to binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PseudoPrefixMap {
    groups: HashMap<String, Binding>,
}

impl PseudoPrefixMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &str) -> Option<&Binding> {
        self.groups.get(key)
    }

    pub fn bind(&mut self, key: impl Into<String>, binding: Binding) {
        self.groups.insert(key.into(), binding);
    }

    pub fn invalidate(&mut self, key: &str) -> Option<Binding> {
        self.groups.remove(key)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Binding)> {
        self.groups.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn underscore_prefix_wins() {
        let policy = PseudoPrefixPolicy::default();
        assert_eq!(policy.derive("Foo_Bar"), "Foo");
        assert_eq!(policy.derive("Foo_Baz"), "Foo");
        assert_eq!(policy.derive("Zend_Db_Table"), "Zend");
    }

    #[test]
    fn camel_case_boundary() {
        let policy = PseudoPrefixPolicy::default();
        assert_eq!(policy.derive("fooBar"), "foo");
        assert_eq!(policy.derive("fooBaz"), "foo");
        assert_eq!(policy.derive("FooBar"), "Foo");
        assert_eq!(policy.derive("foo2Bar"), "foo");
    }

    #[test]
    fn whole_identifier_without_boundary() {
        let policy = PseudoPrefixPolicy::default();
        assert_eq!(policy.derive("widget"), "widget");
        assert_eq!(policy.derive("W"), "W");
        assert_eq!(policy.derive("_private"), "_private");
    }

    #[test]
    fn acronym_modes() {
        let merge = PseudoPrefixPolicy::default();
        assert_eq!(merge.derive("HTTPClient"), "HTTP");
        assert_eq!(merge.derive("URL"), "URL");
        let split = PseudoPrefixPolicy {
            acronyms: AcronymMode::Split,
            ..PseudoPrefixPolicy::default()
        };
        assert_eq!(split.derive("HTTPClient"), "H");
    }

    #[test]
    fn digits_only_split_when_enabled() {
        let upper_only = PseudoPrefixPolicy {
            case_boundary: CaseBoundary::Uppercase,
            ..PseudoPrefixPolicy::default()
        };
        assert_eq!(upper_only.derive("md5Hash"), "md5");
        let default = PseudoPrefixPolicy::default();
        assert_eq!(default.derive("md5Hash"), "md");
        assert_eq!(default.derive("3dModel"), "3d");
    }

    #[test]
    fn disabled_policy_keeps_identifier() {
        let policy = PseudoPrefixPolicy {
            underscore: false,
            case_boundary: CaseBoundary::Disabled,
            acronyms: AcronymMode::Merge,
        };
        assert_eq!(policy.derive("Foo_Bar"), "Foo_Bar");
        assert_eq!(policy.derive("fooBar"), "fooBar");
    }

    #[test]
    fn map_binds_and_invalidates() {
        let mut map = PseudoPrefixMap::new();
        map.bind("Foo", Binding::Resolved(PathBuf::from("/src")));
        assert_eq!(map.lookup("Foo"), Some(&Binding::Resolved(PathBuf::from("/src"))));
        assert!(map.invalidate("Foo").is_some());
        assert!(map.lookup("Foo").is_none());
        assert!(map.is_empty());
    }
}
