//! Prefix to namespace URI bindings used by path queries.

use std::collections::btree_map::{self, BTreeMap};

/// Maps query prefixes to namespace URIs.
///
/// Each prefix is bound at most once; binding it again replaces the URI.
/// Iteration is ordered by prefix, so registration order never matters.
///
/// # Examples
///
/// ```
/// use xmlbridge::NamespaceRegistry;
///
/// let mut registry = NamespaceRegistry::new();
/// registry.insert("cbc", "urn:old");
/// registry.insert("cbc", "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2");
/// assert_eq!(registry.len(), 1);
/// assert!(registry.get("cbc").is_some_and(|uri| uri.ends_with("Components-2")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceRegistry {
    entries: BTreeMap<String, String>,
}

impl NamespaceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `prefix` to `uri`, returning the URI it replaced.
    pub fn insert(&mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Option<String> {
        self.entries.insert(prefix.into(), uri.into())
    }

    #[must_use]
    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.entries.get(prefix).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, prefix: &str) -> bool {
        self.entries.contains_key(prefix)
    }

    /// Iterates over `(prefix, uri)` pairs ordered by prefix.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.entries.iter(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<P: Into<String>, U: Into<String>> FromIterator<(P, U)> for NamespaceRegistry {
    fn from_iter<I: IntoIterator<Item = (P, U)>>(iter: I) -> Self {
        let mut registry = Self::new();
        registry.extend(iter);
        registry
    }
}

impl<P: Into<String>, U: Into<String>> Extend<(P, U)> for NamespaceRegistry {
    fn extend<I: IntoIterator<Item = (P, U)>>(&mut self, iter: I) {
        for (prefix, uri) in iter {
            self.insert(prefix, uri);
        }
    }
}

impl<'a> IntoIterator for &'a NamespaceRegistry {
    type Item = (&'a str, &'a str);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over registry entries.
pub struct Iter<'a> {
    inner: btree_map::Iter<'a, String, String>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut registry = NamespaceRegistry::new();
        assert_eq!(registry.insert("ram", "urn:a"), None);
        assert_eq!(registry.insert("ram", "urn:b"), Some("urn:a".to_string()));
        assert_eq!(registry.get("ram"), Some("urn:b"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_order_independent() {
        let a: NamespaceRegistry = [("x", "urn:x"), ("y", "urn:y")].into_iter().collect();
        let b: NamespaceRegistry = [("y", "urn:y"), ("x", "urn:x")].into_iter().collect();
        assert_eq!(a, b);
        let prefixes: Vec<_> = a.iter().map(|(p, _)| p).collect();
        assert_eq!(prefixes, vec!["x", "y"]);
    }

    #[test]
    fn test_empty() {
        let registry = NamespaceRegistry::default();
        assert!(registry.is_empty());
        assert!(!registry.contains("cbc"));
        assert_eq!(registry.get("cbc"), None);
    }
}
