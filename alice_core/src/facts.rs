//! Durable facts extracted from a conversation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Well-known fact names.
pub mod keys {
    pub const NAME: &str = "name";
    pub const ACCOUNT_NUMBER: &str = "account_number";
    pub const CUSTOMER_ID: &str = "customer_id";
}

/// Facts keyed by name.
///
/// Ordered so that iteration, serialization and prompt rendering are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserFacts(BTreeMap<String, String>);

impl UserFacts {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Merge `other` into `self`; a newer value replaces an older one for the
    /// same key and keys absent from `other` are kept.
    pub fn merge(&mut self, other: &Self) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UserFacts {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for UserFacts {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overwrites_per_key_and_keeps_others() {
        let mut facts: UserFacts = [(keys::NAME, "John")].into_iter().collect();
        facts.merge(&[(keys::ACCOUNT_NUMBER, "123")].into_iter().collect());
        facts.merge(&[(keys::NAME, "John Doe")].into_iter().collect());

        assert_eq!(facts.get(keys::NAME), Some("John Doe"));
        assert_eq!(facts.get(keys::ACCOUNT_NUMBER), Some("123"));
        assert_eq!(facts.len(), 2);
    }

    #[test]
    fn iteration_is_key_ordered() {
        let facts: UserFacts = [("b", "2"), ("a", "1")].into_iter().collect();
        let keys: Vec<&str> = facts.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
