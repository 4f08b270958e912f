use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-text notes keyed by idea text or bias id.
///
/// A cleared note is a missing key, never an empty string, so presence checks
/// are plain lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentMap(BTreeMap<String, String>);

impl CommentMap {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Stores the trimmed text, or removes the key when the text is blank.
    /// Returns whether the map changed.
    pub fn set(&mut self, key: &str, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return self.0.remove(key).is_some();
        }
        if self.get(key) == Some(text) {
            return false;
        }
        self.0.insert(key.to_string(), text.to_string());
        true
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn to_raw(&self) -> BTreeMap<String, String> {
        self.0.clone()
    }

    /// Builds a map from imported data, dropping blank notes.
    pub(crate) fn from_raw(raw: BTreeMap<String, String>) -> Self {
        let mut map = Self::default();
        for (key, text) in raw {
            map.set(&key, &text);
        }
        map
    }
}

/// Notes scoped twice: bias id, then idea text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NestedComments(BTreeMap<String, CommentMap>);

impl NestedComments {
    pub fn get(&self, outer: &str, inner: &str) -> Option<&str> {
        self.0.get(outer).and_then(|map| map.get(inner))
    }

    pub fn has(&self, outer: &str, inner: &str) -> bool {
        self.get(outer, inner).is_some()
    }

    /// Same absence rule as [`CommentMap::set`]; an outer entry left without
    /// notes is removed as well.
    pub fn set(&mut self, outer: &str, inner: &str, text: &str) -> bool {
        let scope = self.0.entry(outer.to_string()).or_default();
        let changed = scope.set(inner, text);
        if scope.is_empty() {
            self.0.remove(outer);
        }
        changed
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn to_raw(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.0
            .iter()
            .map(|(outer, notes)| (outer.clone(), notes.to_raw()))
            .collect()
    }

    pub(crate) fn from_raw(raw: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        let mut nested = Self::default();
        for (outer, notes) in raw {
            for (inner, text) in notes {
                nested.set(&outer, &inner, &text);
            }
        }
        nested
    }
}
