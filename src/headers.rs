//! Case-insensitive ordered header map.
//!
//! Keys are normalized to lowercase once at insertion and lookups lowercase
//! their argument, so casing rules live here and nowhere else. Insertion
//! order is preserved because the response writer emits headers in the order
//! they were set.

use std::fmt;

use crate::error::ProtocolError;

/// Ordered header map normalizing keys at insertion and lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, rejecting a duplicate key.
    ///
    /// This is the parse-side entry point: a request repeating a header key
    /// is a grammar violation.
    pub fn try_insert(
        &mut self,
        name: impl AsRef<str>,
        value: impl Into<String>,
    ) -> Result<(), ProtocolError> {
        let key = name.as_ref().to_ascii_lowercase();
        if self.entries.iter().any(|(k, _)| *k == key) {
            return Err(ProtocolError::DuplicateHeader(key));
        }
        self.entries.push((key, value.into()));
        Ok(())
    }

    /// Set a header, replacing any existing value. Response-side entry point.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let key = name.as_ref().to_ascii_lowercase();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value.into();
        } else {
            self.entries.push((key, value.into()));
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let key = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let key = name.to_ascii_lowercase();
        let idx = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
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

impl fmt::Display for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in self.iter() {
            writeln!(f, "{k}: {v}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a HeaderMap {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
