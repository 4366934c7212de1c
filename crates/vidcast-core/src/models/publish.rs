use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ResolvedLocator;

/// Locators produced by a publish, keyed by logical output name
/// (`original` plus every configured rendition key).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    locators: BTreeMap<String, ResolvedLocator>,
}

impl PublishResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, locator: ResolvedLocator) {
        self.locators.insert(key.into(), locator);
    }

    pub fn get(&self, key: &str) -> Option<&ResolvedLocator> {
        self.locators.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.locators.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.locators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedLocator)> {
        self.locators.iter().map(|(k, v)| (k.as_str(), v))
    }
}
