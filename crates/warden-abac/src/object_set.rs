//! Namespaced attribute storage.
//!
//! Attribute bags are keyed by `{system}.{type}`; a dotted attribute key
//! `{system}.{type}.{field}` resolves by splitting after the second dot.

use std::collections::HashMap;
use std::sync::Arc;

use warden_types::{AttrValue, Attribute};

use crate::condition::AttributeLookup;

/// Per-request map from namespace to attribute bag.
///
/// Bags are reference counted so cached environment attributes can be
/// registered without copying.
#[derive(Debug, Clone, Default)]
pub struct ObjectSet {
    bags: HashMap<String, Arc<Attribute>>,
}

impl ObjectSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, namespace: impl Into<String>, attrs: impl Into<Arc<Attribute>>) {
        self.bags.insert(namespace.into(), attrs.into());
    }

    pub fn get(&self, namespace: &str) -> Option<&Attribute> {
        self.bags.get(namespace).map(AsRef::as_ref)
    }

    pub fn has(&self, namespace: &str) -> bool {
        self.bags.contains_key(namespace)
    }

    pub fn del(&mut self, namespace: &str) {
        self.bags.remove(namespace);
    }

    /// Resolves `{system}.{type}.{field}`.
    ///
    /// Returns `None` for an unknown namespace, an unknown field, or a key
    /// with fewer than three segments. Callers treat `None` as "attribute
    /// unknown", which is distinct from a false boolean.
    pub fn get_attribute(&self, key: &str) -> Option<&AttrValue> {
        let (namespace, field) = split_attribute_key(key)?;
        self.get(namespace)?.get(field)
    }
}

impl AttributeLookup for ObjectSet {
    fn get_attr(&self, key: &str) -> Option<&AttrValue> {
        self.get_attribute(key)
    }

    fn has_resource(&self, namespace: &str) -> bool {
        self.has(namespace)
    }
}

/// Splits a dotted key into `({system}.{type}, field)`.
fn split_attribute_key(key: &str) -> Option<(&str, &str)> {
    let first = key.find('.')?;
    let second = first + 1 + key[first + 1..].find('.')?;
    Some((&key[..second], &key[second + 1..]))
}
