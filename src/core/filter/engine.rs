use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};

use super::{registry::FilterRegistry, rule::FilterRule};

const LIST_SUFFIX: &str = "List";
const GENERIC_LIST: &str = "List";

/// Applies a [`FilterRegistry`] to buffered API response bodies.
///
/// Documents are dispatched on their `kind`:
/// * `List` is a heterogeneous container, every item is filtered by its own kind
/// * `<X>List` is a homogeneous container, items get the `<X>` rules (skipped
///   entirely when `<X>` has none)
/// * anything else is a singular resource filtered by its own kind
///
/// Filtering never fails a request. Bodies that are not JSON objects with a
/// string `kind` are passed through untouched, and when no rule changes anything
/// the original bytes are returned as-is without re-serialization.
#[derive(Debug, Clone)]
pub struct ResponseFilterEngine {
    registry: Arc<FilterRegistry>,
}

impl ResponseFilterEngine {
    pub fn new(registry: Arc<FilterRegistry>) -> Self {
        Self { registry }
    }

    /// Filter a raw response body, returning the (possibly new) body and whether
    /// anything was changed.
    pub fn apply(&self, body: Bytes) -> (Bytes, bool) {
        let mut document: Value = match serde_json::from_slice(&body) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(error = %e, "Response body is not JSON, skipping filters");
                return (body, false);
            }
        };

        let Some(object) = document.as_object_mut() else {
            tracing::warn!("Response body is not a JSON object, skipping filters");
            return (body, false);
        };
        if !object.get("kind").is_some_and(Value::is_string) {
            tracing::warn!("Response body has no string `kind`, skipping filters");
            return (body, false);
        }

        if !self.filter_document(object) {
            return (body, false);
        }

        match serde_json::to_vec(&document) {
            Ok(filtered) => (Bytes::from(filtered), true),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize filtered body, returning original");
                (body, false)
            }
        }
    }

    fn filter_document(&self, object: &mut Map<String, Value>) -> bool {
        let Some(kind) = object.get("kind").and_then(Value::as_str) else {
            return false;
        };

        if kind == GENERIC_LIST {
            return self.filter_generic_list(object);
        }

        if let Some(item_kind) = kind.strip_suffix(LIST_SUFFIX) {
            let rules = self.registry.rules_for(item_kind);
            if rules.is_empty() {
                return false;
            }
            return filter_typed_list(object, rules);
        }

        let rules = self.registry.rules_for(kind);
        apply_rules(object, rules)
    }

    fn filter_generic_list(&self, object: &mut Map<String, Value>) -> bool {
        let Some(items) = object.get_mut("items").and_then(Value::as_array_mut) else {
            return false;
        };

        let mut changed = false;
        for item in items.iter_mut().filter_map(Value::as_object_mut) {
            changed |= self.filter_document(item);
        }
        changed
    }
}

fn filter_typed_list(object: &mut Map<String, Value>, rules: &[FilterRule]) -> bool {
    let Some(items) = object.get_mut("items").and_then(Value::as_array_mut) else {
        return false;
    };

    let mut changed = false;
    for item in items.iter_mut().filter_map(Value::as_object_mut) {
        changed |= apply_rules(item, rules);
    }
    changed
}

fn apply_rules(object: &mut Map<String, Value>, rules: &[FilterRule]) -> bool {
    let mut changed = false;
    for rule in rules {
        changed |= rule.apply(object);
    }
    changed
}
