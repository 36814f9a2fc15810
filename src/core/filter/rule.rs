use std::borrow::Cow;

use regex::Regex;
use serde_json::{Map, Value};

use super::selector::Selector;

/// What a rule does to the targeted field once its selector matches.
#[derive(Debug, Clone)]
pub enum FilterAction {
    /// Delete the field.
    Remove,
    /// Overwrite the field with a literal.
    Replace(Value),
    /// Substitute every match of `pattern` in a string field with `replacement`
    /// (`$1`-style group references allowed). A `None` pattern never applies.
    RegexReplace {
        pattern: Option<Regex>,
        replacement: String,
    },
}

/// A single redaction rule: `(selector, field, action)`.
#[derive(Debug, Clone)]
pub struct FilterRule {
    selector: Selector,
    field: String,
    action: FilterAction,
}

impl FilterRule {
    pub fn new(selector: Selector, field: impl Into<String>, action: FilterAction) -> Self {
        Self {
            selector,
            field: field.into(),
            action,
        }
    }

    pub fn remove(selector: Selector, field: impl Into<String>) -> Self {
        Self::new(selector, field, FilterAction::Remove)
    }

    pub fn replace(selector: Selector, field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(selector, field, FilterAction::Replace(value.into()))
    }

    /// Replace the field with an empty string.
    pub fn blank(selector: Selector, field: impl Into<String>) -> Self {
        Self::replace(selector, field, "")
    }

    /// Build a regex substitution rule. An empty or invalid pattern yields an
    /// inert rule rather than an error.
    pub fn regex_replace(
        selector: Selector,
        field: impl Into<String>,
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Self {
        let field = field.into();
        let compiled = if pattern.is_empty() {
            None
        } else {
            match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::warn!(
                        field = %field,
                        pattern = pattern,
                        error = %e,
                        "Ignoring filter rule with invalid regex"
                    );
                    None
                }
            }
        };

        Self::new(
            selector,
            field,
            FilterAction::RegexReplace {
                pattern: compiled,
                replacement: replacement.into(),
            },
        )
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn action(&self) -> &FilterAction {
        &self.action
    }

    /// Apply the rule to `object`, returning whether anything changed.
    pub fn apply(&self, object: &mut Map<String, Value>) -> bool {
        if self.field.is_empty() {
            return false;
        }

        let Some(parent) = self.selector.resolve(object) else {
            return false;
        };

        match &self.action {
            FilterAction::Remove => remove_field(parent, &self.field),
            FilterAction::Replace(value) => replace_field(parent, &self.field, value),
            FilterAction::RegexReplace {
                pattern: Some(pattern),
                replacement,
            } => regex_replace_field(parent, &self.field, pattern, replacement),
            FilterAction::RegexReplace { pattern: None, .. } => false,
        }
    }
}

fn remove_field(parent: &mut Map<String, Value>, field: &str) -> bool {
    match parent.get(field) {
        Some(value) if !value.is_null() => {
            parent.shift_remove(field);
            true
        }
        _ => false,
    }
}

fn replace_field(parent: &mut Map<String, Value>, field: &str, value: &Value) -> bool {
    match parent.get_mut(field) {
        Some(current) if !current.is_null() && current != value => {
            *current = value.clone();
            true
        }
        _ => false,
    }
}

fn regex_replace_field(
    parent: &mut Map<String, Value>,
    field: &str,
    pattern: &Regex,
    replacement: &str,
) -> bool {
    let Some(Value::String(text)) = parent.get_mut(field) else {
        return false;
    };

    let replaced = match pattern.replace_all(text, replacement) {
        Cow::Borrowed(_) => return false,
        Cow::Owned(replaced) => replaced,
    };
    if replaced == *text {
        return false;
    }

    *text = replaced;
    true
}
