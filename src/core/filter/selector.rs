use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Test evaluated against the value found at the last segment of a selector path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "test", content = "value", rename_all = "snake_case")]
pub enum Predicate {
    /// The value is present and not `null`.
    Exists,
    /// The value is present and equal to the literal.
    Equals(Value),
}

impl Predicate {
    pub fn test(&self, candidate: Option<&Value>) -> bool {
        match self {
            Predicate::Exists => candidate.is_some_and(|value| !value.is_null()),
            Predicate::Equals(expected) => candidate == Some(expected),
        }
    }
}

/// An ordered field path plus a [`Predicate`] deciding whether a rule applies.
///
/// The object holding the last path segment is the "parent" a rule acts on.
/// Resolution fails closed: a missing or non-object intermediate segment simply
/// means the selector does not match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    pub path: Vec<String>,
    pub predicate: Predicate,
}

impl Selector {
    pub fn new<I, S>(path: I, predicate: Predicate) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            predicate,
        }
    }

    /// Matches when the value at `path` is present and not null.
    pub fn exists<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(path, Predicate::Exists)
    }

    /// Matches when the value at `path` equals `value`.
    pub fn equals<I, S>(value: impl Into<Value>, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(path, Predicate::Equals(value.into()))
    }

    /// Walk `document` to the parent object of the last path segment and return it
    /// if the predicate holds there.
    pub fn resolve<'a>(
        &self,
        document: &'a mut Map<String, Value>,
    ) -> Option<&'a mut Map<String, Value>> {
        let (last, parents) = self.path.split_last()?;

        let mut object = document;
        for segment in parents {
            object = object.get_mut(segment)?.as_object_mut()?;
        }

        if self.predicate.test(object.get(last)) {
            Some(object)
        } else {
            None
        }
    }
}
