//! Declarative redaction of Kubernetes API responses.
//!
//! Rules are grouped by resource kind in an immutable [`FilterRegistry`] built at
//! start-up, and applied to buffered JSON responses by the
//! [`ResponseFilterEngine`]. A rule pairs a [`Selector`] (field path + predicate)
//! with an action on a sibling field of the selected value:
//! - remove the field
//! - replace it with a literal
//! - regex-substitute within it

pub mod engine;
pub mod registry;
pub mod rule;
pub mod selector;

pub use engine::ResponseFilterEngine;
pub use registry::{FilterRegistry, FilterRegistryBuilder};
pub use rule::{FilterAction, FilterRule};
pub use selector::{Predicate, Selector};
