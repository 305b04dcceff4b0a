//! Handle registry.
//!
//! Maps opaque [`ResourceId`]s to backend-native objects and tracks the
//! ownership edges between them. The registry enforces teardown order: an
//! entry with live dependents cannot be released.

mod registry;

pub use registry::{HandleRegistry, ResourceId, ResourceKind};

pub(crate) use registry::Registration;
