#![forbid(unsafe_code)]

//! Opaque element handles.
//!
//! An [`ElementId`] names a node on the rendered surface without owning it.
//! Handles are resolved against the live surface whenever they are used, so a
//! handle to a node that has since been removed simply fails to resolve.

use std::fmt;

/// Opaque, non-owning reference to an element on a rendered surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    /// Create an element handle from a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw id value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
