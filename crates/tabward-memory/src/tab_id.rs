//! Tab identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a tracked tab.
///
/// Assigned by the manager when a tab is tracked and never reused for the
/// lifetime of that manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(pub u64);

impl TabId {
    /// Create a new tab ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tab({})", self.0)
    }
}
