//! Per-tab lifecycle state.

use serde::Serialize;
use std::fmt;

/// Lifecycle of a tracked tab.
///
/// ```text
/// Created ──▶ Active ⇄ Inactive
///    │          │         │
///    └──────────┴────┬────┘
///                    ▼
///                Evicting ──▶ Released
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TabState {
    /// Tracked, never activated
    Created,
    /// The one tab the user is looking at
    Active,
    /// Tracked but in the background
    Inactive,
    /// A release for this tab is in flight
    Evicting,
    /// Ledger entry removed (terminal)
    Released,
}

impl TabState {
    /// Whether a move from `self` to `next` is legal.
    pub fn can_transition_to(self, next: TabState) -> bool {
        use TabState::*;
        matches!(
            (self, next),
            (Created, Active)
                | (Created, Inactive)
                | (Active, Active)
                | (Active, Inactive)
                | (Inactive, Active)
                | (Inactive, Inactive)
                | (Created | Active | Inactive, Evicting)
                | (Evicting, Released)
        )
    }

    /// Whether the tab still has a ledger entry that callers may act on.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Created | Self::Active | Self::Inactive)
    }
}

impl fmt::Display for TabState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::Evicting => write!(f, "evicting"),
            Self::Released => write!(f, "released"),
        }
    }
}
