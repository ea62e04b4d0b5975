//! Escalation tiers for unanswered customer messages.
//!
//! The classifier is a pure function so dashboards and monitors can call it
//! against any clock without touching live aggregator state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Discrete escalation level for a room's oldest unread message.
///
/// Variants are declared in severity order, so the derived `Ord` is the
/// escalation ordering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SlaTier {
    /// Nothing unread.
    None,
    /// Unread, but still inside the fresh window.
    Fresh,
    /// Unread past the fresh window.
    Warn,
    /// Unread past the warn window.
    Breach,
}

impl SlaTier {
    /// Stable lowercase name, matching the serde representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Fresh => "fresh",
            Self::Warn => "warn",
            Self::Breach => "breach",
        }
    }
}

/// Tunable windows for [`classify`]. Deployment-specific; see
/// `config::SlaConfig` for the file/env surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaThresholds {
    /// Unread younger than this is [`SlaTier::Fresh`].
    pub fresh_window: Duration,
    /// Unread younger than this (but past the fresh window) is
    /// [`SlaTier::Warn`]; anything older is [`SlaTier::Breach`].
    pub warn_window: Duration,
}

impl Default for SlaThresholds {
    fn default() -> Self {
        Self {
            fresh_window: Duration::from_secs(5 * 60),
            warn_window: Duration::from_secs(15 * 60),
        }
    }
}

/// Maps how long a room's oldest unread message has been waiting to an
/// escalation tier. `unread == 0` is always [`SlaTier::None`] regardless of
/// age; for fixed `unread > 0` the result is non-decreasing in `age`.
#[must_use]
pub fn classify(age: Duration, unread: u32, thresholds: &SlaThresholds) -> SlaTier {
    if unread == 0 {
        SlaTier::None
    } else if age < thresholds.fresh_window {
        SlaTier::Fresh
    } else if age < thresholds.warn_window {
        SlaTier::Warn
    } else {
        SlaTier::Breach
    }
}
