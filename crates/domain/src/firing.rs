//! Action firing — the durable record that a rule's action was dispatched.

use serde::{Deserialize, Serialize};

use crate::id::RuleId;
use crate::time::{self, Timestamp};

/// A rule fired at a given instant. `(rule_id, fired_at)` is unique.
///
/// The most recent firing of a rule drives its cooldown, so these records
/// must survive restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFiring {
    pub rule_id: RuleId,
    pub fired_at: Timestamp,
}

impl ActionFiring {
    /// `fired_at` is [truncated](time::truncate) to storage precision.
    #[must_use]
    pub fn new(rule_id: RuleId, fired_at: Timestamp) -> Self {
        Self {
            rule_id,
            fired_at: time::truncate(fired_at),
        }
    }
}
