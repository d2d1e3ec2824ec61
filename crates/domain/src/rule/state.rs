//! Per-rule evaluation state machine.
//!
//! ```text
//! Idle ──tick──▶ Evaluating ──no match──────────────▶ Idle
//!                     │
//!                     ├──match, cooldown running──▶ CoolingDown { until }
//!                     └──match, cooldown elapsed──▶ fire ──▶ CoolingDown { until }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::time::{Timestamp, to_chrono};

/// Where a rule stands after its latest evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RuleState {
    #[default]
    Idle,
    Evaluating,
    CoolingDown {
        until: Timestamp,
    },
}

/// What the engine should do with a rule once its predicate is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The predicate does not hold.
    Skip,
    /// The predicate holds but the rule fired too recently.
    Suppress { until: Timestamp },
    /// The predicate holds and the cooldown has elapsed.
    Fire,
}

impl RuleState {
    /// Enter evaluation at the start of a tick.
    #[must_use]
    pub fn begin(self) -> Self {
        Self::Evaluating
    }

    /// Resolve the evaluation into the next resting state.
    ///
    /// `fired_at` is `Some` only when the sink accepted the firing.
    #[must_use]
    pub fn settle(decision: Decision, fired_at: Option<Timestamp>, cooldown: Duration) -> Self {
        match (decision, fired_at) {
            (Decision::Fire, Some(ts)) => Self::CoolingDown {
                until: cooldown_until(ts, cooldown),
            },
            (Decision::Suppress { until }, _) => Self::CoolingDown { until },
            _ => Self::Idle,
        }
    }
}

/// Whether a rule last fired at `last` may fire again at `now`.
///
/// A rule that never fired is always eligible. Eligibility begins exactly at
/// `last + cooldown`.
#[must_use]
pub fn is_cooldown_elapsed(last: Option<Timestamp>, cooldown: Duration, now: Timestamp) -> bool {
    match last {
        None => true,
        Some(last) => now.signed_duration_since(last) >= to_chrono(cooldown),
    }
}

/// First instant at which a rule fired at `fired_at` is eligible again.
#[must_use]
pub fn cooldown_until(fired_at: Timestamp, cooldown: Duration) -> Timestamp {
    fired_at
        .checked_add_signed(to_chrono(cooldown))
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC)
}

/// Combine a predicate result with the rule's firing history.
#[must_use]
pub fn decide(
    matched: bool,
    last_firing: Option<Timestamp>,
    cooldown: Duration,
    now: Timestamp,
) -> Decision {
    if !matched {
        return Decision::Skip;
    }
    match last_firing {
        Some(last) if !is_cooldown_elapsed(Some(last), cooldown, now) => Decision::Suppress {
            until: cooldown_until(last, cooldown),
        },
        _ => Decision::Fire,
    }
}
