//! Override timers: the sleep window and the cancel-switch suppression window.

use std::str::FromStr;

use chrono::TimeDelta;

use crate::time::{Deadline, Timestamp};

/// Action reported by a multi-click cancel switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAction {
    Single,
    Double,
    Triple,
    /// Toggles indefinite suppression.
    Hold,
}

impl FromStr for CancelAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "double" => Ok(Self::Double),
            "triple" => Ok(Self::Triple),
            "hold" => Ok(Self::Hold),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

impl std::fmt::Display for CancelAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => f.write_str("single"),
            Self::Double => f.write_str("double"),
            Self::Triple => f.write_str("triple"),
            Self::Hold => f.write_str("hold"),
        }
    }
}

/// A switch action string that is not one of the four known actions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown cancel action {0:?}")]
pub struct UnknownAction(pub String);

/// The two deadlines gating occupancy handling and echo capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideState {
    base_cancel: TimeDelta,
    sleep_until: Deadline,
    suppress_until: Deadline,
}

impl OverrideState {
    /// Fresh state with both windows expired.
    #[must_use]
    pub fn new(base_cancel: TimeDelta) -> Self {
        Self {
            base_cancel,
            sleep_until: Deadline::Unset,
            suppress_until: Deadline::Unset,
        }
    }

    /// Whether occupancy events must be ignored at `now`.
    #[must_use]
    pub fn is_occupancy_suppressed(&self, now: Timestamp) -> bool {
        self.suppress_until.is_pending(now)
    }

    /// Whether device echoes must not be captured at `now`.
    #[must_use]
    pub fn is_echo_capture_suppressed(&self, now: Timestamp) -> bool {
        self.sleep_until.is_pending(now)
    }

    pub fn extend_sleep(&mut self, now: Timestamp, duration: TimeDelta) {
        self.sleep_until = Deadline::after(now, duration);
    }

    /// Replace the suppression deadline according to `action`.
    ///
    /// Clicks never accumulate: the last action wins. `Hold` switches
    /// between indefinite suppression and no suppression at all.
    pub fn apply_cancel_action(&mut self, now: Timestamp, action: CancelAction) {
        self.suppress_until = match action {
            CancelAction::Single => Deadline::after(now, self.base_cancel),
            CancelAction::Double => Deadline::after(now, self.base_cancel * 2),
            CancelAction::Triple => Deadline::after(now, self.base_cancel * 3),
            CancelAction::Hold if self.suppress_until.is_indefinite() => Deadline::At(now),
            CancelAction::Hold => Deadline::Indefinite,
        };
    }

    #[must_use]
    pub fn sleep_until(&self) -> Deadline {
        self.sleep_until
    }

    #[must_use]
    pub fn suppress_until(&self) -> Deadline {
        self.suppress_until
    }
}
