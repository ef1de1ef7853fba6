//! Time and deadline helpers.

use chrono::{DateTime, TimeDelta, Utc};

/// UTC timestamp attached to every inbound message.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// An absolute point in time after which a window is considered over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Deadline {
    /// Never set since process start; always expired.
    #[default]
    Unset,
    /// Expires at the given instant.
    At(Timestamp),
    /// Never expires until explicitly replaced.
    Indefinite,
}

impl Deadline {
    /// Deadline `duration` after `now`.
    #[must_use]
    pub fn after(now: Timestamp, duration: TimeDelta) -> Self {
        Self::At(now + duration)
    }

    /// Whether the window is still open at `now` (strictly before the deadline).
    #[must_use]
    pub fn is_pending(&self, now: Timestamp) -> bool {
        match self {
            Self::Unset => false,
            Self::At(until) => now < *until,
            Self::Indefinite => true,
        }
    }

    #[must_use]
    pub fn is_indefinite(&self) -> bool {
        matches!(self, Self::Indefinite)
    }
}

impl std::fmt::Display for Deadline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unset => f.write_str("unset"),
            Self::At(until) => write!(f, "{}", until.to_rfc3339()),
            Self::Indefinite => f.write_str("indefinite"),
        }
    }
}
