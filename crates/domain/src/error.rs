//! Common error types used across the workspace.
//!
//! Each failure kind has its own typed error; [`PresenceError`] is the
//! umbrella that crosses port boundaries at dispatch time. Rule
//! configuration errors are fatal at startup and never reach it.

/// Top-level error for the presence controller.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// An inbound payload did not carry the expected field.
    #[error("payload parse error")]
    Parse(#[from] ParseError),

    /// A device-specific payload could not be rewritten.
    #[error("command translation error")]
    Translation(#[from] TranslationError),

    /// Connect, subscribe or publish failure reported by the transport.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Rule configuration problems detected while building the registry.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A rule was declared with an empty subscribe topic.
    #[error("{kind} rule has an empty topic")]
    EmptyTopic {
        /// Rule kind (`device`, `sensor`, `cancel_switch`).
        kind: &'static str,
    },

    /// Two rules of the same kind share a subscribe topic.
    #[error("duplicate {kind} rule for topic {topic:?}")]
    DuplicateTopic {
        /// Rule kind (`device`, `sensor`, `cancel_switch`).
        kind: &'static str,
        /// The repeated topic.
        topic: String,
    },

    /// A sensor or cancel-switch rule names an empty payload field.
    #[error("{kind} rule for topic {topic:?} has an empty field name")]
    EmptyField {
        /// Rule kind (`sensor`, `cancel_switch`).
        kind: &'static str,
        /// Topic of the offending rule.
        topic: String,
    },

    /// A query payload was configured without a topic suffix, or the other way round.
    #[error("device rule for topic {topic:?} must set both query_payload and query_topic_suffix")]
    IncompleteQuery {
        /// Topic of the offending rule.
        topic: String,
    },
}

/// Reasons an inbound payload could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The raw bytes are not valid UTF-8.
    #[error("payload is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    /// The payload is not valid JSON.
    #[error("payload is not valid JSON")]
    Json(#[from] serde_json::Error),

    /// The payload is valid JSON but not an object.
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// The expected field is absent.
    #[error("field {field:?} is missing")]
    MissingField {
        /// Name of the missing field.
        field: String,
    },

    /// The field exists with the wrong JSON type.
    #[error("field {field:?} must be a {expected}")]
    WrongType {
        /// Name of the field.
        field: String,
        /// Expected JSON type (`boolean`, `string`).
        expected: &'static str,
    },
}

/// Failures rewriting a cached payload into device commands.
#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    /// The cached payload could not be parsed as a JSON object.
    #[error("cached payload for {topic:?} is not a JSON object")]
    MalformedPayload {
        /// Device subscribe topic.
        topic: String,
        /// Underlying JSON error, when the payload was not JSON at all.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The `brightness` field exists but is not a number.
    #[error("cached payload for {topic:?} has a non-numeric brightness")]
    InvalidBrightness {
        /// Device subscribe topic.
        topic: String,
    },
}

impl PresenceError {
    /// Wrap any transport-level error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Box::new(err))
    }
}
