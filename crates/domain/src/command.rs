//! Command translation: desired on/off state to outbound publishes.
//!
//! Most device kinds receive a single publish carrying either the cached
//! payload or the off payload. RGBWW bulbs mis-render a combined
//! brightness + colour command, so restoring one takes three steps:
//!
//! 1. the cached payload with `brightness` forced to `0`
//! 2. a brightness-only command with the cached brightness
//! 3. the same brightness-only command again, after a settle delay
//!
//! Turning an RGBWW bulb off is a plain single publish, and so is restoring
//! one whose last report was `"state":"OFF"`.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::TranslationError;
use crate::rule::{DeviceKind, DeviceRule};

const BRIGHTNESS: &str = "brightness";
const STATE: &str = "state";

/// One outbound message, to be sent after waiting `delay_before`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub topic: String,
    pub payload: String,
    pub delay_before: Duration,
}

impl Publish {
    #[must_use]
    pub fn now(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            delay_before: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay_before = delay;
        self
    }
}

/// Turns a device rule and a desired state into an ordered publish sequence.
#[derive(Debug, Clone, Copy)]
pub struct CommandTranslator {
    settle_delay: Duration,
}

impl CommandTranslator {
    /// Create a translator waiting `settle_delay` before the final RGBWW step.
    #[must_use]
    pub fn new(settle_delay: Duration) -> Self {
        Self { settle_delay }
    }

    /// Publishes needed to bring `rule`'s device to the desired state.
    ///
    /// `cached` is the payload to restore when `occupied` is true; it is
    /// ignored when vacating.
    ///
    /// # Errors
    ///
    /// Returns [`TranslationError`] when an RGBWW payload is not a JSON
    /// object or carries a non-numeric brightness.
    pub fn translate(
        &self,
        rule: &DeviceRule,
        cached: &str,
        occupied: bool,
    ) -> Result<Vec<Publish>, TranslationError> {
        let topic = rule.command_topic();
        if !occupied {
            return Ok(vec![Publish::now(topic, rule.off_payload.as_str())]);
        }
        match rule.kind {
            DeviceKind::Rgbww => self.restore_rgbww(rule, topic, cached),
            DeviceKind::Simple | DeviceKind::WarmWhite | DeviceKind::Wled => {
                Ok(vec![Publish::now(topic, cached)])
            }
        }
    }

    fn restore_rgbww(
        &self,
        rule: &DeviceRule,
        topic: String,
        cached: &str,
    ) -> Result<Vec<Publish>, TranslationError> {
        let mut object = match serde_json::from_str::<Value>(cached) {
            Ok(Value::Object(object)) => object,
            Ok(_) => {
                return Err(TranslationError::MalformedPayload {
                    topic: rule.subscribe_topic.clone(),
                    source: None,
                });
            }
            Err(err) => {
                return Err(TranslationError::MalformedPayload {
                    topic: rule.subscribe_topic.clone(),
                    source: Some(err),
                });
            }
        };

        // An off report still carries the last brightness; replaying it would
        // switch the bulb on.
        if object
            .get(STATE)
            .and_then(Value::as_str)
            .is_some_and(|state| state.eq_ignore_ascii_case("off"))
        {
            return Ok(vec![Publish::now(topic, cached)]);
        }

        let brightness = match object.get(BRIGHTNESS) {
            // Nothing to restore, e.g. the seeded off payload.
            None => return Ok(vec![Publish::now(topic, cached)]),
            Some(Value::Number(n)) => n.clone(),
            Some(_) => {
                return Err(TranslationError::InvalidBrightness {
                    topic: rule.subscribe_topic.clone(),
                });
            }
        };

        object.insert(BRIGHTNESS.to_string(), Value::from(0));
        let dimmed = Value::Object(object).to_string();

        let mut brightness_only = Map::new();
        brightness_only.insert(BRIGHTNESS.to_string(), Value::Number(brightness));
        let brightness_only = Value::Object(brightness_only).to_string();

        Ok(vec![
            Publish::now(topic.as_str(), dimmed),
            Publish::now(topic.as_str(), brightness_only.as_str()),
            Publish::now(topic, brightness_only).after(self.settle_delay),
        ])
    }
}
