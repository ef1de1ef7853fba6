//! Device state cache: last observed payload per device.
//!
//! Entries are keyed by the device rule's subscribe topic and are never
//! removed. The cache has no interior locking: mutation goes through
//! `&mut self`, so a single owner serializes every write.

use std::collections::HashMap;

use crate::rule::DeviceRule;

/// Mapping from device topic to the raw payload it last reported.
#[derive(Debug, Clone, Default)]
pub struct DeviceStateCache {
    payloads: HashMap<String, String>,
}

impl DeviceStateCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert each rule's off payload unless the device already has an entry.
    ///
    /// Not a reset: payloads observed before a reconnect are kept, and the
    /// connect-time state queries refresh them.
    pub fn seed<'a>(&mut self, rules: impl IntoIterator<Item = &'a DeviceRule>) {
        for rule in rules {
            self.payloads
                .entry(rule.subscribe_topic.clone())
                .or_insert_with(|| rule.off_payload.clone());
        }
    }

    /// Payload to restore for `rule`, falling back to its off payload.
    #[must_use]
    pub fn get<'a>(&'a self, rule: &'a DeviceRule) -> &'a str {
        self.payloads
            .get(&rule.subscribe_topic)
            .map_or(rule.off_payload.as_str(), String::as_str)
    }

    /// Record the latest payload observed for `topic`.
    pub fn set(&mut self, topic: impl Into<String>, payload: impl Into<String>) {
        self.payloads.insert(topic.into(), payload.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}
