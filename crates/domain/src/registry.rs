//! Rule registry: validated, read-only lookup over the configured rules.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::rule::{CancelSwitchRule, DeviceRule, SensorRule};

/// Read-only set of rules, validated once at startup.
///
/// Every lookup is an exact topic match; a miss is `None`, never an error.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    devices: Vec<DeviceRule>,
    sensors: Vec<SensorRule>,
    cancel_switches: Vec<CancelSwitchRule>,
}

impl RuleRegistry {
    /// Validate the rules and build the registry.
    ///
    /// Configured topics have any trailing `/` trimmed so they compare
    /// equal to the exact topics delivered by the broker.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a topic or field name is empty, a topic
    /// is repeated within one rule kind, or a query is half-configured.
    pub fn new(
        mut devices: Vec<DeviceRule>,
        mut sensors: Vec<SensorRule>,
        mut cancel_switches: Vec<CancelSwitchRule>,
    ) -> Result<Self, ConfigError> {
        for rule in &mut devices {
            rule.subscribe_topic = normalize_topic(&rule.subscribe_topic);
        }
        for rule in &mut sensors {
            rule.subscribe_topic = normalize_topic(&rule.subscribe_topic);
        }
        for rule in &mut cancel_switches {
            rule.subscribe_topic = normalize_topic(&rule.subscribe_topic);
        }

        check_topics("device", devices.iter().map(|r| r.subscribe_topic.as_str()))?;
        check_topics("sensor", sensors.iter().map(|r| r.subscribe_topic.as_str()))?;
        check_topics(
            "cancel_switch",
            cancel_switches.iter().map(|r| r.subscribe_topic.as_str()),
        )?;

        for rule in &devices {
            if rule.query_payload.is_some() != rule.query_topic_suffix.is_some() {
                return Err(ConfigError::IncompleteQuery {
                    topic: rule.subscribe_topic.clone(),
                });
            }
        }
        for rule in &sensors {
            if rule.occupancy_field.is_empty() {
                return Err(ConfigError::EmptyField {
                    kind: "sensor",
                    topic: rule.subscribe_topic.clone(),
                });
            }
        }
        for rule in &cancel_switches {
            if rule.action_field.is_empty() {
                return Err(ConfigError::EmptyField {
                    kind: "cancel_switch",
                    topic: rule.subscribe_topic.clone(),
                });
            }
        }

        Ok(Self {
            devices,
            sensors,
            cancel_switches,
        })
    }

    #[must_use]
    pub fn find_sensor_rule(&self, topic: &str) -> Option<&SensorRule> {
        self.sensors.iter().find(|r| r.subscribe_topic == topic)
    }

    #[must_use]
    pub fn find_cancel_rule(&self, topic: &str) -> Option<&CancelSwitchRule> {
        self.cancel_switches
            .iter()
            .find(|r| r.subscribe_topic == topic)
    }

    #[must_use]
    pub fn find_device_rule(&self, topic: &str) -> Option<&DeviceRule> {
        self.devices.iter().find(|r| r.subscribe_topic == topic)
    }

    /// All device rules, in configuration order.
    #[must_use]
    pub fn all_device_rules(&self) -> &[DeviceRule] {
        &self.devices
    }

    /// Wildcard subscription filters (`topic/#`) for every rule, deduplicated.
    #[must_use]
    pub fn subscription_topics(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.devices
            .iter()
            .map(|r| r.subscribe_topic.as_str())
            .chain(self.sensors.iter().map(|r| r.subscribe_topic.as_str()))
            .chain(
                self.cancel_switches
                    .iter()
                    .map(|r| r.subscribe_topic.as_str()),
            )
            .filter(|topic| seen.insert(*topic))
            .map(|topic| format!("{topic}/#"))
            .collect()
    }
}

fn normalize_topic(topic: &str) -> String {
    topic.trim().trim_end_matches('/').to_string()
}

fn check_topics<'a>(
    kind: &'static str,
    topics: impl Iterator<Item = &'a str>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for topic in topics {
        if topic.is_empty() {
            return Err(ConfigError::EmptyTopic { kind });
        }
        if !seen.insert(topic) {
            return Err(ConfigError::DuplicateTopic {
                kind,
                topic: topic.to_string(),
            });
        }
    }
    Ok(())
}
