//! Event dispatcher: decides, for every inbound message, what to publish
//! and how the override timers and device cache change.
//!
//! Each message runs three independent branches, in order:
//!
//! 1. **occupancy**: a sensor reported occupancy while not suppressed; every
//!    device is restored (or switched off) and the sleep window opens.
//! 2. **cancel**: a cancel switch was clicked; the suppression window is
//!    replaced.
//! 3. **echo capture**: a device reported its own state outside the sleep
//!    window; the payload is cached for the next restore.
//!
//! Branches are not mutually exclusive. A failure in one branch, or for one
//! device, is reported and never stops the others.

use std::time::Duration;

use chrono::TimeDelta;
use tokio::sync::mpsc;

use presence_domain::command::{CommandTranslator, Publish};
use presence_domain::device_state::DeviceStateCache;
use presence_domain::error::PresenceError;
use presence_domain::override_state::{CancelAction, OverrideState};
use presence_domain::payload;
use presence_domain::registry::RuleRegistry;
use presence_domain::rule::DeviceRule;
use presence_domain::time::Timestamp;

use crate::inbound::Inbound;
use crate::ports::MessagePublisher;

/// Timing parameters of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherSettings {
    /// How long device echoes are ignored after an occupancy event.
    pub sleep_window: TimeDelta,
    /// Suppression length of a single click; double and triple scale it.
    pub cancel_base: TimeDelta,
    /// Pause before the last step of the RGBWW restore sequence.
    pub settle_delay: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            sleep_window: TimeDelta::seconds(10),
            cancel_base: TimeDelta::minutes(15),
            settle_delay: Duration::from_secs(1),
        }
    }
}

/// What a single dispatch did.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Occupancy value acted upon, if the occupancy branch ran to completion.
    pub occupancy: Option<bool>,
    /// A sensor message arrived while occupancy handling was suppressed.
    pub occupancy_suppressed: bool,
    /// Cancel action applied to the override state.
    pub cancel_action: Option<CancelAction>,
    /// The payload was stored as a device's latest state.
    pub echo_captured: bool,
    /// Number of messages handed to the publisher.
    pub published: usize,
    /// Every error met while dispatching, in order.
    pub errors: Vec<PresenceError>,
}

impl DispatchReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Owns the rule registry, device cache and override timers.
///
/// Every mutating method takes `&mut self`, so messages are processed one
/// at a time and to completion.
pub struct EventDispatcher<P> {
    registry: RuleRegistry,
    cache: DeviceStateCache,
    overrides: OverrideState,
    translator: CommandTranslator,
    sleep_window: TimeDelta,
    publisher: P,
}

impl<P: MessagePublisher> EventDispatcher<P> {
    /// Create a dispatcher with an empty cache and expired timers.
    pub fn new(registry: RuleRegistry, settings: DispatcherSettings, publisher: P) -> Self {
        Self {
            registry,
            cache: DeviceStateCache::new(),
            overrides: OverrideState::new(settings.cancel_base),
            translator: CommandTranslator::new(settings.settle_delay),
            sleep_window: settings.sleep_window,
            publisher,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &DeviceStateCache {
        &self.cache
    }

    #[must_use]
    pub fn overrides(&self) -> &OverrideState {
        &self.overrides
    }

    /// Seed the cache with off payloads and ask every queryable device for
    /// its current state.
    pub async fn on_connect(&mut self) -> DispatchReport {
        let mut report = DispatchReport::default();
        self.cache.seed(self.registry.all_device_rules());

        for rule in self.registry.all_device_rules() {
            let Some((topic, payload)) = rule.query() else {
                continue;
            };
            tracing::debug!(%topic, payload, "querying device state");
            match self.publisher.publish(topic, payload.to_string()).await {
                Ok(()) => report.published += 1,
                Err(err) => {
                    tracing::error!(
                        topic = %rule.subscribe_topic,
                        error = %err,
                        "state query failed"
                    );
                    report.errors.push(err);
                }
            }
        }

        tracing::info!(
            devices = self.registry.all_device_rules().len(),
            queries = report.published,
            "device cache primed"
        );
        report
    }

    /// Process one inbound message received at `now`.
    pub async fn handle_message(
        &mut self,
        topic: &str,
        raw: &[u8],
        now: Timestamp,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        self.occupancy_branch(topic, raw, now, &mut report).await;
        self.cancel_branch(topic, raw, now, &mut report);
        self.echo_branch(topic, raw, now, &mut report);
        report
    }

    /// Drain `inbound` until the sender side closes, then hand the
    /// dispatcher back.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<Inbound>) -> Self {
        tracing::info!("dispatcher started");
        while let Some(item) = inbound.recv().await {
            match item {
                Inbound::Connected => {
                    self.on_connect().await;
                }
                Inbound::Message(msg) => {
                    self.handle_message(&msg.topic, &msg.payload, msg.received_at)
                        .await;
                }
            }
        }
        tracing::info!("inbound channel closed, dispatcher stopped");
        self
    }

    async fn occupancy_branch(
        &mut self,
        topic: &str,
        raw: &[u8],
        now: Timestamp,
        report: &mut DispatchReport,
    ) {
        let Some(rule) = self.registry.find_sensor_rule(topic) else {
            return;
        };
        if self.overrides.is_occupancy_suppressed(now) {
            tracing::debug!(
                topic,
                until = %self.overrides.suppress_until(),
                "occupancy ignored while suppressed"
            );
            report.occupancy_suppressed = true;
            return;
        }

        let occupied = match payload::decode_occupancy(raw, &rule.occupancy_field) {
            Ok(occupied) => occupied,
            Err(err) => {
                tracing::warn!(topic, error = %err, "invalid sensor payload");
                report.errors.push(err.into());
                return;
            }
        };

        self.overrides.extend_sleep(now, self.sleep_window);
        tracing::info!(topic, occupied, "occupancy changed");

        for device in self.registry.all_device_rules() {
            let cached = self.cache.get(device);
            match self.translator.translate(device, cached, occupied) {
                Ok(steps) => self.send_steps(device, steps, report).await,
                Err(err) => {
                    tracing::warn!(
                        topic = %device.subscribe_topic,
                        kind = %device.kind,
                        error = %err,
                        "skipping device, cached payload cannot be translated"
                    );
                    report.errors.push(err.into());
                }
            }
        }
        report.occupancy = Some(occupied);
    }

    async fn send_steps(
        &self,
        device: &DeviceRule,
        steps: Vec<Publish>,
        report: &mut DispatchReport,
    ) {
        for step in steps {
            if !step.delay_before.is_zero() {
                tokio::time::sleep(step.delay_before).await;
            }
            tracing::debug!(topic = %step.topic, payload = %step.payload, "publishing");
            if let Err(err) = self.publisher.publish(step.topic, step.payload).await {
                tracing::error!(
                    topic = %device.subscribe_topic,
                    error = %err,
                    "publish failed, remaining steps for this device dropped"
                );
                report.errors.push(err);
                return;
            }
            report.published += 1;
        }
    }

    fn cancel_branch(
        &mut self,
        topic: &str,
        raw: &[u8],
        now: Timestamp,
        report: &mut DispatchReport,
    ) {
        let Some(rule) = self.registry.find_cancel_rule(topic) else {
            return;
        };
        let value = match payload::decode_action(raw, &rule.action_field) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(topic, error = %err, "invalid cancel switch payload");
                report.errors.push(err.into());
                return;
            }
        };
        match value.parse::<CancelAction>() {
            Ok(action) => {
                self.overrides.apply_cancel_action(now, action);
                tracing::info!(
                    topic,
                    %action,
                    until = %self.overrides.suppress_until(),
                    "occupancy override updated"
                );
                report.cancel_action = Some(action);
            }
            Err(err) => tracing::debug!(topic, error = %err, "ignoring cancel switch action"),
        }
    }

    fn echo_branch(
        &mut self,
        topic: &str,
        raw: &[u8],
        now: Timestamp,
        report: &mut DispatchReport,
    ) {
        if self.registry.find_device_rule(topic).is_none() {
            return;
        }
        if self.overrides.is_echo_capture_suppressed(now) {
            tracing::trace!(topic, "device echo ignored inside sleep window");
            return;
        }
        match payload::decode_text(raw) {
            Ok(text) => {
                tracing::debug!(topic, payload = text, "device state captured");
                self.cache.set(topic, text);
                report.echo_captured = true;
            }
            Err(err) => {
                tracing::warn!(topic, error = %err, "device echo is not valid text");
                report.errors.push(err.into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::future::Future;
    use std::sync::{Arc, Mutex};

    use chrono::DateTime;
    use presence_domain::rule::{CancelSwitchRule, DeviceKind, SensorRule};
    use presence_domain::time::Deadline;

    use crate::inbound::InboundMessage;

    // ── Recording publisher ────────────────────────────────────────

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<(String, String)>>,
        failing_topics: HashSet<String>,
    }

    impl RecordingPublisher {
        fn failing_on(topic: &str) -> Self {
            Self {
                sent: Mutex::default(),
                failing_topics: HashSet::from([topic.to_string()]),
            }
        }

        fn take(&self) -> Vec<(String, String)> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    impl MessagePublisher for RecordingPublisher {
        fn publish(
            &self,
            topic: String,
            payload: String,
        ) -> impl Future<Output = Result<(), PresenceError>> + Send {
            let result = if self.failing_topics.contains(&topic) {
                Err(PresenceError::transport(std::io::Error::other(
                    "broker unavailable",
                )))
            } else {
                self.sent.lock().unwrap().push((topic, payload));
                Ok(())
            };
            async { result }
        }
    }

    // ── Fixtures ───────────────────────────────────────────────────

    fn at(secs: i64) -> Timestamp {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn settings() -> DispatcherSettings {
        DispatcherSettings {
            sleep_window: TimeDelta::seconds(10),
            cancel_base: TimeDelta::seconds(900),
            settle_delay: Duration::ZERO,
        }
    }

    fn registry(devices: Vec<DeviceRule>) -> RuleRegistry {
        RuleRegistry::new(
            devices,
            vec![SensorRule::new("S", "occupancy")],
            vec![CancelSwitchRule::new("B", "action")],
        )
        .unwrap()
    }

    fn dispatcher(
        devices: Vec<DeviceRule>,
    ) -> (EventDispatcher<Arc<RecordingPublisher>>, Arc<RecordingPublisher>) {
        let publisher = Arc::new(RecordingPublisher::default());
        let dispatcher =
            EventDispatcher::new(registry(devices), settings(), Arc::clone(&publisher));
        (dispatcher, publisher)
    }

    fn simple(topic: &str) -> DeviceRule {
        DeviceRule::new(topic, DeviceKind::Simple, "OFF")
    }

    fn sent(topic: &str, payload: &str) -> (String, String) {
        (topic.to_string(), payload.to_string())
    }

    const OCCUPIED: &[u8] = br#"{"occupancy":true}"#;
    const VACANT: &[u8] = br#"{"occupancy":false}"#;

    // ── Occupancy branch ───────────────────────────────────────────

    #[tokio::test]
    async fn should_publish_off_payload_when_cache_never_populated() {
        let (mut dispatcher, publisher) = dispatcher(vec![simple("D")]);

        let report = dispatcher.handle_message("S", OCCUPIED, at(0)).await;

        assert!(report.is_clean());
        assert_eq!(report.occupancy, Some(true));
        assert_eq!(publisher.take(), vec![sent("D/set", "OFF")]);
        assert_eq!(dispatcher.overrides().sleep_until(), Deadline::At(at(10)));
    }

    #[tokio::test]
    async fn should_restore_captured_payload_on_next_occupancy() {
        let (mut dispatcher, publisher) = dispatcher(vec![simple("D")]);
        dispatcher.handle_message("S", OCCUPIED, at(0)).await;
        publisher.take();

        let report = dispatcher.handle_message("D", b"ON_BRIGHT_80", at(20)).await;
        assert!(report.echo_captured);
        assert_eq!(dispatcher.cache().get(&simple("D")), "ON_BRIGHT_80");

        dispatcher.handle_message("S", OCCUPIED, at(21)).await;
        assert_eq!(publisher.take(), vec![sent("D/set", "ON_BRIGHT_80")]);
    }

    #[tokio::test]
    async fn should_restore_every_device_on_repeated_occupancy() {
        let (mut dispatcher, publisher) = dispatcher(vec![simple("D"), simple("E")]);
        dispatcher.handle_message("E", b"E_ON", at(0)).await;

        for t in [100, 200, 300] {
            dispatcher.handle_message("S", OCCUPIED, at(t)).await;
            assert_eq!(
                publisher.take(),
                vec![sent("D/set", "OFF"), sent("E/set", "E_ON")]
            );
        }
    }

    #[tokio::test]
    async fn should_publish_off_payloads_when_vacant_regardless_of_cache() {
        let (mut dispatcher, publisher) = dispatcher(vec![simple("D"), simple("E")]);
        dispatcher.handle_message("D", b"D_ON", at(0)).await;
        dispatcher.handle_message("E", b"E_ON", at(0)).await;

        let report = dispatcher.handle_message("S", VACANT, at(50)).await;

        assert_eq!(report.occupancy, Some(false));
        assert_eq!(publisher.take(), vec![sent("D/set", "OFF"), sent("E/set", "OFF")]);
    }

    #[tokio::test]
    async fn should_report_parse_error_and_keep_state_on_bad_sensor_payload() {
        let (mut dispatcher, publisher) = dispatcher(vec![simple("D")]);

        let report = dispatcher
            .handle_message("S", br#"{"battery":97}"#, at(0))
            .await;

        assert!(matches!(report.errors.as_slice(), [PresenceError::Parse(_)]));
        assert_eq!(report.occupancy, None);
        assert!(publisher.take().is_empty());
        assert_eq!(dispatcher.overrides().sleep_until(), Deadline::Unset);
    }

    #[tokio::test]
    async fn should_skip_untranslatable_device_and_continue_with_others() {
        let rgbww = DeviceRule::new("RGB", DeviceKind::Rgbww, r#"{"state":"OFF"}"#);
        let (mut dispatcher, publisher) = dispatcher(vec![rgbww, simple("D")]);
        dispatcher.handle_message("RGB", b"garbage", at(0)).await;

        let report = dispatcher.handle_message("S", OCCUPIED, at(100)).await;

        assert!(matches!(
            report.errors.as_slice(),
            [PresenceError::Translation(_)]
        ));
        assert_eq!(publisher.take(), vec![sent("D/set", "OFF")]);
    }

    #[tokio::test]
    async fn should_continue_with_other_devices_when_publish_fails() {
        let publisher = Arc::new(RecordingPublisher::failing_on("D/set"));
        let mut dispatcher = EventDispatcher::new(
            registry(vec![simple("D"), simple("E")]),
            settings(),
            Arc::clone(&publisher),
        );

        let report = dispatcher.handle_message("S", VACANT, at(0)).await;

        assert!(matches!(
            report.errors.as_slice(),
            [PresenceError::Transport(_)]
        ));
        assert_eq!(report.published, 1);
        assert_eq!(publisher.take(), vec![sent("E/set", "OFF")]);
    }

    #[tokio::test]
    async fn should_emit_rgbww_restore_sequence_in_order() {
        let rgbww = DeviceRule::new("RGB", DeviceKind::Rgbww, r#"{"state":"OFF"}"#);
        let publisher = Arc::new(RecordingPublisher::default());
        let mut dispatcher = EventDispatcher::new(
            registry(vec![rgbww]),
            DispatcherSettings {
                settle_delay: Duration::from_millis(20),
                ..settings()
            },
            Arc::clone(&publisher),
        );
        dispatcher
            .handle_message("RGB", br#"{"brightness":80,"state":"ON"}"#, at(0))
            .await;

        let started = std::time::Instant::now();
        let report = dispatcher.handle_message("S", OCCUPIED, at(100)).await;

        assert!(started.elapsed() >= Duration::from_millis(20));
        assert_eq!(report.published, 3);
        assert_eq!(
            publisher.take(),
            vec![
                sent("RGB/set", r#"{"brightness":0,"state":"ON"}"#),
                sent("RGB/set", r#"{"brightness":80}"#),
                sent("RGB/set", r#"{"brightness":80}"#),
            ]
        );
    }

    #[tokio::test]
    async fn should_keep_rgbww_off_when_last_report_was_off() {
        let off_report = r#"{"brightness":120,"state":"OFF"}"#;
        let rgbww = DeviceRule::new("RGB", DeviceKind::Rgbww, r#"{"state":"OFF"}"#);
        let (mut dispatcher, publisher) = dispatcher(vec![rgbww]);
        dispatcher
            .handle_message("RGB", off_report.as_bytes(), at(0))
            .await;

        let report = dispatcher.handle_message("S", OCCUPIED, at(100)).await;

        assert_eq!(report.published, 1);
        assert_eq!(publisher.take(), vec![sent("RGB/set", off_report)]);
    }

    // ── Cancel branch ──────────────────────────────────────────────

    #[tokio::test]
    async fn should_suppress_occupancy_during_single_click_window() {
        let (mut dispatcher, publisher) = dispatcher(vec![simple("D")]);

        let report = dispatcher
            .handle_message("B", br#"{"action":"single"}"#, at(0))
            .await;
        assert_eq!(report.cancel_action, Some(CancelAction::Single));
        assert_eq!(dispatcher.overrides().suppress_until(), Deadline::At(at(900)));

        let report = dispatcher.handle_message("S", OCCUPIED, at(500)).await;
        assert!(report.occupancy_suppressed);
        assert!(publisher.take().is_empty());
        assert_eq!(dispatcher.overrides().sleep_until(), Deadline::Unset);

        let report = dispatcher.handle_message("S", OCCUPIED, at(901)).await;
        assert_eq!(report.occupancy, Some(true));
        assert_eq!(publisher.take(), vec![sent("D/set", "OFF")]);
    }

    #[tokio::test]
    async fn should_toggle_indefinite_suppression_with_hold() {
        let (mut dispatcher, publisher) = dispatcher(vec![simple("D")]);
        let hold: &[u8] = br#"{"action":"hold"}"#;

        dispatcher.handle_message("B", hold, at(0)).await;
        assert_eq!(dispatcher.overrides().suppress_until(), Deadline::Indefinite);
        dispatcher.handle_message("S", OCCUPIED, at(100_000)).await;
        assert!(publisher.take().is_empty());

        dispatcher.handle_message("B", hold, at(100_001)).await;
        assert_eq!(
            dispatcher.overrides().suppress_until(),
            Deadline::At(at(100_001))
        );
        dispatcher.handle_message("S", OCCUPIED, at(100_001)).await;
        assert_eq!(publisher.take(), vec![sent("D/set", "OFF")]);
    }

    #[tokio::test]
    async fn should_ignore_unknown_cancel_action() {
        let (mut dispatcher, _publisher) = dispatcher(vec![simple("D")]);
        dispatcher
            .handle_message("B", br#"{"action":"single"}"#, at(0))
            .await;

        let report = dispatcher
            .handle_message("B", br#"{"action":"release"}"#, at(10))
            .await;

        assert!(report.is_clean());
        assert_eq!(report.cancel_action, None);
        assert_eq!(dispatcher.overrides().suppress_until(), Deadline::At(at(900)));
    }

    #[tokio::test]
    async fn should_report_parse_error_on_bad_cancel_payload() {
        let (mut dispatcher, _publisher) = dispatcher(vec![simple("D")]);
        let report = dispatcher
            .handle_message("B", br#"{"action":1}"#, at(0))
            .await;
        assert!(matches!(report.errors.as_slice(), [PresenceError::Parse(_)]));
        assert_eq!(dispatcher.overrides().suppress_until(), Deadline::Unset);
    }

    // ── Echo capture branch ────────────────────────────────────────

    #[tokio::test]
    async fn should_not_capture_echo_inside_sleep_window() {
        let (mut dispatcher, _publisher) = dispatcher(vec![simple("D")]);
        dispatcher.handle_message("D", b"ON_BEFORE", at(0)).await;
        dispatcher.handle_message("S", OCCUPIED, at(100)).await;

        let report = dispatcher.handle_message("D", b"ON_BEFORE", at(105)).await;
        assert!(!report.echo_captured);
        let report = dispatcher.handle_message("D", b"ON_ECHO", at(109)).await;
        assert!(!report.echo_captured);
        assert_eq!(dispatcher.cache().get(&simple("D")), "ON_BEFORE");

        let report = dispatcher.handle_message("D", b"ON_AFTER", at(110)).await;
        assert!(report.echo_captured);
        assert_eq!(dispatcher.cache().get(&simple("D")), "ON_AFTER");
    }

    #[tokio::test]
    async fn should_not_capture_sub_topic_messages() {
        let (mut dispatcher, _publisher) = dispatcher(vec![simple("D")]);
        let report = dispatcher.handle_message("D/set", b"ON", at(0)).await;
        assert!(!report.echo_captured);
        assert!(dispatcher.cache().is_empty());
    }

    #[tokio::test]
    async fn should_run_every_branch_when_topics_overlap() {
        let publisher = Arc::new(RecordingPublisher::default());
        let registry = RuleRegistry::new(
            vec![simple("X")],
            vec![SensorRule::new("X", "occupancy")],
            vec![CancelSwitchRule::new("X", "action")],
        )
        .unwrap();
        let mut dispatcher = EventDispatcher::new(registry, settings(), Arc::clone(&publisher));

        let report = dispatcher
            .handle_message("X", br#"{"occupancy":true,"action":"double"}"#, at(0))
            .await;

        assert_eq!(report.occupancy, Some(true));
        assert_eq!(report.cancel_action, Some(CancelAction::Double));
        // the occupancy branch has just opened the sleep window
        assert!(!report.echo_captured);
        assert_eq!(publisher.take(), vec![sent("X/set", "OFF")]);
    }

    // ── Connection & run loop ──────────────────────────────────────

    #[tokio::test]
    async fn should_seed_cache_and_send_queries_on_connect() {
        let queried = simple("Q").with_query("/get", r#"{"state":""}"#);
        let (mut dispatcher, publisher) = dispatcher(vec![queried, simple("D")]);

        let report = dispatcher.on_connect().await;

        assert_eq!(report.published, 1);
        assert_eq!(dispatcher.cache().len(), 2);
        assert_eq!(publisher.take(), vec![sent("Q/get", r#"{"state":""}"#)]);
    }

    #[tokio::test]
    async fn should_process_channel_in_order_and_return_on_close() {
        let (dispatcher, publisher) = dispatcher(vec![simple("D")]);
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(dispatcher.run(rx));

        tx.send(Inbound::Connected).await.unwrap();
        tx.send(Inbound::Message(InboundMessage::new("D", "ON", at(0))))
            .await
            .unwrap();
        tx.send(Inbound::Message(InboundMessage::new("S", OCCUPIED, at(1))))
            .await
            .unwrap();
        drop(tx);

        let dispatcher = handle.await.unwrap();
        assert_eq!(dispatcher.cache().get(&simple("D")), "ON");
        assert_eq!(publisher.take(), vec![sent("D/set", "ON")]);
    }
}
