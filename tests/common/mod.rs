//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use rule_to_action::recording::RecordingApi;
use rule_to_action::{Event, RuleToAction};
use serde_json::Value;

/// A complete post-login event as the host sends it.
pub fn event_json() -> Value {
    serde_json::from_str(include_str!("event.json")).expect("fixture is valid JSON")
}

/// Parses the fixture after letting the test adjust the raw JSON.
pub fn event_with(adjust: impl FnOnce(&mut Value)) -> Event {
    let mut value = event_json();
    adjust(&mut value);
    Event::from_value(value).expect("fixture matches the event shape")
}

/// The unmodified fixture.
pub fn event() -> Event {
    event_with(|_| {})
}

/// A recorder and a converter replaying onto it.
pub fn converter() -> (Arc<RecordingApi>, RuleToAction) {
    let api = Arc::new(RecordingApi::new());
    let converter = RuleToAction::new(api.clone());
    (api, converter)
}

/// Installs a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
