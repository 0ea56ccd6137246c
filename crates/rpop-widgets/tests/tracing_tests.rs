#![forbid(unsafe_code)]

//! Log output of the popup controller.
//!
//! Captures `tracing` events emitted while driving a popup and checks the
//! levels and structured fields hosts rely on for diagnostics.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rpop_core::{Event, KeyCode};
use rpop_runtime::{FnSink, MemoryFlagStore, PopupConfig, SinkError};
use rpop_widgets::{HeadlessSurface, ReviewPopup};
use tracing_subscriber::layer::SubscriberExt;

// ============================================================================
// Test Infrastructure
// ============================================================================

/// One captured log event.
#[derive(Debug, Clone)]
struct CapturedEvent {
    level: tracing::Level,
    target: String,
    fields: HashMap<String, String>,
}

impl CapturedEvent {
    fn message(&self) -> &str {
        self.fields.get("message").map_or("", String::as_str)
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// A tracing Layer that records every event.
struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

/// Visitor that extracts event fields.
struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCapture {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            fields: visitor.0.into_iter().collect(),
        });
    }
}

/// Run `f` with a capturing subscriber installed and return what it logged.
fn capture(f: impl FnOnce()) -> Vec<CapturedEvent> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(EventCapture {
        events: Arc::clone(&events),
    });
    tracing::subscriber::with_default(subscriber, f);
    events.lock().unwrap().clone()
}

fn popup() -> ReviewPopup<HeadlessSurface> {
    ReviewPopup::new(
        PopupConfig::default(),
        HeadlessSurface::new(),
        MemoryFlagStore::new(),
        MemoryFlagStore::new(),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn rejected_variant_is_a_warning() {
    let events = capture(|| {
        let mut popup = popup();
        assert!(popup.set_variant("C").is_err());
    });

    let warning = events
        .iter()
        .find(|e| e.level == tracing::Level::WARN)
        .expect("warning logged");
    assert_eq!(warning.message(), "rejected popup variant");
    assert_eq!(warning.field("requested"), Some("C"));
    assert_eq!(warning.field("current"), Some("B"));
}

#[test]
fn gate_decisions_log_their_reason() {
    let events = capture(|| {
        let mut popup = popup();
        popup.show();
        popup.show();
    });

    let reasons: Vec<_> = events
        .iter()
        .filter(|e| e.message() == "popup not shown")
        .filter_map(|e| e.field("reason"))
        .collect();
    assert_eq!(reasons, ["shown-this-session"]);
}

#[test]
fn default_sink_logs_events_under_dedicated_target() {
    let events = capture(|| {
        let mut popup = popup();
        popup.show();
        popup.handle_event(&Event::key(KeyCode::Escape));
        popup.advance(Duration::from_millis(400));
    });

    let tracked: Vec<_> = events
        .iter()
        .filter(|e| e.target == "rpop::events")
        .filter_map(|e| e.field("event"))
        .collect();
    assert_eq!(tracked, ["popup_shown", "popup_dismissed"]);
    assert!(
        events
            .iter()
            .any(|e| e.message() == "review popup torn down" && e.level == tracing::Level::DEBUG)
    );
}

#[test]
fn sink_failure_is_logged_not_raised() {
    let events = capture(|| {
        let mut popup = popup().with_sink(FnSink::new(|_| {
            Err(SinkError::Rejected("quota".into()))
        }));
        assert!(popup.show());
    });

    let failure = events
        .iter()
        .find(|e| e.message() == "failed to deliver popup event")
        .expect("delivery failure logged");
    assert_eq!(failure.level, tracing::Level::WARN);
    assert_eq!(failure.field("event"), Some("popup_shown"));
}

#[test]
fn construction_logs_initial_variant() {
    let events = capture(|| {
        let _popup = ReviewPopup::new(
            PopupConfig::default().variant(rpop_core::Variant::A),
            HeadlessSurface::new(),
            MemoryFlagStore::new(),
            MemoryFlagStore::new(),
        );
    });

    let init = events
        .iter()
        .find(|e| e.message() == "review popup initialized")
        .expect("initialization logged");
    assert_eq!(init.level, tracing::Level::DEBUG);
    assert_eq!(init.field("variant"), Some("A"));
}
