#![forbid(unsafe_code)]

//! Analytics event tracking.
//!
//! Every observable popup transition is reported once through
//! [`EventTracker::track`], which stamps the event with an ISO-8601 UTC
//! timestamp and the active copy variant before handing it to an
//! [`EventSink`].
//!
//! Delivery is fire-and-forget: a sink error is logged and counted, never
//! returned to the caller, so analytics can never stall a UI transition.
//!
//! # Payload shape
//!
//! ```json
//! {
//!   "event": "popup_dismissed",
//!   "timestamp": "2025-01-01T12:00:00.000Z",
//!   "variant": "B",
//!   "dismissMethod": "maybe-later"
//! }
//! ```
//!
//! Extra data is merged after the standard fields, so a caller-supplied key
//! with the same name replaces the standard value.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use rpop_core::Variant;
use serde_json::{Map, Value};

/// Names of the events the popup emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    /// The popup was rendered.
    PopupShown,
    /// The popup began closing; carries `dismissMethod`.
    PopupDismissed,
    /// The user asked never to see the popup again.
    PermanentDismiss,
    /// The review link was activated.
    ReviewClicked,
}

impl EventName {
    /// Wire name of the event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PopupShown => "popup_shown",
            Self::PopupDismissed => "popup_dismissed",
            Self::PermanentDismiss => "permanent_dismiss",
            Self::ReviewClicked => "review_clicked",
        }
    }

    /// Marker attribute set on the host surface when the event fires
    /// (`popup_shown` → `data-popup-popup-shown`).
    #[must_use]
    pub fn marker_attribute(self) -> String {
        format!("data-popup-{}", self.as_str().replace('_', "-"))
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked event, as delivered to sinks.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEvent {
    /// Which event fired.
    pub name: EventName,
    /// ISO-8601 UTC timestamp with millisecond precision.
    pub timestamp: String,
    /// Copy variant active when the event fired.
    pub variant: Variant,
    /// Event-specific fields.
    pub data: Map<String, Value>,
}

impl TrackedEvent {
    /// Flatten into the JSON payload shape.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("event".into(), Value::from(self.name.as_str()));
        payload.insert("timestamp".into(), Value::from(self.timestamp.clone()));
        payload.insert("variant".into(), Value::from(self.variant.as_str()));
        for (key, value) in &self.data {
            payload.insert(key.clone(), value.clone());
        }
        Value::Object(payload)
    }

    /// Look up an event-specific field as a string.
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sinks
// ─────────────────────────────────────────────────────────────────────────────

/// Error reported by a sink that could not accept an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The sink is not currently able to deliver anything.
    Unavailable(String),
    /// The sink refused this particular event.
    Rejected(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "sink unavailable: {msg}"),
            Self::Rejected(msg) => write!(f, "event rejected: {msg}"),
        }
    }
}

impl std::error::Error for SinkError {}

/// Destination for tracked events.
pub trait EventSink {
    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "sink"
    }

    /// Deliver one event.
    fn emit(&self, event: &TrackedEvent) -> Result<(), SinkError>;
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn emit(&self, event: &TrackedEvent) -> Result<(), SinkError> {
        (**self).emit(event)
    }
}

impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn emit(&self, event: &TrackedEvent) -> Result<(), SinkError> {
        (**self).emit(event)
    }
}

/// Sink that writes each event as a structured `tracing` record.
///
/// Records use the `rpop::events` target at INFO level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn name(&self) -> &str {
        "LogSink"
    }

    fn emit(&self, event: &TrackedEvent) -> Result<(), SinkError> {
        tracing::info!(
            target: "rpop::events",
            event = event.name.as_str(),
            variant = event.variant.as_str(),
            timestamp = %event.timestamp,
            payload = %event.to_json(),
            "popup event"
        );
        Ok(())
    }
}

/// Sink that records events in memory.
///
/// Clones share the same buffer, so a host or test can keep one handle and
/// give another to the controller.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<TrackedEvent>>>,
}

impl MemorySink {
    /// Create an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded event, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<TrackedEvent> {
        self.events.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Names of every recorded event, oldest first.
    #[must_use]
    pub fn names(&self) -> Vec<EventName> {
        self.events
            .lock()
            .map(|g| g.iter().map(|e| e.name).collect())
            .unwrap_or_default()
    }

    /// How many times `name` was recorded.
    #[must_use]
    pub fn count(&self, name: EventName) -> usize {
        self.events
            .lock()
            .map(|g| g.iter().filter(|e| e.name == name).count())
            .unwrap_or(0)
    }

    /// Drop every recorded event.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.events.lock() {
            guard.clear();
        }
    }
}

impl EventSink for MemorySink {
    fn name(&self) -> &str {
        "MemorySink"
    }

    fn emit(&self, event: &TrackedEvent) -> Result<(), SinkError> {
        let mut guard = self
            .events
            .lock()
            .map_err(|_| SinkError::Unavailable("lock poisoned".into()))?;
        guard.push(event.clone());
        Ok(())
    }
}

/// Sink adapter for a closure.
pub struct FnSink<F>(pub F);

impl<F> FnSink<F>
where
    F: Fn(&TrackedEvent) -> Result<(), SinkError>,
{
    /// Wrap `f` as a sink.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventSink for FnSink<F>
where
    F: Fn(&TrackedEvent) -> Result<(), SinkError>,
{
    fn name(&self) -> &str {
        "FnSink"
    }

    fn emit(&self, event: &TrackedEvent) -> Result<(), SinkError> {
        (self.0)(event)
    }
}

impl<F> fmt::Debug for FnSink<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnSink")
    }
}

/// Sink that forwards every event to several sinks.
///
/// Every sink sees every event; the first error is reported after all
/// sinks have been tried.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutSink {
    /// Create a fan-out with no sinks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    #[must_use]
    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Number of attached sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no sinks are attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn name(&self) -> &str {
        "FanoutSink"
    }

    fn emit(&self, event: &TrackedEvent) -> Result<(), SinkError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(err) = sink.emit(event) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sinks", &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tracker
// ─────────────────────────────────────────────────────────────────────────────

/// Stamps events and delivers them to a sink.
pub struct EventTracker {
    sink: Box<dyn EventSink>,
    delivered: u64,
    failed: u64,
}

impl EventTracker {
    /// Create a tracker delivering to `sink`.
    #[must_use]
    pub fn new(sink: impl EventSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            delivered: 0,
            failed: 0,
        }
    }

    /// Track one event.
    ///
    /// Returns the event as built, whether or not the sink accepted it.
    pub fn track(
        &mut self,
        name: EventName,
        variant: Variant,
        data: Map<String, Value>,
    ) -> TrackedEvent {
        let event = TrackedEvent {
            name,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            variant,
            data,
        };
        match self.sink.emit(&event) {
            Ok(()) => self.delivered += 1,
            Err(err) => {
                self.failed += 1;
                tracing::warn!(
                    sink = self.sink.name(),
                    event = name.as_str(),
                    error = %err,
                    "failed to deliver popup event"
                );
            }
        }
        event
    }

    /// Events the sink accepted.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Events the sink rejected.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed
    }
}

impl Default for EventTracker {
    fn default() -> Self {
        Self::new(LogSink)
    }
}

impl fmt::Debug for EventTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTracker")
            .field("sink", &self.sink.name())
            .field("delivered", &self.delivered)
            .field("failed", &self.failed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn data(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), Value::from(*v)))
            .collect()
    }

    #[test]
    fn marker_attribute_dashes() {
        assert_eq!(
            EventName::PopupShown.marker_attribute(),
            "data-popup-popup-shown"
        );
        assert_eq!(
            EventName::PermanentDismiss.marker_attribute(),
            "data-popup-permanent-dismiss"
        );
    }

    #[test]
    fn track_stamps_variant_and_timestamp() {
        let sink = MemorySink::new();
        let mut tracker = EventTracker::new(sink.clone());
        let event = tracker.track(
            EventName::PopupDismissed,
            Variant::A,
            data(&[("dismissMethod", "close-x")]),
        );

        assert_eq!(event.variant, Variant::A);
        assert!(event.timestamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&event.timestamp).is_ok());
        assert_eq!(event.data_str("dismissMethod"), Some("close-x"));
        assert_eq!(sink.events(), vec![event]);
        assert_eq!(tracker.delivered(), 1);
    }

    #[test]
    fn payload_flattens_extra_data() {
        let event = TrackedEvent {
            name: EventName::PopupDismissed,
            timestamp: "2025-01-01T00:00:00.000Z".into(),
            variant: Variant::B,
            data: data(&[("dismissMethod", "escape-key")]),
        };
        assert_eq!(
            event.to_json(),
            json!({
                "event": "popup_dismissed",
                "timestamp": "2025-01-01T00:00:00.000Z",
                "variant": "B",
                "dismissMethod": "escape-key",
            })
        );
    }

    #[test]
    fn failing_sink_is_swallowed() {
        let mut tracker =
            EventTracker::new(FnSink::new(|_| Err(SinkError::Rejected("offline".into()))));
        let event = tracker.track(EventName::ReviewClicked, Variant::B, Map::new());
        assert_eq!(event.name, EventName::ReviewClicked);
        assert_eq!(tracker.delivered(), 0);
        assert_eq!(tracker.failed(), 1);
    }

    #[test]
    fn fanout_reaches_every_sink_despite_errors() {
        let first = MemorySink::new();
        let second = MemorySink::new();
        let fanout = FanoutSink::new()
            .with(first.clone())
            .with(FnSink::new(|_| Err(SinkError::Unavailable("down".into()))))
            .with(second.clone());
        assert_eq!(fanout.len(), 3);

        let mut tracker = EventTracker::new(fanout);
        tracker.track(EventName::PopupShown, Variant::B, Map::new());

        assert_eq!(first.count(EventName::PopupShown), 1);
        assert_eq!(second.count(EventName::PopupShown), 1);
        assert_eq!(tracker.failed(), 1);
    }

    #[test]
    fn memory_sink_clear() {
        let sink = MemorySink::new();
        let mut tracker = EventTracker::new(sink.clone());
        tracker.track(EventName::PopupShown, Variant::B, Map::new());
        sink.clear();
        assert!(sink.names().is_empty());
    }

    #[test]
    fn log_sink_accepts() {
        let mut tracker = EventTracker::default();
        tracker.track(EventName::PopupShown, Variant::B, Map::new());
        assert_eq!(tracker.delivered(), 1);
    }
}
