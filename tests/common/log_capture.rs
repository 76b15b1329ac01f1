//! Capture `tracing` events for assertions.
//!
//! The subscriber is installed as the thread default, so only events
//! emitted on the test thread are seen. Events from the reporter's worker
//! thread are not captured.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};
use tracing_subscriber::layer::SubscriberExt;

/// Captured events; capture stops when dropped.
pub struct TestLogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
    _guard: tracing::subscriber::DefaultGuard,
}

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: tracing::Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl TestLogCapture {
    pub fn start() -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(CaptureLayer {
            events: Arc::clone(&events),
        });
        let guard = tracing::subscriber::set_default(subscriber);
        Self {
            events,
            _guard: guard,
        }
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn assert_logged_at_level(&self, level: tracing::Level, needle: &str) {
        let events = self.events();
        assert!(
            events
                .iter()
                .any(|e| e.level == level && e.message.contains(needle)),
            "expected {level} event containing '{needle}', got {:#?}",
            events.iter().map(|e| (&e.level, &e.message)).collect::<Vec<_>>()
        );
    }

    pub fn assert_field_logged(&self, name: &str, value: &str) {
        let events = self.events();
        assert!(
            events
                .iter()
                .flat_map(|e| &e.fields)
                .any(|(k, v)| k == name && v.contains(value)),
            "expected field {name}={value}"
        );
    }

    /// No captured message or field contains `needle`.
    pub fn assert_never_contains(&self, needle: &str) {
        for event in self.events() {
            assert!(
                !event.message.contains(needle),
                "'{needle}' leaked into log message: {}",
                event.message
            );
            for (name, value) in &event.fields {
                assert!(!value.contains(needle), "'{needle}' leaked into field {name}");
            }
        }
    }
}

struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CaptureLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CapturedEvent {
                level: *event.metadata().level(),
                target: event.metadata().target().to_string(),
                message: visitor.message,
                fields: visitor.fields,
            });
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.record_str(field, &format!("{value:?}"));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }
}
