//! Shared fixtures for the integration tests.

use diagnostic_bus::{LogBackend, LogRecord, Payload, Sink};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Records every delivery.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<(String, Option<Payload>)>>,
    completions: AtomicUsize,
}

impl CollectingSink {
    pub fn names(&self) -> Vec<String> {
        self.events.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn payloads(&self) -> Vec<Option<Payload>> {
        self.events.lock().iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }
}

impl Sink for CollectingSink {
    fn on_next(&self, event_name: &str, payload: Option<&Payload>) {
        self.events
            .lock()
            .push((event_name.to_string(), payload.cloned()));
    }

    fn on_completed(&self) {
        self.completions.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "collecting"
    }
}

/// Log backend that keeps the records instead of emitting them.
#[derive(Default)]
pub struct CapturedLogs {
    records: Mutex<Vec<LogRecord>>,
}

impl CapturedLogs {
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }
}

impl LogBackend for CapturedLogs {
    fn emit(&self, record: &LogRecord) {
        self.records.lock().push(record.clone());
    }
}
