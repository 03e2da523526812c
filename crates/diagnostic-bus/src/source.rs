//! # Event Source
//!
//! A named channel producers write diagnostic events to. Producers ask
//! [`EventSource::is_enabled`] before building anything; the answer comes from
//! the current subscribers, so a source nobody listens to costs one atomic load.
//!
//! ## Fan-out
//!
//! ```text
//! write(name, payload)
//!     │
//!     ├── snapshot subscribers (short read lock, then released)
//!     │
//!     └── for each subscriber accepting `name`, in subscription order:
//!            sink.on_next(name, payload)   ← on the producer's thread
//!            panic caught → logged, next sink
//! ```
//!
//! The subscriber list is copy-on-write. A subscription disposed while a write
//! is in flight may still receive that one event, never more.

use crate::envelope::Payload;
use crate::error::BusError;
use crate::metrics;
use crate::registry::RegistryInner;
use crate::sink::Sink;
use parking_lot::RwLock;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Predicate deciding which event names a subscriber is interested in.
pub type EventFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Clone)]
struct Subscriber {
    id: u64,
    sink: Arc<dyn Sink>,
    filter: Option<EventFilter>,
}

impl Subscriber {
    fn accepts(&self, event_name: &str) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event_name))
    }
}

pub(crate) struct SourceInner {
    name: String,
    capture_stack_traces: bool,
    subscribers: RwLock<Arc<[Subscriber]>>,
    subscriber_count: AtomicUsize,
    next_id: AtomicU64,
    registry: Weak<RegistryInner>,
}

impl SourceInner {
    fn snapshot(&self) -> Arc<[Subscriber]> {
        self.subscribers.read().clone()
    }

    fn add(&self, subscriber: Subscriber) {
        let mut guard = self.subscribers.write();
        let mut next = guard.to_vec();
        next.push(subscriber);
        self.subscriber_count.store(next.len(), Ordering::Release);
        *guard = next.into();
    }

    fn remove(&self, id: u64) -> bool {
        let mut guard = self.subscribers.write();
        if !guard.iter().any(|s| s.id == id) {
            return false;
        }
        let next: Vec<Subscriber> = guard.iter().filter(|s| s.id != id).cloned().collect();
        self.subscriber_count.store(next.len(), Ordering::Release);
        *guard = next.into();
        true
    }
}

/// Named, independently enable-checkable publish channel.
///
/// Cheap to clone; clones share subscribers. Obtain sources from a
/// [`SourceRegistry`](crate::SourceRegistry) so observers can discover them.
#[derive(Clone)]
pub struct EventSource {
    inner: Arc<SourceInner>,
}

impl EventSource {
    pub(crate) fn new(
        name: impl Into<String>,
        capture_stack_traces: bool,
        registry: Weak<RegistryInner>,
    ) -> Self {
        Self {
            inner: Arc::new(SourceInner {
                name: name.into(),
                capture_stack_traces,
                subscribers: RwLock::new(Arc::from(Vec::new())),
                subscriber_count: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
                registry,
            }),
        }
    }

    /// Create a source that is not registered anywhere.
    ///
    /// Observers never see detached sources; subscribe to them directly.
    pub fn detached(name: impl Into<String>) -> Self {
        Self::new(name, false, Weak::new())
    }

    /// Source name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether envelopes built for this source capture the call stack.
    pub fn captures_stack_traces(&self) -> bool {
        self.inner.capture_stack_traces
    }

    /// Whether any current subscriber wants events called `event_name`.
    pub fn is_enabled(&self, event_name: &str) -> bool {
        if self.inner.subscriber_count.load(Ordering::Acquire) == 0 {
            return false;
        }
        self.inner.snapshot().iter().any(|s| s.accepts(event_name))
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count.load(Ordering::Acquire)
    }

    /// Deliver `payload` to every subscriber accepting `event_name`.
    ///
    /// Runs synchronously on the caller's thread. Returns the number of sinks
    /// that handled the event without panicking.
    pub fn write(&self, event_name: &str, payload: Option<Payload>) -> usize {
        let subscribers = self.inner.snapshot();
        let mut delivered = 0;

        for subscriber in subscribers.iter().filter(|s| s.accepts(event_name)) {
            let sink = &subscriber.sink;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                sink.on_next(event_name, payload.as_ref());
            }));

            match outcome {
                Ok(()) => delivered += 1,
                Err(_) => {
                    let error = BusError::SinkPanicked {
                        sink: sink.name().to_string(),
                        event_name: event_name.to_string(),
                    };
                    warn!(source = %self.inner.name, error = %error, "Sink panic isolated");
                    metrics::record_sink_panic();
                }
            }
        }

        metrics::record_write(delivered);
        delivered
    }

    /// Subscribe `sink` to every event of this source.
    pub fn subscribe(&self, sink: Arc<dyn Sink>) -> Subscription {
        self.add_subscriber(sink, None)
    }

    /// Subscribe `sink` to events whose name satisfies `filter`.
    pub fn subscribe_filtered<F>(&self, sink: Arc<dyn Sink>, filter: F) -> Subscription
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.add_subscriber(sink, Some(Arc::new(filter)))
    }

    fn add_subscriber(&self, sink: Arc<dyn Sink>, filter: Option<EventFilter>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let sink_name = sink.name();
        self.inner.add(Subscriber { id, sink, filter });
        metrics::record_subscribed();

        debug!(source = %self.inner.name, sink = sink_name, id, "Sink subscribed");

        Subscription {
            source: Arc::downgrade(&self.inner),
            source_name: self.inner.name.clone(),
            id,
            disposed: AtomicBool::new(false),
        }
    }

    /// Forward a stream error to every current subscriber.
    pub fn report_error(&self, error: &BusError) {
        for subscriber in self.inner.snapshot().iter() {
            let _ = panic::catch_unwind(AssertUnwindSafe(|| subscriber.sink.on_error(error)));
        }
    }

    /// Deregister from the owning registry and signal completion to sinks.
    ///
    /// Existing subscriptions stay live; observers attaching later no longer
    /// see this source.
    pub fn dispose(&self) {
        if let Some(registry) = self.inner.registry.upgrade() {
            registry.deregister(self);
        }
        self.complete();
    }

    pub(crate) fn complete(&self) {
        for subscriber in self.inner.snapshot().iter() {
            let _ = panic::catch_unwind(AssertUnwindSafe(|| subscriber.sink.on_completed()));
        }
        debug!(source = %self.inner.name, "Event source disposed");
    }

    pub(crate) fn same_source(&self, other: &EventSource) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("name", &self.inner.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle binding one sink to one source.
///
/// Disposing (or dropping) removes exactly this sink from exactly this
/// source. Disposing twice is a no-op.
#[must_use = "dropping a Subscription unsubscribes the sink"]
pub struct Subscription {
    source: Weak<SourceInner>,
    source_name: String,
    id: u64,
    disposed: AtomicBool,
}

impl Subscription {
    /// Name of the source this subscription belongs to.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Not disposed, and the source still exists.
    pub fn is_live(&self) -> bool {
        !self.is_disposed() && self.source.strong_count() > 0
    }

    /// Remove the sink from the source.
    ///
    /// Returns `true` for the call that released the handle, `false` if it
    /// was already disposed. A handle whose source is gone is released too.
    pub fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        metrics::record_unsubscribed();

        if let Some(source) = self.source.upgrade() {
            if source.remove(self.id) {
                debug!(source = %self.source_name, id = self.id, "Sink unsubscribed");
            }
        }
        true
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("source", &self.source_name)
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
