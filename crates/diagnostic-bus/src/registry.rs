//! # Source Registry
//!
//! Every [`EventSource`] created through a registry becomes discoverable by
//! name, and every attached [`SourceObserver`] is told about it exactly once.
//!
//! ```text
//! get_or_create("DbQueries")
//!     │
//!     ├── existing? ──→ return it (no announcement)
//!     │
//!     └── new ──→ insert ──→ snapshot observers ──→ on_source(source) for each
//! ```
//!
//! ## Locking
//!
//! The sources lock is always taken before the observers lock. New sources
//! snapshot the observer list while still holding the sources write lock, and
//! [`SourceRegistry::attach_and_replay`] registers the observer while holding
//! the sources read lock, so a source racing a replaying attach is announced
//! to it once, not twice. Observer callbacks run with no lock held.

use crate::config::SourceConfig;
use crate::error::{BusError, BusResult};
use crate::metrics;
use crate::source::EventSource;
use lazy_static::lazy_static;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

lazy_static! {
    static ref GLOBAL: SourceRegistry = SourceRegistry::with_config(SourceConfig::from_env());
}

/// Receives "source created" notifications from a [`SourceRegistry`].
pub trait SourceObserver: Send + Sync {
    /// A source was created (or replayed on attach).
    fn on_source(&self, source: &EventSource);

    /// An error was signalled on the notification stream.
    fn on_error(&self, _error: &BusError) {}

    /// The registry shut down; no further notifications follow.
    fn on_completed(&self) {}
}

type ObserverEntry = (u64, Arc<dyn SourceObserver>);

pub(crate) struct RegistryInner {
    config: RwLock<SourceConfig>,
    sources: RwLock<HashMap<String, EventSource>>,
    observers: RwLock<Vec<ObserverEntry>>,
    next_observer_id: AtomicU64,
    shut_down: AtomicBool,
}

impl RegistryInner {
    pub(crate) fn deregister(&self, source: &EventSource) {
        let mut sources = self.sources.write();
        let matches = sources
            .get(source.name())
            .is_some_and(|existing| existing.same_source(source));
        if matches {
            sources.remove(source.name());
            debug!(source = source.name(), "Event source deregistered");
        }
    }

    fn detach(&self, id: u64) -> Option<Arc<dyn SourceObserver>> {
        let mut observers = self.observers.write();
        let index = observers.iter().position(|(entry_id, _)| *entry_id == id)?;
        Some(observers.remove(index).1)
    }

    fn observer_snapshot(&self) -> Vec<Arc<dyn SourceObserver>> {
        self.observers
            .read()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect()
    }
}

/// Process-scoped name → source map plus "source created" notifications.
///
/// Cheap to clone; clones share state. Use [`SourceRegistry::global`] for the
/// process-wide instance or [`SourceRegistry::new`] for an injected one.
#[derive(Clone)]
pub struct SourceRegistry {
    inner: Arc<RegistryInner>,
}

impl SourceRegistry {
    /// Create an empty registry with default source settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SourceConfig::default())
    }

    /// Create an empty registry whose sources use `config`.
    #[must_use]
    pub fn with_config(config: SourceConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                config: RwLock::new(config),
                sources: RwLock::new(HashMap::new()),
                observers: RwLock::new(Vec::new()),
                next_observer_id: AtomicU64::new(1),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// The process-wide registry, configured from the environment.
    pub fn global() -> &'static SourceRegistry {
        &GLOBAL
    }

    /// Settings applied to sources created by this registry.
    pub fn config(&self) -> SourceConfig {
        self.inner.config.read().clone()
    }

    /// Replace the settings for sources created from now on.
    ///
    /// Sources that already exist keep the settings they were created with.
    pub fn configure(&self, config: SourceConfig) {
        debug!(
            capture_stack_traces = config.capture_stack_traces,
            "Source registry reconfigured"
        );
        *self.inner.config.write() = config;
    }

    /// Return the source called `name`, creating and announcing it if needed.
    pub fn get_or_create(&self, name: &str) -> BusResult<EventSource> {
        if name.is_empty() {
            return Err(BusError::EmptySourceName);
        }

        if let Some(existing) = self.inner.sources.read().get(name) {
            return Ok(existing.clone());
        }

        let (source, observers) = {
            let mut sources = self.inner.sources.write();
            if let Some(existing) = sources.get(name) {
                return Ok(existing.clone());
            }

            let source = EventSource::new(
                name,
                self.inner.config.read().capture_stack_traces,
                Arc::downgrade(&self.inner),
            );
            sources.insert(name.to_string(), source.clone());

            let observers = if self.is_shut_down() {
                Vec::new()
            } else {
                self.inner.observer_snapshot()
            };
            (source, observers)
        };

        metrics::record_source_created();
        debug!(source = name, observers = observers.len(), "Event source created");

        for observer in observers {
            announce(observer.as_ref(), &source);
        }

        Ok(source)
    }

    /// Look up a registered source.
    pub fn get(&self, name: &str) -> Option<EventSource> {
        self.inner.sources.read().get(name).cloned()
    }

    /// All registered sources, in no particular order.
    pub fn sources(&self) -> Vec<EventSource> {
        self.inner.sources.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.sources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sources.read().is_empty()
    }

    /// Deregister the source called `name`.
    ///
    /// Subscriptions already issued keep working. Returns whether a source
    /// was registered under that name.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.inner.sources.write().remove(name).is_some();
        if removed {
            debug!(source = name, "Event source deregistered");
        }
        removed
    }

    /// Observe sources created from now on.
    pub fn attach(&self, observer: Arc<dyn SourceObserver>) -> RegistryAttachment {
        self.attach_inner(observer, false)
    }

    /// Observe sources created from now on, and announce existing ones once.
    pub fn attach_and_replay(&self, observer: Arc<dyn SourceObserver>) -> RegistryAttachment {
        self.attach_inner(observer, true)
    }

    fn attach_inner(&self, observer: Arc<dyn SourceObserver>, replay: bool) -> RegistryAttachment {
        let id = self.inner.next_observer_id.fetch_add(1, Ordering::Relaxed);
        let existing: Option<Vec<EventSource>> = {
            let sources = self.inner.sources.read();
            let mut observers = self.inner.observers.write();
            // Checked under the observers lock so shutdown cannot miss us.
            if self.is_shut_down() {
                None
            } else {
                observers.push((id, observer.clone()));
                Some(if replay {
                    sources.values().cloned().collect()
                } else {
                    Vec::new()
                })
            }
        };

        let Some(existing) = existing else {
            observer.on_completed();
            return RegistryAttachment::detached();
        };

        debug!(id, replayed = existing.len(), "Source observer attached");

        for source in &existing {
            announce(observer.as_ref(), source);
        }

        RegistryAttachment {
            registry: Arc::downgrade(&self.inner),
            id,
            detached: AtomicBool::new(false),
        }
    }

    /// Number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.read().len()
    }

    /// Signal an error on the notification stream to every observer.
    pub fn report_error(&self, error: &BusError) {
        for observer in self.inner.observer_snapshot() {
            let _ = panic::catch_unwind(AssertUnwindSafe(|| observer.on_error(error)));
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    /// Tear the bus down.
    ///
    /// Completes and detaches every observer, then deregisters every source
    /// and signals completion to its sinks. Idempotent. Sources requested
    /// afterwards are still handed out but never announced.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let observers: Vec<ObserverEntry> = self.inner.observers.write().drain(..).collect();
        let sources: Vec<EventSource> = self.inner.sources.write().drain().map(|(_, s)| s).collect();

        for (_, observer) in &observers {
            if panic::catch_unwind(AssertUnwindSafe(|| observer.on_completed())).is_err() {
                warn!("Source observer panicked during completion");
            }
        }
        for source in &sources {
            source.complete();
        }

        info!(
            observers = observers.len(),
            sources = sources.len(),
            "Diagnostic source registry shut down"
        );
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.len())
            .field("observers", &self.observer_count())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

fn announce(observer: &dyn SourceObserver, source: &EventSource) {
    if panic::catch_unwind(AssertUnwindSafe(|| observer.on_source(source))).is_err() {
        warn!(source = source.name(), "Source observer panicked on announcement");
    }
}

/// Handle for an observer attached to a registry.
///
/// Disposing (or dropping) stops further announcements to the observer. It
/// does not touch subscriptions the observer already made.
#[must_use = "dropping a RegistryAttachment detaches the observer"]
pub struct RegistryAttachment {
    registry: Weak<RegistryInner>,
    id: u64,
    detached: AtomicBool,
}

impl RegistryAttachment {
    fn detached() -> Self {
        Self {
            registry: Weak::new(),
            id: 0,
            detached: AtomicBool::new(true),
        }
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Stop receiving announcements.
    pub fn dispose(&self) {
        if self.detached.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            if registry.detach(self.id).is_some() {
                debug!(id = self.id, "Source observer detached");
            }
        }
    }
}

impl Drop for RegistryAttachment {
    fn drop(&mut self) {
        self.dispose();
    }
}
