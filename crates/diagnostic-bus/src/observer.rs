//! # Subscription Observer
//!
//! Watches a [`SourceRegistry`] for new sources and subscribes one sink to
//! every source whose name is on its allow-list.
//!
//! ```text
//!              set_enabled(true)
//! [DISABLED] ────────────────────→ [ENABLED]
//!     │       ←────────────────────    │
//!     │        set_enabled(false)      │ on_source(s) where s.name ∈ allow-list
//!     │                                │   → subscribe sink, record handle
//!     │                                │
//!     └──────────── on_completed ──────┴──→ [COMPLETED]
//!                                           all handles disposed, list empty,
//!                                           later notifications ignored
//! ```
//!
//! Disabling only suppresses new subscriptions. Tearing down requires
//! [`SubscriptionObserver::on_completed`] (called by
//! [`SourceRegistry::shutdown`]).

use crate::config::ObserverConfig;
use crate::error::BusError;
use crate::registry::{RegistryAttachment, SourceObserver, SourceRegistry};
use crate::sink::Sink;
use crate::source::{EventSource, Subscription};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct ObserverState {
    completed: bool,
    subscriptions: Vec<Subscription>,
}

/// Subscribes a sink to allow-listed sources as they appear.
pub struct SubscriptionObserver {
    sink: Arc<dyn Sink>,
    allow_list: Vec<String>,
    enabled: AtomicBool,
    state: Mutex<ObserverState>,
}

impl SubscriptionObserver {
    /// Create a disabled observer for `allow_list`. Duplicate names are dropped.
    pub fn new<I, S>(sink: Arc<dyn Sink>, allow_list: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = Vec::new();
        for name in allow_list {
            let name = name.into();
            if !names.contains(&name) {
                names.push(name);
            }
        }

        Self {
            sink,
            allow_list: names,
            enabled: AtomicBool::new(false),
            state: Mutex::new(ObserverState::default()),
        }
    }

    /// Create an observer from config; enabled state comes from `config`.
    pub fn from_config(sink: Arc<dyn Sink>, config: &ObserverConfig) -> Self {
        let observer = Self::new(sink, config.listen_to.iter().cloned());
        observer.set_enabled(config.enabled);
        observer
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Toggle processing of new sources. Existing subscriptions are kept.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Source names this observer subscribes to.
    pub fn should_listen_to(&self) -> &[String] {
        &self.allow_list
    }

    /// Number of live subscriptions held.
    ///
    /// Handles whose source has been dropped are not counted.
    pub fn active_subscriptions(&self) -> usize {
        self.state
            .lock()
            .subscriptions
            .iter()
            .filter(|s| s.is_live())
            .count()
    }

    pub fn is_completed(&self) -> bool {
        self.state.lock().completed
    }

    /// Attach to `registry` for sources created from now on.
    pub fn attach(self: &Arc<Self>, registry: &SourceRegistry) -> RegistryAttachment {
        registry.attach(self.clone())
    }

    /// Attach to `registry` and also consider sources that already exist.
    pub fn attach_and_replay(self: &Arc<Self>, registry: &SourceRegistry) -> RegistryAttachment {
        registry.attach_and_replay(self.clone())
    }

    fn listens_to(&self, name: &str) -> bool {
        self.allow_list.iter().any(|allowed| allowed == name)
    }
}

impl SourceObserver for SubscriptionObserver {
    fn on_source(&self, source: &EventSource) {
        if !self.is_enabled() {
            return;
        }

        let mut state = self.state.lock();
        if state.completed || !self.listens_to(source.name()) {
            return;
        }

        state.subscriptions.retain(Subscription::is_live);
        state.subscriptions.push(source.subscribe(self.sink.clone()));
        debug!(
            source = source.name(),
            sink = self.sink.name(),
            active = state.subscriptions.len(),
            "Observer subscribed sink"
        );
    }

    fn on_error(&self, error: &BusError) {
        debug!(error = %error, "Observer ignored notification error");
    }

    fn on_completed(&self) {
        let mut state = self.state.lock();
        if state.completed {
            return;
        }
        state.completed = true;

        let released = state.subscriptions.len();
        for subscription in state.subscriptions.drain(..) {
            subscription.dispose();
        }
        debug!(released, sink = self.sink.name(), "Observer completed");
    }
}
