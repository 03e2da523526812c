//! # Attach Flow Tests
//!
//! End-to-end consumer flow: construct an observer with a sink and an
//! allow-list, enable it, attach it to a registry, then publish through the
//! sources the registry hands out.
//!
//! ```text
//! SourceRegistry ──announce──→ SubscriptionObserver ──subscribe──→ EventSource
//!                                                                    │
//! producer ──register_event──────────────────────────────────────────┘──→ sink
//! ```

#[cfg(test)]
mod tests {
    use crate::integration::support::{CapturedLogs, CollectingSink};
    use diagnostic_bus::{
        LoggingSink, Payload, Publish, SourceRegistry, SubscriptionObserver, NOT_PUBLISHED,
    };
    use diagnostic_telemetry::{attach_logging, TelemetryConfig};
    use serde_json::json;
    use std::sync::Arc;
    use tracing::Level;
    use uuid::Uuid;

    fn attached_observer(
        registry: &SourceRegistry,
        sink: Arc<CollectingSink>,
        names: &[&str],
    ) -> (Arc<SubscriptionObserver>, diagnostic_bus::RegistryAttachment) {
        let observer = Arc::new(SubscriptionObserver::new(sink, names.iter().copied()));
        observer.set_enabled(true);
        let attachment = observer.attach(registry);
        (observer, attachment)
    }

    // =========================================================================
    // ATTACH AND PUBLISH
    // =========================================================================

    #[test]
    fn test_db_queries_flow() {
        let registry = SourceRegistry::new();
        let sink = Arc::new(CollectingSink::default());
        let (observer, _attachment) = attached_observer(&registry, sink.clone(), &["DbQueries"]);

        let db = registry.get_or_create("DbQueries").unwrap();
        let id = db.register_event("query.start", "ExecuteQuery", None).unwrap();

        assert!(!id.is_nil());
        assert_eq!(observer.active_subscriptions(), 1);
        assert_eq!(sink.names(), vec!["query.start"]);

        let payloads = sink.payloads();
        let event = payloads[0]
            .as_ref()
            .and_then(Payload::as_event)
            .expect("enriched event");
        assert_eq!(event.envelope().correlation_id(), id);
        assert_eq!(event.envelope().operation(), "ExecuteQuery");
    }

    #[test]
    fn test_unlisted_source_stays_disabled() {
        let registry = SourceRegistry::new();
        let sink = Arc::new(CollectingSink::default());
        let (_observer, _attachment) = attached_observer(&registry, sink.clone(), &["DbQueries"]);

        let http = registry.get_or_create("Http").unwrap();
        let id = http
            .register_event_with("request.start", "Get", None, |_| {
                panic!("nothing listens to Http")
            })
            .unwrap();

        assert_eq!(id, NOT_PUBLISHED);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_correlated_start_and_end() {
        let registry = SourceRegistry::new();
        let sink = Arc::new(CollectingSink::default());
        let (_observer, _attachment) = attached_observer(&registry, sink.clone(), &["DbQueries"]);
        let db = registry.get_or_create("DbQueries").unwrap();

        let id = db
            .register_event_with_id_and("query.start", "ExecuteQuery", |envelope| {
                Some(envelope.extend().with_field("sql", "SELECT 1").into())
            })
            .unwrap();
        let end = db.register_event("query.end", "ExecuteQuery", Some(id)).unwrap();

        assert_eq!(end, id);
        let ids: Vec<Option<Uuid>> = sink
            .payloads()
            .iter()
            .map(|p| p.as_ref().and_then(Payload::correlation_id))
            .collect();
        assert_eq!(ids, vec![Some(id), Some(id)]);
    }

    #[test]
    fn test_replay_picks_up_existing_sources() {
        let registry = SourceRegistry::new();
        let db = registry.get_or_create("DbQueries").unwrap();

        let sink = Arc::new(CollectingSink::default());
        let observer = Arc::new(SubscriptionObserver::new(sink.clone(), ["DbQueries"]));
        observer.set_enabled(true);
        let _attachment = observer.attach_and_replay(&registry);

        db.register_event("query.start", "ExecuteQuery", None).unwrap();
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_two_observers_share_a_source() {
        let registry = SourceRegistry::new();
        let first = Arc::new(CollectingSink::default());
        let second = Arc::new(CollectingSink::default());
        let (_a, _att_a) = attached_observer(&registry, first.clone(), &["DbQueries"]);
        let (_b, _att_b) = attached_observer(&registry, second.clone(), &["DbQueries", "Http"]);

        let db = registry.get_or_create("DbQueries").unwrap();
        db.register_event("query.start", "ExecuteQuery", None).unwrap();

        assert_eq!(db.subscriber_count(), 2);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    // =========================================================================
    // LOGGING SINK
    // =========================================================================

    #[test]
    fn test_logging_sink_record_through_registry() {
        let registry = SourceRegistry::new();
        let logs = Arc::new(CapturedLogs::default());
        let sink = LoggingSink::new()
            .with_backend(logs.clone())
            .with_level(Level::DEBUG);
        let observer = Arc::new(SubscriptionObserver::new(Arc::new(sink), ["DbQueries"]));
        observer.set_enabled(true);
        let _attachment = observer.attach(&registry);

        let db = registry.get_or_create("DbQueries").unwrap();
        let id = db
            .register_event_with_id_and("query.start", "ExecuteQuery", |envelope| {
                Some(envelope.extend().with_field("rows", 3).into())
            })
            .unwrap();
        db.register_event_with("query.noop", "ExecuteQuery", None, |_| None)
            .unwrap();

        let records = logs.records();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.level, Level::DEBUG);
        assert_eq!(record.arg("event_name"), Some(&json!("query.start")));
        assert_eq!(record.arg("operation"), Some(&json!("ExecuteQuery")));
        assert_eq!(record.arg("correlation_id"), Some(&json!(id.to_string())));
        assert_eq!(record.arg("rows"), Some(&json!(3)));

        let rendered = record.render();
        assert!(rendered.contains("EventName = query.start"));
        assert!(rendered.contains(&format!("CorrelationId = {id}")));
    }

    #[test]
    fn test_opaque_payload_is_logged() {
        let registry = SourceRegistry::new();
        let logs = Arc::new(CapturedLogs::default());
        let db = registry.get_or_create("DbQueries").unwrap();
        let _sub = db.subscribe(Arc::new(LoggingSink::new().with_backend(logs.clone())));

        db.write("cache.miss", Some(Payload::Opaque(json!({"key": "users:1"}))));

        let records = logs.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].arg("payload"), Some(&json!({"key": "users:1"})));
    }

    #[test]
    fn test_telemetry_attach_logging() {
        let registry = SourceRegistry::new();
        let mut config = TelemetryConfig::default();
        config.observer = diagnostic_bus::ObserverConfig::listening_to(["DbQueries"]);

        let guard = attach_logging(&registry, &config);
        let db = registry.get_or_create("DbQueries").unwrap();

        assert!(db.is_enabled("query.start"));
        assert_eq!(guard.observer().active_subscriptions(), 1);
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    #[test]
    fn test_shutdown_releases_everything() {
        let registry = SourceRegistry::new();
        let sink = Arc::new(CollectingSink::default());
        let (observer, attachment) = attached_observer(&registry, sink.clone(), &["DbQueries"]);
        let db = registry.get_or_create("DbQueries").unwrap();

        registry.shutdown();
        registry.shutdown();

        assert!(registry.is_shut_down());
        assert!(registry.is_empty());
        assert_eq!(registry.observer_count(), 0);
        assert!(observer.is_completed());
        assert_eq!(observer.active_subscriptions(), 0);
        assert_eq!(db.subscriber_count(), 0);

        let id = db.register_event("query.start", "ExecuteQuery", None).unwrap();
        assert!(id.is_nil());
        assert!(sink.is_empty());

        attachment.dispose();
    }

    #[test]
    fn test_shutdown_completes_direct_subscribers() {
        let registry = SourceRegistry::new();
        let db = registry.get_or_create("DbQueries").unwrap();
        let sink = Arc::new(CollectingSink::default());
        let _sub = db.subscribe(sink.clone());

        registry.shutdown();
        assert_eq!(sink.completions(), 1);
    }

    #[test]
    fn test_attach_after_shutdown_completes_immediately() {
        let registry = SourceRegistry::new();
        registry.shutdown();

        let sink = Arc::new(CollectingSink::default());
        let (observer, attachment) = attached_observer(&registry, sink, &["DbQueries"]);

        assert!(attachment.is_detached());
        assert!(observer.is_completed());

        let db = registry.get_or_create("DbQueries").unwrap();
        assert!(!db.is_enabled("query.start"));
    }

    #[test]
    fn test_disposed_subscription_stops_delivery() {
        let registry = SourceRegistry::new();
        let db = registry.get_or_create("DbQueries").unwrap();
        let sink = Arc::new(CollectingSink::default());
        let sub = db.subscribe(sink.clone());

        db.register_event("query.start", "ExecuteQuery", None).unwrap();
        sub.dispose();
        sub.dispose();
        let id = db.register_event("query.end", "ExecuteQuery", None).unwrap();

        assert!(sub.is_disposed());
        assert!(id.is_nil());
        assert_eq!(sink.names(), vec!["query.start"]);
    }
}
