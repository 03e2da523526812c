//! # Concurrency Tests
//!
//! Producers publish from many threads while consumers subscribe, dispose,
//! and registries create sources concurrently.

#[cfg(test)]
mod tests {
    use crate::integration::support::CollectingSink;
    use diagnostic_bus::{
        EventSource, Publish, SourceObserver, SourceRegistry, SubscriptionObserver,
    };
    use parking_lot::Mutex;
    use rand::Rng;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use uuid::Uuid;

    /// Counts announcements per source name.
    #[derive(Default)]
    struct AnnouncementLog {
        names: Mutex<Vec<String>>,
    }

    impl SourceObserver for AnnouncementLog {
        fn on_source(&self, source: &EventSource) {
            self.names.lock().push(source.name().to_string());
        }
    }

    #[test]
    fn test_concurrent_get_or_create_announces_once() {
        let registry = SourceRegistry::new();
        let log = Arc::new(AnnouncementLog::default());
        let _attachment = registry.attach(log.clone());

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry.get_or_create("DbQueries").unwrap()
                })
            })
            .collect();

        let sources: Vec<EventSource> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(log.names.lock().as_slice(), ["DbQueries"]);
        assert_eq!(registry.len(), 1);

        // Every thread got the same source
        let sink = Arc::new(CollectingSink::default());
        let _sub = sources[0].subscribe(sink);
        assert!(sources.iter().all(|s| s.subscriber_count() == 1));
    }

    #[test]
    fn test_concurrent_publishers_get_unique_ids() {
        let registry = SourceRegistry::new();
        let db = registry.get_or_create("DbQueries").unwrap();
        let sink = Arc::new(CollectingSink::default());
        let _sub = db.subscribe(sink.clone());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let db = db.clone();
                thread::spawn(move || {
                    (0..250)
                        .map(|_| db.register_event("query.start", "ExecuteQuery", None).unwrap())
                        .collect::<Vec<Uuid>>()
                })
            })
            .collect();

        let ids: HashSet<Uuid> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        assert_eq!(ids.len(), 1000);
        assert_eq!(sink.len(), 1000);
    }

    #[test]
    fn test_dispose_racing_publish_delivers_at_most_once() {
        for _ in 0..50 {
            let db = EventSource::detached("DbQueries");
            let sink = Arc::new(CollectingSink::default());
            let sub = db.subscribe(sink.clone());
            let barrier = Arc::new(Barrier::new(2));

            let publisher = {
                let db = db.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    db.register_event("query.start", "ExecuteQuery", None).unwrap()
                })
            };

            barrier.wait();
            sub.dispose();
            let id = publisher.join().unwrap();

            assert!(sink.len() <= 1);
            if sink.len() == 1 {
                assert!(!id.is_nil());
            }

            // After dispose has returned nothing more arrives
            db.register_event("query.end", "ExecuteQuery", None).unwrap();
            assert!(sink.len() <= 1);
        }
    }

    #[test]
    fn test_subscribe_churn_while_publishing() {
        let db = EventSource::detached("DbQueries");
        let stable = Arc::new(CollectingSink::default());
        let _stable_sub = db.subscribe(stable.clone());
        let stop = Arc::new(AtomicBool::new(false));

        let churn: Vec<_> = (0..3)
            .map(|_| {
                let db = db.clone();
                let stop = stop.clone();
                thread::spawn(move || {
                    let mut rng = rand::thread_rng();
                    while !stop.load(Ordering::Relaxed) {
                        let sink = Arc::new(CollectingSink::default());
                        let sub = db.subscribe(sink);
                        if rng.gen_bool(0.5) {
                            thread::yield_now();
                        }
                        sub.dispose();
                    }
                })
            })
            .collect();

        for _ in 0..500 {
            db.register_event("query.start", "ExecuteQuery", None).unwrap();
        }
        stop.store(true, Ordering::Relaxed);
        for handle in churn {
            handle.join().unwrap();
        }

        assert_eq!(stable.len(), 500);
        assert_eq!(db.subscriber_count(), 1);
    }

    #[test]
    fn test_completion_racing_announcements_leaves_nothing_subscribed() {
        let names: Vec<String> = (0..16).map(|i| format!("Source{i}")).collect();

        for _ in 0..20 {
            let registry = SourceRegistry::new();
            let sink = Arc::new(CollectingSink::default());
            let observer = Arc::new(SubscriptionObserver::new(sink, names.clone()));
            observer.set_enabled(true);
            let _attachment = observer.attach(&registry);

            let barrier = Arc::new(Barrier::new(5));
            let creators: Vec<_> = names
                .chunks(4)
                .map(|chunk| {
                    let registry = registry.clone();
                    let barrier = barrier.clone();
                    let chunk = chunk.to_vec();
                    thread::spawn(move || {
                        barrier.wait();
                        chunk
                            .iter()
                            .map(|name| registry.get_or_create(name).unwrap())
                            .collect::<Vec<EventSource>>()
                    })
                })
                .collect();

            barrier.wait();
            observer.on_completed();

            let sources: Vec<EventSource> = creators
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect();

            assert_eq!(sources.len(), names.len());
            assert!(observer.is_completed());
            assert_eq!(observer.active_subscriptions(), 0);
            for source in &sources {
                assert_eq!(source.subscriber_count(), 0, "{} still subscribed", source.name());
            }
        }
    }

    #[test]
    fn test_shutdown_racing_attach_leaves_no_live_observer() {
        for _ in 0..50 {
            let registry = SourceRegistry::new();
            let log = Arc::new(AnnouncementLog::default());
            let barrier = Arc::new(Barrier::new(2));

            let attacher = {
                let registry = registry.clone();
                let log = log.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry.attach(log)
                })
            };

            barrier.wait();
            registry.shutdown();
            let attachment = attacher.join().unwrap();

            assert_eq!(registry.observer_count(), 0);
            registry.get_or_create("DbQueries").unwrap();
            assert!(log.names.lock().is_empty());
            drop(attachment);
        }
    }
}
