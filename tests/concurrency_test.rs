mod helpers;

use std::sync::Arc;

use chrono::{Duration, Utc};
use helpers::{analytics_engines, conversation_stores, interaction_at};
use somnus::conversation::Role;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_appends_to_one_conversation_never_drop_messages() {
    const WRITERS: usize = 16;
    const APPENDS_EACH: usize = 25;

    for (backend, store) in conversation_stores() {
        let id = store.create_or_get(None, None).await.unwrap();

        let mut handles = Vec::new();
        for w in 0..WRITERS {
            let store = Arc::clone(&store);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                for n in 0..APPENDS_EACH {
                    store
                        .append_message(&id, Role::User, &format!("w{w}-m{n}"))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let conv = store.history(&id).await.unwrap();
        assert_eq!(conv.messages.len(), WRITERS * APPENDS_EACH, "{backend}");
        assert!(conv.updated_at >= conv.created_at, "{backend}");

        // Each writer's own messages are still in its submission order
        for w in 0..WRITERS {
            let mine: Vec<&str> = conv
                .messages
                .iter()
                .map(|m| m.content.as_str())
                .filter(|c| c.starts_with(&format!("w{w}-")))
                .collect();
            let expected: Vec<String> = (0..APPENDS_EACH).map(|n| format!("w{w}-m{n}")).collect();
            assert_eq!(mine, expected, "{backend}");
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_appends_to_distinct_conversations_are_independent() {
    const CONVERSATIONS: usize = 12;
    const APPENDS_EACH: usize = 20;

    for (backend, store) in conversation_stores() {
        let mut ids = Vec::new();
        for _ in 0..CONVERSATIONS {
            ids.push(store.create_or_get(None, None).await.unwrap());
        }

        let mut handles = Vec::new();
        for id in &ids {
            let store = Arc::clone(&store);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                for n in 0..APPENDS_EACH {
                    store
                        .append_message(&id, Role::User, &format!("m{n}"))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for id in &ids {
            let conv = store.history(id).await.unwrap();
            assert_eq!(conv.messages.len(), APPENDS_EACH, "{backend}");
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_records_all_land() {
    const WRITERS: usize = 10;
    const RECORDS_EACH: usize = 30;

    for (backend, engine) in analytics_engines() {
        let mut handles = Vec::new();
        for w in 0..WRITERS {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                let now = Utc::now();
                for n in 0..RECORDS_EACH {
                    engine
                        .record(interaction_at(
                            Some(&format!("user-{w}")),
                            &format!("conv-{w}-{n}"),
                            "sleep_science",
                            now,
                        ))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let report = engine.overview(30).await.unwrap();
        assert_eq!(
            report.total_interactions,
            (WRITERS * RECORDS_EACH) as u64,
            "{backend}"
        );
        assert_eq!(report.unique_users, WRITERS as u64, "{backend}");

        for w in 0..WRITERS {
            let user = engine.user_report(&format!("user-{w}")).await.unwrap();
            assert_eq!(user.total_interactions, RECORDS_EACH as u64, "{backend}");
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn cleanup_runs_safely_alongside_writers() {
    const FRESH_RECORDS: usize = 50;

    for (backend, engine) in analytics_engines() {
        // Seed data old enough to be evicted
        let stale = Utc::now() - Duration::days(30);
        for n in 0..20 {
            engine
                .record(interaction_at(Some("old"), &format!("old-{n}"), "t", stale))
                .await
                .unwrap();
        }

        let writer = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                for n in 0..FRESH_RECORDS {
                    engine
                        .record(interaction_at(
                            Some("fresh"),
                            &format!("fresh-{n}"),
                            "t",
                            Utc::now(),
                        ))
                        .await
                        .unwrap();
                }
            })
        };
        let cleaner = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine.cleanup(7).await.unwrap();
            })
        };

        writer.await.unwrap();
        cleaner.await.unwrap();

        // A second cleanup is deterministic: all stale rows are gone by now
        engine.cleanup(7).await.unwrap();

        // Every fresh record survived; every stale record was evicted
        let report = engine.overview(365).await.unwrap();
        assert_eq!(report.total_interactions, FRESH_RECORDS as u64, "{backend}");
        let fresh = engine.user_report("fresh").await.unwrap();
        assert_eq!(fresh.total_interactions, FRESH_RECORDS as u64, "{backend}");
    }
}
