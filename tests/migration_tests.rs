//! Migration orchestrator: copy-first/clear-last, idempotency, and full
//! retry after partial failure.

use std::sync::Arc;

use tempfile::TempDir;
use tierstore::{
    EntitlementResolver, InMemoryRemoteStore, LocalCache, MigrationOrchestrator, MigrationStatus,
    PaymentEvent, Quota, RecordDraft, RecordKind, RecordPayload, RemoteAdapter, StoreConfig,
    SubscriptionTier, TierChanged, TierStore, UserId,
};

fn schedule_draft(user: UserId, title: &str) -> RecordDraft {
    RecordDraft::new(user, RecordPayload::schedule(title, vec!["08:00".to_string()]))
}

#[tokio::test]
async fn upgrade_migrates_local_schedules_to_remote() {
    let temp = TempDir::new().unwrap();
    let remote = Arc::new(InMemoryRemoteStore::new());
    let store = TierStore::open_with_store(StoreConfig::new(temp.path()), remote.clone()).unwrap();
    let user = UserId::new();

    store.save(user, schedule_draft(user, "morning")).await.unwrap();
    store.save(user, schedule_draft(user, "evening")).await.unwrap();

    let job = store
        .handle_payment(PaymentEvent::Succeeded {
            user,
            tier: SubscriptionTier::Plus,
            amount_cents: 999,
        })
        .await
        .unwrap()
        .expect("upgrade crosses the remote boundary");

    assert_eq!(job.status, MigrationStatus::Completed);
    assert_eq!(job.copied, 2);
    assert_eq!(remote.count(user, RecordKind::Schedule).await, 2);

    // The local cache must be empty for every kind afterwards.
    let cache = LocalCache::open(temp.path().join("cache")).unwrap();
    for kind in RecordKind::ALL {
        assert!(cache.read(user, kind).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn repeating_the_same_upgrade_event_adds_nothing() {
    let temp = TempDir::new().unwrap();
    let remote = Arc::new(InMemoryRemoteStore::new());
    let cache = Arc::new(LocalCache::open(temp.path()).unwrap());
    let adapter = Arc::new(RemoteAdapter::new(remote.clone()));
    let orchestrator =
        MigrationOrchestrator::new(cache.clone(), adapter, EntitlementResolver::new());
    let user = UserId::new();

    cache
        .write(user, schedule_draft(user, "morning"), Quota::Bounded(5))
        .await
        .unwrap();
    cache
        .write(user, schedule_draft(user, "evening"), Quota::Bounded(5))
        .await
        .unwrap();

    let event = TierChanged {
        user,
        old_tier: SubscriptionTier::Free,
        new_tier: SubscriptionTier::Plus,
    };

    let first = orchestrator
        .handle_tier_change(&event)
        .await
        .unwrap()
        .expect("boundary crossed");
    assert_eq!(first.status, MigrationStatus::Completed);
    assert_eq!(first.copied, 2);
    assert_eq!(remote.count(user, RecordKind::Schedule).await, 2);

    // Second run sees an empty cache and copies nothing.
    let second = orchestrator
        .handle_tier_change(&event)
        .await
        .unwrap()
        .expect("boundary crossed");
    assert_eq!(second.status, MigrationStatus::Completed);
    assert_eq!(second.copied, 0);
    assert_eq!(remote.count(user, RecordKind::Schedule).await, 2);
}

#[tokio::test]
async fn failed_migration_leaves_local_cache_untouched() {
    let temp = TempDir::new().unwrap();
    let remote = Arc::new(InMemoryRemoteStore::new());
    let cache = Arc::new(LocalCache::open(temp.path()).unwrap());
    let adapter = Arc::new(RemoteAdapter::new(remote.clone()));
    let orchestrator =
        MigrationOrchestrator::new(cache.clone(), adapter, EntitlementResolver::new());
    let user = UserId::new();

    cache
        .write(user, schedule_draft(user, "kept"), Quota::Bounded(5))
        .await
        .unwrap();
    cache
        .write(
            user,
            RecordDraft::new(user, RecordPayload::entry("also kept", None)),
            Quota::Bounded(5),
        )
        .await
        .unwrap();

    remote.set_offline(true).await;
    let event = TierChanged {
        user,
        old_tier: SubscriptionTier::Free,
        new_tier: SubscriptionTier::Essential,
    };
    let job = orchestrator
        .handle_tier_change(&event)
        .await
        .unwrap()
        .expect("boundary crossed");
    assert_eq!(job.status, MigrationStatus::Failed);

    assert_eq!(cache.read(user, RecordKind::Schedule).await.unwrap().len(), 1);
    assert_eq!(cache.read(user, RecordKind::Entry).await.unwrap().len(), 1);

    // Next relevant event re-attempts the full copy and succeeds.
    remote.set_offline(false).await;
    let retry = orchestrator
        .handle_tier_change(&event)
        .await
        .unwrap()
        .expect("boundary crossed");
    assert_eq!(retry.status, MigrationStatus::Completed);
    assert_eq!(retry.copied, 2);
    assert_eq!(remote.count(user, RecordKind::Schedule).await, 1);
    assert_eq!(remote.count(user, RecordKind::Entry).await, 1);
    assert!(cache.read(user, RecordKind::Schedule).await.unwrap().is_empty());
}

#[tokio::test]
async fn migration_preserves_local_history_order() {
    let temp = TempDir::new().unwrap();
    let remote = Arc::new(InMemoryRemoteStore::new());
    let store = TierStore::open_with_store(StoreConfig::new(temp.path()), remote.clone()).unwrap();
    let user = UserId::new();

    for i in 0..3 {
        store
            .save(user, schedule_draft(user, &format!("plan {i}")))
            .await
            .unwrap();
    }
    store
        .handle_payment(PaymentEvent::Succeeded {
            user,
            tier: SubscriptionTier::Essential,
            amount_cents: 499,
        })
        .await
        .unwrap();

    // Remote listing is reverse-chronological; oldest local record was
    // created first remotely, so the newest local record lists first.
    let page = store.load(user, RecordKind::Schedule).await.unwrap();
    let titles: Vec<String> = page
        .records
        .iter()
        .map(|r| match &r.payload {
            RecordPayload::Schedule { title, .. } => title.clone(),
            other => panic!("unexpected payload {other:?}"),
        })
        .collect();
    assert_eq!(titles, vec!["plan 2", "plan 1", "plan 0"]);
}

#[tokio::test]
async fn downgrade_never_triggers_migration() {
    let temp = TempDir::new().unwrap();
    let store = TierStore::open(StoreConfig::new(temp.path())).unwrap();
    let user = UserId::new();

    store
        .handle_payment(PaymentEvent::Succeeded {
            user,
            tier: SubscriptionTier::Plus,
            amount_cents: 999,
        })
        .await
        .unwrap();
    let job = store
        .handle_payment(PaymentEvent::Canceled { user })
        .await
        .unwrap();
    assert!(job.is_none(), "losing remote access must not migrate anything");
}

#[tokio::test]
async fn upgrade_between_two_paid_tiers_does_not_remigrate() {
    let temp = TempDir::new().unwrap();
    let remote = Arc::new(InMemoryRemoteStore::new());
    let store = TierStore::open_with_store(StoreConfig::new(temp.path()), remote.clone()).unwrap();
    let user = UserId::new();

    store.save(user, schedule_draft(user, "early")).await.unwrap();
    store
        .handle_payment(PaymentEvent::Succeeded {
            user,
            tier: SubscriptionTier::Essential,
            amount_cents: 499,
        })
        .await
        .unwrap();
    assert_eq!(remote.count(user, RecordKind::Schedule).await, 1);

    // Essential -> Premium stays on the remote side of the boundary.
    let job = store
        .handle_payment(PaymentEvent::Succeeded {
            user,
            tier: SubscriptionTier::Premium,
            amount_cents: 1999,
        })
        .await
        .unwrap();
    assert!(job.is_none());
    assert_eq!(remote.count(user, RecordKind::Schedule).await, 1);
}
