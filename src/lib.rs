// ============================================================================
// tierstore: tiered persistence and migration layer
// ============================================================================
//
// Routes every read/write of user data to either a bounded local cache or a
// shared remote document store, based on the user's current entitlement
// tier; enforces per-tier storage quotas; and migrates accumulated local
// data into the remote store exactly once when a user upgrades, without
// losing data if the migration is interrupted.

pub mod cache;
pub mod config;
pub mod core;
pub mod entitlement;
pub mod migration;
pub mod remote;
pub mod router;
pub mod subscription;

// Re-export main types for convenience
pub use cache::LocalCache;
pub use config::StoreConfig;
pub use core::{
    Cursor, Page, RecordDraft, RecordKind, RecordPayload, RecordRef, Result, RoutineStep,
    StoreError, StoredRecord, UserId, UserIdentity,
};
pub use entitlement::{Entitlement, EntitlementResolver, Quota, Quotas, SubscriptionTier};
pub use migration::{MigrationJob, MigrationOrchestrator, MigrationStatus};
pub use remote::{
    DegradeReason, InMemoryRemoteStore, RemoteAdapter, RemoteOutcome, RemoteStore,
};
pub use router::StorageRouter;
pub use subscription::{PaymentEvent, SubscriptionStatus, SubscriptionTracker, TierChanged};

use std::sync::Arc;
use tracing::info;

/// Top-level composition of the persistence layer.
///
/// Owns the subscription tracker, the storage router, and the migration
/// orchestrator, all explicitly constructed. Substituting a fake
/// `RemoteStore` in tests is a constructor argument, not a global swap.
///
/// # Examples
///
/// ```
/// use tierstore::{RecordPayload, StoreConfig, TierStore, UserIdentity};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> tierstore::Result<()> {
/// let dir = tempfile::tempdir().unwrap();
/// let store = TierStore::open(StoreConfig::new(dir.path()))?;
///
/// let identity = UserIdentity::new("sam@example.com");
/// let user = identity.id;
/// store.register(identity).await;
///
/// let draft = tierstore::RecordDraft::new(user, RecordPayload::entry("day one", Some(7)));
/// let record_ref = store.save(user, draft).await?;
/// assert!(record_ref.is_local()); // free tier has no remote access
/// # Ok(())
/// # }
/// ```
pub struct TierStore {
    config: StoreConfig,
    tracker: Arc<SubscriptionTracker>,
    router: StorageRouter,
    migrator: MigrationOrchestrator,
}

impl TierStore {
    /// Open with the in-memory remote backend. Suitable for development and
    /// tests; production wires a real document-store client via
    /// [`TierStore::open_with_store`].
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::open_with_store(config, Arc::new(InMemoryRemoteStore::new()))
    }

    pub fn open_with_store(config: StoreConfig, store: Arc<dyn RemoteStore>) -> Result<Self> {
        config.validate()?;
        let resolver = EntitlementResolver::with_overrides(config.quota_overrides.clone());
        let tracker = Arc::new(SubscriptionTracker::open(config.subscriptions_dir())?);
        let cache = Arc::new(LocalCache::open(config.cache_dir())?);
        let remote = Arc::new(RemoteAdapter::new(store));

        let router = StorageRouter::new(
            tracker.clone(),
            resolver.clone(),
            cache.clone(),
            remote.clone(),
        );
        let migrator = MigrationOrchestrator::new(cache, remote, resolver);

        Ok(Self {
            config,
            tracker,
            router,
            migrator,
        })
    }

    /// Record a first sign-in.
    pub async fn register(&self, identity: UserIdentity) {
        self.tracker.register(identity).await;
    }

    pub async fn status(&self, user: UserId) -> SubscriptionStatus {
        self.tracker.status(user).await
    }

    /// Apply a payment-processor notification. When the event changes the
    /// user's tier, any resulting migration runs to completion before this
    /// returns; the finished job is handed back for inspection.
    pub async fn handle_payment(&self, event: PaymentEvent) -> Result<Option<MigrationJob>> {
        let changed = match event {
            PaymentEvent::Succeeded {
                user,
                tier,
                amount_cents,
            } => {
                self.tracker
                    .apply_payment_success(user, tier, amount_cents)
                    .await
            }
            PaymentEvent::Failed { user, reason } => {
                self.tracker.apply_payment_failure(user, &reason).await
            }
            PaymentEvent::Canceled { user } => self.tracker.cancel(user).await,
        };

        let Some(event) = changed else {
            return Ok(None);
        };
        info!(
            user = %event.user,
            old_tier = %event.old_tier,
            new_tier = %event.new_tier,
            "tier changed"
        );
        self.migrator.handle_tier_change(&event).await
    }

    pub async fn save(&self, user: UserId, draft: RecordDraft) -> Result<RecordRef> {
        self.router.save(user, draft).await
    }

    /// First page with the configured default page size.
    pub async fn load(&self, user: UserId, kind: RecordKind) -> Result<Page> {
        self.router
            .load(user, kind, self.config.default_page_size, None)
            .await
    }

    pub async fn load_page(
        &self,
        user: UserId,
        kind: RecordKind,
        page_size: usize,
        cursor: Option<Cursor>,
    ) -> Result<Page> {
        self.router.load(user, kind, page_size, cursor).await
    }

    pub async fn set_active(&self, user: UserId, kind: RecordKind, id: &RecordRef) -> Result<()> {
        self.router.set_active(user, kind, id).await
    }

    pub async fn delete(&self, user: UserId, kind: RecordKind, id: &RecordRef) -> Result<()> {
        self.router.delete(user, kind, id).await
    }

    pub fn router(&self) -> &StorageRouter {
        &self.router
    }

    pub fn tracker(&self) -> &Arc<SubscriptionTracker> {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn free_tier_saves_land_locally() {
        let temp = TempDir::new().unwrap();
        let store = TierStore::open(StoreConfig::new(temp.path())).unwrap();
        let user = UserId::new();

        let draft = RecordDraft::new(user, RecordPayload::entry("first", None));
        let record_ref = store.save(user, draft).await.unwrap();
        assert!(record_ref.is_local());

        let page = store.load(user, RecordKind::Entry).await.unwrap();
        assert_eq!(page.records.len(), 1);
    }

    #[tokio::test]
    async fn paid_tier_saves_land_remotely() {
        let temp = TempDir::new().unwrap();
        let store = TierStore::open(StoreConfig::new(temp.path())).unwrap();
        let user = UserId::new();

        store
            .handle_payment(PaymentEvent::Succeeded {
                user,
                tier: SubscriptionTier::Essential,
                amount_cents: 499,
            })
            .await
            .unwrap();

        let draft = RecordDraft::new(user, RecordPayload::entry("synced", None));
        let record_ref = store.save(user, draft).await.unwrap();
        assert!(record_ref.is_remote());
    }

    #[tokio::test]
    async fn renewal_without_tier_change_runs_no_migration() {
        let temp = TempDir::new().unwrap();
        let store = TierStore::open(StoreConfig::new(temp.path())).unwrap();
        let user = UserId::new();

        let first = store
            .handle_payment(PaymentEvent::Succeeded {
                user,
                tier: SubscriptionTier::Plus,
                amount_cents: 999,
            })
            .await
            .unwrap();
        assert!(first.is_some());

        let renewal = store
            .handle_payment(PaymentEvent::Succeeded {
                user,
                tier: SubscriptionTier::Plus,
                amount_cents: 999,
            })
            .await
            .unwrap();
        assert!(renewal.is_none());
    }
}
