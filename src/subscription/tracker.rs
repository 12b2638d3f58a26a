use super::events::TierChanged;
use crate::core::{Result, StoreError, UserId, UserIdentity};
use crate::entitlement::SubscriptionTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Consecutive failures that force a downgrade to `Free`.
pub const MAX_PAYMENT_FAILURES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    pub tier: SubscriptionTier,
    pub is_active: bool,
    pub consecutive_payment_failures: u32,
    pub last_payment_at: Option<DateTime<Utc>>,
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        Self {
            tier: SubscriptionTier::Free,
            is_active: true,
            consecutive_payment_failures: 0,
            last_payment_at: None,
        }
    }
}

impl SubscriptionStatus {
    /// The tier used for entitlement decisions. An inactive subscription
    /// never grants paid capabilities, whatever the recorded tier says.
    pub fn effective_tier(&self) -> SubscriptionTier {
        if self.is_active {
            self.tier
        } else {
            SubscriptionTier::Free
        }
    }
}

#[derive(Serialize, Deserialize)]
struct JournalRecord {
    user: UserId,
    identity: Option<UserIdentity>,
    status: SubscriptionStatus,
}

/// Per-user subscription state, mutated only by payment-event handlers.
///
/// Bookkeeping is journaled to disk best-effort: a failed journal write logs
/// a warning and queues the user for `flush_pending`, but the in-memory
/// transition always proceeds. The state is re-derivable from the payment
/// processor's records, so availability wins over immediate durability here.
pub struct SubscriptionTracker {
    journal_dir: PathBuf,
    statuses: RwLock<HashMap<UserId, SubscriptionStatus>>,
    identities: RwLock<HashMap<UserId, UserIdentity>>,
    pending_flush: RwLock<HashSet<UserId>>,
}

impl SubscriptionTracker {
    /// Open the tracker, recovering any journaled state under `journal_dir`.
    pub fn open<P: AsRef<Path>>(journal_dir: P) -> Result<Self> {
        let journal_dir = journal_dir.as_ref().to_path_buf();
        fs::create_dir_all(&journal_dir)
            .map_err(|e| StoreError::LocalStorage(format!("create journal dir: {e}")))?;

        let mut statuses = HashMap::new();
        let mut identities = HashMap::new();
        for entry in fs::read_dir(&journal_dir)
            .map_err(|e| StoreError::LocalStorage(format!("read journal dir: {e}")))?
        {
            let entry = entry.map_err(|e| StoreError::LocalStorage(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("sub") {
                continue;
            }
            let data = fs::read(&path)
                .map_err(|e| StoreError::LocalStorage(format!("read journal: {e}")))?;
            let record: JournalRecord = rmp_serde::from_slice(&data)
                .map_err(|e| StoreError::Serialization(format!("decode journal: {e}")))?;
            statuses.insert(record.user, record.status);
            if let Some(identity) = record.identity {
                identities.insert(record.user, identity);
            }
        }

        Ok(Self {
            journal_dir,
            statuses: RwLock::new(statuses),
            identities: RwLock::new(identities),
            pending_flush: RwLock::new(HashSet::new()),
        })
    }

    /// Record a first sign-in. A second call for the same id is a no-op: the
    /// identity is immutable once created.
    pub async fn register(&self, identity: UserIdentity) {
        let user = identity.id;
        {
            let mut identities = self.identities.write().await;
            if identities.contains_key(&user) {
                return;
            }
            identities.insert(user, identity);
        }
        self.statuses
            .write()
            .await
            .entry(user)
            .or_insert_with(SubscriptionStatus::default);
        self.journal(user).await;
    }

    /// Current status, defaulting to a fresh free-tier status for users the
    /// tracker has never seen.
    pub async fn status(&self, user: UserId) -> SubscriptionStatus {
        self.statuses
            .read()
            .await
            .get(&user)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn apply_payment_success(
        &self,
        user: UserId,
        tier: SubscriptionTier,
        amount_cents: u64,
    ) -> Option<TierChanged> {
        let changed = {
            let mut statuses = self.statuses.write().await;
            let status = statuses.entry(user).or_default();
            let old_tier = status.tier;
            status.tier = tier;
            status.is_active = true;
            status.consecutive_payment_failures = 0;
            status.last_payment_at = Some(Utc::now());
            debug!(%user, %tier, amount_cents, "payment succeeded");
            (old_tier != tier).then_some(TierChanged {
                user,
                old_tier,
                new_tier: tier,
            })
        };
        self.journal(user).await;
        changed
    }

    pub async fn apply_payment_failure(&self, user: UserId, reason: &str) -> Option<TierChanged> {
        let changed = {
            let mut statuses = self.statuses.write().await;
            let status = statuses.entry(user).or_default();
            status.consecutive_payment_failures += 1;
            warn!(
                %user,
                failures = status.consecutive_payment_failures,
                reason,
                "payment failed"
            );
            if status.consecutive_payment_failures < MAX_PAYMENT_FAILURES {
                None
            } else if status.tier == SubscriptionTier::Free && !status.is_active {
                // Already at the floor; further failures only bump the counter.
                None
            } else {
                let old_tier = status.tier;
                status.tier = SubscriptionTier::Free;
                status.is_active = false;
                (old_tier != SubscriptionTier::Free).then_some(TierChanged {
                    user,
                    old_tier,
                    new_tier: SubscriptionTier::Free,
                })
            }
        };
        self.journal(user).await;
        changed
    }

    /// Immediate cancellation; no grace period.
    pub async fn cancel(&self, user: UserId) -> Option<TierChanged> {
        let changed = {
            let mut statuses = self.statuses.write().await;
            let status = statuses.entry(user).or_default();
            let old_tier = status.tier;
            status.tier = SubscriptionTier::Free;
            status.is_active = false;
            debug!(%user, "subscription canceled");
            (old_tier != SubscriptionTier::Free).then_some(TierChanged {
                user,
                old_tier,
                new_tier: SubscriptionTier::Free,
            })
        };
        self.journal(user).await;
        changed
    }

    /// Retry journal writes that previously failed. Returns how many users
    /// were flushed successfully.
    pub async fn flush_pending(&self) -> usize {
        let pending: Vec<UserId> = self.pending_flush.read().await.iter().copied().collect();
        let mut flushed = 0;
        for user in pending {
            if self.try_journal(user).await.is_ok() {
                self.pending_flush.write().await.remove(&user);
                flushed += 1;
            }
        }
        flushed
    }

    /// Best-effort durable write; never fails the caller.
    async fn journal(&self, user: UserId) {
        if let Err(e) = self.try_journal(user).await {
            warn!(%user, error = %e, "subscription journal write failed; queued for retry");
            self.pending_flush.write().await.insert(user);
        }
    }

    async fn try_journal(&self, user: UserId) -> Result<()> {
        let record = JournalRecord {
            user,
            identity: self.identities.read().await.get(&user).cloned(),
            status: self.status(user).await,
        };
        let path = self.journal_dir.join(format!("{}.sub", user.as_uuid()));
        write_atomic(&path, &record)
    }
}

fn write_atomic(path: &Path, record: &JournalRecord) -> Result<()> {
    let data = rmp_serde::to_vec(record)
        .map_err(|e| StoreError::Serialization(format!("encode journal: {e}")))?;
    let temp_path = path.with_extension("tmp");
    let temp_file = File::create(&temp_path)
        .map_err(|e| StoreError::LocalStorage(format!("create journal temp: {e}")))?;
    let mut writer = BufWriter::new(temp_file);
    writer
        .write_all(&data)
        .map_err(|e| StoreError::LocalStorage(format!("write journal: {e}")))?;
    writer
        .flush()
        .map_err(|e| StoreError::LocalStorage(format!("flush journal: {e}")))?;
    writer
        .get_mut()
        .sync_all()
        .map_err(|e| StoreError::LocalStorage(format!("sync journal: {e}")))?;
    fs::rename(&temp_path, path)
        .map_err(|e| StoreError::LocalStorage(format!("rename journal: {e}")))?;
    Ok(())
}
