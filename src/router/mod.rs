//! Storage router: the single entry point for all persistence. Every
//! operation consults the subscription tracker and entitlement resolver
//! before touching a backend.
//!
//! A save either completes remotely, degrades into a local write, or goes
//! straight to the local cache when the tier has no remote access. The only
//! hard failure on the save path is a local write the storage medium itself
//! refuses.
//!
//! Save and load degrade asymmetrically on purpose: dropping a paid user's
//! write while offline would violate availability, so saves fall back to the
//! local cache silently. Showing that user stale local data instead of their
//! cloud history would violate the durability contract, so loads surface a
//! retryable error instead.

use crate::cache::LocalCache;
use crate::core::{
    Cursor, Page, RecordDraft, RecordKind, RecordRef, Result, StoreError, UserId,
};
use crate::entitlement::{EntitlementResolver, SubscriptionTier};
use crate::remote::{RemoteAdapter, RemoteOutcome};
use crate::subscription::SubscriptionTracker;
use std::sync::Arc;
use tracing::{debug, info};

pub struct StorageRouter {
    tracker: Arc<SubscriptionTracker>,
    resolver: EntitlementResolver,
    cache: Arc<LocalCache>,
    remote: Arc<RemoteAdapter>,
}

impl StorageRouter {
    pub fn new(
        tracker: Arc<SubscriptionTracker>,
        resolver: EntitlementResolver,
        cache: Arc<LocalCache>,
        remote: Arc<RemoteAdapter>,
    ) -> Self {
        Self {
            tracker,
            resolver,
            cache,
            remote,
        }
    }

    /// Persist a record on whichever path the user's entitlement selects.
    /// Never fails for remote trouble; a degraded remote write lands in the
    /// local cache under free-tier quotas, as if the user were on the free
    /// tier for this one call.
    pub async fn save(&self, user: UserId, draft: RecordDraft) -> Result<RecordRef> {
        let kind = draft.kind();
        let entitlement = self.entitlement_for(user).await;

        let quotas = if entitlement.has_remote_access {
            match self.remote.write(user, draft.clone()).await? {
                RemoteOutcome::Completed(id) => {
                    debug!(%user, %kind, %id, "saved remotely");
                    return Ok(RecordRef::Remote(id));
                }
                RemoteOutcome::Degraded(reason) => {
                    info!(%user, %kind, %reason, "remote save degraded; falling back to local cache");
                    // Degraded call: treat this one operation as free-tier.
                    self.resolver.resolve(SubscriptionTier::Free).quotas
                }
            }
        } else {
            entitlement.quotas
        };

        let receipt = self.cache.write(user, draft, quotas.for_kind(kind)).await?;
        Ok(RecordRef::Local(receipt.id))
    }

    /// Page through the user's records, newest first. For a user entitled to
    /// remote data, a degraded remote read is a retryable error, never a
    /// silent substitution of local state.
    pub async fn load(
        &self,
        user: UserId,
        kind: RecordKind,
        page_size: usize,
        cursor: Option<Cursor>,
    ) -> Result<Page> {
        // A zero page size would end pagination with records remaining.
        let page_size = page_size.max(1);
        let entitlement = self.entitlement_for(user).await;

        if entitlement.has_remote_access {
            return match self.remote.list(user, kind, page_size, cursor.as_ref()).await? {
                RemoteOutcome::Completed(page) => Ok(Page {
                    records: page.documents.into_iter().map(|d| d.into_stored()).collect(),
                    next_cursor: page.next_cursor,
                }),
                RemoteOutcome::Degraded(reason) => {
                    Err(StoreError::RemoteUnavailable(reason.to_string()))
                }
            };
        }

        let records = self.cache.read(user, kind).await?;
        paginate_local(records, page_size, cursor)
    }

    /// Activate one record and deactivate its siblings, on whichever path the
    /// ref points at. A degraded remote sequence surfaces as retryable; the
    /// caller retries the whole call as a unit.
    pub async fn set_active(&self, user: UserId, kind: RecordKind, id: &RecordRef) -> Result<()> {
        match id {
            RecordRef::Remote(remote_id) => {
                self.require_remote_access(user, "set_active").await?;
                match self.remote.set_active(user, kind, remote_id).await? {
                    RemoteOutcome::Completed(()) => Ok(()),
                    RemoteOutcome::Degraded(reason) => {
                        Err(StoreError::RemoteUnavailable(reason.to_string()))
                    }
                }
            }
            RecordRef::Local(local_id) => self.cache.set_active(user, kind, local_id).await,
        }
    }

    /// Hard delete, reserved for explicit user action.
    pub async fn delete(&self, user: UserId, kind: RecordKind, id: &RecordRef) -> Result<()> {
        match id {
            RecordRef::Remote(remote_id) => {
                self.require_remote_access(user, "delete").await?;
                match self.remote.delete(remote_id).await? {
                    RemoteOutcome::Completed(()) => Ok(()),
                    RemoteOutcome::Degraded(reason) => {
                        Err(StoreError::RemoteUnavailable(reason.to_string()))
                    }
                }
            }
            RecordRef::Local(local_id) => self.cache.remove(user, kind, local_id).await,
        }
    }

    async fn entitlement_for(&self, user: UserId) -> crate::entitlement::Entitlement {
        let status = self.tracker.status(user).await;
        self.resolver.resolve(status.effective_tier())
    }

    /// Mutating through a remote ref requires a live remote entitlement;
    /// a lapsed subscription must not keep write access to the remote store
    /// through refs handed out while it was paid.
    async fn require_remote_access(&self, user: UserId, op: &str) -> Result<()> {
        if self.entitlement_for(user).await.has_remote_access {
            Ok(())
        } else {
            Err(StoreError::PermissionDenied(format!(
                "{op} on remote record requires an active paid subscription (user {user})"
            )))
        }
    }
}

fn paginate_local(
    records: Vec<crate::core::StoredRecord>,
    page_size: usize,
    cursor: Option<Cursor>,
) -> Result<Page> {
    let offset = match &cursor {
        Some(c) => c
            .as_str()
            .parse::<usize>()
            .map_err(|_| StoreError::InvalidCursor(c.as_str().to_string()))?,
        None => 0,
    };
    let end = (offset + page_size).min(records.len());
    let next_cursor = (end < records.len()).then(|| Cursor::new(end.to_string()));
    let page = records
        .into_iter()
        .skip(offset)
        .take(page_size)
        .collect();
    Ok(Page {
        records: page,
        next_cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RecordPayload, StoredRecord};
    use chrono::Utc;

    fn stored(n: usize) -> Vec<StoredRecord> {
        (0..n)
            .map(|i| StoredRecord {
                id: RecordRef::Local(crate::core::LocalRecordId::new()),
                owner: UserId::new(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                payload: RecordPayload::entry(format!("note {i}"), None),
            })
            .collect()
    }

    #[test]
    fn local_pagination_covers_all_records_once() {
        let records = stored(7);
        let expected: Vec<_> = records.iter().map(|r| r.id).collect();

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = paginate_local(records.clone(), 3, cursor).unwrap();
            seen.extend(page.records.iter().map(|r| r.id));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert_eq!(seen, expected);
    }

    #[test]
    fn local_pagination_rejects_garbage_cursor() {
        let result = paginate_local(stored(2), 3, Some(Cursor::new("zzz")));
        assert!(matches!(result, Err(StoreError::InvalidCursor(_))));
    }

    #[test]
    fn empty_set_yields_one_empty_page() {
        let page = paginate_local(Vec::new(), 3, None).unwrap();
        assert!(page.records.is_empty());
        assert!(page.next_cursor.is_none());
    }
}
