use super::{RecordPatch, RemoteDocument, RemoteError, RemotePage, RemoteStore};
use crate::core::{Cursor, RecordKind, RecordPayload, RemoteRecordId, UserId};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use tokio::sync::RwLock;

struct StoredDoc {
    doc: RemoteDocument,
    /// Monotonic creation sequence; breaks timestamp ties so pagination
    /// order is stable.
    seq: u64,
}

#[derive(Default)]
struct Inner {
    docs: Vec<StoredDoc>,
    next_seq: u64,
    offline: bool,
    denied_owners: HashSet<UserId>,
}

/// Reference backend: a durable-store stand-in with server-assigned ids and
/// timestamps, plus fault injection so degraded paths are testable without a
/// network.
#[derive(Default)]
pub struct InMemoryRemoteStore {
    inner: RwLock<Inner>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store being unreachable.
    pub async fn set_offline(&self, offline: bool) {
        self.inner.write().await.offline = offline;
    }

    /// Simulate an authorization failure for one owner.
    pub async fn deny_owner(&self, owner: UserId) {
        self.inner.write().await.denied_owners.insert(owner);
    }

    pub async fn allow_owner(&self, owner: UserId) {
        self.inner.write().await.denied_owners.remove(&owner);
    }

    /// Total documents held for `(owner, kind)`.
    pub async fn count(&self, owner: UserId, kind: RecordKind) -> usize {
        self.inner
            .read()
            .await
            .docs
            .iter()
            .filter(|d| d.doc.owner == owner && d.doc.kind() == kind)
            .count()
    }
}

impl Inner {
    fn check_reachable(&self, owner: UserId) -> Result<(), RemoteError> {
        if self.offline {
            return Err(RemoteError::Unavailable("store offline".to_string()));
        }
        if self.denied_owners.contains(&owner) {
            return Err(RemoteError::PermissionDenied(owner));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn create(
        &self,
        owner: UserId,
        payload: RecordPayload,
    ) -> Result<RemoteRecordId, RemoteError> {
        let mut inner = self.inner.write().await;
        inner.check_reachable(owner)?;

        let id = RemoteRecordId::new();
        let now = Utc::now();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.docs.push(StoredDoc {
            doc: RemoteDocument {
                id,
                owner,
                created_at: now,
                updated_at: now,
                payload,
            },
            seq,
        });
        Ok(id)
    }

    async fn list(
        &self,
        owner: UserId,
        kind: RecordKind,
        page_size: usize,
        cursor: Option<&Cursor>,
    ) -> Result<RemotePage, RemoteError> {
        let inner = self.inner.read().await;
        inner.check_reachable(owner)?;

        // A zero page size would end pagination with records remaining.
        let page_size = page_size.max(1);
        let before = match cursor {
            Some(c) => c
                .as_str()
                .parse::<u64>()
                .map_err(|_| RemoteError::InvalidCursor(c.as_str().to_string()))?,
            None => u64::MAX,
        };

        // Reverse-chronological: creation sequence is monotonic in creation
        // time, so descending seq is descending created_at.
        let mut matching: Vec<&StoredDoc> = inner
            .docs
            .iter()
            .filter(|d| d.doc.owner == owner && d.doc.kind() == kind && d.seq < before)
            .collect();
        matching.sort_by(|a, b| b.seq.cmp(&a.seq));

        let has_more = matching.len() > page_size;
        let page: Vec<&StoredDoc> = matching.into_iter().take(page_size).collect();
        let next_cursor = if has_more {
            page.last().map(|d| Cursor::new(d.seq.to_string()))
        } else {
            None
        };

        Ok(RemotePage {
            documents: page.into_iter().map(|d| d.doc.clone()).collect(),
            next_cursor,
        })
    }

    async fn update(&self, id: &RemoteRecordId, patch: RecordPatch) -> Result<(), RemoteError> {
        let mut inner = self.inner.write().await;
        if inner.offline {
            return Err(RemoteError::Unavailable("store offline".to_string()));
        }
        let pos = inner
            .docs
            .iter()
            .position(|d| d.doc.id == *id)
            .ok_or(RemoteError::NotFound(*id))?;
        let owner = inner.docs[pos].doc.owner;
        if inner.denied_owners.contains(&owner) {
            return Err(RemoteError::PermissionDenied(owner));
        }

        let stored = &mut inner.docs[pos];
        apply_patch(&mut stored.doc.payload, &patch);
        stored.doc.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: &RemoteRecordId) -> Result<(), RemoteError> {
        let mut inner = self.inner.write().await;
        if inner.offline {
            return Err(RemoteError::Unavailable("store offline".to_string()));
        }
        let pos = inner
            .docs
            .iter()
            .position(|d| d.doc.id == *id)
            .ok_or(RemoteError::NotFound(*id))?;
        let owner = inner.docs[pos].doc.owner;
        if inner.denied_owners.contains(&owner) {
            return Err(RemoteError::PermissionDenied(owner));
        }
        inner.docs.remove(pos);
        Ok(())
    }
}

fn apply_patch(payload: &mut RecordPayload, patch: &RecordPatch) {
    match payload {
        RecordPayload::Schedule { title, active, .. } => {
            if let Some(t) = &patch.title {
                *title = t.clone();
            }
            if let Some(a) = patch.active {
                *active = a;
            }
        }
        RecordPayload::Routine { title, active, .. } => {
            if let Some(t) = &patch.title {
                *title = t.clone();
            }
            if let Some(a) = patch.active {
                *active = a;
            }
        }
        RecordPayload::Entry { note, .. } => {
            if let Some(n) = &patch.note {
                *note = n.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_assigns_server_id_and_timestamps() {
        let store = InMemoryRemoteStore::new();
        let owner = UserId::new();
        let id = store
            .create(owner, RecordPayload::entry("hello", None))
            .await
            .unwrap();

        let page = store.list(owner, RecordKind::Entry, 10, None).await.unwrap();
        assert_eq!(page.documents.len(), 1);
        assert_eq!(page.documents[0].id, id);
        assert_eq!(page.documents[0].created_at, page.documents[0].updated_at);
    }

    #[tokio::test]
    async fn list_is_reverse_chronological() {
        let store = InMemoryRemoteStore::new();
        let owner = UserId::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(
                store
                    .create(owner, RecordPayload::entry(format!("note {i}"), None))
                    .await
                    .unwrap(),
            );
        }

        let page = store.list(owner, RecordKind::Entry, 10, None).await.unwrap();
        let listed: Vec<_> = page.documents.iter().map(|d| d.id).collect();
        ids.reverse();
        assert_eq!(listed, ids);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn queries_are_owner_scoped() {
        let store = InMemoryRemoteStore::new();
        let alice = UserId::new();
        let bob = UserId::new();
        store
            .create(alice, RecordPayload::entry("alice's", None))
            .await
            .unwrap();
        store
            .create(bob, RecordPayload::entry("bob's", None))
            .await
            .unwrap();

        let page = store.list(alice, RecordKind::Entry, 10, None).await.unwrap();
        assert_eq!(page.documents.len(), 1);
        assert_eq!(page.documents[0].owner, alice);
    }

    #[tokio::test]
    async fn garbage_cursor_is_rejected() {
        let store = InMemoryRemoteStore::new();
        let owner = UserId::new();
        let cursor = Cursor::new("not-a-cursor");
        let result = store
            .list(owner, RecordKind::Entry, 10, Some(&cursor))
            .await;
        assert!(matches!(result, Err(RemoteError::InvalidCursor(_))));
    }

    #[tokio::test]
    async fn zero_page_size_still_makes_progress() {
        let store = InMemoryRemoteStore::new();
        let owner = UserId::new();
        for i in 0..3 {
            store
                .create(owner, RecordPayload::entry(format!("note {i}"), None))
                .await
                .unwrap();
        }

        let page = store.list(owner, RecordKind::Entry, 0, None).await.unwrap();
        assert_eq!(page.documents.len(), 1);
        assert!(page.next_cursor.is_some());
    }

    #[tokio::test]
    async fn offline_store_refuses_everything() {
        let store = InMemoryRemoteStore::new();
        let owner = UserId::new();
        store.set_offline(true).await;

        let result = store.create(owner, RecordPayload::entry("x", None)).await;
        assert!(matches!(result, Err(RemoteError::Unavailable(_))));
        let result = store.list(owner, RecordKind::Entry, 10, None).await;
        assert!(matches!(result, Err(RemoteError::Unavailable(_))));
    }
}
