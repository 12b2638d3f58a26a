use super::{RecordPatch, RemoteError, RemotePage, RemoteStore};
use crate::core::{
    Cursor, RecordDraft, RecordKind, RemoteRecordId, Result, StoreError, UserId,
};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Why a remote call was downgraded instead of completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradeReason {
    Unavailable,
    Timeout,
    PermissionDenied,
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradeReason::Unavailable => f.write_str("remote store unavailable"),
            DegradeReason::Timeout => f.write_str("remote request timed out"),
            DegradeReason::PermissionDenied => f.write_str("permission denied by remote store"),
        }
    }
}

/// Outcome of a remote call that is allowed to degrade. `Degraded` is a
/// value, not an error: the router's fallback is driven by this control flow
/// rather than by a caught exception.
#[derive(Debug)]
pub enum RemoteOutcome<T> {
    Completed(T),
    Degraded(DegradeReason),
}

/// Wraps a `RemoteStore` backend and translates transient and permission
/// failures into `Degraded`. Only non-degradable failures (missing records,
/// bad cursors) surface as errors.
pub struct RemoteAdapter {
    store: Arc<dyn RemoteStore>,
}

impl RemoteAdapter {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    pub async fn write(
        &self,
        owner: UserId,
        draft: RecordDraft,
    ) -> Result<RemoteOutcome<RemoteRecordId>> {
        match self.store.create(owner, draft.payload).await {
            Ok(id) => Ok(RemoteOutcome::Completed(id)),
            Err(e) => degrade("write", e),
        }
    }

    pub async fn list(
        &self,
        owner: UserId,
        kind: RecordKind,
        page_size: usize,
        cursor: Option<&Cursor>,
    ) -> Result<RemoteOutcome<RemotePage>> {
        match self.store.list(owner, kind, page_size, cursor).await {
            Ok(page) => Ok(RemoteOutcome::Completed(page)),
            Err(e) => degrade("list", e),
        }
    }

    pub async fn update(
        &self,
        id: &RemoteRecordId,
        patch: RecordPatch,
    ) -> Result<RemoteOutcome<()>> {
        match self.store.update(id, patch).await {
            Ok(()) => Ok(RemoteOutcome::Completed(())),
            Err(e) => degrade("update", e),
        }
    }

    pub async fn delete(&self, id: &RemoteRecordId) -> Result<RemoteOutcome<()>> {
        match self.store.delete(id).await {
            Ok(()) => Ok(RemoteOutcome::Completed(())),
            Err(e) => degrade("delete", e),
        }
    }

    /// Two-step activation: deactivate every currently-active sibling, then
    /// activate the target. The backing store offers no cross-document
    /// transaction for this access pattern, so the sequence must be retried
    /// as a unit on a degraded outcome; re-running is idempotent because
    /// deactivating an already-inactive document is a no-op.
    pub async fn set_active(
        &self,
        owner: UserId,
        kind: RecordKind,
        id: &RemoteRecordId,
    ) -> Result<RemoteOutcome<()>> {
        if !kind.supports_active() {
            return Err(StoreError::UnsupportedOperation(format!(
                "{kind} records carry no active flag"
            )));
        }

        let mut active_ids = Vec::new();
        let mut target_seen = false;
        let mut cursor: Option<Cursor> = None;
        loop {
            let page = match self.list(owner, kind, 50, cursor.as_ref()).await? {
                RemoteOutcome::Completed(page) => page,
                RemoteOutcome::Degraded(reason) => return Ok(RemoteOutcome::Degraded(reason)),
            };
            for doc in &page.documents {
                target_seen |= doc.id == *id;
                if doc.payload.is_active() && doc.id != *id {
                    active_ids.push(doc.id);
                }
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        if !target_seen {
            return Err(StoreError::RecordNotFound(id.to_string()));
        }

        for active_id in &active_ids {
            match self.update(active_id, RecordPatch::deactivate()).await? {
                RemoteOutcome::Completed(()) => {}
                RemoteOutcome::Degraded(reason) => return Ok(RemoteOutcome::Degraded(reason)),
            }
        }
        self.update(id, RecordPatch::activate()).await
    }
}

fn degrade<T>(op: &str, err: RemoteError) -> Result<RemoteOutcome<T>> {
    let reason = match &err {
        RemoteError::Unavailable(_) => DegradeReason::Unavailable,
        RemoteError::Timeout(_) => DegradeReason::Timeout,
        RemoteError::PermissionDenied(_) => DegradeReason::PermissionDenied,
        RemoteError::NotFound(id) => return Err(StoreError::RecordNotFound(id.to_string())),
        RemoteError::InvalidCursor(c) => return Err(StoreError::InvalidCursor(c.clone())),
    };
    warn!(op, error = %err, "remote call degraded");
    Ok(RemoteOutcome::Degraded(reason))
}
