//! Remote document store boundary.
//!
//! `RemoteStore` is the transport seam: a durable, owner-scoped, cursor-
//! paginated document store. The crate ships an in-memory implementation as
//! the reference backend; a wire client slots in behind the same trait.
//! `RemoteAdapter` sits on top and turns transient trouble into a typed
//! `Degraded` outcome instead of an error, which is what drives the storage
//! router's fallback logic.

mod adapter;
mod memory;

pub use adapter::{DegradeReason, RemoteAdapter, RemoteOutcome};
pub use memory::InMemoryRemoteStore;

use crate::core::{Cursor, RecordKind, RecordPayload, RemoteRecordId, StoredRecord, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RemoteError {
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    #[error("remote request timed out: {0}")]
    Timeout(String),

    #[error("permission denied for owner '{0}'")]
    PermissionDenied(UserId),

    #[error("document '{0}' not found")]
    NotFound(RemoteRecordId),

    #[error("invalid cursor '{0}'")]
    InvalidCursor(String),
}

/// A document as the remote store holds it: server-assigned id and
/// timestamps, owner-scoped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: RemoteRecordId,
    pub owner: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub payload: RecordPayload,
}

impl RemoteDocument {
    pub fn kind(&self) -> RecordKind {
        self.payload.kind()
    }

    pub fn into_stored(self) -> StoredRecord {
        StoredRecord {
            id: crate::core::RecordRef::Remote(self.id),
            owner: self.owner,
            created_at: self.created_at,
            updated_at: self.updated_at,
            payload: self.payload,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemotePage {
    pub documents: Vec<RemoteDocument>,
    pub next_cursor: Option<Cursor>,
}

/// Partial update applied by `update`. Unset fields are left untouched;
/// deactivating an already-inactive document is a no-op by construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordPatch {
    pub title: Option<String>,
    pub note: Option<String>,
    pub active: Option<bool>,
}

impl RecordPatch {
    pub fn activate() -> Self {
        Self {
            active: Some(true),
            ..Self::default()
        }
    }

    pub fn deactivate() -> Self {
        Self {
            active: Some(false),
            ..Self::default()
        }
    }
}

/// The remote document store capability. Creation is append-only (`create`,
/// never create-or-replace); listing is strictly reverse-chronological by
/// creation time with an opaque cursor.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn create(
        &self,
        owner: UserId,
        payload: RecordPayload,
    ) -> Result<RemoteRecordId, RemoteError>;

    async fn list(
        &self,
        owner: UserId,
        kind: RecordKind,
        page_size: usize,
        cursor: Option<&Cursor>,
    ) -> Result<RemotePage, RemoteError>;

    async fn update(&self, id: &RemoteRecordId, patch: RecordPatch) -> Result<(), RemoteError>;

    async fn delete(&self, id: &RemoteRecordId) -> Result<(), RemoteError>;
}
