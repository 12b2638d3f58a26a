//! Local bounded cache: the only store available to users without remote
//! access, and the fallback target for degraded remote writes.
//!
//! Records are kept newest-first per `(user, kind)` in a bounded FIFO.
//! Capacity eviction is strictly oldest-first, not LRU: records are
//! write-once/append-mostly, so access recency carries no signal. Each user's
//! snapshot is rewritten wholesale to one file under the data dir; there is
//! no network I/O anywhere in this module.

use crate::core::{
    LocalRecordId, RecordDraft, RecordKind, RecordRef, Result, StoreError, StoredRecord, UserId,
};
use crate::entitlement::Quota;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserSnapshot {
    schedules: Vec<StoredRecord>,
    entries: Vec<StoredRecord>,
    routines: Vec<StoredRecord>,
}

impl UserSnapshot {
    fn records(&self, kind: RecordKind) -> &Vec<StoredRecord> {
        match kind {
            RecordKind::Schedule => &self.schedules,
            RecordKind::Entry => &self.entries,
            RecordKind::Routine => &self.routines,
        }
    }

    fn records_mut(&mut self, kind: RecordKind) -> &mut Vec<StoredRecord> {
        match kind {
            RecordKind::Schedule => &mut self.schedules,
            RecordKind::Entry => &mut self.entries,
            RecordKind::Routine => &mut self.routines,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WriteReceipt {
    pub id: LocalRecordId,
    /// How many oldest records the quota pushed out on this write.
    pub evicted: usize,
}

pub struct LocalCache {
    data_dir: PathBuf,
    users: RwLock<HashMap<UserId, UserSnapshot>>,
}

impl LocalCache {
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)
            .map_err(|e| StoreError::LocalStorage(format!("create cache dir: {e}")))?;
        Ok(Self {
            data_dir,
            users: RwLock::new(HashMap::new()),
        })
    }

    /// Prepend `draft` to the user's sequence for its kind, then truncate to
    /// `quota`, discarding the oldest excess. The snapshot is persisted
    /// before the in-memory state is committed, so a failed disk write drops
    /// the record instead of leaving memory and disk disagreeing.
    pub async fn write(
        &self,
        user: UserId,
        draft: RecordDraft,
        quota: Quota,
    ) -> Result<WriteReceipt> {
        let mut users = self.users.write().await;
        let mut snapshot = self.loaded(&mut users, user)?.clone();

        let id = LocalRecordId::new();
        let kind = draft.kind();
        let now = Utc::now();
        let records = snapshot.records_mut(kind);
        records.insert(
            0,
            StoredRecord {
                id: RecordRef::Local(id),
                owner: draft.owner,
                created_at: draft.created_at,
                updated_at: now,
                payload: draft.payload,
            },
        );

        let mut evicted = 0;
        if let Some(cap) = quota.cap() {
            if records.len() > cap {
                evicted = records.len() - cap;
                records.truncate(cap);
            }
        }

        self.persist(user, &snapshot)?;
        users.insert(user, snapshot);
        if evicted > 0 {
            debug!(%user, %kind, evicted, "cache quota reached; oldest records evicted");
        }
        Ok(WriteReceipt { id, evicted })
    }

    /// All cached records of `kind`, newest first.
    pub async fn read(&self, user: UserId, kind: RecordKind) -> Result<Vec<StoredRecord>> {
        let mut users = self.users.write().await;
        Ok(self.loaded(&mut users, user)?.records(kind).clone())
    }

    pub async fn clear(&self, user: UserId, kind: RecordKind) -> Result<()> {
        let mut users = self.users.write().await;
        let mut snapshot = self.loaded(&mut users, user)?.clone();
        snapshot.records_mut(kind).clear();
        self.persist(user, &snapshot)?;
        users.insert(user, snapshot);
        Ok(())
    }

    pub async fn remove(&self, user: UserId, kind: RecordKind, id: &LocalRecordId) -> Result<()> {
        let mut users = self.users.write().await;
        let mut snapshot = self.loaded(&mut users, user)?.clone();
        let records = snapshot.records_mut(kind);
        let before = records.len();
        records.retain(|r| r.id != RecordRef::Local(*id));
        if records.len() == before {
            return Err(StoreError::RecordNotFound(id.to_string()));
        }
        self.persist(user, &snapshot)?;
        users.insert(user, snapshot);
        Ok(())
    }

    /// Activate `id` and deactivate every sibling of the same kind in a
    /// single snapshot rewrite, so the single-active invariant cannot be
    /// observed violated locally.
    pub async fn set_active(
        &self,
        user: UserId,
        kind: RecordKind,
        id: &LocalRecordId,
    ) -> Result<()> {
        if !kind.supports_active() {
            return Err(StoreError::UnsupportedOperation(format!(
                "{kind} records carry no active flag"
            )));
        }
        let mut users = self.users.write().await;
        let mut snapshot = self.loaded(&mut users, user)?.clone();
        let records = snapshot.records_mut(kind);
        let target = RecordRef::Local(*id);
        if !records.iter().any(|r| r.id == target) {
            return Err(StoreError::RecordNotFound(id.to_string()));
        }
        let now = Utc::now();
        for record in records.iter_mut() {
            let on = record.id == target;
            if record.is_active() != on {
                record.payload.set_active(on)?;
                record.updated_at = now;
            }
        }
        self.persist(user, &snapshot)?;
        users.insert(user, snapshot);
        Ok(())
    }

    fn loaded<'a>(
        &self,
        users: &'a mut HashMap<UserId, UserSnapshot>,
        user: UserId,
    ) -> Result<&'a mut UserSnapshot> {
        if !users.contains_key(&user) {
            let snapshot = self.load_from_disk(user)?;
            users.insert(user, snapshot);
        }
        Ok(users.get_mut(&user).unwrap())
    }

    fn load_from_disk(&self, user: UserId) -> Result<UserSnapshot> {
        let path = self.user_path(user);
        if !path.exists() {
            return Ok(UserSnapshot::default());
        }
        let data = fs::read(&path)
            .map_err(|e| StoreError::LocalStorage(format!("read cache snapshot: {e}")))?;
        rmp_serde::from_slice(&data)
            .map_err(|e| StoreError::Serialization(format!("decode cache snapshot: {e}")))
    }

    fn persist(&self, user: UserId, snapshot: &UserSnapshot) -> Result<()> {
        let data = rmp_serde::to_vec(snapshot)
            .map_err(|e| StoreError::Serialization(format!("encode cache snapshot: {e}")))?;
        let path = self.user_path(user);
        let temp_path = path.with_extension("tmp");
        let temp_file = File::create(&temp_path)
            .map_err(|e| StoreError::LocalStorage(format!("create cache temp: {e}")))?;
        let mut writer = BufWriter::new(temp_file);
        writer
            .write_all(&data)
            .map_err(|e| StoreError::LocalStorage(format!("write cache snapshot: {e}")))?;
        writer
            .flush()
            .map_err(|e| StoreError::LocalStorage(format!("flush cache snapshot: {e}")))?;
        writer
            .get_mut()
            .sync_all()
            .map_err(|e| StoreError::LocalStorage(format!("sync cache snapshot: {e}")))?;
        fs::rename(&temp_path, &path)
            .map_err(|e| StoreError::LocalStorage(format!("rename cache snapshot: {e}")))?;
        Ok(())
    }

    fn user_path(&self, user: UserId) -> PathBuf {
        self.data_dir.join(format!("{}.cache", user.as_uuid()))
    }
}
