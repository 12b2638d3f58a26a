//! One-time bulk copy of locally cached records into the remote store,
//! triggered by a tier upgrade that crosses the remote-access boundary.
//!
//! The load-bearing invariant is copy-first, clear-last: local data is never
//! deleted before remote durability of every local record is confirmed. A
//! failed run leaves the cache fully intact and is retried wholesale on the
//! next relevant event; a retry that re-copies already-copied records can
//! duplicate them remotely (there is no record-level idempotency key to
//! dedupe on), which is the accepted trade-off: duplicates are harmless,
//! data loss is not.

use crate::cache::LocalCache;
use crate::core::{RecordDraft, RecordKind, Result, UserId};
use crate::entitlement::EntitlementResolver;
use crate::remote::{RemoteAdapter, RemoteOutcome};
use crate::subscription::TierChanged;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStatus {
    Pending,
    Copying,
    Completed,
    Failed,
}

/// Transient bookkeeping for one upgrade; never persisted beyond its run.
#[derive(Debug, Clone)]
pub struct MigrationJob {
    pub id: Uuid,
    pub user: UserId,
    pub status: MigrationStatus,
    pub copied: usize,
    pub failed: usize,
}

impl MigrationJob {
    fn new(user: UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            status: MigrationStatus::Pending,
            copied: 0,
            failed: 0,
        }
    }
}

pub struct MigrationOrchestrator {
    cache: Arc<LocalCache>,
    remote: Arc<RemoteAdapter>,
    resolver: EntitlementResolver,
}

impl MigrationOrchestrator {
    pub fn new(
        cache: Arc<LocalCache>,
        remote: Arc<RemoteAdapter>,
        resolver: EntitlementResolver,
    ) -> Self {
        Self {
            cache,
            remote,
            resolver,
        }
    }

    /// React to a tier change. Returns `None` when the change does not gain
    /// remote access; otherwise runs the copy and returns the finished job.
    pub async fn handle_tier_change(&self, event: &TierChanged) -> Result<Option<MigrationJob>> {
        if !event.crosses_remote_boundary_up(&self.resolver) {
            return Ok(None);
        }
        Ok(Some(self.migrate(event.user).await?))
    }

    async fn migrate(&self, user: UserId) -> Result<MigrationJob> {
        let mut job = MigrationJob::new(user);
        job.status = MigrationStatus::Copying;
        info!(job_id = %job.id, %user, "migration started");

        for kind in RecordKind::ALL {
            // Oldest first, so remote creation order matches local history.
            let records = self.cache.read(user, kind).await?;
            for record in records.into_iter().rev() {
                let draft = RecordDraft {
                    owner: record.owner,
                    created_at: record.created_at,
                    payload: record.payload,
                };
                match self.remote.write(user, draft).await? {
                    RemoteOutcome::Completed(_) => job.copied += 1,
                    RemoteOutcome::Degraded(reason) => {
                        job.failed += 1;
                        job.status = MigrationStatus::Failed;
                        warn!(
                            job_id = %job.id,
                            %user,
                            %kind,
                            %reason,
                            copied = job.copied,
                            "migration aborted; local cache left untouched"
                        );
                        return Ok(job);
                    }
                }
            }
        }

        // Every record is durable remotely; only now may local data go.
        for kind in RecordKind::ALL {
            self.cache.clear(user, kind).await?;
        }
        job.status = MigrationStatus::Completed;
        info!(job_id = %job.id, %user, copied = job.copied, "migration completed");
        Ok(job)
    }
}
