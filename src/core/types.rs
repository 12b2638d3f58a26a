use super::{Result, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identity
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Created at first sign-in, immutable thereafter. Owned by the subscription
/// tracker; other components hold only the `UserId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub contact: String,
}

impl UserIdentity {
    pub fn new(contact: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            contact: contact.into(),
        }
    }
}

// ============================================================================
// Record kinds and payloads
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Schedule,
    Entry,
    Routine,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::Schedule, RecordKind::Entry, RecordKind::Routine];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Schedule => "schedule",
            RecordKind::Entry => "entry",
            RecordKind::Routine => "routine",
        }
    }

    /// Only schedules and routines carry an active flag.
    pub fn supports_active(&self) -> bool {
        !matches!(self, RecordKind::Entry)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineStep {
    pub name: String,
    pub minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordPayload {
    Schedule {
        title: String,
        slots: Vec<String>,
        active: bool,
    },
    Entry {
        note: String,
        score: Option<u8>,
        /// Free-form questionnaire answers captured with the entry.
        details: serde_json::Value,
    },
    Routine {
        title: String,
        steps: Vec<RoutineStep>,
        active: bool,
    },
}

impl RecordPayload {
    pub fn schedule(title: impl Into<String>, slots: Vec<String>) -> Self {
        RecordPayload::Schedule {
            title: title.into(),
            slots,
            active: false,
        }
    }

    pub fn entry(note: impl Into<String>, score: Option<u8>) -> Self {
        RecordPayload::Entry {
            note: note.into(),
            score,
            details: serde_json::Value::Null,
        }
    }

    pub fn routine(title: impl Into<String>, steps: Vec<RoutineStep>) -> Self {
        RecordPayload::Routine {
            title: title.into(),
            steps,
            active: false,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            RecordPayload::Schedule { .. } => RecordKind::Schedule,
            RecordPayload::Entry { .. } => RecordKind::Entry,
            RecordPayload::Routine { .. } => RecordKind::Routine,
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            RecordPayload::Schedule { active, .. } | RecordPayload::Routine { active, .. } => {
                *active
            }
            RecordPayload::Entry { .. } => false,
        }
    }

    pub(crate) fn set_active(&mut self, on: bool) -> Result<()> {
        match self {
            RecordPayload::Schedule { active, .. } | RecordPayload::Routine { active, .. } => {
                *active = on;
                Ok(())
            }
            RecordPayload::Entry { .. } => Err(StoreError::UnsupportedOperation(
                "entries carry no active flag".to_string(),
            )),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// A record as submitted by the UI, before either store has assigned it an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDraft {
    pub owner: UserId,
    pub created_at: DateTime<Utc>,
    pub payload: RecordPayload,
}

impl RecordDraft {
    pub fn new(owner: UserId, payload: RecordPayload) -> Self {
        Self {
            owner,
            created_at: Utc::now(),
            payload,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.payload.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalRecordId(Uuid);

impl LocalRecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LocalRecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteRecordId(Uuid);

impl RemoteRecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RemoteRecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RemoteRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "remote-{}", self.0)
    }
}

/// Where a record lives. The two id namespaces are deliberately distinct
/// types: callers must not assume a local ref stays valid after migration or
/// compare refs across the two paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum RecordRef {
    Local(LocalRecordId),
    Remote(RemoteRecordId),
}

impl RecordRef {
    pub fn is_local(&self) -> bool {
        matches!(self, RecordRef::Local(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, RecordRef::Remote(_))
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordRef::Local(id) => write!(f, "{id}"),
            RecordRef::Remote(id) => write!(f, "{id}"),
        }
    }
}

/// A record as returned by `load`, from either path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordRef,
    pub owner: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub payload: RecordPayload,
}

impl StoredRecord {
    pub fn kind(&self) -> RecordKind {
        self.payload.kind()
    }

    pub fn is_active(&self) -> bool {
        self.payload.is_active()
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// Opaque continuation token. Pass it back unchanged to fetch the next page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor(String);

impl Cursor {
    pub(crate) fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<StoredRecord>,
    pub next_cursor: Option<Cursor>,
}
