pub mod error;
pub mod types;

pub use error::{Result, StoreError};
pub use types::{
    Cursor, LocalRecordId, Page, RecordDraft, RecordKind, RecordPayload, RecordRef,
    RemoteRecordId, RoutineStep, StoredRecord, UserId, UserIdentity,
};
