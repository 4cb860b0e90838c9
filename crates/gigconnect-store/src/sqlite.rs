//! [`MessageStore`] persisted in SQLite.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use gigconnect_shared::error::Result;
use gigconnect_shared::{ConversationId, Inbox, MessageId, MessagingError};
use tracing::{debug, info};

use crate::database::Database;
use crate::error::StoreError;
use crate::message_store::{next_timestamp, MessageStore};
use crate::models::{Message, MessageDraft};

struct Inner {
    db: Database,
    last_created_at: Option<DateTime<Utc>>,
}

/// Durable message log.
///
/// `rusqlite::Connection` is not `Sync`, so the connection sits behind a
/// mutex.  That mutex also serializes id assignment.
pub struct SqliteStore {
    inner: Mutex<Inner>,
}

impl SqliteStore {
    pub fn new(db: Database) -> std::result::Result<Self, StoreError> {
        let last_created_at = db.latest_message_time()?;
        info!(
            path = ?db.path(),
            resumed = last_created_at.is_some(),
            "sqlite message store ready"
        );
        Ok(Self {
            inner: Mutex::new(Inner {
                db,
                last_created_at,
            }),
        })
    }

    pub fn open_at(path: &Path) -> std::result::Result<Self, StoreError> {
        Self::new(Database::open_at(path)?)
    }

    /// Open the database in the platform data directory.
    pub fn open_default() -> std::result::Result<Self, StoreError> {
        Self::new(Database::new()?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Poisoned.into())
    }
}

/// Translate a row-level miss into the id the caller asked for.
fn not_found_as(id: MessageId) -> impl FnOnce(StoreError) -> MessagingError {
    move |e| match e {
        StoreError::NotFound => MessagingError::MessageNotFound(id),
        other => other.into(),
    }
}

impl MessageStore for SqliteStore {
    fn append(&self, draft: MessageDraft) -> Result<Message> {
        let mut inner = self.lock()?;

        let created_at = next_timestamp(inner.last_created_at);
        let message = inner.db.insert_message(draft, created_at)?;
        inner.last_created_at = Some(message.created_at);

        debug!(message_id = %message.id, conversation = %message.conversation_id, "persisted message");
        Ok(message)
    }

    fn get(&self, id: MessageId) -> Result<Message> {
        self.lock()?.db.get_message(id).map_err(not_found_as(id))
    }

    fn list_by_conversation(&self, conversation_id: &ConversationId) -> Result<Vec<Message>> {
        Ok(self.lock()?.db.list_messages_for_conversation(conversation_id)?)
    }

    fn set_read(&self, id: MessageId) -> Result<bool> {
        self.lock()?.db.mark_message_read(id).map_err(not_found_as(id))
    }

    fn replay(&self) -> Result<Vec<Message>> {
        Ok(self.lock()?.db.list_all_messages()?)
    }

    fn count_unread(&self, inbox: Inbox) -> Result<u64> {
        Ok(self.lock()?.db.count_unread_messages(inbox)?)
    }
}
