//! CRUD operations for [`Message`] records.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use gigconnect_shared::{ConversationId, Inbox, MessageId, Role, UserId};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Message, MessageDraft};

const MESSAGE_COLUMNS: &str = "id, conversation_id, from_id, from_name, from_role, \
     to_id, to_name, to_role, subject, body, created_at, is_read";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a draft and return the stored message with its assigned id.
    ///
    /// `created_at` is truncated to the microsecond precision of the stored
    /// column so the returned message matches what a later read yields.
    pub fn insert_message(&self, draft: MessageDraft, created_at: DateTime<Utc>) -> Result<Message> {
        let created_at = created_at.trunc_subsecs(6);
        self.conn().execute(
            "INSERT INTO messages (conversation_id, from_id, from_name, from_role,
                                   to_id, to_name, to_role, subject, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                draft.conversation_id.as_str(),
                user_id_to_sql(draft.from_id)?,
                draft.from_name,
                draft.from_role.as_str(),
                user_id_to_sql(draft.to_id)?,
                draft.to_name,
                draft.to_role.as_str(),
                draft.subject,
                draft.body,
                created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;

        let id = MessageId(self.conn().last_insert_rowid() as u64);
        Ok(Message::from_draft(id, created_at, draft))
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_message(&self, id: MessageId) -> Result<Message> {
        self.conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![message_id_to_sql(id)?],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// All messages of a conversation, oldest first.
    pub fn list_messages_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS}
             FROM messages
             WHERE conversation_id = ?1
             ORDER BY id ASC"
        ))?;

        let rows = stmt.query_map(params![conversation_id.as_str()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// The whole log, oldest first.
    pub fn list_all_messages(&self) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages ORDER BY id ASC"
        ))?;

        let rows = stmt.query_map([], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn count_unread_messages(&self, inbox: Inbox) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages
             WHERE to_id = ?1 AND to_role = ?2 AND is_read = 0",
            params![user_id_to_sql(inbox.user_id)?, inbox.role.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Creation time of the most recent message, if any.
    pub fn latest_message_time(&self) -> Result<Option<DateTime<Utc>>> {
        let ts: Option<String> = self
            .conn()
            .query_row(
                "SELECT created_at FROM messages ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match ts {
            Some(s) => Ok(Some(DateTime::parse_from_rfc3339(&s)?.with_timezone(&Utc))),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Mark a message read.  Returns `true` if this call flipped the flag,
    /// `false` if it was already read.
    pub fn mark_message_read(&self, id: MessageId) -> Result<bool> {
        let raw_id = message_id_to_sql(id)?;
        let affected = self.conn().execute(
            "UPDATE messages SET is_read = 1 WHERE id = ?1 AND is_read = 0",
            params![raw_id],
        )?;
        if affected > 0 {
            return Ok(true);
        }

        let exists: Option<i64> = self
            .conn()
            .query_row("SELECT 1 FROM messages WHERE id = ?1", params![raw_id], |row| {
                row.get(0)
            })
            .optional()?;

        match exists {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn user_id_to_sql(id: UserId) -> Result<i64> {
    i64::try_from(id.0).map_err(|_| StoreError::OutOfRange(id.0))
}

fn message_id_to_sql(id: MessageId) -> Result<i64> {
    // Ids above i64::MAX cannot exist in SQLite, so such a lookup is a miss.
    i64::try_from(id.0).map_err(|_| StoreError::NotFound)
}

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

/// Map a `rusqlite::Row` to a [`Message`].
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id: i64 = row.get(0)?;
    let conversation_id: String = row.get(1)?;
    let from_id: i64 = row.get(2)?;
    let from_name: String = row.get(3)?;
    let from_role: String = row.get(4)?;
    let to_id: i64 = row.get(5)?;
    let to_name: String = row.get(6)?;
    let to_role: String = row.get(7)?;
    let subject: Option<String> = row.get(8)?;
    let body: String = row.get(9)?;
    let ts_str: String = row.get(10)?;
    let is_read: bool = row.get(11)?;

    let from_role: Role = from_role.parse().map_err(|e| conversion_error(4, e))?;
    let to_role: Role = to_role.parse().map_err(|e| conversion_error(7, e))?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(10, e))?;

    Ok(Message {
        id: MessageId(id as u64),
        from_id: UserId(from_id as u64),
        from_name,
        from_role,
        to_id: UserId(to_id as u64),
        to_name,
        to_role,
        subject,
        body,
        created_at,
        read: is_read,
        conversation_id: ConversationId(conversation_id),
    })
}
