//! The storage seam of the messaging engine.

use chrono::{DateTime, Utc};
use gigconnect_shared::error::Result;
use gigconnect_shared::{ConversationId, Inbox, MessageId};

use crate::models::{Message, MessageDraft};

/// Append-only message log.
///
/// Implementations assign identity and creation time inside [`append`], and
/// must serialize identity assignment so ids never collide.  A failed append
/// leaves the log untouched.
///
/// [`append`]: MessageStore::append
pub trait MessageStore: Send + Sync {
    /// Store a draft and return the materialized message.
    fn append(&self, draft: MessageDraft) -> Result<Message>;

    /// Fetch one message.  Unknown ids yield `MessageNotFound`.
    fn get(&self, id: MessageId) -> Result<Message>;

    /// Every message of one conversation, in append order.
    fn list_by_conversation(&self, conversation_id: &ConversationId) -> Result<Vec<Message>>;

    /// Flip the read flag.  Returns `true` only on the call that performed the
    /// unread to read transition; repeated calls return `false`.
    fn set_read(&self, id: MessageId) -> Result<bool>;

    /// The whole log in append order.
    fn replay(&self) -> Result<Vec<Message>>;

    /// Count unread messages addressed to `inbox` by scanning the log.
    fn count_unread(&self, inbox: Inbox) -> Result<u64>;
}

/// Creation time for the next message: now, unless the clock stepped back
/// behind the previous message.
pub(crate) fn next_timestamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(prev) if prev > now => prev,
        _ => now,
    }
}
