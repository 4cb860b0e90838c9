use gigconnect_shared::{ConversationId, Inbox, MessageId};
use gigconnect_store::Message;
use serde::Serialize;

/// State changes published by the engine after they are applied.
///
/// Observers call [`crate::MessagingEngine::subscribe`] and receive every
/// event sent after that point.  A receiver that falls behind the channel
/// capacity sees `RecvError::Lagged` and should re-read engine state.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagingEvent {
    MessageSent {
        message: Message,
    },
    MessageRead {
        message_id: MessageId,
        conversation_id: ConversationId,
        inbox: Inbox,
        /// Unread messages left in `inbox` for this conversation.
        remaining_unread: u64,
    },
}

impl MessagingEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            MessagingEvent::MessageSent { .. } => "message_sent",
            MessagingEvent::MessageRead { .. } => "message_read",
        }
    }
}
