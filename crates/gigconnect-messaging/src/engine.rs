//! The messaging engine: send, mark-read and the read path.

use std::sync::Arc;

use gigconnect_shared::constants::{
    DEFAULT_EVENT_BUFFER, MAX_MESSAGE_BODY_LEN, MAX_SUBJECT_LEN, MAX_USER_ID,
};
use gigconnect_shared::error::Result;
use gigconnect_shared::{ConversationId, Inbox, MessageId, MessagingError, Role, UserId};
use gigconnect_store::{Message, MessageDraft, MessageStore};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::conversation::{Conversation, ConversationThread};
use crate::events::MessagingEvent;
use crate::index::{lock_slot, ConversationIndex};

/// Composes a message store with the conversation index derived from it.
///
/// Sends and reads for one conversation are serialized on that
/// conversation's slot lock, which is held across the store write and the
/// index update so the two are never observed out of step.  Different
/// conversations proceed in parallel.
pub struct MessagingEngine {
    store: Arc<dyn MessageStore>,
    index: ConversationIndex,
    events: broadcast::Sender<MessagingEvent>,
}

impl MessagingEngine {
    /// Open an engine over `store`, rebuilding the index from its log.
    pub fn open(store: Arc<dyn MessageStore>) -> Result<Self> {
        Self::open_with_event_buffer(store, DEFAULT_EVENT_BUFFER)
    }

    pub fn open_with_event_buffer(store: Arc<dyn MessageStore>, capacity: usize) -> Result<Self> {
        let log = store.replay()?;
        let replayed = log.len();
        let index = ConversationIndex::rebuild(log)?;

        info!(
            messages = replayed,
            conversations = index.len(),
            "messaging engine ready"
        );

        let (events, _) = broadcast::channel(capacity.max(1));
        Ok(Self {
            store,
            index,
            events,
        })
    }

    /// Store a message and fold it into its conversation.
    ///
    /// Fails with `InvalidParticipants` if both sides share a role or the
    /// conversation id already belongs to another freelancer/establishment
    /// pair, and with `InvalidDraft` for an empty conversation id, an empty
    /// body, or oversized fields.  On any error nothing is stored.
    pub fn send_message(&self, draft: MessageDraft) -> Result<Message> {
        validate_draft(&draft)?;
        let participants = draft.participants()?;

        let conversation_id = draft.conversation_id.clone();
        let slot = self.index.reserve(&conversation_id)?;
        let mut entry = lock_slot(&slot)?;

        if let Some(conversation) = entry.as_ref() {
            conversation.ensure_same_pair(&participants)?;
        }

        let message = match self.store.append(draft) {
            Ok(message) => message,
            Err(e) => {
                let vacant = entry.is_none();
                drop(entry);
                if vacant {
                    self.index.release_vacant(&conversation_id, slot);
                }
                warn!(conversation = %conversation_id, error = %e, "append failed");
                return Err(e);
            }
        };
        self.index.on_message_appended(&mut entry, &message, participants);
        drop(entry);

        info!(
            message_id = %message.id,
            conversation = %message.conversation_id,
            from = %message.sender_inbox(),
            to = %message.recipient_inbox(),
            "message sent"
        );

        self.publish(MessagingEvent::MessageSent {
            message: message.clone(),
        });
        Ok(message)
    }

    /// Mark a message read.  Repeating the call is a no-op; the recipient's
    /// unread counter drops exactly once.
    pub fn mark_as_read(&self, id: MessageId) -> Result<Message> {
        let mut message = self.store.get(id)?;

        let slot = self
            .index
            .slot(&message.conversation_id)?
            .ok_or_else(|| MessagingError::ConversationNotFound(message.conversation_id.clone()))?;
        let mut entry = lock_slot(&slot)?;

        let transitioned = self.store.set_read(id)?;
        message.read = true;
        if !transitioned {
            debug!(message_id = %id, "message already read");
            return Ok(message);
        }

        self.index.on_message_read(&mut entry, &message);
        let inbox = message.recipient_inbox();
        let remaining_unread = entry.as_ref().map_or(0, |c| c.unread_for(inbox));
        drop(entry);

        info!(
            message_id = %id,
            conversation = %message.conversation_id,
            inbox = %inbox,
            remaining_unread,
            "message read"
        );

        self.publish(MessagingEvent::MessageRead {
            message_id: id,
            conversation_id: message.conversation_id.clone(),
            inbox,
            remaining_unread,
        });
        Ok(message)
    }

    /// A conversation with its messages, or `None` if nothing was ever sent
    /// under `id`.
    pub fn get_conversation(&self, id: &ConversationId) -> Result<Option<ConversationThread>> {
        let Some(slot) = self.index.slot(id)? else {
            return Ok(None);
        };
        let entry = lock_slot(&slot)?;
        let Some(conversation) = entry.as_ref() else {
            return Ok(None);
        };

        let messages = self.store.list_by_conversation(id)?;
        let thread = ConversationThread {
            conversation: conversation.clone(),
            messages,
        };
        Ok(Some(thread))
    }

    /// Summary only, without loading messages.
    pub fn get_conversation_summary(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        self.index.get(id)
    }

    /// Every message of a conversation in send order.
    pub fn list_messages(&self, id: &ConversationId) -> Result<Vec<Message>> {
        self.store.list_by_conversation(id)
    }

    /// Messages addressed to `(user_id, role)` that are still unread.
    pub fn get_unread_count(&self, user_id: UserId, role: Role) -> Result<u64> {
        self.index.unread_for(Inbox::new(user_id, role))
    }

    /// The user's conversations, most recently active first.
    pub fn list_conversations(&self, user_id: UserId, role: Role) -> Result<Vec<Conversation>> {
        self.index.list_for(Inbox::new(user_id, role))
    }

    /// Receive every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<MessagingEvent> {
        self.events.subscribe()
    }

    pub fn conversation_count(&self) -> usize {
        self.index.len()
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    fn publish(&self, event: MessagingEvent) {
        let kind = event.kind();
        if self.events.send(event).is_err() {
            trace!(kind, "no event subscribers");
        }
    }
}

fn validate_draft(draft: &MessageDraft) -> Result<()> {
    if draft.conversation_id.is_empty() {
        return Err(MessagingError::InvalidDraft(
            "conversation id must not be empty".into(),
        ));
    }
    for id in [draft.from_id, draft.to_id] {
        if id.0 > MAX_USER_ID {
            return Err(MessagingError::InvalidDraft(format!(
                "user id {id} is out of range (max {MAX_USER_ID})"
            )));
        }
    }
    if draft.body.trim().is_empty() {
        return Err(MessagingError::InvalidDraft(
            "message body must not be empty".into(),
        ));
    }
    if draft.body.len() > MAX_MESSAGE_BODY_LEN {
        return Err(MessagingError::InvalidDraft(format!(
            "message body is {} bytes (max {MAX_MESSAGE_BODY_LEN})",
            draft.body.len()
        )));
    }
    if let Some(subject) = &draft.subject {
        if subject.len() > MAX_SUBJECT_LEN {
            return Err(MessagingError::InvalidDraft(format!(
                "subject is {} bytes (max {MAX_SUBJECT_LEN})",
                subject.len()
            )));
        }
    }
    Ok(())
}
