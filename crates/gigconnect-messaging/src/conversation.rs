//! Conversation summaries kept by the index.

use chrono::{DateTime, Utc};
use gigconnect_shared::{ConversationId, Inbox, MessageId, ParticipantsError, Role};
use gigconnect_store::{Message, Participants};
use serde::{Deserialize, Serialize};

/// Unread messages per recipient role.
///
/// Each side of a conversation has its own inbox, so a message only ever
/// counts against the role it was addressed to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnreadCounts {
    pub freelancer: u64,
    pub establishment: u64,
}

impl UnreadCounts {
    pub fn get(&self, role: Role) -> u64 {
        match role {
            Role::Freelancer => self.freelancer,
            Role::Establishment => self.establishment,
        }
    }

    fn slot(&mut self, role: Role) -> &mut u64 {
        match role {
            Role::Freelancer => &mut self.freelancer,
            Role::Establishment => &mut self.establishment,
        }
    }

    pub fn increment(&mut self, role: Role) {
        *self.slot(role) += 1;
    }

    /// Floored at zero.
    pub fn decrement(&mut self, role: Role) {
        let count = self.slot(role);
        *count = count.saturating_sub(1);
    }
}

/// Summary of every message exchanged under one conversation id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    /// Established by the first message; later messages must match it.
    pub participants: Participants,
    pub last_message: String,
    pub last_message_time: DateTime<Utc>,
    pub last_message_id: MessageId,
    pub unread: UnreadCounts,
    pub message_count: u64,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Start a conversation from its first message.
    pub(crate) fn open(message: &Message, participants: Participants) -> Self {
        Self {
            id: message.conversation_id.clone(),
            participants,
            last_message: message.body.clone(),
            last_message_time: message.created_at,
            last_message_id: message.id,
            unread: UnreadCounts::default(),
            message_count: 0,
            created_at: message.created_at,
        }
    }

    /// Reject a message whose sender/recipient pair differs from the one this
    /// conversation was opened with.
    pub fn ensure_same_pair(&self, candidate: &Participants) -> Result<(), ParticipantsError> {
        if self.participants.same_pair(candidate) {
            return Ok(());
        }
        Err(ParticipantsError::PairMismatch {
            conversation: self.id.clone(),
            expected_freelancer: self.participants.freelancer.id,
            expected_establishment: self.participants.establishment.id,
            freelancer: candidate.freelancer.id,
            establishment: candidate.establishment.id,
        })
    }

    pub(crate) fn apply_appended(&mut self, message: &Message) {
        self.last_message = message.body.clone();
        self.last_message_time = message.created_at;
        self.last_message_id = message.id;
        self.message_count += 1;
        if !message.read {
            self.unread.increment(message.to_role);
        }
    }

    pub(crate) fn apply_read(&mut self, message: &Message) {
        self.unread.decrement(message.to_role);
    }

    /// Unread messages waiting in `inbox`; zero if the inbox is not a
    /// participant.
    pub fn unread_for(&self, inbox: Inbox) -> u64 {
        if self.participants.includes(inbox) {
            self.unread.get(inbox.role)
        } else {
            0
        }
    }
}

/// A conversation summary together with its full message history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationThread {
    #[serde(flatten)]
    pub conversation: Conversation,
    /// Oldest first.
    pub messages: Vec<Message>,
}
