use thiserror::Error;

use crate::types::{ConversationId, MessageId, Role, UserId};

/// Failures surfaced by the messaging engine. Every variant leaves the
/// message store and conversation index exactly as they were.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessagingError {
    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    #[error("Invalid participants: {0}")]
    InvalidParticipants(ParticipantsError),

    #[error("Invalid message: {0}")]
    InvalidDraft(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl MessagingError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MessagingError::MessageNotFound(_) | MessagingError::ConversationNotFound(_)
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParticipantsError {
    #[error("sender and recipient are both {0}")]
    SameRole(Role),

    #[error(
        "conversation {conversation} belongs to freelancer {expected_freelancer} and \
         establishment {expected_establishment}, not freelancer {freelancer} and \
         establishment {establishment}"
    )]
    PairMismatch {
        conversation: ConversationId,
        expected_freelancer: UserId,
        expected_establishment: UserId,
        freelancer: UserId,
        establishment: UserId,
    },
}

impl From<ParticipantsError> for MessagingError {
    fn from(e: ParticipantsError) -> Self {
        MessagingError::InvalidParticipants(e)
    }
}

pub type Result<T> = std::result::Result<T, MessagingError>;
