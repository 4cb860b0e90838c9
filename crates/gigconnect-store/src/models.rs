//! Domain model structs stored in the message log.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer.

use chrono::{DateTime, Utc};
use gigconnect_shared::{ConversationId, Inbox, MessageId, ParticipantsError, Role, UserId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// A message as submitted by a caller, before the store assigns identity and
/// creation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageDraft {
    pub from_id: UserId,
    pub from_name: String,
    pub from_role: Role,
    pub to_id: UserId,
    pub to_name: String,
    pub to_role: Role,
    /// Optional subject line.
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
    /// Caller-supplied conversation key.
    pub conversation_id: ConversationId,
}

impl MessageDraft {
    /// Resolve which side of the draft fills the freelancer slot and which
    /// fills the establishment slot.
    pub fn participants(&self) -> Result<Participants, ParticipantsError> {
        Participants::resolve(
            (self.from_id, self.from_name.as_str(), self.from_role),
            (self.to_id, self.to_name.as_str(), self.to_role),
        )
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single stored message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Store-assigned identity.
    pub id: MessageId,
    pub from_id: UserId,
    pub from_name: String,
    pub from_role: Role,
    pub to_id: UserId,
    pub to_name: String,
    pub to_role: Role,
    pub subject: Option<String>,
    pub body: String,
    /// Assigned at append time; never earlier than the previous message.
    pub created_at: DateTime<Utc>,
    /// One-way flag, false until the recipient reads the message.
    pub read: bool,
    pub conversation_id: ConversationId,
}

impl Message {
    /// Materialize a draft with the identity and time chosen by a store.
    pub fn from_draft(id: MessageId, created_at: DateTime<Utc>, draft: MessageDraft) -> Self {
        Self {
            id,
            from_id: draft.from_id,
            from_name: draft.from_name,
            from_role: draft.from_role,
            to_id: draft.to_id,
            to_name: draft.to_name,
            to_role: draft.to_role,
            subject: draft.subject,
            body: draft.body,
            created_at,
            read: false,
            conversation_id: draft.conversation_id,
        }
    }

    /// The inbox this message is counted against while unread.
    pub fn recipient_inbox(&self) -> Inbox {
        Inbox::new(self.to_id, self.to_role)
    }

    pub fn sender_inbox(&self) -> Inbox {
        Inbox::new(self.from_id, self.from_role)
    }

    pub fn participants(&self) -> Result<Participants, ParticipantsError> {
        Participants::resolve(
            (self.from_id, self.from_name.as_str(), self.from_role),
            (self.to_id, self.to_name.as_str(), self.to_role),
        )
    }
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

/// One side of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub id: UserId,
    pub name: String,
}

/// The freelancer/establishment pair a conversation belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participants {
    pub freelancer: Participant,
    pub establishment: Participant,
}

impl Participants {
    fn resolve(
        from: (UserId, &str, Role),
        to: (UserId, &str, Role),
    ) -> Result<Self, ParticipantsError> {
        if to.2 != from.2.counterpart() {
            return Err(ParticipantsError::SameRole(from.2));
        }

        let (freelancer, establishment) = match from.2 {
            Role::Freelancer => (from, to),
            Role::Establishment => (to, from),
        };

        Ok(Self {
            freelancer: Participant {
                id: freelancer.0,
                name: freelancer.1.to_string(),
            },
            establishment: Participant {
                id: establishment.0,
                name: establishment.1.to_string(),
            },
        })
    }

    /// Same pair of users, ignoring display names.
    pub fn same_pair(&self, other: &Participants) -> bool {
        self.freelancer.id == other.freelancer.id
            && self.establishment.id == other.establishment.id
    }

    /// The participant acting in `role`.
    pub fn get(&self, role: Role) -> &Participant {
        match role {
            Role::Freelancer => &self.freelancer,
            Role::Establishment => &self.establishment,
        }
    }

    pub fn includes(&self, inbox: Inbox) -> bool {
        self.get(inbox.role).id == inbox.user_id
    }

    pub fn inboxes(&self) -> [Inbox; 2] {
        [
            Inbox::new(self.freelancer.id, Role::Freelancer),
            Inbox::new(self.establishment.id, Role::Establishment),
        ]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn draft(from: (u64, Role), to: (u64, Role), conversation: &str) -> MessageDraft {
        MessageDraft {
            from_id: UserId(from.0),
            from_name: format!("user-{}", from.0),
            from_role: from.1,
            to_id: UserId(to.0),
            to_name: format!("user-{}", to.0),
            to_role: to.1,
            subject: None,
            body: "hello".to_string(),
            conversation_id: ConversationId::new(conversation),
        }
    }

    #[test]
    fn participants_resolve_regardless_of_direction() {
        let a = draft((1, Role::Freelancer), (2, Role::Establishment), "c1")
            .participants()
            .unwrap();
        let b = draft((2, Role::Establishment), (1, Role::Freelancer), "c1")
            .participants()
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(a.freelancer.id, UserId(1));
        assert_eq!(a.establishment.id, UserId(2));
        assert_eq!(a.freelancer.name, "user-1");
    }

    #[test]
    fn participants_reject_same_role() {
        let err = draft((1, Role::Freelancer), (2, Role::Freelancer), "c1")
            .participants()
            .unwrap_err();
        assert_eq!(err, ParticipantsError::SameRole(Role::Freelancer));
    }

    #[test]
    fn same_pair_ignores_names() {
        let a = draft((1, Role::Freelancer), (2, Role::Establishment), "c1")
            .participants()
            .unwrap();
        let mut renamed = a.clone();
        renamed.freelancer.name = "Renamed".into();
        assert!(a.same_pair(&renamed));

        let other = draft((3, Role::Freelancer), (2, Role::Establishment), "c1")
            .participants()
            .unwrap();
        assert!(!a.same_pair(&other));
    }

    #[test]
    fn message_from_draft_starts_unread() {
        let d = draft((1, Role::Freelancer), (2, Role::Establishment), "c1");
        let m = Message::from_draft(MessageId(1), Utc::now(), d);
        assert!(!m.read);
        assert_eq!(m.recipient_inbox(), Inbox::new(UserId(2), Role::Establishment));
        assert_eq!(m.sender_inbox(), Inbox::new(UserId(1), Role::Freelancer));
    }

    #[test]
    fn draft_subject_defaults_to_none() {
        let json = r#"{
            "from_id": 1, "from_name": "Ana", "from_role": "freelancer",
            "to_id": 2, "to_name": "Cafe", "to_role": "establishment",
            "body": "hi", "conversation_id": "f1-e2"
        }"#;
        let d: MessageDraft = serde_json::from_str(json).unwrap();
        assert_eq!(d.subject, None);
        assert_eq!(d.conversation_id.as_str(), "f1-e2");
    }
}
