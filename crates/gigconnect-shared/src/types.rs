use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{ESTABLISHMENT_KEY_PREFIX, FREELANCER_KEY_PREFIX};

/// Marketplace user identity, as issued by the identity collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned message identity. Strictly increasing, never reused.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl MessageId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-supplied key grouping every message between one freelancer and
/// one establishment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Canonical key for a freelancer/establishment pair.
    ///
    /// The engine never derives keys itself; this helper exists so callers
    /// have one deterministic choice that does not depend on who writes first.
    pub fn for_pair(freelancer: UserId, establishment: UserId) -> Self {
        Self(format!(
            "{FREELANCER_KEY_PREFIX}{}-{ESTABLISHMENT_KEY_PREFIX}{}",
            freelancer.0, establishment.0
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Which side of the marketplace a user acts on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Freelancer,
    Establishment,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Freelancer => "freelancer",
            Role::Establishment => "establishment",
        }
    }

    /// The role on the other side of every message.
    pub fn counterpart(self) -> Self {
        match self {
            Role::Freelancer => Role::Establishment,
            Role::Establishment => Role::Freelancer,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "freelancer" => Ok(Role::Freelancer),
            "establishment" => Ok(Role::Establishment),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// One user's inbox: the pair the unread counters are keyed by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inbox {
    pub user_id: UserId,
    pub role: Role,
}

impl Inbox {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}

impl fmt::Display for Inbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.role, self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("freelancer".parse::<Role>().unwrap(), Role::Freelancer);
        assert_eq!("Establishment".parse::<Role>().unwrap(), Role::Establishment);
        assert!("admin".parse::<Role>().is_err());
        assert_eq!(Role::Freelancer.to_string(), "freelancer");
    }

    #[test]
    fn test_role_counterpart() {
        assert_eq!(Role::Freelancer.counterpart(), Role::Establishment);
        assert_eq!(Role::Establishment.counterpart(), Role::Freelancer);
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&Role::Establishment).unwrap();
        assert_eq!(json, "\"establishment\"");
        let role: Role = serde_json::from_str("\"freelancer\"").unwrap();
        assert_eq!(role, Role::Freelancer);
    }

    #[test]
    fn test_conversation_key_for_pair() {
        let key = ConversationId::for_pair(UserId(7), UserId(42));
        assert_eq!(key.as_str(), "f7-e42");
        assert_eq!(key, ConversationId::for_pair(UserId(7), UserId(42)));
        assert_ne!(key, ConversationId::for_pair(UserId(42), UserId(7)));
    }

    #[test]
    fn test_blank_conversation_id_is_empty() {
        assert!(ConversationId::new("   ").is_empty());
        assert!(!ConversationId::new("c1").is_empty());
    }
}
