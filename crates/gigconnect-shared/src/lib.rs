//! # gigconnect-shared
//!
//! Identifiers, roles, limits and the error taxonomy shared by every
//! Gigconnect crate.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{MessagingError, ParticipantsError};
pub use types::{ConversationId, Inbox, MessageId, Role, UserId};
