//! # gigconnect-messaging
//!
//! Turns individual message sends into threaded conversations between a
//! freelancer and an establishment, keeping per-recipient unread counters in
//! step with the message log.
//!
//! [`MessagingEngine`] composes a [`gigconnect_store::MessageStore`] (source
//! of truth) with a [`ConversationIndex`] (derived summaries).  Every send and
//! every read is applied to both under a per-conversation lock, so neither is
//! ever visible without the other.

pub mod conversation;
pub mod engine;
pub mod events;
pub mod index;

pub use conversation::{Conversation, ConversationThread, UnreadCounts};
pub use engine::MessagingEngine;
pub use events::MessagingEvent;
pub use index::ConversationIndex;
