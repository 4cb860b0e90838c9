//! In-process message log.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use gigconnect_shared::error::Result;
use gigconnect_shared::{ConversationId, Inbox, MessageId, MessagingError};
use tracing::debug;

use crate::message_store::{next_timestamp, MessageStore};
use crate::models::{Message, MessageDraft};

#[derive(Default)]
struct Log {
    /// Message `n` lives at index `n - 1`.
    messages: Vec<Message>,
    by_conversation: HashMap<ConversationId, Vec<usize>>,
}

impl Log {
    fn slot(&self, id: MessageId) -> Option<usize> {
        let idx = usize::try_from(id.0).ok()?.checked_sub(1)?;
        (idx < self.messages.len()).then_some(idx)
    }
}

/// [`MessageStore`] backed by a vector guarded by a read/write lock.
///
/// Identities are the 1-based position in the log, so they are strictly
/// increasing and gap-free.  Readers never block each other.
#[derive(Default)]
pub struct MemoryStore {
    log: RwLock<Log>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().map(|log| log.messages.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Log>> {
        self.log
            .read()
            .map_err(|_| MessagingError::StorageUnavailable("message log lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Log>> {
        self.log
            .write()
            .map_err(|_| MessagingError::StorageUnavailable("message log lock poisoned".into()))
    }
}

impl MessageStore for MemoryStore {
    fn append(&self, draft: MessageDraft) -> Result<Message> {
        let mut log = self.write()?;

        let id = MessageId(log.messages.len() as u64 + 1);
        let created_at = next_timestamp(log.messages.last().map(|m| m.created_at));
        let message = Message::from_draft(id, created_at, draft);

        let idx = log.messages.len();
        log.by_conversation
            .entry(message.conversation_id.clone())
            .or_default()
            .push(idx);
        log.messages.push(message.clone());

        debug!(message_id = %id, conversation = %message.conversation_id, "appended message");
        Ok(message)
    }

    fn get(&self, id: MessageId) -> Result<Message> {
        let log = self.read()?;
        log.slot(id)
            .map(|idx| log.messages[idx].clone())
            .ok_or(MessagingError::MessageNotFound(id))
    }

    fn list_by_conversation(&self, conversation_id: &ConversationId) -> Result<Vec<Message>> {
        let log = self.read()?;
        Ok(log
            .by_conversation
            .get(conversation_id)
            .map(|slots| slots.iter().map(|&idx| log.messages[idx].clone()).collect())
            .unwrap_or_default())
    }

    fn set_read(&self, id: MessageId) -> Result<bool> {
        let mut log = self.write()?;
        let idx = log.slot(id).ok_or(MessagingError::MessageNotFound(id))?;

        let message = &mut log.messages[idx];
        if message.read {
            return Ok(false);
        }
        message.read = true;
        Ok(true)
    }

    fn replay(&self) -> Result<Vec<Message>> {
        Ok(self.read()?.messages.clone())
    }

    fn count_unread(&self, inbox: Inbox) -> Result<u64> {
        let log = self.read()?;
        Ok(log
            .messages
            .iter()
            .filter(|m| !m.read && m.recipient_inbox() == inbox)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gigconnect_shared::{Role, UserId};

    use super::*;
    use crate::models::tests::draft;

    #[test]
    fn ids_are_strictly_increasing_and_gap_free() {
        let store = MemoryStore::new();
        let ids: Vec<u64> = (0..5)
            .map(|_| {
                store
                    .append(draft((1, Role::Freelancer), (2, Role::Establishment), "c1"))
                    .unwrap()
                    .id
                    .0
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn timestamps_follow_append_order() {
        let store = MemoryStore::new();
        for _ in 0..10 {
            store
                .append(draft((1, Role::Freelancer), (2, Role::Establishment), "c1"))
                .unwrap();
        }
        let all = store.replay().unwrap();
        assert!(all.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[test]
    fn list_by_conversation_filters_and_keeps_order() {
        let store = MemoryStore::new();
        store
            .append(draft((1, Role::Freelancer), (2, Role::Establishment), "c1"))
            .unwrap();
        store
            .append(draft((3, Role::Freelancer), (2, Role::Establishment), "c2"))
            .unwrap();
        store
            .append(draft((2, Role::Establishment), (1, Role::Freelancer), "c1"))
            .unwrap();

        let c1 = store.list_by_conversation(&"c1".into()).unwrap();
        assert_eq!(c1.iter().map(|m| m.id.0).collect::<Vec<_>>(), vec![1, 3]);
        assert!(store.list_by_conversation(&"nope".into()).unwrap().is_empty());
    }

    #[test]
    fn set_read_reports_transition_once() {
        let store = MemoryStore::new();
        let m = store
            .append(draft((1, Role::Freelancer), (2, Role::Establishment), "c1"))
            .unwrap();

        assert!(store.set_read(m.id).unwrap());
        assert!(!store.set_read(m.id).unwrap());
        assert!(store.get(m.id).unwrap().read);
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let store = MemoryStore::new();
        assert_eq!(
            store.set_read(MessageId(1)).unwrap_err(),
            MessagingError::MessageNotFound(MessageId(1))
        );
        assert!(store.get(MessageId(0)).unwrap_err().is_not_found());
    }

    #[test]
    fn count_unread_scans_recipient_inbox() {
        let store = MemoryStore::new();
        let m = store
            .append(draft((1, Role::Freelancer), (2, Role::Establishment), "c1"))
            .unwrap();
        store
            .append(draft((2, Role::Establishment), (1, Role::Freelancer), "c1"))
            .unwrap();

        let establishment = Inbox::new(UserId(2), Role::Establishment);
        assert_eq!(store.count_unread(establishment).unwrap(), 1);
        store.set_read(m.id).unwrap();
        assert_eq!(store.count_unread(establishment).unwrap(), 0);
        assert_eq!(
            store
                .count_unread(Inbox::new(UserId(1), Role::Freelancer))
                .unwrap(),
            1
        );
    }

    #[test]
    fn concurrent_appends_never_collide() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| {
                            store
                                .append(draft(
                                    (t, Role::Freelancer),
                                    (100, Role::Establishment),
                                    &format!("c{t}"),
                                ))
                                .unwrap()
                                .id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<MessageId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 400);
        assert_eq!(store.len(), 400);
    }
}
