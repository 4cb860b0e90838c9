//! Derived per-conversation summaries.
//!
//! The index holds one slot per conversation id.  A slot is an
//! `Arc<Mutex<Option<Conversation>>>`: the outer map lock is only held long
//! enough to find or insert the slot, and all per-conversation work happens
//! under the slot's own mutex so unrelated conversations never wait on each
//! other.  A slot stays `None` until its first message is appended, so a
//! reserved-but-empty slot is invisible to readers.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use gigconnect_shared::error::Result;
use gigconnect_shared::{ConversationId, Inbox, MessagingError};
use gigconnect_store::{Message, Participants};
use tracing::{debug, warn};

use crate::conversation::Conversation;

pub(crate) type Slot = Arc<Mutex<Option<Conversation>>>;

#[derive(Default)]
pub struct ConversationIndex {
    slots: RwLock<HashMap<ConversationId, Slot>>,
    /// Conversations each inbox takes part in.
    memberships: RwLock<HashMap<Inbox, BTreeSet<ConversationId>>>,
    /// Slots that hold a conversation. Read without touching any slot lock.
    opened: AtomicUsize,
}

fn poisoned() -> MessagingError {
    MessagingError::StorageUnavailable("conversation index lock poisoned".into())
}

pub(crate) fn lock_slot(slot: &Slot) -> Result<MutexGuard<'_, Option<Conversation>>> {
    slot.lock().map_err(|_| poisoned())
}

impl ConversationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index by replaying a message log in append order.
    pub fn rebuild(messages: impl IntoIterator<Item = Message>) -> Result<Self> {
        let index = Self::new();
        let mut replayed = 0usize;

        for message in messages {
            let slot = index.reserve(&message.conversation_id)?;
            let mut entry = lock_slot(&slot)?;

            let participants = message.participants()?;
            if let Some(conversation) = entry.as_ref() {
                conversation.ensure_same_pair(&participants)?;
            }
            index.on_message_appended(&mut entry, &message, participants);
            replayed += 1;
        }

        debug!(
            messages = replayed,
            conversations = index.len(),
            "conversation index rebuilt"
        );
        Ok(index)
    }

    /// Find the slot for `id`, inserting an empty one if needed.
    pub(crate) fn reserve(&self, id: &ConversationId) -> Result<Slot> {
        if let Some(slot) = self.slots.read().map_err(|_| poisoned())?.get(id) {
            return Ok(slot.clone());
        }
        let mut slots = self.slots.write().map_err(|_| poisoned())?;
        Ok(slots.entry(id.clone()).or_default().clone())
    }

    pub(crate) fn slot(&self, id: &ConversationId) -> Result<Option<Slot>> {
        Ok(self.slots.read().map_err(|_| poisoned())?.get(id).cloned())
    }

    /// Drop a slot reserved for a send that never reached the log.
    ///
    /// The caller must have released its guard on `slot`.  The slot is only
    /// removed while it is still vacant and nobody else holds a handle to
    /// it, so a sender queued on the same id keeps a slot that stays mapped.
    pub(crate) fn release_vacant(&self, id: &ConversationId, slot: Slot) {
        let Ok(mut slots) = self.slots.write() else {
            warn!(conversation = %id, "conversation index lock poisoned, keeping vacant slot");
            return;
        };

        let mapped = slots.get(id).is_some_and(|s| Arc::ptr_eq(s, &slot));
        // One handle in the map, one held by the caller.
        let unshared = Arc::strong_count(&slot) == 2;
        if mapped && unshared && lock_slot(&slot).map(|c| c.is_none()).unwrap_or(false) {
            slots.remove(id);
        }
    }

    /// Fold a freshly stored message into its conversation, opening the
    /// conversation if this is its first message.  The caller holds the
    /// conversation's slot lock and has already checked `participants`
    /// against it.  Never fails: the message is already in the log.
    pub(crate) fn on_message_appended(
        &self,
        entry: &mut Option<Conversation>,
        message: &Message,
        participants: Participants,
    ) {
        if let Some(conversation) = entry.as_mut() {
            conversation.apply_appended(message);
        } else {
            let mut memberships = self.write_memberships();
            for inbox in participants.inboxes() {
                memberships
                    .entry(inbox)
                    .or_default()
                    .insert(message.conversation_id.clone());
            }
            drop(memberships);

            let mut conversation = Conversation::open(message, participants);
            conversation.apply_appended(message);
            *entry = Some(conversation);
            self.opened.fetch_add(1, Ordering::Relaxed);
        }

        // Messages replayed from a log may already be read.
        if message.read {
            if let Some(conversation) = entry.as_mut() {
                conversation.apply_read(message);
            }
        }
    }

    /// Account for a message's unread to read transition.  Must only be called
    /// once per message, on the call that actually flipped the flag.
    pub(crate) fn on_message_read(&self, entry: &mut Option<Conversation>, message: &Message) {
        if let Some(conversation) = entry.as_mut() {
            conversation.apply_read(message);
        }
    }

    /// Snapshot of one conversation summary.
    pub fn get(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        let Some(slot) = self.slot(id)? else {
            return Ok(None);
        };
        let conversation = lock_slot(&slot)?.clone();
        Ok(conversation)
    }

    /// Conversations `inbox` participates in, most recently active first.
    /// Ties on time are broken by conversation id, ascending.
    pub fn list_for(&self, inbox: Inbox) -> Result<Vec<Conversation>> {
        let mut conversations = Vec::new();
        for id in self.conversation_ids_for(inbox)? {
            if let Some(conversation) = self.get(&id)? {
                conversations.push(conversation);
            }
        }

        conversations.sort_by(|a, b| {
            b.last_message_time
                .cmp(&a.last_message_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(conversations)
    }

    /// Sum of `inbox`'s unread counters across its conversations.
    pub fn unread_for(&self, inbox: Inbox) -> Result<u64> {
        let mut total = 0;
        for id in self.conversation_ids_for(inbox)? {
            if let Some(slot) = self.slot(&id)? {
                if let Some(conversation) = lock_slot(&slot)?.as_ref() {
                    total += conversation.unread_for(inbox);
                }
            }
        }
        Ok(total)
    }

    /// Number of conversations holding at least one message.
    pub fn len(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the membership set out so no slot is locked while the
    /// membership lock is held.
    fn conversation_ids_for(&self, inbox: Inbox) -> Result<Vec<ConversationId>> {
        let memberships = self.read_memberships();
        Ok(memberships
            .get(&inbox)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default())
    }

    // Membership sets only change through single inserts, so a poisoned
    // lock still guards a consistent map.
    fn read_memberships(&self) -> RwLockReadGuard<'_, HashMap<Inbox, BTreeSet<ConversationId>>> {
        self.memberships.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_memberships(&self) -> RwLockWriteGuard<'_, HashMap<Inbox, BTreeSet<ConversationId>>> {
        self.memberships.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use gigconnect_shared::{MessageId, ParticipantsError, Role, UserId};
    use gigconnect_store::MessageDraft;

    use super::*;

    fn message(id: u64, from: (u64, Role), to: (u64, Role), conversation: &str) -> Message {
        let draft = MessageDraft {
            from_id: UserId(from.0),
            from_name: format!("user-{}", from.0),
            from_role: from.1,
            to_id: UserId(to.0),
            to_name: format!("user-{}", to.0),
            to_role: to.1,
            subject: None,
            body: format!("body {id}"),
            conversation_id: ConversationId::new(conversation),
        };
        Message::from_draft(MessageId(id), Utc::now(), draft)
    }

    fn append(index: &ConversationIndex, message: &Message) {
        let slot = index.reserve(&message.conversation_id).unwrap();
        let mut entry = lock_slot(&slot).unwrap();
        let participants = message.participants().unwrap();
        index.on_message_appended(&mut entry, message, participants);
    }

    fn read(index: &ConversationIndex, message: &Message) {
        let slot = index.slot(&message.conversation_id).unwrap().unwrap();
        let mut entry = lock_slot(&slot).unwrap();
        index.on_message_read(&mut entry, message);
    }

    const F1: (u64, Role) = (1, Role::Freelancer);
    const E2: (u64, Role) = (2, Role::Establishment);

    #[test]
    fn first_message_opens_conversation_with_resolved_slots() {
        let index = ConversationIndex::new();
        append(&index, &message(1, E2, F1, "c1"));

        let conversation = index.get(&"c1".into()).unwrap().unwrap();
        assert_eq!(conversation.participants.freelancer.id, UserId(1));
        assert_eq!(conversation.participants.establishment.id, UserId(2));
        assert_eq!(conversation.last_message, "body 1");
        assert_eq!(conversation.unread.freelancer, 1);
        assert_eq!(conversation.unread.establishment, 0);
        assert_eq!(conversation.message_count, 1);
    }

    #[test]
    fn unread_is_tracked_per_recipient_role() {
        let index = ConversationIndex::new();
        let first = message(1, F1, E2, "c1");
        let second = message(2, E2, F1, "c1");
        append(&index, &first);
        append(&index, &second);

        let f1 = Inbox::new(UserId(1), Role::Freelancer);
        let e2 = Inbox::new(UserId(2), Role::Establishment);
        assert_eq!(index.unread_for(f1).unwrap(), 1);
        assert_eq!(index.unread_for(e2).unwrap(), 1);

        read(&index, &second);
        assert_eq!(index.unread_for(f1).unwrap(), 0);
        assert_eq!(index.unread_for(e2).unwrap(), 1);

        let conversation = index.get(&"c1".into()).unwrap().unwrap();
        assert_eq!(conversation.last_message, "body 2");
        assert_eq!(conversation.last_message_id, MessageId(2));
    }

    #[test]
    fn read_never_drops_below_zero() {
        let index = ConversationIndex::new();
        let m = message(1, F1, E2, "c1");
        append(&index, &m);
        read(&index, &m);
        read(&index, &m);

        let conversation = index.get(&"c1".into()).unwrap().unwrap();
        assert_eq!(conversation.unread.establishment, 0);
    }

    #[test]
    fn unknown_conversation_is_absent() {
        let index = ConversationIndex::new();
        index.reserve(&"reserved".into()).unwrap();
        assert!(index.get(&"missing".into()).unwrap().is_none());
        assert!(index.get(&"reserved".into()).unwrap().is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn listing_orders_by_recency_then_id() {
        let index = ConversationIndex::new();
        let base = Utc::now();

        let mut older = message(1, F1, (3, Role::Establishment), "b");
        older.created_at = base;
        let mut tie_b = message(2, F1, E2, "z");
        tie_b.created_at = base + Duration::seconds(5);
        let mut tie_a = message(3, F1, (4, Role::Establishment), "a");
        tie_a.created_at = base + Duration::seconds(5);

        for m in [&older, &tie_b, &tie_a] {
            append(&index, m);
        }

        let ids: Vec<String> = index
            .list_for(Inbox::new(UserId(1), Role::Freelancer))
            .unwrap()
            .into_iter()
            .map(|c| c.id.0)
            .collect();
        assert_eq!(ids, vec!["a", "z", "b"]);

        let establishment_view = index
            .list_for(Inbox::new(UserId(2), Role::Establishment))
            .unwrap();
        assert_eq!(establishment_view.len(), 1);
    }

    #[test]
    fn rebuild_replays_read_flags() {
        let mut read_one = message(1, F1, E2, "c1");
        read_one.read = true;
        let unread = message(2, F1, E2, "c1");

        let index = ConversationIndex::rebuild([read_one, unread]).unwrap();
        let conversation = index.get(&"c1".into()).unwrap().unwrap();
        assert_eq!(conversation.unread.establishment, 1);
        assert_eq!(conversation.message_count, 2);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn rebuild_rejects_mismatched_pairs() {
        let first = message(1, F1, E2, "c1");
        let intruder = message(2, (9, Role::Freelancer), E2, "c1");

        let err = ConversationIndex::rebuild([first, intruder]).err().unwrap();
        assert!(matches!(
            err,
            MessagingError::InvalidParticipants(ParticipantsError::PairMismatch { .. })
        ));
    }

    #[test]
    fn vacant_slot_is_released() {
        let index = ConversationIndex::new();
        let id: ConversationId = "c1".into();

        let slot = index.reserve(&id).unwrap();
        index.release_vacant(&id, slot);
        assert!(index.slot(&id).unwrap().is_none());
    }

    #[test]
    fn shared_or_opened_slot_is_kept() {
        let index = ConversationIndex::new();
        let id: ConversationId = "c1".into();

        let slot = index.reserve(&id).unwrap();
        let waiting = index.reserve(&id).unwrap();
        index.release_vacant(&id, slot);
        assert!(index.slot(&id).unwrap().is_some());
        drop(waiting);

        let m = message(1, F1, E2, "c1");
        append(&index, &m);
        let slot = index.slot(&id).unwrap().unwrap();
        index.release_vacant(&id, slot);
        assert!(index.get(&id).unwrap().is_some());
    }

    #[test]
    fn len_counts_opened_conversations_only() {
        let index = ConversationIndex::new();
        index.reserve(&"vacant".into()).unwrap();
        append(&index, &message(1, F1, E2, "c1"));
        append(&index, &message(2, E2, F1, "c1"));
        append(&index, &message(3, F1, (4, Role::Establishment), "c2"));

        assert_eq!(index.len(), 2);
    }

    #[test]
    fn poisoned_memberships_still_index_messages() {
        let index = Arc::new(ConversationIndex::new());
        let holder = index.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.memberships.write().unwrap();
            panic!("panic while holding the membership lock");
        })
        .join();
        assert!(index.memberships.is_poisoned());

        append(&index, &message(1, E2, F1, "c1"));
        assert_eq!(index.unread_for(Inbox::new(UserId(1), Role::Freelancer)).unwrap(), 1);
        assert_eq!(index.list_for(Inbox::new(UserId(2), Role::Establishment)).unwrap().len(), 1);
    }
}
