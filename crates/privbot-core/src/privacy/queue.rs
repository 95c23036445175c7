use std::{collections::HashSet, sync::Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::{
    domain::{ChannelId, GuildId, MessageId, MessageRef, UserId},
    messaging::types::ObservedMessage,
};

/// A message accepted for delayed deletion.
#[derive(Clone, Debug)]
pub struct QueuedMessage {
    pub message_id: MessageId,
    pub author_id: UserId,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub created_at: DateTime<Utc>,
}

impl QueuedMessage {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            channel_id: self.channel_id,
            message_id: self.message_id,
        }
    }
}

impl From<&ObservedMessage> for QueuedMessage {
    fn from(m: &ObservedMessage) -> Self {
        Self {
            message_id: m.id,
            author_id: m.author_id,
            channel_id: m.channel_id,
            guild_id: m.guild_id,
            created_at: m.created_at,
        }
    }
}

/// Unbounded FIFO between the producers (intake, enrollment scan) and the
/// single delete worker, plus the set of ids currently pending.
///
/// An id is reserved before its message is pushed and released by the worker
/// on every terminal outcome, so a message is never pending twice.
pub struct DeleteQueue {
    tx: mpsc::UnboundedSender<QueuedMessage>,
    // Held here while no worker runs; the worker takes it on start and hands it back on stop.
    rx: Mutex<Option<mpsc::UnboundedReceiver<QueuedMessage>>>,
    // Item that was mid-delay when the worker stopped. Still reserved; served first on restart.
    interrupted: Mutex<Option<QueuedMessage>>,
    pending: Mutex<HashSet<MessageId>>,
}

impl Default for DeleteQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DeleteQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            interrupted: Mutex::new(None),
            pending: Mutex::new(HashSet::new()),
        }
    }

    /// Atomically claim `id`. Returns `false` if it is already pending.
    pub fn reserve(&self, id: MessageId) -> bool {
        lock(&self.pending).insert(id)
    }

    pub fn release(&self, id: MessageId) {
        lock(&self.pending).remove(&id);
    }

    pub fn is_pending(&self, id: MessageId) -> bool {
        lock(&self.pending).contains(&id)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Push a message whose id was already reserved.
    pub fn push(&self, item: QueuedMessage) {
        let id = item.message_id;
        // The receiver lives as long as the queue itself, so this only fails on teardown.
        if self.tx.send(item).is_err() {
            self.release(id);
        }
    }

    pub(crate) fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<QueuedMessage>> {
        lock(&self.rx).take()
    }

    pub(crate) fn return_receiver(&self, rx: mpsc::UnboundedReceiver<QueuedMessage>) {
        *lock(&self.rx) = Some(rx);
    }

    /// Hand back an item the worker dequeued but did not finish. Its id stays pending.
    pub(crate) fn park_interrupted(&self, item: QueuedMessage) {
        *lock(&self.interrupted) = Some(item);
    }

    pub(crate) fn take_interrupted(&self) -> Option<QueuedMessage> {
        lock(&self.interrupted).take()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64) -> QueuedMessage {
        QueuedMessage {
            message_id: MessageId(id),
            author_id: UserId(1),
            channel_id: ChannelId(2),
            guild_id: Some(GuildId(3)),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn reserve_rejects_pending_ids_until_released() {
        let q = DeleteQueue::new();
        assert!(q.reserve(MessageId(7)));
        assert!(!q.reserve(MessageId(7)));
        assert!(q.is_pending(MessageId(7)));

        q.release(MessageId(7));
        assert!(!q.is_pending(MessageId(7)));
        assert!(q.reserve(MessageId(7)));
    }

    #[tokio::test]
    async fn pushed_items_come_out_in_order() {
        let q = DeleteQueue::new();
        for id in [3, 1, 2] {
            assert!(q.reserve(MessageId(id)));
            q.push(item(id));
        }

        let mut rx = q.take_receiver().unwrap();
        assert!(q.take_receiver().is_none());
        let mut order = Vec::new();
        for _ in 0..3 {
            order.push(rx.recv().await.unwrap().message_id.0);
        }
        assert_eq!(order, vec![3, 1, 2]);
        assert_eq!(q.pending_count(), 3);

        q.return_receiver(rx);
        assert!(q.take_receiver().is_some());
    }

    #[test]
    fn parked_item_is_taken_once_and_stays_pending() {
        let q = DeleteQueue::new();
        assert!(q.reserve(MessageId(9)));
        q.park_interrupted(item(9));

        assert!(q.is_pending(MessageId(9)));
        assert_eq!(q.take_interrupted().map(|i| i.message_id), Some(MessageId(9)));
        assert!(q.take_interrupted().is_none());
    }
}
