use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::model::message::Message;

/// Default number of messages kept in memory.
pub const DEFAULT_MAX_MESSAGES: usize = 5000;

/// Bounded FIFO of recent messages, newest at the front.
///
/// Only the dispatch task inserts or evicts; the mutex exists so readers on
/// other tasks see a consistent deque.
pub struct MessageHistory {
    capacity: usize,
    messages: Mutex<VecDeque<Message>>,
}

impl MessageHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Message>> {
        // A panic while holding the lock cannot leave the deque half-written.
        self.messages.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Prepend a message, evicting the oldest entries past capacity.
    /// Returns the evicted messages, oldest last.
    pub fn push(&self, message: Message) -> Vec<Message> {
        if self.capacity == 0 {
            return vec![message];
        }
        let mut messages = self.lock();
        messages.push_front(message);
        let mut evicted = Vec::new();
        while messages.len() > self.capacity {
            if let Some(old) = messages.pop_back() {
                evicted.push(old);
            }
        }
        evicted
    }

    pub fn get(&self, message_id: &str) -> Option<Message> {
        self.lock().iter().find(|m| m.id == message_id).cloned()
    }

    /// Mutate a cached message in place; returns `(before, after)`.
    pub fn update<F>(&self, message_id: &str, f: F) -> Option<(Message, Message)>
    where
        F: FnOnce(&mut Message),
    {
        let mut messages = self.lock();
        let message = messages.iter_mut().find(|m| m.id == message_id)?;
        let before = message.clone();
        f(message);
        Some((before, message.clone()))
    }

    pub fn remove(&self, message_id: &str) -> Option<Message> {
        let mut messages = self.lock();
        let index = messages.iter().position(|m| m.id == message_id)?;
        messages.remove(index)
    }

    /// Drop every message in the given channels.
    pub fn retain_channels<F>(&self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.lock().retain(|m| keep(&m.channel_id));
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Newest-first copy of the history.
    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}
