//! Per-session inbound buffering.
//!
//! Each session gets its own overflow queue so a burst in one conversation
//! never sheds events from another. Batches are collected once the session
//! has been quiet for the configured debounce window, with the queue's
//! one-shot overflow notice carried at the head of the batch.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use {
    switchyard_config::QueueConfig,
    switchyard_queue::{
        DEFAULT_SUMMARY_LINE_LIMIT, NoticeStyle, OverflowQueue, build_collect_prompt,
        debounce_wait, summary_line,
    },
};

use crate::event::InboundEvent;

type Inbox = Arc<Mutex<OverflowQueue<InboundEvent>>>;

/// Events drained from one session inbox.
#[derive(Debug, Default)]
pub struct CollectedBatch {
    /// Drained events in arrival order.
    pub events: Vec<InboundEvent>,
    /// One-shot summary of events shed while the batch accumulated.
    pub overflow_notice: Option<String>,
}

impl CollectedBatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.overflow_notice.is_none()
    }

    /// Renders the batch as a single prompt: the overflow notice attaches to
    /// the title line, then one block per event.
    #[must_use]
    pub fn prompt(&self, title: &str) -> String {
        build_collect_prompt(title, self.overflow_notice.as_deref(), &self.events, |event, _| {
            match &event.sender {
                Some(sender) => format!("[{}] {sender}: {}", event.channel, event.text),
                None => format!("[{}] {}", event.channel, event.text),
            }
        })
    }
}

/// One overflow queue per session key, created lazily.
#[derive(Debug)]
pub struct SessionInboxes {
    queue_cfg: QueueConfig,
    inboxes: Mutex<HashMap<String, Inbox>>,
}

impl SessionInboxes {
    #[must_use]
    pub fn new(queue_cfg: QueueConfig) -> Self {
        Self { queue_cfg, inboxes: Mutex::new(HashMap::new()) }
    }

    /// Offers an event to the session's inbox.
    ///
    /// Returns whether the inbox accepted it; shed events are summarized
    /// from their text per the queue's drop policy.
    pub fn admit(&self, session_key: &str, event: InboundEvent) -> bool {
        let inbox = self.inbox(session_key);
        let mut queue = lock(&inbox);
        queue.admit(event, |dropped| summary_line(&dropped.text, DEFAULT_SUMMARY_LINE_LIMIT))
    }

    /// Buffered events for a session; 0 when it has no inbox.
    #[must_use]
    pub fn pending(&self, session_key: &str) -> usize {
        self.existing(session_key).map_or(0, |inbox| lock(&inbox).len())
    }

    /// Waits until the session has been quiet for its debounce window, then
    /// drains everything buffered.
    ///
    /// A session that never buffered anything collects an empty batch
    /// immediately.
    pub async fn collect(&self, session_key: &str) -> CollectedBatch {
        let Some(inbox) = self.existing(session_key) else {
            return CollectedBatch::default();
        };
        debounce_wait(&inbox).await;
        let mut queue = lock(&inbox);
        let overflow_notice = queue.take_overflow_notice(&NoticeStyle::default());
        let events = queue.drain();
        CollectedBatch { events, overflow_notice }
    }

    fn inbox(&self, session_key: &str) -> Inbox {
        let mut inboxes = self.inboxes.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            inboxes
                .entry(session_key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(OverflowQueue::new(&self.queue_cfg)))),
        )
    }

    fn existing(&self, session_key: &str) -> Option<Inbox> {
        let inboxes = self.inboxes.lock().unwrap_or_else(PoisonError::into_inner);
        inboxes.get(session_key).cloned()
    }
}

fn lock(inbox: &Inbox) -> MutexGuard<'_, OverflowQueue<InboundEvent>> {
    inbox.lock().unwrap_or_else(PoisonError::into_inner)
}
