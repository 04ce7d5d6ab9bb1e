//! Capacity-bounded buffer with pluggable drop policies.

use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use tokio::time::Instant;

use {switchyard_common::DropPolicy, switchyard_config::QueueConfig};

/// Presentation knobs for [`OverflowQueue::take_overflow_notice`].
#[derive(Debug, Clone, Default)]
pub struct NoticeStyle {
    /// Word used for dropped items; "message" when unset.
    pub noun: Option<String>,
    /// Replaces the default first line entirely.
    pub title: Option<String>,
}

/// FIFO buffer that sheds load per its drop policy once `cap` is reached.
///
/// A cap of zero means unbounded. State is mutated only through
/// [`admit`](Self::admit) and the one-shot notice reader; ownership is
/// the caller's, typically one queue per session.
#[derive(Debug)]
pub struct OverflowQueue<T> {
    items: VecDeque<T>,
    cap: usize,
    drop_policy: DropPolicy,
    dropped_count: u64,
    summary_lines: VecDeque<String>,
    summary_limit: usize,
    debounce_ms: u64,
    last_admitted: Option<Instant>,
}

impl<T> OverflowQueue<T> {
    #[must_use]
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            items: VecDeque::new(),
            cap: config.cap,
            drop_policy: config.drop_policy,
            dropped_count: 0,
            summary_lines: VecDeque::new(),
            summary_limit: config.summary_limit,
            debounce_ms: config.debounce_ms,
            last_admitted: None,
        }
    }

    /// Offers `item` to the queue, shedding per the drop policy when full.
    ///
    /// Returns whether the item was accepted. Under [`DropPolicy::New`] a
    /// full queue rejects the incoming item and stays untouched; the other
    /// policies evict from the front until the item fits. Evictions under
    /// [`DropPolicy::Summarize`] are folded through `summarize` into the
    /// summary lines, oldest lines falling off past the summary limit.
    pub fn admit<F>(&mut self, item: T, mut summarize: F) -> bool
    where
        F: FnMut(&T) -> String,
    {
        let accepted = if self.cap == 0 || self.items.len() < self.cap {
            self.items.push_back(item);
            true
        } else {
            match self.drop_policy {
                DropPolicy::New => {
                    #[cfg(feature = "metrics")]
                    switchyard_metrics::counter!(
                        switchyard_metrics::queue::ITEMS_REJECTED_TOTAL
                    )
                    .increment(1);
                    false
                },
                DropPolicy::Old => {
                    while self.items.len() >= self.cap {
                        self.items.pop_front();
                        #[cfg(feature = "metrics")]
                        switchyard_metrics::counter!(
                            switchyard_metrics::queue::ITEMS_DROPPED_TOTAL
                        )
                        .increment(1);
                    }
                    self.items.push_back(item);
                    true
                },
                DropPolicy::Summarize => {
                    while self.items.len() >= self.cap {
                        if let Some(evicted) = self.items.pop_front() {
                            let line = summarize(&evicted);
                            self.summary_lines.push_back(line);
                            while self.summary_lines.len() > self.summary_limit {
                                self.summary_lines.pop_front();
                            }
                            self.dropped_count += 1;
                            #[cfg(feature = "metrics")]
                            switchyard_metrics::counter!(
                                switchyard_metrics::queue::ITEMS_DROPPED_TOTAL
                            )
                            .increment(1);
                        }
                    }
                    self.items.push_back(item);
                    true
                },
            }
        };
        if accepted {
            self.last_admitted = Some(Instant::now());
            #[cfg(feature = "metrics")]
            switchyard_metrics::counter!(switchyard_metrics::queue::ITEMS_ADMITTED_TOTAL)
                .increment(1);
        }
        accepted
    }

    /// Renders the pending overflow notice and clears it.
    ///
    /// Only the summarize policy produces notices, and only once drops
    /// have actually happened. Reading is destructive: the dropped count
    /// and summary lines reset so the same overflow is never reported
    /// twice.
    pub fn take_overflow_notice(&mut self, style: &NoticeStyle) -> Option<String> {
        if self.drop_policy != DropPolicy::Summarize || self.dropped_count == 0 {
            return None;
        }
        let noun = style.noun.as_deref().unwrap_or("message");
        let mut notice = match &style.title {
            Some(title) => title.clone(),
            None => {
                let plural = if self.dropped_count == 1 { "" } else { "s" };
                format!(
                    "[Queue overflow] Dropped {} {noun}{plural} due to cap.",
                    self.dropped_count
                )
            },
        };
        if !self.summary_lines.is_empty() {
            notice.push_str("\nSummary:");
            for line in &self.summary_lines {
                notice.push_str("\n- ");
                notice.push_str(line);
            }
        }
        self.dropped_count = 0;
        self.summary_lines.clear();
        #[cfg(feature = "metrics")]
        switchyard_metrics::counter!(switchyard_metrics::queue::OVERFLOW_NOTICES_TOTAL)
            .increment(1);
        Some(notice)
    }

    /// Removes and returns all buffered items in FIFO order.
    pub fn drain(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    #[must_use]
    pub fn summary_lines(&self) -> impl Iterator<Item = &str> {
        self.summary_lines.iter().map(String::as_str)
    }
}

/// Resolves once no new item has been admitted for the queue's debounce
/// window.
///
/// A zero debounce, or a queue that has never admitted anything, resolves
/// immediately. Admissions made while waiting push the deadline out. The
/// lock is never held across the sleep, so concurrent admits stay cheap.
pub async fn debounce_wait<T>(queue: &Mutex<OverflowQueue<T>>) {
    loop {
        let (debounce_ms, last_admitted) = {
            let state = queue.lock().unwrap_or_else(PoisonError::into_inner);
            (state.debounce_ms, state.last_admitted)
        };
        if debounce_ms == 0 {
            return;
        }
        let Some(last_admitted) = last_admitted else {
            return;
        };
        let deadline = last_admitted + Duration::from_millis(debounce_ms);
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        tokio::time::sleep(deadline - now).await;
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn queue(cap: usize, drop_policy: DropPolicy) -> OverflowQueue<&'static str> {
        OverflowQueue::new(&QueueConfig {
            cap,
            drop_policy,
            summary_limit: 10,
            debounce_ms: 0,
        })
    }

    fn echo(item: &&str) -> String {
        (*item).to_string()
    }

    #[test]
    fn zero_cap_is_unbounded() {
        let mut q = queue(0, DropPolicy::New);
        for i in 0..100 {
            assert!(q.admit(if i % 2 == 0 { "even" } else { "odd" }, echo));
        }
        assert_eq!(q.len(), 100);
    }

    #[test]
    fn accepts_while_under_cap() {
        let mut q = queue(3, DropPolicy::New);
        assert!(q.admit("item1", echo));
        assert!(q.admit("item2", echo));
        assert!(q.admit("item3", echo));
        assert_eq!(q.len(), 3);
        assert_eq!(q.dropped_count(), 0);
    }

    #[test]
    fn new_policy_rejects_the_incoming_item() {
        let mut q = queue(2, DropPolicy::New);
        assert!(q.admit("item1", echo));
        assert!(q.admit("item2", echo));
        assert!(!q.admit("item3", echo));
        assert_eq!(q.drain(), vec!["item1", "item2"]);
    }

    #[test]
    fn old_policy_evicts_from_the_front() {
        let mut q = queue(2, DropPolicy::Old);
        assert!(q.admit("item1", echo));
        assert!(q.admit("item2", echo));
        assert!(q.admit("item3", echo));
        assert_eq!(q.dropped_count(), 0);
        assert_eq!(q.drain(), vec!["item2", "item3"]);
    }

    #[test]
    fn summarize_policy_records_evictions() {
        let mut q = queue(2, DropPolicy::Summarize);
        assert!(q.admit("item1", echo));
        assert!(q.admit("item2", echo));
        assert!(q.admit("item3", echo));
        assert_eq!(q.dropped_count(), 1);
        assert_eq!(q.summary_lines().collect::<Vec<_>>(), vec!["item1"]);
        assert_eq!(q.drain(), vec!["item2", "item3"]);
    }

    #[test]
    fn summary_lines_keep_only_the_newest() {
        let mut q = OverflowQueue::new(&QueueConfig {
            cap: 2,
            drop_policy: DropPolicy::Summarize,
            summary_limit: 2,
            debounce_ms: 0,
        });
        for item in ["item1", "item2", "item3", "item4", "item5"] {
            assert!(q.admit(item, echo));
        }
        assert_eq!(q.dropped_count(), 3);
        assert_eq!(q.summary_lines().collect::<Vec<_>>(), vec!["item2", "item3"]);
        assert_eq!(q.drain(), vec!["item4", "item5"]);
    }

    #[test]
    fn notice_absent_for_non_summarize_policies() {
        let mut q = queue(1, DropPolicy::Old);
        q.admit("item1", echo);
        q.admit("item2", echo);
        assert_eq!(q.take_overflow_notice(&NoticeStyle::default()), None);
    }

    #[test]
    fn notice_absent_before_any_drop() {
        let mut q = queue(2, DropPolicy::Summarize);
        q.admit("item1", echo);
        assert_eq!(q.take_overflow_notice(&NoticeStyle::default()), None);
    }

    #[test]
    fn notice_pluralizes_and_lists_summaries() {
        let mut q = queue(1, DropPolicy::Summarize);
        for item in ["item1", "item2", "item3"] {
            q.admit(item, echo);
        }
        let notice = q.take_overflow_notice(&NoticeStyle::default()).unwrap();
        assert_eq!(
            notice,
            "[Queue overflow] Dropped 2 messages due to cap.\nSummary:\n- item1\n- item2",
        );
    }

    #[test]
    fn notice_uses_singular_noun_for_one_drop() {
        let mut q = queue(1, DropPolicy::Summarize);
        q.admit("item1", echo);
        q.admit("item2", echo);
        let notice = q.take_overflow_notice(&NoticeStyle::default()).unwrap();
        assert_eq!(notice, "[Queue overflow] Dropped 1 message due to cap.\nSummary:\n- item1");
    }

    #[test]
    fn notice_custom_title_replaces_first_line() {
        let mut q = queue(1, DropPolicy::Summarize);
        q.admit("item1", echo);
        q.admit("item2", echo);
        let style = NoticeStyle { title: Some("Custom title".into()), noun: None };
        assert_eq!(
            q.take_overflow_notice(&style).unwrap(),
            "Custom title\nSummary:\n- item1",
        );
    }

    #[test]
    fn notice_reading_is_one_shot() {
        let mut q = queue(1, DropPolicy::Summarize);
        q.admit("item1", echo);
        q.admit("item2", echo);
        assert!(q.take_overflow_notice(&NoticeStyle::default()).is_some());
        assert_eq!(q.dropped_count(), 0);
        assert_eq!(q.summary_lines().count(), 0);
        assert_eq!(q.take_overflow_notice(&NoticeStyle::default()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_resolves_immediately_when_disabled() {
        let q = Mutex::new(queue(0, DropPolicy::New));
        q.lock().unwrap().admit("item1", echo);
        debounce_wait(&q).await;
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_waits_out_the_quiet_window() {
        let mut inner = queue(0, DropPolicy::New);
        inner.debounce_ms = 100;
        let q = Mutex::new(inner);
        q.lock().unwrap().admit("item1", echo);
        let started = Instant::now();
        debounce_wait(&q).await;
        assert_eq!(started.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_extends_while_items_arrive() {
        let mut inner = queue(0, DropPolicy::New);
        inner.debounce_ms = 100;
        let q = Arc::new(Mutex::new(inner));
        q.lock().unwrap().admit("item1", echo);
        let started = Instant::now();

        let waiter = tokio::spawn({
            let q = q.clone();
            async move { debounce_wait(&q).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        q.lock().unwrap().admit("item2", echo);
        waiter.await.unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(150), "elapsed {elapsed:?}");
    }
}
