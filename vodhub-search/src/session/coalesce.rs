//! Bounded-latency batching of incoming records.
//!
//! The first record that lands in an empty buffer arms a single deadline
//! `window` in the future. Later records join the same batch without
//! moving the deadline. A flush hands over everything pending, in arrival
//! order, and disarms the deadline.

use std::time::Duration;

use tokio::time::Instant;

use crate::types::ResultRecord;

/// Pending records plus the one outstanding flush deadline.
#[derive(Debug)]
pub struct CoalescingBuffer {
    window: Duration,
    pending: Vec<ResultRecord>,
    deadline: Option<Instant>,
    flushed: usize,
}

impl CoalescingBuffer {
    /// Create an empty buffer with the given flush window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Vec::new(),
            deadline: None,
            flushed: 0,
        }
    }

    /// Queue a batch. Arms the deadline if this is the first unflushed item.
    pub fn push(&mut self, records: Vec<ResultRecord>, now: Instant) {
        if records.is_empty() {
            return;
        }
        if self.deadline.is_none() {
            self.deadline = Some(now + self.window);
        }
        self.pending.extend(records);
    }

    /// When the next flush is due, if anything is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the deadline has passed.
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Number of records waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Total records handed over by all flushes so far.
    pub fn flushed_total(&self) -> usize {
        self.flushed
    }

    /// Take every pending record, in arrival order, and disarm the deadline.
    pub fn flush(&mut self) -> Vec<ResultRecord> {
        self.deadline = None;
        let batch = std::mem::take(&mut self.pending);
        self.flushed += batch.len();
        batch
    }

    /// Drop everything pending without delivering it.
    pub fn discard(&mut self) {
        self.deadline = None;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(ids: &[&str]) -> Vec<ResultRecord> {
        ids.iter()
            .map(|id| ResultRecord {
                id: (*id).into(),
                source: "a".into(),
                source_name: "A".into(),
                title: "T".into(),
                year: "2020".into(),
                episodes: vec![],
                poster: None,
                douban_id: None,
                type_name: None,
            })
            .collect()
    }

    #[test]
    fn first_push_arms_deadline_once() {
        let window = Duration::from_millis(100);
        let mut buffer = CoalescingBuffer::new(window);
        let t0 = Instant::now();
        buffer.push(records(&["1"]), t0);
        assert_eq!(buffer.deadline(), Some(t0 + window));

        buffer.push(records(&["2"]), t0 + Duration::from_millis(50));
        assert_eq!(buffer.deadline(), Some(t0 + window));
        assert_eq!(buffer.pending_len(), 2);
    }

    #[test]
    fn empty_batch_does_not_arm() {
        let mut buffer = CoalescingBuffer::new(Duration::from_millis(100));
        buffer.push(vec![], Instant::now());
        assert!(buffer.deadline().is_none());
    }

    #[test]
    fn flush_preserves_order_and_disarms() {
        let mut buffer = CoalescingBuffer::new(Duration::from_millis(100));
        let now = Instant::now();
        buffer.push(records(&["1", "2"]), now);
        buffer.push(records(&["3"]), now);
        let ids: Vec<String> = buffer.flush().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert!(buffer.deadline().is_none());
        assert_eq!(buffer.pending_len(), 0);
        assert_eq!(buffer.flushed_total(), 3);
    }

    #[test]
    fn due_only_after_window() {
        let window = Duration::from_millis(100);
        let mut buffer = CoalescingBuffer::new(window);
        let t0 = Instant::now();
        assert!(!buffer.is_due(t0));
        buffer.push(records(&["1"]), t0);
        assert!(!buffer.is_due(t0 + Duration::from_millis(99)));
        assert!(buffer.is_due(t0 + window));
    }

    #[test]
    fn push_after_flush_rearms() {
        let window = Duration::from_millis(100);
        let mut buffer = CoalescingBuffer::new(window);
        let t0 = Instant::now();
        buffer.push(records(&["1"]), t0);
        buffer.flush();
        let t1 = t0 + Duration::from_millis(500);
        buffer.push(records(&["2"]), t1);
        assert_eq!(buffer.deadline(), Some(t1 + window));
    }

    #[test]
    fn discard_drops_pending() {
        let mut buffer = CoalescingBuffer::new(Duration::from_millis(100));
        buffer.push(records(&["1"]), Instant::now());
        buffer.discard();
        assert_eq!(buffer.pending_len(), 0);
        assert!(buffer.deadline().is_none());
        assert_eq!(buffer.flushed_total(), 0);
    }
}
