use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot of a detected push, fixed at detection time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationQueueEntry {
    pub resource_id: String,
    pub author: String,
    pub message_summary: String,
    pub total_count: u64,
    pub detected_at: DateTime<Utc>,
}

impl NotificationQueueEntry {
    /// `author · message`, the toast description line.
    pub fn description(&self) -> String {
        format!("{} · {}", self.author, self.message_summary)
    }
}

/// FIFO of pending notifications with at most one on display.
///
/// Knows nothing about rendering: the display layer reads
/// [`peek_active`](Self::peek_active) and calls
/// [`acknowledge`](Self::acknowledge) on dismiss or timeout.
#[derive(Debug, Clone, Default)]
pub struct NotificationQueue {
    pending: VecDeque<NotificationQueueEntry>,
    active: Option<NotificationQueueEntry>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, entry: NotificationQueueEntry) {
        self.pending.push_back(entry);
    }

    pub fn peek_active(&self) -> Option<&NotificationQueueEntry> {
        self.active.as_ref()
    }

    pub fn is_displaying(&self) -> bool {
        self.active.is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_none() && self.pending.is_empty()
    }

    /// Promote the front entry if nothing is on display. Returns the entry
    /// that became active, if any.
    pub fn show_next(&mut self) -> Option<&NotificationQueueEntry> {
        if self.active.is_some() {
            return None;
        }
        self.active = self.pending.pop_front();
        self.active.as_ref()
    }

    /// The active entry was dismissed. Clears it and promotes the next.
    /// Returns the dismissed entry.
    pub fn acknowledge(&mut self) -> Option<NotificationQueueEntry> {
        let done = self.active.take();
        self.show_next();
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> NotificationQueueEntry {
        NotificationQueueEntry {
            resource_id: id.into(),
            author: "ana".into(),
            message_summary: "push".into(),
            total_count: 1,
            detected_at: DateTime::<Utc>::from_timestamp_millis(0).unwrap(),
        }
    }

    #[test]
    fn drains_fifo_one_at_a_time() {
        let mut queue = NotificationQueue::new();
        for id in ["A", "B", "C"] {
            queue.enqueue(entry(id));
        }

        assert_eq!(queue.show_next().unwrap().resource_id, "A");
        // Already displaying: nothing else is promoted.
        assert!(queue.show_next().is_none());
        assert_eq!(queue.pending_len(), 2);

        let mut shown = vec![queue.peek_active().unwrap().resource_id.clone()];
        while queue.acknowledge().is_some() {
            if let Some(active) = queue.peek_active() {
                shown.push(active.resource_id.clone());
            }
        }
        assert_eq!(shown, vec!["A", "B", "C"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn acknowledge_with_nothing_active_is_harmless() {
        let mut queue = NotificationQueue::new();
        assert!(queue.acknowledge().is_none());
        queue.enqueue(entry("A"));
        // Acknowledging promotes whatever is waiting.
        assert!(queue.acknowledge().is_none());
        assert_eq!(queue.peek_active().unwrap().resource_id, "A");
    }

    #[test]
    fn description_joins_author_and_message() {
        assert_eq!(entry("A").description(), "ana · push");
    }
}
