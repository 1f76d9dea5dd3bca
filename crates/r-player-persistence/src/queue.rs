//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Bounded FIFO between sample producers and the log writer."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use r_player_common::OverflowPolicy;

/// What happened to an item offered to a full or closed queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The item was appended without loss.
    Queued,
    /// The queue was full; its oldest item was discarded to make room.
    DroppedOldest,
    /// The queue was full; the offered item was discarded.
    DroppedNewest,
    /// The queue no longer accepts items.
    Closed,
}

#[derive(Debug)]
struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Multi-producer, single-consumer FIFO with a fixed capacity.
///
/// Producers never block; the overflow policy decides which item is lost.
#[derive(Debug)]
pub struct SampleQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Condvar,
    capacity: usize,
    policy: OverflowPolicy,
    dropped: AtomicU64,
}

impl<T> SampleQueue<T> {
    /// Create a queue holding at most `capacity` items (minimum one).
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity.min(4096)),
                closed: false,
            }),
            available: Condvar::new(),
            capacity,
            policy,
            dropped: AtomicU64::new(0),
        }
    }

    /// Offer an item.
    pub fn push(&self, item: T) -> PushOutcome {
        let mut inner = self.inner.lock();
        if inner.closed {
            return PushOutcome::Closed;
        }
        let outcome = if inner.items.len() < self.capacity {
            inner.items.push_back(item);
            PushOutcome::Queued
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            match self.policy {
                OverflowPolicy::DropOldest => {
                    inner.items.pop_front();
                    inner.items.push_back(item);
                    PushOutcome::DroppedOldest
                }
                OverflowPolicy::DropNewest => PushOutcome::DroppedNewest,
            }
        };
        drop(inner);
        self.available.notify_one();
        outcome
    }

    /// Take the oldest item, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `None` on timeout or once the queue is closed and empty.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let mut inner = self.inner.lock();
        let deadline = Instant::now().checked_add(timeout);
        while inner.items.is_empty() && !inner.closed {
            let timed_out = match deadline {
                Some(deadline) => self.available.wait_until(&mut inner, deadline).timed_out(),
                None => {
                    self.available.wait(&mut inner);
                    false
                }
            };
            if timed_out {
                break;
            }
        }
        inner.items.pop_front()
    }

    /// Stop accepting items; queued items can still be taken.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.available.notify_all();
    }

    /// Whether [`Self::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Items currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether no items are queued.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items lost to the overflow policy so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn drop_oldest_keeps_the_latest_items() {
        let queue = SampleQueue::new(2, OverflowPolicy::DropOldest);
        assert_eq!(queue.push(1), PushOutcome::Queued);
        assert_eq!(queue.push(2), PushOutcome::Queued);
        assert_eq!(queue.push(3), PushOutcome::DroppedOldest);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.pop_timeout(Duration::ZERO), Some(2));
        assert_eq!(queue.pop_timeout(Duration::ZERO), Some(3));
        assert_eq!(queue.pop_timeout(Duration::ZERO), None);
    }

    #[test]
    fn drop_newest_rejects_the_offered_item() {
        let queue = SampleQueue::new(1, OverflowPolicy::DropNewest);
        queue.push("a");
        assert_eq!(queue.push("b"), PushOutcome::DroppedNewest);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_timeout(Duration::ZERO), Some("a"));
    }

    #[test]
    fn closed_queue_rejects_pushes_but_drains() {
        let queue = SampleQueue::new(4, OverflowPolicy::DropOldest);
        queue.push(7);
        queue.close();
        assert!(queue.is_closed());
        assert_eq!(queue.push(8), PushOutcome::Closed);
        assert_eq!(queue.pop_timeout(Duration::from_secs(1)), Some(7));
        assert_eq!(queue.pop_timeout(Duration::from_secs(1)), None);
    }

    #[test]
    fn waiting_consumer_wakes_on_push() {
        let queue = Arc::new(SampleQueue::new(4, OverflowPolicy::DropOldest));
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop_timeout(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(20));
        queue.push(42);
        assert_eq!(consumer.join().unwrap(), Some(42));
    }
}
