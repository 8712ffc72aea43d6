//! Bounded queue between callers of `record` and the recorder's worker.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

/// Why a push did not enqueue its item. The item is handed back.
#[derive(Debug, PartialEq, Eq)]
pub enum PushError<T> {
    Full(T),
    Closed(T),
}

impl<T> PushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            PushError::Full(item) | PushError::Closed(item) => item,
        }
    }
}

/// Result of [`BoundedQueue::push_or_park`].
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    /// The item went straight into the queue.
    Queued,
    /// The queue was full; the item waits behind earlier parked items.
    Parked,
}

struct Parked<T> {
    item: T,
    deadline: Instant,
}

struct QueueState<T> {
    items: VecDeque<T>,
    /// Items waiting for room, oldest first. Promoted into `items` as the
    /// consumer frees slots, so admission order is push order.
    parked: VecDeque<Parked<T>>,
    /// Parked items whose deadline passed, waiting for `take_expired`.
    expired: Vec<T>,
    closed: bool,
}

impl<T> QueueState<T> {
    fn expire(&mut self, now: Instant) {
        while self.parked.front().is_some_and(|p| p.deadline <= now) {
            if let Some(p) = self.parked.pop_front() {
                self.expired.push(p.item);
            }
        }
    }

    fn promote(&mut self, capacity: usize, now: Instant) {
        self.expire(now);
        while self.items.len() < capacity {
            match self.parked.pop_front() {
                Some(p) => self.items.push_back(p.item),
                None => break,
            }
        }
    }
}

/// A bounded multi-producer, single-consumer queue.
///
/// Producers never await; the consumer awaits in [`BoundedQueue::pop`].
/// Besides the queue itself there is a parking area of the same capacity
/// for [`BoundedQueue::push_or_park`], drained strictly in order.
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    capacity: usize,
    readable: Notify,
}

impl<T> BoundedQueue<T> {
    /// Create a queue. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                parked: VecDeque::new(),
                expired: Vec::new(),
                closed: false,
            }),
            capacity,
            readable: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queued plus parked items.
    pub fn len(&self) -> usize {
        let state = self.lock();
        state.items.len() + state.parked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    // Nothing in this module panics while holding the lock, so a poisoned
    // mutex still guards consistent state.
    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState<T>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enqueue if there is room and nothing is parked ahead.
    pub fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(PushError::Closed(item));
            }
            if state.items.len() >= self.capacity || !state.parked.is_empty() {
                return Err(PushError::Full(item));
            }
            state.items.push_back(item);
        }
        self.readable.notify_one();
        Ok(())
    }

    /// Enqueue, evicting the oldest item when full. Returns the evicted item.
    pub fn push_displacing(&self, item: T) -> Result<Option<T>, PushError<T>> {
        let displaced = {
            let mut state = self.lock();
            if state.closed {
                return Err(PushError::Closed(item));
            }
            let displaced = if state.items.len() >= self.capacity {
                state.items.pop_front()
            } else {
                None
            };
            state.items.push_back(item);
            displaced
        };
        self.readable.notify_one();
        Ok(displaced)
    }

    /// Enqueue, or park the item for up to `timeout` when the queue is full.
    ///
    /// Parked items are admitted in push order as the consumer frees slots;
    /// an item still parked at its deadline moves to the expired list. Fails
    /// with `Full` only when the parking area is full too.
    pub fn push_or_park(&self, item: T, timeout: Duration) -> Result<Admission, PushError<T>> {
        let now = Instant::now();
        let admission = {
            let mut state = self.lock();
            if state.closed {
                return Err(PushError::Closed(item));
            }
            state.promote(self.capacity, now);

            if state.parked.is_empty() && state.items.len() < self.capacity {
                state.items.push_back(item);
                Admission::Queued
            } else if state.parked.len() >= self.capacity {
                return Err(PushError::Full(item));
            } else {
                state.parked.push_back(Parked {
                    item,
                    deadline: now + timeout,
                });
                Admission::Parked
            }
        };
        if admission == Admission::Queued {
            self.readable.notify_one();
        }
        Ok(admission)
    }

    /// Move parked items past their deadline to the expired list and hand
    /// back everything on it.
    pub fn take_expired(&self) -> Vec<T> {
        let mut state = self.lock();
        state.expire(Instant::now());
        std::mem::take(&mut state.expired)
    }

    /// Dequeue the oldest item, waiting for one. Returns `None` once the
    /// queue is closed and drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let notified = self.readable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                let now = Instant::now();
                state.promote(self.capacity, now);
                if let Some(item) = state.items.pop_front() {
                    state.promote(self.capacity, now);
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Refuse further pushes and wake the consumer. Queued and parked items
    /// remain poppable.
    pub fn close(&self) {
        self.lock().closed = true;
        self.readable.notify_waiters();
    }
}
