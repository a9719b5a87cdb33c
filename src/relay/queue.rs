//! Bounded FIFO shared between control-surface producers and the agent
//! session consumer.
//!
//! Backed by a `VecDeque` inside an `embassy-sync` blocking mutex, so a
//! queue is `Sync` and any thread or task holding a reference may push.
//! Critical sections are a few pointer moves long.

use core::cell::RefCell;
use std::collections::VecDeque;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::config::OverflowPolicy;

/// What happened to a pushed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Accepted,
    /// Accepted after evicting the oldest entry (`drop-oldest` policy).
    AcceptedEvicting,
    /// Queue full under `reject-new`; the entry was not stored.
    Rejected,
}

impl EnqueueOutcome {
    pub fn accepted(self) -> bool {
        !matches!(self, Self::Rejected)
    }

    pub fn evicted(self) -> bool {
        matches!(self, Self::AcceptedEvicting)
    }
}

pub struct BoundedQueue<T> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<VecDeque<T>>>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl<T> BoundedQueue<T> {
    /// `capacity` is raised to at least 1.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(RefCell::new(VecDeque::with_capacity(capacity))),
            capacity,
            policy,
        }
    }

    pub fn push(&self, item: T) -> EnqueueOutcome {
        self.inner.lock(|q| {
            let mut q = q.borrow_mut();
            if q.len() < self.capacity {
                q.push_back(item);
                return EnqueueOutcome::Accepted;
            }
            match self.policy {
                OverflowPolicy::RejectNew => EnqueueOutcome::Rejected,
                OverflowPolicy::DropOldest => {
                    q.pop_front();
                    q.push_back(item);
                    EnqueueOutcome::AcceptedEvicting
                }
            }
        })
    }

    pub fn pop(&self) -> Option<T> {
        self.inner.lock(|q| q.borrow_mut().pop_front())
    }

    pub fn len(&self) -> usize {
        self.inner.lock(|q| q.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
