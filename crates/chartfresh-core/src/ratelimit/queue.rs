//! Bounded-concurrency admission with a priority backlog.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    /// Tier index, highest priority first.
    fn tier(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "normal" => Some(Priority::Normal),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
        }
    }
}

/// Outcome of [`RefreshQueue::enqueue`].
#[derive(Debug)]
pub enum Admission<T> {
    /// A capacity slot was reserved; the caller runs the item now.
    Execute(T),
    /// No capacity; the item waits behind `position` others.
    Queued { position: usize },
}

/// Global concurrency cap plus a backlog ordered high > normal > low,
/// FIFO within a tier.
///
/// Invariant: `in_flight() <= max_concurrent()` at all times.
#[derive(Debug)]
pub struct RefreshQueue<T> {
    max_concurrent: usize,
    in_flight: usize,
    tiers: [VecDeque<T>; 3],
}

impl<T> RefreshQueue<T> {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            in_flight: 0,
            tiers: [VecDeque::new(), VecDeque::new(), VecDeque::new()],
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn queued_len(&self) -> usize {
        self.tiers.iter().map(VecDeque::len).sum()
    }

    pub fn has_capacity(&self) -> bool {
        self.in_flight < self.max_concurrent
    }

    /// Reserve a slot and hand the item back, or append it to its tier.
    pub fn enqueue(&mut self, item: T, priority: Priority) -> Admission<T> {
        if self.has_capacity() {
            self.in_flight += 1;
            Admission::Execute(item)
        } else {
            let position = self.push(item, priority);
            Admission::Queued { position }
        }
    }

    /// Append to the backlog regardless of capacity. Returns the number of
    /// items ahead of it.
    pub fn push(&mut self, item: T, priority: Priority) -> usize {
        let tier = priority.tier();
        let ahead: usize = self.tiers[..=tier].iter().map(VecDeque::len).sum();
        self.tiers[tier].push_back(item);
        ahead
    }

    /// Release one slot. Over-release is ignored.
    pub fn release(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Pop queued items in priority-then-FIFO order while capacity remains,
    /// reserving a slot for each. Items for which `is_ready` is false stay
    /// queued in place.
    pub fn drain_ready(&mut self, mut is_ready: impl FnMut(&T) -> bool) -> Vec<T> {
        let mut ready = Vec::new();
        'outer: while self.has_capacity() {
            for tier in self.tiers.iter_mut() {
                if let Some(index) = tier.iter().position(&mut is_ready)
                    && let Some(item) = tier.remove(index)
                {
                    self.in_flight += 1;
                    ready.push(item);
                    continue 'outer;
                }
            }
            break;
        }
        ready
    }

    /// Release a slot and dispatch whatever now fits.
    pub fn on_execution_complete(&mut self, is_ready: impl FnMut(&T) -> bool) -> Vec<T> {
        self.release();
        self.drain_ready(is_ready)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.tiers.iter().flat_map(VecDeque::iter)
    }

    /// Remove every queued item, leaving in-flight accounting untouched.
    pub fn clear(&mut self) -> Vec<T> {
        self.tiers.iter_mut().flat_map(|tier| tier.drain(..)).collect()
    }
}
