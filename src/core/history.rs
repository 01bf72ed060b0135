//! Bounded step-history buffers.
//!
//! The two engines retain history differently: the ensemble appends into a
//! large bounded buffer (default cap 10_000), the attention field keeps a
//! small fixed ring (cap 500). Both evict oldest-first; the policy enum keeps
//! the asymmetry explicit and per-instance instead of hardcoding it twice.

use std::collections::VecDeque;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default cap for the ensemble's append-style history.
pub const DEFAULT_APPEND_CAP: usize = 10_000;

/// Default cap for the attention field's ring history.
pub const DEFAULT_RING_CAP: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EvictionPolicy {
    /// Grows until `cap`, then drops the oldest entry per push.
    /// Intended for long traces where the cap is rarely reached.
    BoundedAppend { cap: usize },
    /// Fixed-size ring: steady-state length is exactly `cap`.
    FixedRing { cap: usize },
}

impl EvictionPolicy {
    pub fn cap(&self) -> usize {
        match *self {
            EvictionPolicy::BoundedAppend { cap } => cap,
            EvictionPolicy::FixedRing { cap } => cap,
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct History<T> {
    entries: VecDeque<T>,
    policy: EvictionPolicy,
}

impl<T> History<T> {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            entries: VecDeque::new(),
            policy,
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Append one entry, evicting the oldest once past the cap.
    pub fn push(&mut self, entry: T) {
        let cap = self.policy.cap();
        if cap == 0 {
            return;
        }
        while self.entries.len() >= cap {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.entries.get(idx)
    }

    pub fn back(&self) -> Option<&T> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}
