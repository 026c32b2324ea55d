// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Record of event-log entries that were delivered.
//!
//! # Retention
//!
//! The set is bounded by count. When an insert pushes it past its capacity the
//! oldest keys are evicted first. Modems keep a short rolling event log, so by the
//! time a key is evicted the entry it names has long left the device and cannot be
//! fetched again.

use std::collections::{HashSet, VecDeque};
use std::sync::RwLock;

/// Default number of identity keys retained.
///
/// # Value: 10,000 keys
///
/// A cable modem event log holds a few hundred entries at most, so this covers
/// many full rotations of the log.
pub const DEFAULT_SEEN_CAPACITY: usize = 10_000;

#[derive(Debug, Default)]
struct Inner {
    keys: HashSet<String>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
}

/// Thread-safe set of identity keys (see [`crate::model::LogEntry::identity_key`]).
///
/// Membership checks take a shared lock and can run concurrently; inserts take the
/// exclusive lock for the whole batch.
#[derive(Debug)]
pub struct SeenSet {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SEEN_CAPACITY)
    }
}

impl SeenSet {
    /// Creates a set retaining at most `capacity` keys. A capacity of zero is treated
    /// as one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        SeenSet {
            inner: RwLock::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        #[allow(clippy::expect_used)]
        let inner = self.inner.read().expect("lock poisoned");
        inner.keys.contains(key)
    }

    /// Inserts every key, evicting the oldest keys beyond capacity.
    ///
    /// Keys from the batch being inserted are never evicted by that same insert, so a
    /// batch larger than the capacity is retained whole until the next insert.
    pub fn insert_all<I>(&self, keys: I)
    where
        I: IntoIterator<Item = String>,
    {
        #[allow(clippy::expect_used)]
        let mut inner = self.inner.write().expect("lock poisoned");
        let mut added = 0;
        for key in keys {
            if inner.keys.insert(key.clone()) {
                inner.order.push_back(key);
                added += 1;
            }
        }
        let limit = self.capacity.max(added);
        while inner.order.len() > limit {
            if let Some(oldest) = inner.order.pop_front() {
                inner.keys.remove(&oldest);
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        #[allow(clippy::expect_used)]
        let inner = self.inner.read().expect("lock poisoned");
        inner.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
