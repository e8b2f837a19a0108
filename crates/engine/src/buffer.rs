// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The shared buffer.
//!
//! One mutex guards the queue, the id counter and the metrics together, so
//! every public operation is a single short critical section. Nothing in
//! here awaits or performs I/O while the lock is held.

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use snafu::{ResultExt, ensure};
use tracing::debug;

use crate::{
    entry::{self, Entry, now_ms},
    error::{
        AllocationFailureSnafu, CapacityExceededSnafu, EngineError, ErrorKind, NotInitializedSnafu,
        Result, ValidationSnafu,
    },
    metrics::{EngineMetrics, LOGS_INGESTED, LOGS_PROCESSED, count_error},
    queue::BoundedQueue,
};

/// Read-only view of the oldest buffered entries.
///
/// Serializes as `{"queue_depth":..,"items":[..],"returned":..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub queue_depth: usize,
    pub items:       Vec<Entry>,
    pub returned:    usize,
}

#[derive(Debug)]
struct Inner {
    queue:   BoundedQueue,
    next_id: u64,
    metrics: EngineMetrics,
    open:    bool,
}

/// Bounded FIFO of log entries plus the delivery counters that describe it.
///
/// Safe to share between any number of producers behind an `Arc`. Draining
/// is done by [`crate::QueueProcessor`], of which only one should run at a
/// time per engine.
#[derive(Debug)]
pub struct BufferEngine {
    capacity: usize,
    inner:    Mutex<Inner>,
}

impl BufferEngine {
    pub fn new(capacity: usize) -> Result<Self> {
        ensure!(
            capacity > 0,
            ValidationSnafu {
                reason: "buffer capacity must be greater than zero",
            }
        );
        Ok(Self {
            capacity,
            inner: Mutex::new(Inner {
                queue:   BoundedQueue::new(),
                next_id: 1,
                metrics: EngineMetrics::new(capacity, now_ms()),
                open:    true,
            }),
        })
    }

    pub const fn capacity(&self) -> usize { self.capacity }

    fn lock_open(&self) -> Result<MutexGuard<'_, Inner>> {
        let inner = self.inner.lock();
        ensure!(inner.open, NotInitializedSnafu);
        Ok(inner)
    }

    /// Appends a new entry and returns its id.
    ///
    /// Fields are checked before the lock is taken, so a rejected entry
    /// leaves the queue and counters untouched: `total_errors` tracks engine
    /// and delivery faults, not malformed input. A full buffer or a failed
    /// allocation counts towards `total_errors`.
    pub fn enqueue(&self, level: &str, source: &str, message: &str) -> Result<u64> {
        if let Err(err) = entry::validate(level, source, message) {
            count_error(ErrorKind::ValidationError);
            return Err(err);
        }

        let mut inner = self.lock_open()?;
        if inner.queue.len() >= self.capacity {
            inner.metrics.total_errors += 1;
            count_error(ErrorKind::CapacityExceeded);
            return CapacityExceededSnafu {
                capacity: self.capacity,
            }
            .fail();
        }
        if let Err(err) = inner.queue.try_reserve(1).context(AllocationFailureSnafu) {
            inner.metrics.total_errors += 1;
            count_error(ErrorKind::AllocationFailure);
            return Err(err);
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.queue.push_back(Entry::new(
            id,
            level.to_owned(),
            source.to_owned(),
            message.to_owned(),
            now_ms(),
        ));
        inner.metrics.total_ingested += 1;
        let depth = inner.queue.len();
        inner.metrics.set_depth(depth);
        LOGS_INGESTED.inc();
        Ok(id)
    }

    /// Removes the head entry, or returns `None` when the buffer is empty.
    pub fn dequeue(&self) -> Result<Option<Entry>> {
        let mut inner = self.lock_open()?;
        let entry = inner.queue.pop_front();
        if entry.is_some() {
            let depth = inner.queue.len();
            inner.metrics.set_depth(depth);
        }
        Ok(entry)
    }

    /// Puts a previously dequeued entry back at the head.
    ///
    /// When the buffer filled up in the meantime the entry is handed back
    /// alongside the error; the caller owns the decision to drop it.
    pub fn requeue_front(&self, entry: Entry) -> std::result::Result<(), (EngineError, Entry)> {
        let mut inner = match self.lock_open() {
            Ok(inner) => inner,
            Err(err) => return Err((err, entry)),
        };
        if inner.queue.len() >= self.capacity {
            let err = CapacityExceededSnafu {
                capacity: self.capacity,
            }
            .build();
            return Err((err, entry));
        }
        if let Err(err) = inner.queue.try_reserve(1).context(AllocationFailureSnafu) {
            return Err((err, entry));
        }
        let log_id = entry.id();
        inner.queue.push_front(entry);
        let depth = inner.queue.len();
        inner.metrics.set_depth(depth);
        drop(inner);
        debug!(component = "buffer_engine", log_id, "requeued at head");
        Ok(())
    }

    /// Records one successful delivery. No-op on a closed engine.
    pub fn mark_processed(&self, latency_ms: f64) {
        let mut inner = self.inner.lock();
        if !inner.open {
            return;
        }
        inner.metrics.total_processed += 1;
        inner.metrics.last_processing_ms = latency_ms;
        inner.metrics.last_processed_at_ms = now_ms();
        LOGS_PROCESSED.inc();
    }

    /// Records one failure. No-op on a closed engine.
    pub fn mark_error(&self) {
        let mut inner = self.inner.lock();
        if inner.open {
            inner.metrics.total_errors += 1;
        }
    }

    pub fn metrics(&self) -> Result<EngineMetrics> { Ok(self.lock_open()?.metrics.clone()) }

    pub fn len(&self) -> Result<usize> { Ok(self.lock_open()?.queue.len()) }

    pub fn is_empty(&self) -> Result<bool> { Ok(self.len()? == 0) }

    /// Copies up to `max_items` entries from the head without removing them.
    pub fn preview(&self, max_items: usize) -> Result<Preview> {
        let inner = self.lock_open()?;
        let items: Vec<Entry> = inner.queue.iter().take(max_items).cloned().collect();
        Ok(Preview {
            queue_depth: inner.queue.len(),
            returned: items.len(),
            items,
        })
    }

    pub fn is_open(&self) -> bool { self.inner.lock().open }

    /// Drops every buffered entry and closes the engine.
    ///
    /// Subsequent operations fail with `NotInitialized`. Calling it again is
    /// harmless. Returns how many entries were discarded.
    pub fn shutdown(&self) -> usize {
        let mut inner = self.inner.lock();
        if !inner.open {
            return 0;
        }
        let discarded = inner.queue.len();
        inner.queue.clear();
        inner.metrics.set_depth(0);
        inner.open = false;
        drop(inner);
        debug!(component = "buffer_engine", discarded, "buffer closed");
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        let err = BufferEngine::new(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let engine = BufferEngine::new(4).unwrap();
        assert_eq!(engine.enqueue("INFO", "t", "a").unwrap(), 1);
        assert_eq!(engine.enqueue("INFO", "t", "b").unwrap(), 2);
        engine.dequeue().unwrap();
        assert_eq!(engine.enqueue("INFO", "t", "c").unwrap(), 3);
    }

    #[test]
    fn capacity_rejection_counts_an_error() {
        let engine = BufferEngine::new(1).unwrap();
        engine.enqueue("INFO", "t", "a").unwrap();
        let err = engine.enqueue("INFO", "t", "b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapacityExceeded);

        let metrics = engine.metrics().unwrap();
        assert_eq!(metrics.queue_depth, 1);
        assert_eq!(metrics.total_ingested, 1);
        assert_eq!(metrics.total_errors, 1);
    }

    #[test]
    fn validation_rejection_leaves_counters_alone() {
        let engine = BufferEngine::new(2).unwrap();
        let before = engine.metrics().unwrap();
        for (level, message) in [("INFO", ""), ("INFO", "a\0b"), ("LEVEL-TOO-LONG-X", "m")] {
            let err = engine.enqueue(level, "t", message).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValidationError);
        }
        assert_eq!(engine.metrics().unwrap(), before);
        assert!(engine.is_empty().unwrap());
    }

    #[test]
    fn requeue_hands_entry_back_when_full() {
        let engine = BufferEngine::new(1).unwrap();
        engine.enqueue("INFO", "t", "a").unwrap();
        let entry = engine.dequeue().unwrap().unwrap();
        engine.enqueue("INFO", "t", "b").unwrap();

        let (err, returned) = engine.requeue_front(entry).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
        assert_eq!(returned.id(), 1);
        assert_eq!(returned.message(), "a");
        // Requeue rejection is reported by the caller, not counted here.
        assert_eq!(engine.metrics().unwrap().total_errors, 0);
    }

    #[test]
    fn mark_processed_records_latency() {
        let engine = BufferEngine::new(2).unwrap();
        engine.mark_processed(4.5);
        engine.mark_error();
        let metrics = engine.metrics().unwrap();
        assert_eq!(metrics.total_processed, 1);
        assert_eq!(metrics.total_errors, 1);
        assert!((metrics.last_processing_ms - 4.5).abs() < f64::EPSILON);
        assert!(metrics.last_processed_at_ms >= metrics.started_at_ms);
    }

    #[test]
    fn shutdown_closes_every_operation() {
        let engine = BufferEngine::new(2).unwrap();
        engine.enqueue("INFO", "t", "a").unwrap();
        assert_eq!(engine.shutdown(), 1);
        assert_eq!(engine.shutdown(), 0);
        assert!(!engine.is_open());

        let not_init = |err: EngineError| assert_eq!(err.kind(), ErrorKind::NotInitialized);
        not_init(engine.enqueue("INFO", "t", "b").unwrap_err());
        not_init(engine.dequeue().unwrap_err());
        not_init(engine.metrics().unwrap_err());
        not_init(engine.preview(1).unwrap_err());
        not_init(engine.len().unwrap_err());
        let entry = Entry::new(1, "INFO".into(), "t".into(), "a".into(), 0);
        let (err, _) = engine.requeue_front(entry).unwrap_err();
        not_init(err);

        engine.mark_error();
        engine.mark_processed(1.0);
    }
}
