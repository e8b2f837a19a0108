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

//! Batch delivery from the buffer into a [`Sink`].
//!
//! A batch stops at the first sink failure. The failing entry goes back to
//! the head of the buffer so nothing enqueued after it can overtake it.

use std::{sync::Arc, time::Instant};

use serde::Serialize;
use snafu::IntoError;
use tracing::{debug, error, warn};

use crate::{
    buffer::BufferEngine,
    entry::{Entry, now_ms},
    error::{EngineError, ErrorKind, PersistenceSnafu, RequeueLossSnafu, Result, SinkError},
    metrics::{BATCH_DURATION_SECONDS, LOGS_LOST, LOGS_REQUEUED, count_error},
    sink::Sink,
};

/// Outcome of a successful `process` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProcessReport {
    pub processed:  usize,
    pub elapsed_ms: f64,
}

/// Drains a [`BufferEngine`] into a [`Sink`].
///
/// `process` takes `&mut self`, so one processor never runs two batches at
/// once. Running two processors against the same buffer concurrently is
/// allowed by the types but gives up ordering; callers that share a buffer
/// keep a single processor behind a lock.
pub struct QueueProcessor {
    buffer:             Arc<BufferEngine>,
    sink:               Arc<dyn Sink>,
    default_batch_size: usize,
}

impl QueueProcessor {
    /// A `default_batch_size` of zero is treated as one.
    pub fn new(buffer: Arc<BufferEngine>, sink: Arc<dyn Sink>, default_batch_size: usize) -> Self {
        Self {
            buffer,
            sink,
            default_batch_size: default_batch_size.max(1),
        }
    }

    pub const fn default_batch_size(&self) -> usize { self.default_batch_size }

    pub fn buffer(&self) -> &Arc<BufferEngine> { &self.buffer }

    pub fn sink(&self) -> &Arc<dyn Sink> { &self.sink }

    /// Delivers up to `max_items` entries (the default batch size when 0).
    ///
    /// Entries delivered before a failure stay delivered. On failure the
    /// error carries how many made it, and `total_errors` grows by exactly
    /// one for the call.
    pub async fn process(&mut self, max_items: usize) -> Result<ProcessReport> {
        let started = Instant::now();
        let limit = if max_items > 0 {
            max_items
        } else {
            self.default_batch_size
        };

        let mut processed = 0;
        while processed < limit {
            let Some(entry) = self.buffer.dequeue()? else {
                break;
            };

            let in_flight = InFlight::new(&self.buffer, entry);
            let entry = in_flight.entry();

            let processed_at_ms = now_ms();
            #[allow(clippy::cast_precision_loss)]
            let latency_ms = processed_at_ms.saturating_sub(entry.ingested_at_ms()) as f64;

            match self.sink.insert_log(entry, processed_at_ms, latency_ms).await {
                Ok(()) => {
                    in_flight.delivered();
                    self.buffer.mark_processed(latency_ms);
                    processed += 1;
                }
                Err(source) => {
                    let entry = in_flight.release();
                    self.buffer.mark_error();
                    BATCH_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());
                    return Err(self.recover(entry, processed, source));
                }
            }
        }

        if processed > 0 {
            self.persist_snapshot().await;
        }

        let elapsed = started.elapsed();
        BATCH_DURATION_SECONDS.observe(elapsed.as_secs_f64());
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        debug!(component = "queue_processor", processed, elapsed_ms, "batch complete");
        Ok(ProcessReport {
            processed,
            elapsed_ms,
        })
    }

    /// Puts a failed entry back at the head and builds the batch error.
    fn recover(&self, entry: Entry, processed: usize, source: SinkError) -> EngineError {
        let id = entry.id();
        match self.buffer.requeue_front(entry) {
            Ok(()) => {
                LOGS_REQUEUED.inc();
                count_error(ErrorKind::PersistenceError);
                error!(
                    component = "queue_processor",
                    log_id = id,
                    processed,
                    error = %source,
                    "sink insert failed, log requeued"
                );
                PersistenceSnafu { id, processed }.into_error(source)
            }
            Err((requeue_err, lost)) => {
                drop(lost);
                LOGS_LOST.inc();
                count_error(ErrorKind::RequeueLoss);
                error!(
                    component = "queue_processor",
                    log_id = id,
                    processed,
                    error = %source,
                    requeue_error = %requeue_err,
                    "requeue failed, log dropped"
                );
                RequeueLossSnafu {
                    id,
                    processed,
                    reason: requeue_err.to_string(),
                }
                .into_error(source)
            }
        }
    }

    async fn persist_snapshot(&self) {
        let snapshot = match self.buffer.metrics() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                debug!(component = "queue_processor", error = %err, "skipping metrics snapshot");
                return;
            }
        };
        if let Err(err) = self.sink.insert_metrics(&snapshot).await {
            self.buffer.mark_error();
            error!(
                component = "persistence",
                error = %err,
                "failed to persist metrics snapshot"
            );
        }
    }
}

/// A dequeued entry whose delivery has not been settled yet.
///
/// If the `process` future is dropped while the sink call is pending, the
/// guard puts the entry back at the head. When that requeue is refused the
/// entry is counted and reported as lost, like a failed delivery.
struct InFlight<'a> {
    buffer: &'a BufferEngine,
    entry:  Option<Entry>,
}

impl<'a> InFlight<'a> {
    const fn new(buffer: &'a BufferEngine, entry: Entry) -> Self {
        Self {
            buffer,
            entry: Some(entry),
        }
    }

    // Only `delivered` and `release` take the entry, and both consume the guard.
    fn entry(&self) -> &Entry {
        self.entry
            .as_ref()
            .unwrap_or_else(|| unreachable!("in-flight entry already settled"))
    }

    fn delivered(mut self) { self.entry = None; }

    fn release(mut self) -> Entry {
        self.entry
            .take()
            .unwrap_or_else(|| unreachable!("in-flight entry already settled"))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let Some(entry) = self.entry.take() else {
            return;
        };
        let id = entry.id();
        match self.buffer.requeue_front(entry) {
            Ok(()) => {
                LOGS_REQUEUED.inc();
                warn!(
                    component = "queue_processor",
                    log_id = id,
                    "delivery cancelled, log requeued"
                );
            }
            Err((requeue_err, lost)) => {
                drop(lost);
                self.buffer.mark_error();
                LOGS_LOST.inc();
                count_error(ErrorKind::RequeueLoss);
                error!(
                    component = "queue_processor",
                    log_id = id,
                    requeue_error = %requeue_err,
                    "requeue failed, log dropped"
                );
            }
        }
    }
}
