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

//! Delivery accounting.
//!
//! [`EngineMetrics`] is the per-engine snapshot handed to sinks and API
//! callers. The prometheus statics below are process-wide mirrors for
//! scraping and are never read back by the engine.

use std::sync::LazyLock;

use prometheus::{
    Histogram, IntCounter, IntCounterVec, IntGauge, register_histogram, register_int_counter,
    register_int_counter_vec, register_int_gauge,
};
use serde::Serialize;

use crate::{entry::ENTRY_FOOTPRINT_BYTES, error::ErrorKind};

pub const ERROR_KIND_LABEL: &str = "kind";

/// Point-in-time copy of an engine's counters and gauges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineMetrics {
    pub total_ingested:        u64,
    pub total_processed:       u64,
    pub total_errors:          u64,
    pub queue_depth:           usize,
    pub buffer_capacity:       usize,
    pub memory_bytes_estimate: usize,
    pub last_processing_ms:    f64,
    pub started_at_ms:         i64,
    /// Zero until the first successful delivery.
    pub last_processed_at_ms:  i64,
}

impl EngineMetrics {
    pub(crate) const fn new(buffer_capacity: usize, started_at_ms: i64) -> Self {
        Self {
            total_ingested: 0,
            total_processed: 0,
            total_errors: 0,
            queue_depth: 0,
            buffer_capacity,
            memory_bytes_estimate: 0,
            last_processing_ms: 0.0,
            started_at_ms,
            last_processed_at_ms: 0,
        }
    }

    pub(crate) fn set_depth(&mut self, depth: usize) {
        self.queue_depth = depth;
        self.memory_bytes_estimate = depth * ENTRY_FOOTPRINT_BYTES;
        QUEUE_DEPTH.set(i64::try_from(depth).unwrap_or(i64::MAX));
    }

    /// Shapes the snapshot for API consumers.
    #[allow(clippy::cast_precision_loss)]
    pub fn report(&self, now_ms: i64) -> MetricsReport {
        let uptime_ms = now_ms.saturating_sub(self.started_at_ms).max(0);
        MetricsReport {
            total_ingested:        self.total_ingested,
            total_processed:       self.total_processed,
            total_errors:          self.total_errors,
            queue_depth:           self.queue_depth,
            buffer_capacity:       self.buffer_capacity,
            memory_bytes_estimate: self.memory_bytes_estimate,
            last_processing_ms:    self.last_processing_ms,
            uptime_seconds:        uptime_ms as f64 / 1000.0,
        }
    }
}

/// The metrics document served to clients; field order is part of the
/// contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub total_ingested:        u64,
    pub total_processed:       u64,
    pub total_errors:          u64,
    pub queue_depth:           usize,
    pub buffer_capacity:       usize,
    pub memory_bytes_estimate: usize,
    pub last_processing_ms:    f64,
    pub uptime_seconds:        f64,
}

pub static LOGS_INGESTED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("logbuf_logs_ingested_total", "Total number of logs accepted").unwrap()
});

pub static LOGS_PROCESSED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "logbuf_logs_processed_total",
        "Total number of logs persisted to the sink"
    )
    .unwrap()
});

pub static LOGS_REQUEUED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "logbuf_logs_requeued_total",
        "Total number of logs returned to the queue head after a sink failure"
    )
    .unwrap()
});

pub static LOGS_LOST: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "logbuf_logs_lost_total",
        "Total number of logs dropped because requeue was rejected"
    )
    .unwrap()
});

pub static ENGINE_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "logbuf_errors_total",
        "Total number of engine errors by kind",
        &[ERROR_KIND_LABEL]
    )
    .unwrap()
});

pub static QUEUE_DEPTH: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("logbuf_queue_depth", "Entries currently buffered").unwrap()
});

pub static BATCH_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "logbuf_batch_duration_seconds",
        "Wall-clock duration of process calls in seconds"
    )
    .unwrap()
});

pub(crate) fn count_error(kind: ErrorKind) {
    ENGINE_ERRORS.with_label_values(&[kind.as_str()]).inc();
}
