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

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use smart_default::SmartDefault;
use snafu::ensure;

use super::Sink;
use crate::{
    entry::Entry,
    error::{RejectedSnafu, SinkError, UnavailableSnafu},
    metrics::EngineMetrics,
};

/// An entry as the sink received it.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedLog {
    pub entry:           Entry,
    pub processed_at_ms: i64,
    pub processing_ms:   f64,
}

/// Records of each kind kept by [`MemorySink::new`].
pub const DEFAULT_MEMORY_RETENTION: usize = 10_000;

#[derive(Debug, Default)]
struct State {
    logs:           VecDeque<PersistedLog>,
    snapshots:      VecDeque<EngineMetrics>,
    fail_next_logs: usize,
    fail_metrics:   bool,
    down:           bool,
    closed:         bool,
}

/// In-process sink that keeps the most recent records it receives.
///
/// Used when no database is configured and as the fault injector in tests:
/// it can refuse the next N log inserts, every metrics insert, or report
/// itself down. Once `retention` logs (or snapshots) are held, each new one
/// evicts the oldest.
#[derive(Debug, SmartDefault)]
pub struct MemorySink {
    #[default(_code = "DEFAULT_MEMORY_RETENTION")]
    retention: usize,
    state:     Mutex<State>,
}

impl MemorySink {
    pub fn new() -> Self { Self::default() }

    /// A `retention` of zero is treated as one.
    pub fn with_retention(retention: usize) -> Self {
        Self {
            retention: retention.max(1),
            state:     Mutex::default(),
        }
    }

    pub const fn retention(&self) -> usize { self.retention }

    /// Reject the next `count` calls to `insert_log`.
    pub fn fail_next_logs(&self, count: usize) { self.state.lock().fail_next_logs = count; }

    pub fn fail_metrics(&self, fail: bool) { self.state.lock().fail_metrics = fail; }

    /// While down, every call fails with `Unavailable`.
    pub fn set_down(&self, down: bool) { self.state.lock().down = down; }

    pub fn logs(&self) -> Vec<PersistedLog> { self.state.lock().logs.iter().cloned().collect() }

    pub fn persisted_ids(&self) -> Vec<u64> {
        self.state.lock().logs.iter().map(|log| log.entry.id()).collect()
    }

    pub fn snapshots(&self) -> Vec<EngineMetrics> {
        self.state.lock().snapshots.iter().cloned().collect()
    }

    pub fn is_closed(&self) -> bool { self.state.lock().closed }
}

#[async_trait]
impl Sink for MemorySink {
    async fn insert_log(
        &self,
        entry: &Entry,
        processed_at_ms: i64,
        processing_ms: f64,
    ) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        ensure!(!state.down, UnavailableSnafu { reason: "memory sink is down" });
        if state.fail_next_logs > 0 {
            state.fail_next_logs -= 1;
            return RejectedSnafu {
                operation: "insert_log",
                reason:    format!("injected failure for log {}", entry.id()),
            }
            .fail();
        }
        retain(
            &mut state.logs,
            self.retention,
            PersistedLog {
                entry: entry.clone(),
                processed_at_ms,
                processing_ms,
            },
        );
        Ok(())
    }

    async fn insert_metrics(&self, snapshot: &EngineMetrics) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        ensure!(!state.down, UnavailableSnafu { reason: "memory sink is down" });
        ensure!(
            !state.fail_metrics,
            RejectedSnafu {
                operation: "insert_metrics",
                reason:    "injected failure",
            }
        );
        retain(&mut state.snapshots, self.retention, snapshot.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), SinkError> {
        ensure!(
            !self.state.lock().down,
            UnavailableSnafu { reason: "memory sink is down" }
        );
        Ok(())
    }

    async fn close(&self) { self.state.lock().closed = true; }
}

fn retain<T>(history: &mut VecDeque<T>, retention: usize, item: T) {
    while history.len() >= retention {
        history.pop_front();
    }
    history.push_back(item);
}
