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

mod memory;

use async_trait::async_trait;
pub use memory::{DEFAULT_MEMORY_RETENTION, MemorySink, PersistedLog};

use crate::{entry::Entry, error::SinkError, metrics::EngineMetrics};

/// Durable destination for delivered entries.
///
/// The processor calls into a sink strictly outside the buffer lock, so an
/// implementation may block on network I/O for as long as it needs. Any
/// error from `insert_log` makes the processor requeue the entry and stop
/// the batch; the sink does not have to be idempotent across that retry
/// beyond what at-least-once delivery implies.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use logbuf_engine::{EngineMetrics, Entry, Sink, SinkError};
///
/// struct Discard;
///
/// #[async_trait]
/// impl Sink for Discard {
///     async fn insert_log(&self, _: &Entry, _: i64, _: f64) -> Result<(), SinkError> { Ok(()) }
///
///     async fn insert_metrics(&self, _: &EngineMetrics) -> Result<(), SinkError> { Ok(()) }
///
///     async fn ping(&self) -> Result<(), SinkError> { Ok(()) }
/// }
/// ```
#[async_trait]
pub trait Sink: Send + Sync + 'static {
    /// Persists one entry together with when and how fast it was delivered.
    async fn insert_log(
        &self,
        entry: &Entry,
        processed_at_ms: i64,
        processing_ms: f64,
    ) -> Result<(), SinkError>;

    /// Persists a metrics snapshot. Failures here never fail a batch.
    async fn insert_metrics(&self, snapshot: &EngineMetrics) -> Result<(), SinkError>;

    /// Health check.
    async fn ping(&self) -> Result<(), SinkError>;

    /// Releases connections. Called once, after the final drain.
    async fn close(&self) {}
}
