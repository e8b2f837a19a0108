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

use std::sync::Arc;

use logbuf_engine::{
    BufferEngine, EngineConfig, EngineError, MemorySink, MetricsReport, Preview, ProcessReport,
    QueueProcessor, Result, Sink, now_ms,
};
use logbuf_storage_postgres::PostgresSink;
use serde::Serialize;
use snafu::ResultExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::{
    config::{AppConfig, SinkKind},
    error::{ConnectSinkSnafu, Error as AppError, InvalidConfigSnafu},
};

pub const DEFAULT_LEVEL: &str = "INFO";
pub const DEFAULT_SOURCE: &str = "api";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DbStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status:      HealthStatus,
    pub db:          DbStatus,
    pub queue_depth: usize,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool { self.status == HealthStatus::Ok }
}

/// What a shutdown did with the entries still buffered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Delivered by the final drain.
    pub drained:   usize,
    /// Still queued when the drain stopped, then dropped.
    pub discarded: usize,
}

/// Runtime handle: one buffer, one sink and the single processor draining it.
///
/// Share it as `Arc<LogEngine>`. Producers may call [`LogEngine::add_log`]
/// concurrently; batch processing is serialized internally so delivery order
/// is the ingestion order.
pub struct LogEngine {
    config:    EngineConfig,
    buffer:    Arc<BufferEngine>,
    sink:      Arc<dyn Sink>,
    processor: Mutex<QueueProcessor>,
}

impl LogEngine {
    /// Builds the configured sink and an empty buffer.
    #[tracing::instrument(level = "debug", skip_all, fields(sink = %config.sink), err)]
    pub async fn open(config: &AppConfig) -> Result<Self, AppError> {
        let engine = config.engine()?;
        let sink: Arc<dyn Sink> = match config.sink {
            SinkKind::Memory => Arc::new(MemorySink::with_retention(config.memory_retention)),
            SinkKind::Postgres => Arc::new(
                PostgresSink::connect(&config.postgres())
                    .await
                    .context(ConnectSinkSnafu)?,
            ),
        };
        Self::with_sink(engine, sink)
    }

    /// Uses an already constructed sink. `config` is normalized first.
    pub fn with_sink(config: EngineConfig, sink: Arc<dyn Sink>) -> Result<Self, AppError> {
        let invalid = |err: EngineError| {
            InvalidConfigSnafu {
                reason: err.to_string(),
            }
            .build()
        };
        let config = config.normalize().map_err(invalid)?;
        let buffer = Arc::new(BufferEngine::new(config.buffer_capacity).map_err(invalid)?);
        let processor = QueueProcessor::new(buffer.clone(), sink.clone(), config.process_batch_size);
        info!(
            component = "engine_api",
            capacity = config.buffer_capacity,
            auto_process_threshold = config.auto_process_threshold,
            batch_size = config.process_batch_size,
            "runtime initialized"
        );
        Ok(Self {
            config,
            buffer,
            sink,
            processor: Mutex::new(processor),
        })
    }

    pub const fn config(&self) -> &EngineConfig { &self.config }

    pub fn is_open(&self) -> bool { self.buffer.is_open() }

    /// Enqueues one entry and returns its id.
    ///
    /// Empty `level` and `source` become `INFO` and `api`. Once the queue
    /// reaches the auto-process threshold a batch runs before returning, and
    /// a failure of that batch is returned even though the entry itself was
    /// accepted.
    pub async fn add_log(&self, level: &str, source: &str, message: &str) -> Result<u64> {
        let level = if level.is_empty() { DEFAULT_LEVEL } else { level };
        let source = if source.is_empty() { DEFAULT_SOURCE } else { source };
        let id = self.buffer.enqueue(level, source, message)?;

        let depth = self.buffer.len()?;
        if depth >= self.config.auto_process_threshold {
            debug!(component = "engine_api", depth, "auto-process threshold reached");
            self.process(self.config.process_batch_size).await?;
        }
        Ok(id)
    }

    /// The oldest `pending_preview_limit` entries and the true depth.
    pub fn pending(&self) -> Result<Preview> { self.buffer.preview(self.config.pending_preview_limit) }

    /// Runs one batch. `max_items` of 0 uses the configured batch size.
    pub async fn process(&self, max_items: usize) -> Result<ProcessReport> {
        self.processor.lock().await.process(max_items).await
    }

    pub fn metrics(&self) -> Result<MetricsReport> { Ok(self.buffer.metrics()?.report(now_ms())) }

    /// Pings the sink. A failed ping degrades health but is not an error.
    pub async fn health(&self) -> Result<HealthReport> {
        let queue_depth = self.buffer.len()?;
        let (status, db) = match self.sink.ping().await {
            Ok(()) => (HealthStatus::Ok, DbStatus::Up),
            Err(err) => {
                error!(component = "engine_api", error = %err, "sink health check failed");
                (HealthStatus::Degraded, DbStatus::Down)
            }
        };
        Ok(HealthReport {
            status,
            db,
            queue_depth,
        })
    }

    /// Drains what the sink will take, then closes the buffer and the sink.
    ///
    /// The drain stops at the first empty batch or the first failure; what
    /// is left is discarded. Later calls return an empty report.
    pub async fn shutdown(&self) -> ShutdownReport {
        let mut processor = self.processor.lock().await;
        if !self.buffer.is_open() {
            return ShutdownReport::default();
        }

        let mut drained = 0;
        loop {
            match processor.process(self.config.process_batch_size).await {
                Ok(report) if report.processed > 0 => drained += report.processed,
                Ok(_) => break,
                Err(err) => {
                    drained += err.processed();
                    error!(
                        component = "engine_api",
                        error = %err,
                        "final drain stopped early"
                    );
                    break;
                }
            }
        }

        let discarded = self.buffer.shutdown();
        self.sink.close().await;
        drop(processor);
        info!(component = "engine_api", drained, discarded, "runtime shutdown completed");
        ShutdownReport { drained, discarded }
    }
}
