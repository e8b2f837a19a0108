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

//! PostgreSQL implementation of [`logbuf_engine::Sink`].
//!
//! Delivered entries go to `processed_logs`, metrics snapshots to
//! `processing_metrics`. Both tables are created on connect if missing.

mod config;
mod err;

use async_trait::async_trait;
pub use config::PostgresConfig;
pub use err::{Error, Result};
use logbuf_engine::{EngineMetrics, Entry, Sink, SinkError, error::BackendSnafu};
use snafu::{IntoError, ResultExt};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;

use crate::err::{ConnectSnafu, SchemaSnafu};

const CREATE_PROCESSED_LOGS: &str = "CREATE TABLE IF NOT EXISTS processed_logs (
    id BIGSERIAL PRIMARY KEY,
    log_id BIGINT NOT NULL,
    level TEXT NOT NULL,
    source TEXT NOT NULL,
    message TEXT NOT NULL,
    ingested_at TIMESTAMPTZ NOT NULL,
    processed_at TIMESTAMPTZ NOT NULL,
    processing_ms DOUBLE PRECISION NOT NULL
)";

const CREATE_PROCESSING_METRICS: &str = "CREATE TABLE IF NOT EXISTS processing_metrics (
    id BIGSERIAL PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    total_ingested BIGINT NOT NULL,
    total_processed BIGINT NOT NULL,
    total_errors BIGINT NOT NULL,
    queue_depth BIGINT NOT NULL,
    buffer_capacity BIGINT NOT NULL,
    memory_bytes BIGINT NOT NULL,
    last_processing_ms DOUBLE PRECISION NOT NULL
)";

const INSERT_LOG: &str = "INSERT INTO processed_logs
    (log_id, level, source, message, ingested_at, processed_at, processing_ms)
    VALUES ($1, $2, $3, $4, to_timestamp($5), to_timestamp($6), $7)";

const INSERT_METRICS: &str = "INSERT INTO processing_metrics
    (total_ingested, total_processed, total_errors, queue_depth, buffer_capacity, memory_bytes,
     last_processing_ms)
    VALUES ($1, $2, $3, $4, $5, $6, $7)";

/// Sink backed by a small PostgreSQL connection pool.
#[derive(Clone)]
pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    /// Connects and makes sure both tables exist.
    #[tracing::instrument(level = "debug", skip_all, fields(host = %config.host, port = config.port), err)]
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(config.connect_timeout)
            .connect_with(config.connect_options())
            .await
            .context(ConnectSnafu {
                host: &config.host,
                port: config.port,
            })?;

        let sink = Self { pool };
        sink.ensure_schema().await?;
        info!(
            component = "persistence",
            host = %config.host,
            database = %config.database,
            "postgres connection initialized"
        );
        Ok(sink)
    }

    pub fn pool(&self) -> &PgPool { &self.pool }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_PROCESSED_LOGS)
            .execute(&self.pool)
            .await
            .context(SchemaSnafu {
                table: "processed_logs",
            })?;
        sqlx::query(CREATE_PROCESSING_METRICS)
            .execute(&self.pool)
            .await
            .context(SchemaSnafu {
                table: "processing_metrics",
            })?;
        Ok(())
    }
}

fn backend(operation: &'static str) -> impl FnOnce(sqlx::Error) -> SinkError {
    move |err| BackendSnafu { operation }.into_error(Box::new(err))
}

fn to_bigint<T: TryInto<i64>>(value: T) -> i64 { value.try_into().unwrap_or(i64::MAX) }

#[allow(clippy::cast_precision_loss)]
fn epoch_seconds(ms: i64) -> f64 { ms as f64 / 1000.0 }

#[async_trait]
impl Sink for PostgresSink {
    async fn insert_log(
        &self,
        entry: &Entry,
        processed_at_ms: i64,
        processing_ms: f64,
    ) -> std::result::Result<(), SinkError> {
        sqlx::query(INSERT_LOG)
            .bind(to_bigint(entry.id()))
            .bind(entry.level())
            .bind(entry.source())
            .bind(entry.message())
            .bind(epoch_seconds(entry.ingested_at_ms()))
            .bind(epoch_seconds(processed_at_ms))
            .bind(processing_ms)
            .execute(&self.pool)
            .await
            .map_err(backend("insert_log"))?;
        Ok(())
    }

    async fn insert_metrics(&self, snapshot: &EngineMetrics) -> std::result::Result<(), SinkError> {
        sqlx::query(INSERT_METRICS)
            .bind(to_bigint(snapshot.total_ingested))
            .bind(to_bigint(snapshot.total_processed))
            .bind(to_bigint(snapshot.total_errors))
            .bind(to_bigint(snapshot.queue_depth))
            .bind(to_bigint(snapshot.buffer_capacity))
            .bind(to_bigint(snapshot.memory_bytes_estimate))
            .bind(snapshot.last_processing_ms)
            .execute(&self.pool)
            .await
            .map_err(backend("insert_metrics"))?;
        Ok(())
    }

    async fn ping(&self) -> std::result::Result<(), SinkError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(backend("ping"))?;
        Ok(())
    }

    async fn close(&self) { self.pool.close().await; }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bigint_conversion_saturates() {
        assert_eq!(to_bigint(42_u64), 42);
        assert_eq!(to_bigint(u64::MAX), i64::MAX);
        assert_eq!(to_bigint(7_usize), 7);
    }

    #[test]
    fn timestamps_are_fractional_seconds() {
        assert!((epoch_seconds(1_500) - 1.5).abs() < f64::EPSILON);
        assert!(epoch_seconds(0).abs() < f64::EPSILON);
    }

    #[test]
    fn backend_errors_name_the_operation() {
        let err = backend("ping")(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, SinkError::Backend { operation: "ping", .. }));
        assert_eq!(err.to_string(), "Sink backend failed during ping");
    }
}
