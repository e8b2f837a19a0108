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

use logbuf_app::{AppConfig, DbStatus, Error, HealthStatus, LogEngine, ShutdownReport, SinkKind};
use logbuf_engine::{EngineConfig, ErrorKind, MemorySink};

fn engine_with(config: EngineConfig) -> (LogEngine, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let engine = LogEngine::with_sink(config, sink.clone()).unwrap();
    (engine, sink)
}

fn small() -> EngineConfig {
    EngineConfig::builder()
        .buffer_capacity(8)
        .auto_process_threshold(8)
        .process_batch_size(3)
        .pending_preview_limit(2)
        .build()
}

#[tokio::test]
async fn empty_level_and_source_get_defaults() {
    let (engine, _sink) = engine_with(small());
    engine.add_log("", "", "hello").await.unwrap();

    let preview = engine.pending().unwrap();
    assert_eq!(preview.items[0].level(), "INFO");
    assert_eq!(preview.items[0].source(), "api");
}

#[tokio::test]
async fn threshold_triggers_a_batch() {
    let config = EngineConfig::builder()
        .buffer_capacity(10)
        .auto_process_threshold(3)
        .process_batch_size(2)
        .build();
    let (engine, sink) = engine_with(config);

    engine.add_log("INFO", "t", "one").await.unwrap();
    engine.add_log("INFO", "t", "two").await.unwrap();
    assert!(sink.persisted_ids().is_empty());

    engine.add_log("INFO", "t", "three").await.unwrap();
    assert_eq!(sink.persisted_ids(), vec![1, 2]);
    assert_eq!(engine.metrics().unwrap().queue_depth, 1);
}

#[tokio::test]
async fn auto_process_failure_surfaces_but_keeps_the_entry() {
    let config = EngineConfig::builder()
        .buffer_capacity(4)
        .auto_process_threshold(1)
        .build();
    let (engine, sink) = engine_with(config);
    sink.fail_next_logs(1);

    let err = engine.add_log("INFO", "t", "kept").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PersistenceError);
    assert_eq!(engine.pending().unwrap().queue_depth, 1);
}

#[tokio::test]
async fn process_uses_batch_size_when_zero() {
    let (engine, sink) = engine_with(small());
    for i in 0..5 {
        engine.add_log("INFO", "t", &format!("m{i}")).await.unwrap();
    }

    let report = engine.process(0).await.unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(sink.persisted_ids(), vec![1, 2, 3]);

    let report = engine.process(10).await.unwrap();
    assert_eq!(report.processed, 2);
}

#[tokio::test]
async fn pending_honours_preview_limit() {
    let (engine, _sink) = engine_with(small());
    for i in 0..4 {
        engine.add_log("INFO", "t", &format!("m{i}")).await.unwrap();
    }
    let preview = engine.pending().unwrap();
    assert_eq!(preview.queue_depth, 4);
    assert_eq!(preview.returned, 2);
    assert_eq!(preview.items[0].message(), "m0");
}

#[tokio::test]
async fn health_reflects_sink_state() {
    let (engine, sink) = engine_with(small());
    engine.add_log("INFO", "t", "m").await.unwrap();

    let health = engine.health().await.unwrap();
    assert!(health.is_healthy());
    assert_eq!(health.db, DbStatus::Up);
    assert_eq!(health.queue_depth, 1);

    sink.set_down(true);
    let health = engine.health().await.unwrap();
    assert_eq!(health.status, HealthStatus::Degraded);
    assert_eq!(health.db, DbStatus::Down);
    assert_eq!(
        serde_json::to_string(&health).unwrap(),
        r#"{"status":"degraded","db":"down","queue_depth":1}"#
    );
}

#[tokio::test]
async fn shutdown_drains_then_closes() {
    let (engine, sink) = engine_with(small());
    for i in 0..7 {
        engine.add_log("INFO", "t", &format!("m{i}")).await.unwrap();
    }

    let report = engine.shutdown().await;
    assert_eq!(
        report,
        ShutdownReport {
            drained:   7,
            discarded: 0,
        }
    );
    assert_eq!(sink.persisted_ids(), (1..=7).collect::<Vec<_>>());
    assert!(sink.is_closed());
    assert!(!engine.is_open());

    assert_eq!(engine.shutdown().await, ShutdownReport::default());
}

#[tokio::test]
async fn shutdown_discards_what_the_sink_refuses() {
    let (engine, sink) = engine_with(small());
    for i in 0..5 {
        engine.add_log("INFO", "t", &format!("m{i}")).await.unwrap();
    }
    sink.set_down(true);

    let report = engine.shutdown().await;
    assert_eq!(report.drained, 0);
    assert_eq!(report.discarded, 5);
}

#[tokio::test]
async fn closed_engine_reports_not_initialized() {
    let (engine, _sink) = engine_with(small());
    engine.shutdown().await;

    let kinds = [
        engine.add_log("INFO", "t", "late").await.unwrap_err().kind(),
        engine.pending().unwrap_err().kind(),
        engine.process(0).await.unwrap_err().kind(),
        engine.metrics().unwrap_err().kind(),
        engine.health().await.unwrap_err().kind(),
    ];
    assert!(kinds.iter().all(|kind| *kind == ErrorKind::NotInitialized));
}

#[tokio::test]
async fn concurrent_producers_share_the_handle() {
    let config = EngineConfig::builder()
        .buffer_capacity(1000)
        .auto_process_threshold(50)
        .process_batch_size(25)
        .build();
    let sink = Arc::new(MemorySink::new());
    let engine = Arc::new(LogEngine::with_sink(config, sink.clone()).unwrap());

    let mut tasks = Vec::new();
    for producer in 0..4 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..100 {
                engine
                    .add_log("INFO", &format!("p{producer}"), &format!("m{i}"))
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    engine.shutdown().await;

    let ids = sink.persisted_ids();
    assert_eq!(ids.len(), 400);
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn memory_sink_can_be_selected_by_config() {
    let config = AppConfig {
        sink: SinkKind::Memory,
        buffer_capacity: 4,
        ..AppConfig::default()
    };
    let engine = LogEngine::open(&config).await.unwrap();
    assert_eq!(engine.config().auto_process_threshold, 4);
    assert!(engine.health().await.unwrap().is_healthy());
}

#[tokio::test]
async fn zero_capacity_is_refused() {
    let config = EngineConfig::builder().buffer_capacity(0).build();
    let err = LogEngine::with_sink(config, Arc::new(MemorySink::new()))
        .err()
        .unwrap();
    assert!(matches!(err, Error::InvalidConfig { .. }));
}
