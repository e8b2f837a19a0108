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

use logbuf_app::LogEngine;
use logbuf_common_telemetry::init_default_ut_logging;
use logbuf_engine::{EngineConfig, MemorySink};
use logbuf_server::{
    ServiceHandler,
    http::{RestServerConfig, start_rest_server},
};
use serde_json::{Value, json};

struct Harness {
    handler: ServiceHandler,
    sink:    Arc<MemorySink>,
    engine:  Arc<LogEngine>,
    client:  reqwest::Client,
}

impl Harness {
    async fn start(config: EngineConfig) -> Self {
        init_default_ut_logging();
        let sink = Arc::new(MemorySink::new());
        let engine = Arc::new(LogEngine::with_sink(config, sink.clone()).unwrap());
        let rest = RestServerConfig::builder()
            .bind_address("127.0.0.1:0")
            .build();
        let handler = start_rest_server(rest, engine.clone()).await.unwrap();
        Self {
            handler,
            sink,
            engine,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String { format!("http://{}{path}", self.handler.local_addr()) }

    async fn get(&self, path: &str) -> (u16, Value) {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: &Value) -> (u16, Value) {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    async fn stop(self) {
        self.handler.shutdown();
        self.handler.wait_for_stop().await.unwrap();
    }
}

fn config(capacity: usize) -> EngineConfig {
    EngineConfig::builder()
        .buffer_capacity(capacity)
        .auto_process_threshold(capacity)
        .process_batch_size(10)
        .build()
}

#[tokio::test]
async fn ingest_preview_process_metrics() {
    let harness = Harness::start(config(16)).await;

    let (status, body) = harness
        .post("/logs", &json!({"level": "ERROR", "source": "web", "message": "boom"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"status": "ok", "message": "log accepted", "id": 1}));

    let (_, body) = harness.post("/logs", &json!({"message": "defaults"})).await;
    assert_eq!(body["id"], 2);

    let (status, preview) = harness.get("/logs").await;
    assert_eq!(status, 200);
    assert_eq!(preview["queue_depth"], 2);
    assert_eq!(preview["returned"], 2);
    assert_eq!(preview["items"][0]["level"], "ERROR");
    assert_eq!(preview["items"][1]["level"], "INFO");
    assert_eq!(preview["items"][1]["source"], "api");

    let (status, body) = harness.post("/process", &json!({"max_items": 1})).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["processed"], 1);
    assert!(body["elapsed_ms"].is_number());

    let (status, metrics) = harness.get("/metrics").await;
    assert_eq!(status, 200);
    assert_eq!(metrics["total_ingested"], 2);
    assert_eq!(metrics["total_processed"], 1);
    assert_eq!(metrics["queue_depth"], 1);
    assert_eq!(metrics["buffer_capacity"], 16);
    assert!(metrics["uptime_seconds"].is_number());

    assert_eq!(harness.sink.persisted_ids(), vec![1]);
    harness.stop().await;
}

#[tokio::test]
async fn process_without_body_uses_batch_size() {
    let harness = Harness::start(config(32)).await;
    for i in 0..12 {
        harness
            .post("/logs", &json!({"message": format!("m{i}")}))
            .await;
    }

    let response = harness
        .client
        .post(harness.url("/process"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["processed"], 10);
    harness.stop().await;
}

#[tokio::test]
async fn invalid_entries_are_bad_requests() {
    let harness = Harness::start(config(4)).await;

    let (status, body) = harness.post("/logs", &json!({"message": ""})).await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = harness.post("/logs", &json!({"level": "INFO"})).await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = harness.post("/logs", &json!({"message": "a\u{0}b"})).await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = harness.post("/process", &json!({"max_items": "all"})).await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "validation_error");
    harness.stop().await;
}

#[tokio::test]
async fn full_buffer_is_too_many_requests() {
    let config = EngineConfig::builder()
        .buffer_capacity(2)
        .auto_process_threshold(2)
        .build();
    let harness = Harness::start(config).await;
    harness.sink.set_down(true);

    // The second add reaches the threshold and its auto-process fails.
    let (status, _) = harness.post("/logs", &json!({"message": "a"})).await;
    assert_eq!(status, 200);
    let (status, body) = harness.post("/logs", &json!({"message": "b"})).await;
    assert_eq!(status, 502);
    assert_eq!(body["code"], "persistence_error");

    let (status, body) = harness.post("/logs", &json!({"message": "c"})).await;
    assert_eq!(status, 429);
    assert_eq!(body["code"], "capacity_exceeded");
    harness.stop().await;
}

#[tokio::test]
async fn sink_failure_surfaces_from_process() {
    let harness = Harness::start(config(8)).await;
    harness.post("/logs", &json!({"message": "a"})).await;
    harness.post("/logs", &json!({"message": "b"})).await;
    harness.sink.fail_next_logs(1);

    let (status, body) = harness.post("/process", &json!({})).await;
    assert_eq!(status, 502);
    assert_eq!(body["code"], "persistence_error");
    assert!(body["message"].as_str().unwrap().contains("log 1"));

    let (_, preview) = harness.get("/logs").await;
    assert_eq!(preview["queue_depth"], 2);
    assert_eq!(preview["items"][0]["id"], 1);
    harness.stop().await;
}

#[tokio::test]
async fn health_turns_degraded_with_the_sink() {
    let harness = Harness::start(config(8)).await;

    let (status, body) = harness.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"status": "ok", "db": "up", "queue_depth": 0}));

    harness.sink.set_down(true);
    let (status, body) = harness.get("/health").await;
    assert_eq!(status, 503);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["db"], "down");
    harness.stop().await;
}

#[tokio::test]
async fn closed_engine_is_unavailable() {
    let harness = Harness::start(config(8)).await;
    harness.engine.shutdown().await;

    let (status, body) = harness.get("/metrics").await;
    assert_eq!(status, 503);
    assert_eq!(body["code"], "not_initialized");
    harness.stop().await;
}

#[tokio::test]
async fn prometheus_exposition_lists_engine_counters() {
    let harness = Harness::start(config(8)).await;
    harness.post("/logs", &json!({"message": "counted"})).await;

    let response = harness
        .client
        .get(harness.url("/metrics/prometheus"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let text = response.text().await.unwrap();
    assert!(text.contains("logbuf_logs_ingested_total"));
    harness.stop().await;
}
