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

//! REST routes over a shared [`LogEngine`].

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use logbuf_app::{HealthReport, LogEngine};
use logbuf_engine::{MetricsReport, Preview};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info};

use crate::{
    BindSnafu, ParseAddressSnafu, Result, ServiceHandler,
    error::{ApiResult, EncodeSnafu, InvalidBodySnafu},
};

/// Request bodies carry at most one log message; 64 KiB is plenty.
pub const DEFAULT_MAX_HTTP_BODY_SIZE: usize = 64 * 1024;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, bon::Builder)]
#[builder(on(String, into))]
pub struct RestServerConfig {
    #[default = "0.0.0.0:8000"]
    #[builder(default = "0.0.0.0:8000".to_owned())]
    pub bind_address:  String,
    #[default(_code = "DEFAULT_MAX_HTTP_BODY_SIZE")]
    #[builder(default = DEFAULT_MAX_HTTP_BODY_SIZE)]
    pub max_body_size: usize,
    #[default = true]
    #[builder(default = true)]
    pub enable_cors:   bool,
}

impl RestServerConfig {
    pub fn for_port(port: u16) -> Self {
        Self {
            bind_address: format!("0.0.0.0:{port}"),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LogRequest {
    #[serde(default)]
    pub level:   String,
    #[serde(default)]
    pub source:  String,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProcessRequest {
    /// 0 means the configured batch size.
    #[serde(default)]
    pub max_items: usize,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status:  &'static str,
    pub message: &'static str,
    pub id:      u64,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub status:     &'static str,
    pub processed:  usize,
    pub elapsed_ms: f64,
}

/// Binds the listener, then serves `engine` until the handler is shut down.
///
/// Binding happens before this returns, so a port conflict is reported to
/// the caller rather than lost inside the server task.
pub async fn start_rest_server(
    config: RestServerConfig,
    engine: Arc<LogEngine>,
) -> Result<ServiceHandler> {
    let bind_addr = config
        .bind_address
        .parse::<std::net::SocketAddr>()
        .context(ParseAddressSnafu {
            addr: config.bind_address.clone(),
        })?;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .context(BindSnafu {
            addr: config.bind_address.clone(),
        })?;
    let local_addr = listener.local_addr().context(BindSnafu {
        addr: config.bind_address.clone(),
    })?;

    let mut router = log_routes(engine)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config.max_body_size));
    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    let cancellation_token = CancellationToken::new();
    let shutdown = cancellation_token.clone();
    let join_handle = tokio::spawn(async move {
        info!(component = "rest_server", %local_addr, "REST server started");
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
        info!(component = "rest_server", %local_addr, ?result, "REST server stopped");
    });

    Ok(ServiceHandler {
        join_handle,
        cancellation_token,
        local_addr,
    })
}

pub fn log_routes(engine: Arc<LogEngine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/logs", get(pending_logs).post(add_log))
        .route("/process", post(process))
        .route("/metrics", get(metrics))
        .route("/metrics/prometheus", get(prometheus_metrics))
        .with_state(engine)
}

async fn health(State(engine): State<Arc<LogEngine>>) -> ApiResult<(StatusCode, Json<HealthReport>)> {
    let report = engine.health().await?;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok((status, Json(report)))
}

async fn add_log(
    State(engine): State<Arc<LogEngine>>,
    body: std::result::Result<Json<LogRequest>, JsonRejection>,
) -> ApiResult<Json<AcceptedResponse>> {
    let Json(request) = body.map_err(|rejection| {
        InvalidBodySnafu {
            reason: rejection.body_text(),
        }
        .build()
    })?;
    let id = engine
        .add_log(&request.level, &request.source, &request.message)
        .await?;
    debug!(component = "rest_server", id, "log accepted");
    Ok(Json(AcceptedResponse {
        status: "ok",
        message: "log accepted",
        id,
    }))
}

async fn pending_logs(State(engine): State<Arc<LogEngine>>) -> ApiResult<Json<Preview>> {
    Ok(Json(engine.pending()?))
}

// The body is optional, so it is parsed by hand instead of through `Json`.
async fn process(
    State(engine): State<Arc<LogEngine>>,
    body: Bytes,
) -> ApiResult<Json<ProcessResponse>> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ProcessRequest::default()
    } else {
        serde_json::from_slice::<ProcessRequest>(&body).map_err(|err| {
            InvalidBodySnafu {
                reason: err.to_string(),
            }
            .build()
        })?
    };
    let report = engine.process(request.max_items).await?;
    Ok(Json(ProcessResponse {
        status:     "ok",
        processed:  report.processed,
        elapsed_ms: report.elapsed_ms,
    }))
}

async fn metrics(State(engine): State<Arc<LogEngine>>) -> ApiResult<Json<MetricsReport>> {
    Ok(Json(engine.metrics()?))
}

async fn prometheus_metrics() -> ApiResult<impl IntoResponse> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .context(EncodeSnafu)?;
    Ok(([(header::CONTENT_TYPE, encoder.format_type().to_owned())], buffer))
}
