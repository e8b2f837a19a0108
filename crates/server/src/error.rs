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

use std::any::Any;

use axum::{Json, response::IntoResponse};
use logbuf_engine::{EngineError, ErrorKind};
use logbuf_error::{ErrorExt, StackError, StatusCode};
use serde::Serialize;
use snafu::Snafu;
use tracing::error;

/// `{"code":"<kind>","message":"<detail>"}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code:    &'static str,
    pub message: String,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ApiError {
    #[snafu(transparent)]
    Engine { source: EngineError },

    #[snafu(display("Invalid request body: {reason}"))]
    InvalidBody { reason: String },

    #[snafu(display("Failed to encode metrics"))]
    Encode { source: prometheus::Error },
}

impl ApiError {
    /// Machine-readable code shared with the engine's error kinds.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Engine { source } => source.kind().as_str(),
            Self::InvalidBody { .. } => ErrorKind::ValidationError.as_str(),
            Self::Encode { .. } => "internal",
        }
    }

    /// Engine errors carry their sink cause; the rest are self-describing.
    pub fn message(&self) -> String {
        match self {
            Self::Engine { source } => source.output_msg(),
            _ => self.to_string(),
        }
    }
}

impl ErrorExt for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Engine { source } => source.status_code(),
            Self::InvalidBody { .. } => StatusCode::InvalidArgument,
            Self::Encode { .. } => StatusCode::Internal,
        }
    }

    fn as_any(&self) -> &dyn Any { self as _ }
}

impl StackError for ApiError {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) {
        buf.push(format!("{layer}: {self}"));
    }

    fn next(&self) -> Option<&dyn StackError> { None }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.http_status().is_server_error() {
            error!(component = "rest_server", code = self.code(), error = %self, "request failed");
        }
        let body = Json(ErrorBody {
            code:    self.code(),
            message: self.message(),
        });
        (status.http_status(), body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
