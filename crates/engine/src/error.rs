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

use std::{any::Any, collections::TryReserveError};

use logbuf_error::{ErrorExt, StackError, StatusCode};
use snafu::Snafu;

/// Errors raised by a sink implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    #[snafu(display("Sink unavailable: {reason}"))]
    Unavailable {
        reason: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Sink rejected {operation}: {reason}"))]
    Rejected {
        operation: &'static str,
        reason:    String,
        #[snafu(implicit)]
        loc:       snafu::Location,
    },

    #[snafu(display("Sink backend failed during {operation}"))]
    Backend {
        operation: &'static str,
        source:    Box<dyn std::error::Error + Send + Sync>,
        #[snafu(implicit)]
        loc:       snafu::Location,
    },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EngineError {
    #[snafu(display("Invalid log entry: {reason}"))]
    Validation {
        reason: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Buffer is full ({capacity} entries)"))]
    CapacityExceeded {
        capacity: usize,
        #[snafu(implicit)]
        loc:      snafu::Location,
    },

    #[snafu(display("Failed to allocate queue storage"))]
    AllocationFailure {
        source: TryReserveError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to persist log {id} after {processed} in this batch; log requeued"))]
    Persistence {
        id:        u64,
        processed: usize,
        source:    SinkError,
        #[snafu(implicit)]
        loc:       snafu::Location,
    },

    #[snafu(display(
        "Failed to persist log {id} after {processed} in this batch; requeue rejected ({reason}), \
         log dropped"
    ))]
    RequeueLoss {
        id:        u64,
        processed: usize,
        reason:    String,
        source:    SinkError,
        #[snafu(implicit)]
        loc:       snafu::Location,
    },

    #[snafu(display("Log engine is not initialized"))]
    NotInitialized {
        #[snafu(implicit)]
        loc: snafu::Location,
    },
}

/// Machine-readable failure kind, rendered in snake_case on the wire.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    strum_macros::Display,
    strum_macros::IntoStaticStr,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    CapacityExceeded,
    AllocationFailure,
    PersistenceError,
    RequeueLoss,
    NotInitialized,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str { self.into() }
}

impl EngineError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::ValidationError,
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::AllocationFailure { .. } => ErrorKind::AllocationFailure,
            Self::Persistence { .. } => ErrorKind::PersistenceError,
            Self::RequeueLoss { .. } => ErrorKind::RequeueLoss,
            Self::NotInitialized { .. } => ErrorKind::NotInitialized,
        }
    }

    /// Entries committed to the sink by the failed `process` call before it
    /// stopped. Zero for errors that did not come from a batch.
    pub const fn processed(&self) -> usize {
        match self {
            Self::Persistence { processed, .. } | Self::RequeueLoss { processed, .. } => *processed,
            _ => 0,
        }
    }
}

impl StackError for EngineError {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) {
        buf.push(format!("{layer}: {self}"));
    }

    fn next(&self) -> Option<&dyn StackError> { None }
}

impl ErrorExt for EngineError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::ValidationError => StatusCode::InvalidArgument,
            ErrorKind::CapacityExceeded => StatusCode::ResourceExhausted,
            ErrorKind::AllocationFailure => StatusCode::Internal,
            ErrorKind::PersistenceError => StatusCode::Upstream,
            ErrorKind::RequeueLoss => StatusCode::DataLoss,
            ErrorKind::NotInitialized => StatusCode::Unavailable,
        }
    }

    fn as_any(&self) -> &dyn Any { self as _ }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use snafu::IntoError;

    use super::*;

    #[test]
    fn kinds_render_snake_case() {
        assert_eq!(ErrorKind::ValidationError.to_string(), "validation_error");
        assert_eq!(ErrorKind::RequeueLoss.to_string(), "requeue_loss");
        let raw: &'static str = ErrorKind::NotInitialized.into();
        assert_eq!(raw, "not_initialized");
    }

    #[test]
    fn persistence_keeps_sink_cause() {
        let err = PersistenceSnafu {
            id:        9_u64,
            processed: 2_usize,
        }
        .into_error(
            UnavailableSnafu {
                reason: "connection reset",
            }
            .build(),
        );
        assert_eq!(err.kind(), ErrorKind::PersistenceError);
        assert_eq!(err.processed(), 2);
        assert_eq!(err.status_code(), StatusCode::Upstream);
        assert_eq!(
            err.output_msg(),
            "Failed to persist log 9 after 2 in this batch; log requeued: Sink unavailable: \
             connection reset"
        );
    }

    #[test]
    fn capacity_is_retryable() {
        let err = CapacityExceededSnafu { capacity: 3_usize }.build();
        assert!(err.status_code().is_retryable());
        assert_eq!(err.processed(), 0);
    }
}
