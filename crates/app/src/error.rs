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

use logbuf_error::{ErrorExt, StackError, StatusCode};
use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures while bringing a [`crate::LogEngine`] up.
#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Failed to load configuration"))]
    LoadConfig {
        source: config::ConfigError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Invalid configuration: {reason}"))]
    InvalidConfig {
        reason: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to open the postgres sink"))]
    ConnectSink {
        source: logbuf_storage_postgres::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

/// Configuration errors are the subset of [`Error`] raised before any I/O.
pub type ConfigError = Error;

impl StackError for Error {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) {
        buf.push(format!("{layer}: {self}"));
    }

    fn next(&self) -> Option<&dyn StackError> { None }
}

impl ErrorExt for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::LoadConfig { .. } | Self::InvalidConfig { .. } => StatusCode::InvalidArgument,
            Self::ConnectSink { .. } => StatusCode::Unavailable,
        }
    }

    fn as_any(&self) -> &dyn Any { self }
}
