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

//! Process-level wiring: configuration loading and the [`LogEngine`] handle
//! that the REST server and the CLI share.

pub mod config;
mod engine;
pub mod error;

pub use config::{AppConfig, LogLevel, SinkKind};
pub use engine::{
    DEFAULT_LEVEL, DEFAULT_SOURCE, DbStatus, HealthReport, HealthStatus, LogEngine,
    ShutdownReport,
};
pub use error::{ConfigError, Error};
