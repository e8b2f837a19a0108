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

//! Process configuration.
//!
//! Every key is flat and unprefixed so a deployment can be configured with
//! plain `BUFFER_CAPACITY=4096 SINK=memory logbuf server`. An optional TOML
//! document is layered underneath the environment.

use std::{str::FromStr, time::Duration};

use config::{Config, Environment, File, FileFormat};
use logbuf_common_telemetry::{LogFormat, LoggingOptions};
use logbuf_engine::{DEFAULT_MEMORY_RETENTION, EngineConfig};
use logbuf_storage_postgres::PostgresConfig;
use serde::{Deserialize, Deserializer, Serialize};
use smart_default::SmartDefault;
use snafu::ResultExt;
use strum_macros::{Display, EnumString, IntoStaticStr};

use crate::error::{InvalidConfigSnafu, LoadConfigSnafu, Result};

/// Minimum severity of emitted events.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Error,
}

impl LogLevel {
    /// Filter directive understood by `tracing_subscriber`.
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

// Unknown names fall back to INFO instead of failing the whole load.
impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_str(raw.trim()).unwrap_or_default())
    }
}

/// Where processed entries are delivered.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Postgres,
    /// Keeps everything in process memory; nothing survives a restart.
    Memory,
}

/// Flat, environment-friendly configuration for one `logbuf` process.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[default = 2048]
    pub buffer_capacity:        usize,
    #[default = 256]
    pub auto_process_threshold: usize,
    #[default = 200]
    pub process_batch_size:     usize,
    #[default = 200]
    pub pending_preview_limit:  usize,

    pub log_level:  LogLevel,
    /// Directory for rolling log files; empty keeps logs on stdout only.
    #[default = ""]
    pub log_dir:    String,
    pub log_format: LogFormat,

    pub sink:               SinkKind,
    /// Logs and snapshots a `memory` sink keeps before evicting the oldest.
    #[default(_code = "DEFAULT_MEMORY_RETENTION")]
    pub memory_retention:   usize,
    #[default = "127.0.0.1"]
    pub db_host:            String,
    #[default = 5432]
    pub db_port:            u16,
    #[default = "log_engine"]
    pub db_name:            String,
    #[default = "log_engine"]
    pub db_user:            String,
    #[default = "log_engine"]
    pub db_password:        String,
    /// Seconds.
    #[default = 5]
    pub db_connect_timeout: u64,

    #[default = 8000]
    pub api_port: u16,
}

impl AppConfig {
    /// Reads the process environment.
    pub fn load_from_env() -> Result<Self> { Self::load(None, Environment::default()) }

    /// Layers `env` over an optional TOML document, then over the defaults.
    pub fn load(toml: Option<&str>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(toml) = toml {
            builder = builder.add_source(File::from_str(toml, FileFormat::Toml));
        }
        let config: Self = builder
            .add_source(env.try_parsing(true))
            .build()
            .and_then(Config::try_deserialize)
            .context(LoadConfigSnafu)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.engine()?;
        Ok(())
    }

    /// Engine knobs with the clamping rules applied.
    pub fn engine(&self) -> Result<EngineConfig> {
        EngineConfig::builder()
            .buffer_capacity(self.buffer_capacity)
            .auto_process_threshold(self.auto_process_threshold)
            .process_batch_size(self.process_batch_size)
            .pending_preview_limit(self.pending_preview_limit)
            .build()
            .normalize()
            .map_err(|err| {
                InvalidConfigSnafu {
                    reason: err.to_string(),
                }
                .build()
            })
    }

    pub fn postgres(&self) -> PostgresConfig {
        PostgresConfig::builder()
            .host(self.db_host.as_str())
            .port(self.db_port)
            .database(self.db_name.as_str())
            .user(self.db_user.as_str())
            .password(self.db_password.as_str())
            .connect_timeout(Duration::from_secs(self.db_connect_timeout))
            .build()
    }

    pub fn logging(&self) -> LoggingOptions {
        LoggingOptions::builder()
            .dir(self.log_dir.clone())
            .level(self.log_level.as_filter().to_owned())
            .log_format(self.log_format)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;
    use crate::error::Error;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Environment::default().source(Some(map))
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = AppConfig::load(None, env(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.sink, SinkKind::Postgres);
        assert_eq!(config.api_port, 8000);
        assert_eq!(config.engine().unwrap(), EngineConfig::default());
    }

    #[test]
    fn environment_keys_are_case_insensitive() {
        let config = AppConfig::load(
            None,
            env(&[
                ("BUFFER_CAPACITY", "16"),
                ("SINK", "memory"),
                ("DB_PORT", "6543"),
                ("DB_PASSWORD", "1234"),
            ]),
        )
        .unwrap();
        assert_eq!(config.buffer_capacity, 16);
        assert_eq!(config.sink, SinkKind::Memory);
        assert_eq!(config.db_port, 6543);
        assert_eq!(config.db_password, "1234");
    }

    #[test]
    fn memory_retention_is_bounded_by_default() {
        assert_eq!(AppConfig::default().memory_retention, DEFAULT_MEMORY_RETENTION);
        let config = AppConfig::load(None, env(&[("MEMORY_RETENTION", "32")])).unwrap();
        assert_eq!(config.memory_retention, 32);
    }

    #[test]
    fn environment_overrides_toml() {
        let toml = "buffer_capacity = 64\napi_port = 9000\n";
        let config = AppConfig::load(Some(toml), env(&[("API_PORT", "9100")])).unwrap();
        assert_eq!(config.buffer_capacity, 64);
        assert_eq!(config.api_port, 9100);
    }

    #[test]
    fn engine_knobs_are_clamped() {
        let config = AppConfig::load(
            None,
            env(&[
                ("BUFFER_CAPACITY", "10"),
                ("AUTO_PROCESS_THRESHOLD", "0"),
                ("PROCESS_BATCH_SIZE", "0"),
                ("PENDING_PREVIEW_LIMIT", "0"),
            ]),
        )
        .unwrap();
        let engine = config.engine().unwrap();
        assert_eq!(engine.auto_process_threshold, 10);
        assert_eq!(engine.process_batch_size, 1);
        assert_eq!(engine.pending_preview_limit, 50);
    }

    #[test]
    fn zero_capacity_is_a_config_error() {
        let err = AppConfig::load(None, env(&[("BUFFER_CAPACITY", "0")])).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn unknown_sink_is_a_config_error() {
        let err = AppConfig::load(None, env(&[("SINK", "kafka")])).unwrap_err();
        assert!(matches!(err, Error::LoadConfig { .. }));
    }

    #[test_case("DEBUG", LogLevel::Debug ; "debug")]
    #[test_case("error", LogLevel::Error ; "lowercase error")]
    #[test_case("INFO", LogLevel::Info ; "info")]
    #[test_case("WARN", LogLevel::Info ; "unknown falls back")]
    #[test_case("", LogLevel::Info ; "empty falls back")]
    fn log_level_parsing(raw: &str, expected: LogLevel) {
        let config = AppConfig::load(None, env(&[("LOG_LEVEL", raw)])).unwrap();
        assert_eq!(config.log_level, expected);
    }

    #[test]
    fn postgres_settings_are_forwarded() {
        let config = AppConfig {
            db_host: "db".to_owned(),
            db_connect_timeout: 2,
            ..AppConfig::default()
        };
        let pg = config.postgres();
        assert_eq!(pg.host, "db");
        assert_eq!(pg.database, "log_engine");
        assert_eq!(pg.connect_timeout, Duration::from_secs(2));
    }

    #[test]
    fn logging_follows_log_level() {
        let config = AppConfig {
            log_level: LogLevel::Debug,
            ..AppConfig::default()
        };
        assert_eq!(config.logging().level.as_deref(), Some("debug"));
        assert!(config.logging().dir.is_empty());
    }
}
