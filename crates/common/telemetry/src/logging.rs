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

//! Global `tracing` subscriber setup.
//!
//! Every crate in the workspace emits plain `tracing` events tagged with a
//! `component` field. This module decides where those events go: stdout,
//! hourly rolling files, and a separate error-only file.

use std::{
    env,
    io::IsTerminal,
    sync::{Mutex, Once, PoisonError},
};

use bon::Builder;
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, de};
use smart_default::SmartDefault;
use snafu::{ResultExt, Snafu};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Registry, filter, layer::SubscriberExt, prelude::*};

/// Deserializes a string value, using `Default::default()` if the string is
/// empty.
///
/// Environment-sourced configuration frequently carries `KEY=` for "unset";
/// this treats that the same as a missing key.
pub fn empty_string_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        Ok(T::default())
    } else {
        T::deserialize(de::value::StrDeserializer::new(&s)).map_err(|e: de::value::Error| {
            de::Error::custom(format!("invalid value, expect empty string, err: {e}"))
        })
    }
}

pub const DEFAULT_LOGGING_DIR: &str = "logs";

/// Default filter when neither the options nor `RUST_LOG` name one.
const DEFAULT_LOG_TARGETS: &str = "info";

type FilteredRegistry = tracing_subscriber::layer::Layered<filter::Targets, Registry>;

type BoxedLayer = Box<dyn tracing_subscriber::Layer<FilteredRegistry> + Send + Sync>;

/// Set once a subscriber has actually been installed.
static INSTALLED: Mutex<bool> = Mutex::new(false);

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LoggingError {
    #[snafu(display("Invalid log level filter '{filter}'"))]
    InvalidFilter {
        filter: String,
        source: filter::ParseError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to create rolling log file in {dir}"))]
    RollingFile {
        dir:    String,
        source: tracing_appender::rolling::InitError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to install global subscriber"))]
    InstallSubscriber {
        source: tracing::subscriber::SetGlobalDefaultError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

/// Configuration options for the logging system.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct LoggingOptions {
    /// Directory for rolling log files. Empty disables file output.
    #[default = ""]
    #[builder(default)]
    pub dir: String,

    /// Level filter such as `"info"` or `"debug,sqlx=warn"`.
    ///
    /// Falls back to `RUST_LOG`, then to `info`.
    pub level: Option<String>,

    #[serde(default, deserialize_with = "empty_string_as_default")]
    #[builder(default)]
    pub log_format: LogFormat,

    /// Rotated files kept per output; 720 hourly files is thirty days.
    #[default = 720]
    #[builder(default = 720)]
    pub max_log_files: usize,

    #[default = true]
    #[builder(default = true)]
    pub append_stdout: bool,
}

/// Available log output formats.
#[derive(
    Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize, Default, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per event, for log shippers.
    Json,
    #[default]
    Text,
}

impl LoggingOptions {
    fn targets(&self) -> Result<filter::Targets, LoggingError> {
        let from_env = env::var(EnvFilter::DEFAULT_ENV).ok();
        let raw = self
            .level
            .as_deref()
            .or(from_env.as_deref())
            .unwrap_or(DEFAULT_LOG_TARGETS);
        raw.parse::<filter::Targets>()
            .context(InvalidFilterSnafu { filter: raw })
    }
}

static GLOBAL_UT_LOG_GUARD: Lazy<Mutex<Option<Vec<WorkerGuard>>>> = Lazy::new(|| Mutex::new(None));

/// Logging for unit and integration tests.
///
/// Writes to `UNITTEST_LOG_DIR` (default `/tmp/__unittest_logs`) at
/// `UNITTEST_LOG_LEVEL`. Safe to call from every test.
pub fn init_default_ut_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let dir =
            env::var("UNITTEST_LOG_DIR").unwrap_or_else(|_| "/tmp/__unittest_logs".to_string());
        let level = env::var("UNITTEST_LOG_LEVEL").unwrap_or_else(|_| {
            "debug,hyper=warn,tower=warn,reqwest=warn,sqlx=warn,h2=info".to_string()
        });
        let opts = LoggingOptions::builder()
            .dir(dir.clone())
            .level(level)
            .append_stdout(false)
            .build();

        match init_global_logging("unittest", &opts) {
            Ok(guards) => {
                if let Ok(mut slot) = GLOBAL_UT_LOG_GUARD.lock() {
                    *slot = Some(guards);
                }
                tracing::info!("logs dir = {}", dir);
            }
            Err(err) => eprintln!("unit test logging disabled: {err}"),
        }
    });
}

fn fmt_layer<W>(
    writer: W,
    format: LogFormat,
    ansi: bool,
) -> BoxedLayer
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => tracing_subscriber::fmt::Layer::new()
            .json()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_current_span(true)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::Layer::new()
            .with_writer(writer)
            .with_ansi(ansi)
            .boxed(),
    }
}

fn rolling_appender(
    opts: &LoggingOptions,
    prefix: &str,
) -> Result<RollingFileAppender, LoggingError> {
    RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(prefix)
        .max_log_files(opts.max_log_files)
        .build(&opts.dir)
        .context(RollingFileSnafu { dir: &opts.dir })
}

/// Install the process-wide subscriber.
///
/// Layers, depending on `opts`:
///
/// - stdout, when `append_stdout` is set
/// - `<dir>/<app_name>.*` with hourly rotation, when `dir` is non-empty
/// - `<dir>/<app_name>-err.*` receiving only ERROR events
///
/// Only the first successful call installs anything; later calls return no
/// guards. A call that fails leaves nothing installed, so it can be retried
/// with corrected options. The returned guards flush the non-blocking writers
/// on drop and must be held for the life of the process.
pub fn init_global_logging(
    app_name: &str,
    opts: &LoggingOptions,
) -> Result<Vec<WorkerGuard>, LoggingError> {
    let mut installed = INSTALLED.lock().unwrap_or_else(PoisonError::into_inner);
    if *installed {
        return Ok(vec![]);
    }

    let targets = opts.targets()?;

    let mut guards = vec![];
    let mut layers: Vec<BoxedLayer> = vec![];

    if opts.append_stdout {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        guards.push(guard);
        layers.push(fmt_layer(writer, opts.log_format, std::io::stdout().is_terminal()));
    }

    if !opts.dir.is_empty() {
        let (writer, guard) = tracing_appender::non_blocking(rolling_appender(opts, app_name)?);
        guards.push(guard);
        layers.push(fmt_layer(writer, opts.log_format, false));

        let err_prefix = format!("{app_name}-err");
        let (writer, guard) =
            tracing_appender::non_blocking(rolling_appender(opts, &err_prefix)?);
        guards.push(guard);
        layers.push(
            fmt_layer(writer, opts.log_format, false)
                .with_filter(filter::LevelFilter::ERROR)
                .boxed(),
        );
    }

    // A `log` bridge may already be installed by the host; that is fine.
    let _ = LogTracer::init();

    let subscriber = Registry::default().with(targets).with(layers);
    tracing::subscriber::set_global_default(subscriber).context(InstallSubscriberSnafu)?;
    *installed = true;

    Ok(guards)
}
