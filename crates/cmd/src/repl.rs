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

//! Line-oriented shell over a [`LogEngine`].

use logbuf_app::{DEFAULT_LEVEL, LogEngine};
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub const BANNER: &str = "Log Engine CLI started.
Commands:
  LEVEL|SOURCE|MESSAGE  -> enqueue log
  process               -> process queue batch
  metrics               -> show metrics
  pending               -> show pending queue
  quit                  -> shutdown
";

#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Skip,
    Quit,
    Process,
    Metrics,
    Pending,
    Add {
        level:   &'a str,
        source:  &'a str,
        message: &'a str,
    },
    Invalid,
}

/// Parses one input line. Missing level and source fall back to `INFO`
/// and `default_source`.
pub fn parse_line<'a>(line: &'a str, default_source: &'a str) -> Command<'a> {
    let input = line.trim();
    match input {
        "" => return Command::Skip,
        "quit" => return Command::Quit,
        "process" => return Command::Process,
        "metrics" => return Command::Metrics,
        "pending" => return Command::Pending,
        _ => {}
    }

    let mut parts = input.splitn(3, '|').map(str::trim);
    let level = parts.next().filter(|s| !s.is_empty()).unwrap_or(DEFAULT_LEVEL);
    let source = parts.next().filter(|s| !s.is_empty()).unwrap_or(default_source);
    match parts.next() {
        Some(message) if !message.is_empty() => Command::Add {
            level,
            source,
            message,
        },
        _ => Command::Invalid,
    }
}

/// Runs until `quit` or end of input. Engine errors are reported on stderr
/// and do not end the session.
pub async fn run<R>(engine: &LogEngine, input: R, default_source: &str) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    println!("{BANNER}");
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line, default_source) {
            Command::Skip => {}
            Command::Quit => break,
            Command::Process => match engine.process(0).await {
                Ok(report) => println!(
                    "{}",
                    json!({"status": "ok", "processed": report.processed, "elapsed_ms": report.elapsed_ms})
                ),
                Err(err) => eprintln!("process failed: {err}"),
            },
            Command::Metrics => match engine.metrics().map(|m| serde_json::to_string(&m)) {
                Ok(Ok(text)) => println!("{text}"),
                Ok(Err(err)) => eprintln!("metrics failed: {err}"),
                Err(err) => eprintln!("metrics failed: {err}"),
            },
            Command::Pending => match engine.pending().map(|p| serde_json::to_string(&p)) {
                Ok(Ok(text)) => println!("{text}"),
                Ok(Err(err)) => eprintln!("pending failed: {err}"),
                Err(err) => eprintln!("pending failed: {err}"),
            },
            Command::Add {
                level,
                source,
                message,
            } => {
                if let Err(err) = engine.add_log(level, source, message).await {
                    eprintln!("enqueue failed: {err}");
                }
            }
            Command::Invalid => eprintln!("Invalid input. Expected LEVEL|SOURCE|MESSAGE"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use logbuf_app::{AppConfig, SinkKind};
    use test_case::test_case;

    use super::*;

    #[test_case("", Command::Skip ; "blank")]
    #[test_case("  quit ", Command::Quit ; "quit with padding")]
    #[test_case("process", Command::Process ; "process")]
    #[test_case("metrics", Command::Metrics ; "metrics")]
    #[test_case("pending", Command::Pending ; "pending")]
    #[test_case("ERROR|db|disk full", Command::Add { level: "ERROR", source: "db", message: "disk full" } ; "full triple")]
    #[test_case("WARN | web | a|b", Command::Add { level: "WARN", source: "web", message: "a|b" } ; "message keeps pipes")]
    #[test_case("DEBUG||m", Command::Add { level: "DEBUG", source: "cli", message: "m" } ; "empty source defaults")]
    #[test_case("|src|m", Command::Add { level: "INFO", source: "src", message: "m" } ; "empty level defaults")]
    #[test_case("hello", Command::Invalid ; "bare word has no message")]
    #[test_case("INFO|cli|", Command::Invalid ; "empty message")]
    fn parses(line: &str, expected: Command<'_>) {
        assert_eq!(parse_line(line, "cli"), expected);
    }

    #[tokio::test]
    async fn session_enqueues_and_drains() {
        let config = AppConfig {
            sink: SinkKind::Memory,
            buffer_capacity: 8,
            ..AppConfig::default()
        };
        let engine = Arc::new(LogEngine::open(&config).await.unwrap());
        let input: &[u8] = b"INFO|t|one\nbogus\nERROR|t|two\npending\nprocess\nquit\nINFO|t|never\n";

        run(&engine, input, "cli").await.unwrap();

        let metrics = engine.metrics().unwrap();
        assert_eq!(metrics.total_ingested, 2);
        assert_eq!(metrics.total_processed, 2);
        assert_eq!(metrics.queue_depth, 0);
    }
}
