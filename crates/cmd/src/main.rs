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

use clap::{Args, Parser, Subcommand};
use logbuf_app::{AppConfig, LogEngine};
use logbuf_common_telemetry::{init_global_logging, set_panic_hook};
use logbuf_server::http::{RestServerConfig, start_rest_server};
use snafu::{ResultExt, Whatever};
use tokio::io::BufReader;
use tracing::{error, info};

mod build_info;
mod repl;

#[derive(Debug, Parser)]
#[clap(
name = "logbuf",
about = "Bounded log buffer with batched delivery",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Server(ServerArgs),
    Repl(ReplArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Serves the REST API until Ctrl-C or SIGTERM, then drains the buffer.
Settings come from the environment (BUFFER_CAPACITY, SINK, DB_HOST, API_PORT, ...).
Examples:

SINK=memory logbuf server
logbuf server --port 9000

")]
struct ServerArgs {
    /// Overrides API_PORT.
    #[arg(long)]
    port: Option<u16>,
}

impl ServerArgs {
    async fn run(&self, config: AppConfig) -> Result<(), Whatever> {
        let engine = Arc::new(
            LogEngine::open(&config)
                .await
                .whatever_context("Failed to open log engine")?,
        );
        let rest = RestServerConfig::for_port(self.port.unwrap_or(config.api_port));
        let handler = start_rest_server(rest, engine.clone())
            .await
            .whatever_context("Failed to start REST server")?;
        info!(component = "rest_server", addr = %handler.local_addr(), "logbuf server running");

        shutdown_signal().await;

        handler.shutdown();
        handler
            .wait_for_stop()
            .await
            .whatever_context("REST server did not stop cleanly")?;
        let report = engine.shutdown().await;
        info!(
            component = "engine_api",
            drained = report.drained,
            discarded = report.discarded,
            "logbuf server stopped"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Reads commands from stdin: LEVEL|SOURCE|MESSAGE, process, metrics, pending, quit.
Examples:

SINK=memory logbuf repl
printf 'ERROR|db|disk full\nprocess\n' | logbuf repl

")]
struct ReplArgs {
    /// Source used when a line leaves it empty.
    #[arg(long, default_value = "cli")]
    source: String,
}

impl ReplArgs {
    async fn run(&self, config: AppConfig) -> Result<(), Whatever> {
        let engine = LogEngine::open(&config)
            .await
            .whatever_context("Failed to open log engine")?;
        let input = BufReader::new(tokio::io::stdin());
        let session = repl::run(&engine, input, &self.source).await;
        engine.shutdown().await;
        session.whatever_context("Failed to read stdin")?;
        println!("Shutdown complete.");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C signal"); },
        () = terminate => { info!("Received terminate signal"); },
    }
}

#[tokio::main]
async fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();
    let config = AppConfig::load_from_env().whatever_context("Failed to load configuration")?;
    let _guards = init_global_logging("logbuf", &config.logging())
        .whatever_context("Failed to initialize logging")?;
    set_panic_hook();

    match cli.commands {
        Commands::Server(args) => args.run(config).await,
        Commands::Repl(args) => args.run(config).await,
    }
}
