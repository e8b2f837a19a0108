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

pub mod error;
pub mod http;

use std::net::SocketAddr;

use snafu::{ResultExt, Snafu};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(transparent)]
    Network { source: NetworkError },

    #[snafu(display("Server task failed"))]
    Join { source: tokio::task::JoinError },
}

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum NetworkError {
    #[snafu(display("Failed to bind {addr}"))]
    Bind {
        addr:   String,
        #[snafu(source)]
        source: std::io::Error,
    },

    #[snafu(display("Failed to parse address {addr}"))]
    ParseAddress {
        addr:   String,
        #[snafu(source)]
        source: std::net::AddrParseError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Handle to a running server task.
pub struct ServiceHandler {
    join_handle:        JoinHandle<()>,
    cancellation_token: CancellationToken,
    local_addr:         SocketAddr,
}

impl ServiceHandler {
    /// The address actually bound, which differs from the configured one
    /// when port 0 was requested.
    pub const fn local_addr(&self) -> SocketAddr { self.local_addr }

    /// Signals graceful shutdown without waiting for it.
    pub fn shutdown(&self) { self.cancellation_token.cancel(); }

    /// Waits for the server task to finish. Call after [`Self::shutdown`].
    pub async fn wait_for_stop(self) -> Result<()> {
        self.join_handle.await.context(JoinSnafu)
    }

    pub fn is_finished(&self) -> bool { self.join_handle.is_finished() }
}
