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

use serde::Serialize;
use snafu::ensure;

use crate::error::{Result, ValidationSnafu};

pub const MAX_LEVEL_LEN: usize = 15;
pub const MAX_SOURCE_LEN: usize = 63;
pub const MAX_MESSAGE_LEN: usize = 511;

/// Bytes accounted per queued entry in `memory_bytes_estimate`.
///
/// Three NUL-terminated text slots, the id and the timestamp, plus the three
/// words a doubly linked queue node carries. Kept stable so dashboards built
/// on the estimate do not shift when the in-memory layout changes.
pub const ENTRY_FOOTPRINT_BYTES: usize = (MAX_LEVEL_LEN + 1)
    + (MAX_SOURCE_LEN + 1)
    + (MAX_MESSAGE_LEN + 1)
    + 2 * size_of::<u64>()
    + 3 * size_of::<usize>();

/// A single buffered log record.
///
/// Fields are fixed at enqueue time. Requeueing moves the same value back
/// into the buffer, so `id` and `ingested_at_ms` survive a failed delivery.
///
/// Serializes with the field order `id, level, source, message,
/// ingested_at_ms`; the preview endpoint depends on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    id:             u64,
    level:          String,
    source:         String,
    message:        String,
    ingested_at_ms: i64,
}

impl Entry {
    pub(crate) const fn new(
        id: u64,
        level: String,
        source: String,
        message: String,
        ingested_at_ms: i64,
    ) -> Self {
        Self {
            id,
            level,
            source,
            message,
            ingested_at_ms,
        }
    }

    pub const fn id(&self) -> u64 { self.id }

    pub fn level(&self) -> &str { &self.level }

    pub fn source(&self) -> &str { &self.source }

    pub fn message(&self) -> &str { &self.message }

    pub const fn ingested_at_ms(&self) -> i64 { self.ingested_at_ms }
}

/// Checks field bounds in bytes. An empty level or source is accepted here;
/// callers that want defaults apply them before enqueueing.
///
/// NUL is refused in every field: text columns downstream cannot store it,
/// and an entry the sink can never accept would pin the head of the queue.
pub(crate) fn validate(level: &str, source: &str, message: &str) -> Result<()> {
    ensure!(
        !message.is_empty(),
        ValidationSnafu {
            reason: "message must not be empty",
        }
    );
    for (field, value) in [("level", level), ("source", source), ("message", message)] {
        ensure!(
            !value.contains('\0'),
            ValidationSnafu {
                reason: format!("{field} contains a NUL byte"),
            }
        );
    }
    ensure!(
        level.len() <= MAX_LEVEL_LEN,
        ValidationSnafu {
            reason: format!("level exceeds {MAX_LEVEL_LEN} bytes"),
        }
    );
    ensure!(
        source.len() <= MAX_SOURCE_LEN,
        ValidationSnafu {
            reason: format!("source exceeds {MAX_SOURCE_LEN} bytes"),
        }
    );
    ensure!(
        message.len() <= MAX_MESSAGE_LEN,
        ValidationSnafu {
            reason: format!("message exceeds {MAX_MESSAGE_LEN} bytes"),
        }
    );
    Ok(())
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> i64 { chrono::Utc::now().timestamp_millis() }
