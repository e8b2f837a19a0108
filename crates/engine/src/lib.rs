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

//! # logbuf-engine
//!
//! A bounded, lock-protected FIFO of log entries and the batch protocol that
//! drains it into a durable [`Sink`].
//!
//! Producers call [`BufferEngine::enqueue`] from any thread. A single
//! [`QueueProcessor`] moves entries from the head of the buffer into the
//! sink; when the sink refuses an entry it is put back at the head and the
//! batch stops, so delivery order always matches ingestion order.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use logbuf_engine::{BufferEngine, MemorySink, QueueProcessor};
//!
//! # tokio_test_block(async {
//! let buffer = Arc::new(BufferEngine::new(16).unwrap());
//! let sink = Arc::new(MemorySink::new());
//! let mut processor = QueueProcessor::new(buffer.clone(), sink.clone(), 8);
//!
//! buffer.enqueue("INFO", "api", "hello").unwrap();
//! let report = processor.process(0).await.unwrap();
//! assert_eq!(report.processed, 1);
//! assert_eq!(sink.persisted_ids(), vec![1]);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod buffer;
pub mod config;
mod entry;
pub mod error;
pub mod metrics;
mod processor;
mod queue;
pub mod sink;

pub use buffer::{BufferEngine, Preview};
pub use config::EngineConfig;
pub use entry::{
    ENTRY_FOOTPRINT_BYTES, Entry, MAX_LEVEL_LEN, MAX_MESSAGE_LEN, MAX_SOURCE_LEN, now_ms,
};
pub use error::{EngineError, ErrorKind, Result, SinkError};
pub use metrics::{EngineMetrics, MetricsReport};
pub use processor::{ProcessReport, QueueProcessor};
pub use sink::{DEFAULT_MEMORY_RETENTION, MemorySink, PersistedLog, Sink};
