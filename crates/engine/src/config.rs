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

use bon::Builder;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::ensure;

use crate::error::{Result, ValidationSnafu};

pub const DEFAULT_PREVIEW_LIMIT: usize = 50;

/// Tuning knobs for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault, Builder)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of buffered entries. Must be non-zero.
    #[default = 2048]
    #[builder(default = 2048)]
    pub buffer_capacity:        usize,
    /// Queue depth at which `add_log` triggers a batch.
    #[default = 256]
    #[builder(default = 256)]
    pub auto_process_threshold: usize,
    #[default = 200]
    #[builder(default = 200)]
    pub process_batch_size:     usize,
    #[default = 200]
    #[builder(default = 200)]
    pub pending_preview_limit:  usize,
}

impl EngineConfig {
    /// Validates capacity and clamps the remaining knobs into range.
    ///
    /// - `auto_process_threshold` of 0 or above capacity becomes capacity
    /// - `process_batch_size` of 0 becomes 1
    /// - `pending_preview_limit` of 0 becomes 50
    pub fn normalize(self) -> Result<Self> {
        ensure!(
            self.buffer_capacity > 0,
            ValidationSnafu {
                reason: "buffer_capacity must be greater than zero",
            }
        );
        let auto_process_threshold =
            if self.auto_process_threshold == 0 || self.auto_process_threshold > self.buffer_capacity {
                self.buffer_capacity
            } else {
                self.auto_process_threshold
            };
        Ok(Self {
            buffer_capacity: self.buffer_capacity,
            auto_process_threshold,
            process_batch_size: self.process_batch_size.max(1),
            pending_preview_limit: if self.pending_preview_limit == 0 {
                DEFAULT_PREVIEW_LIMIT
            } else {
                self.pending_preview_limit
            },
        })
    }
}
