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

use std::time::Duration;

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use sqlx::postgres::PgConnectOptions;

/// Connection settings for the PostgreSQL sink.
#[derive(Clone, SmartDefault, bon::Builder, Serialize, Deserialize, PartialEq, Eq)]
#[builder(on(String, into))]
pub struct PostgresConfig {
    #[default = "127.0.0.1"]
    #[builder(default = "127.0.0.1".to_owned())]
    pub host:            String,
    #[default = 5432]
    #[builder(default = 5432)]
    pub port:            u16,
    #[default = "log_engine"]
    #[builder(default = "log_engine".to_owned())]
    pub database:        String,
    #[default = "log_engine"]
    #[builder(default = "log_engine".to_owned())]
    pub user:            String,
    #[default = "log_engine"]
    #[builder(default = "log_engine".to_owned())]
    pub password:        String,
    /// Applies to the initial connect and to every pool checkout.
    #[default(_code = "Duration::from_secs(5)")]
    #[builder(default = Duration::from_secs(5))]
    pub connect_timeout: Duration,
    #[default = 4]
    #[builder(default = 4)]
    pub max_connections: u32,
}

impl PostgresConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
    }
}

// Keeps the password out of logs.
impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_connections", &self.max_connections)
            .finish_non_exhaustive()
    }
}
