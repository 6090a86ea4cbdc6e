/* Licensed to the Apache Software Foundation (ASF) under one
 * or more contributor license agreements.  See the NOTICE file
 * distributed with this work for additional information
 * regarding copyright ownership.  The ASF licenses this file
 * to you under the Apache License, Version 2.0 (the
 * "License"); you may not use this file except in compliance
 * with the License.  You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing,
 * software distributed under the License is distributed on an
 * "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
 * KIND, either express or implied.  See the License for the
 * specific language governing permissions and limitations
 * under the License.
 */

use crate::error::AdminError;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use spectator::ProviderConfig;
use spectator_common::{PropertyType, duration};
use std::time::Duration;

pub const ENV_PREFIX: &str = "SPECTATOR_";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    pub http: HttpConfig,
    pub cluster: String,
    pub source: PropertyType,
    pub store: StoreConfig,
    #[serde(with = "duration::option")]
    pub periodic_refresh: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON object of `path -> record` loaded into the in-memory store at startup.
    pub seed_file: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            cluster: "CLUSTER_Demo".to_owned(),
            source: PropertyType::ExternalView,
            store: StoreConfig::default(),
            periodic_refresh: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8100".to_owned(),
        }
    }
}

impl AdminConfig {
    /// Layers the TOML file at `path` and `SPECTATOR_` environment
    /// variables (nested keys separated by `__`, e.g. `SPECTATOR_HTTP__ADDRESS`)
    /// over the defaults. A missing file leaves the defaults in place.
    pub fn load(path: &str) -> Result<Self, AdminError> {
        let config = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    pub fn provider_config(&self) -> ProviderConfig {
        let config = ProviderConfig::new(&self.cluster, self.source);
        match self.periodic_refresh {
            Some(interval) => config.with_periodic_refresh(interval),
            None => config,
        }
    }
}
