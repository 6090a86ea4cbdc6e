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

use serde::{Deserialize, Serialize};
use spectator_common::{PropertyType, duration};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub cluster: String,
    pub source: PropertyType,
    /// Full resync interval on top of event-driven builds. Disabled when `None`.
    #[serde(with = "duration::option")]
    pub periodic_refresh: Option<Duration>,
    #[serde(with = "duration")]
    pub refresh_timeout: Duration,
    /// How long construction waits for the first snapshot before returning.
    #[serde(with = "duration")]
    pub init_timeout: Duration,
    pub backoff: BackoffConfig,
}

/// Bounded exponential backoff used while the provider is stale.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    #[serde(with = "duration")]
    pub initial: Duration,
    #[serde(with = "duration")]
    pub max: Duration,
    pub multiplier: f64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            cluster: String::new(),
            source: PropertyType::ExternalView,
            periodic_refresh: None,
            refresh_timeout: Duration::from_secs(10),
            init_timeout: Duration::from_secs(30),
            backoff: BackoffConfig::default(),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(50),
            max: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl ProviderConfig {
    pub fn new(cluster: impl Into<String>, source: PropertyType) -> Self {
        Self {
            cluster: cluster.into(),
            source,
            ..Default::default()
        }
    }

    pub fn with_periodic_refresh(mut self, interval: Duration) -> Self {
        self.periodic_refresh = Some(interval);
        self
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}

impl BackoffConfig {
    /// Delay to wait before retry number `attempt` (0-based), capped at `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        let factor = multiplier.powi(attempt.min(64) as i32);
        let nanos = self.initial.as_nanos() as f64 * factor;
        if !nanos.is_finite() || nanos >= self.max.as_nanos() as f64 {
            self.max
        } else {
            Duration::from_nanos(nanos.round() as u64)
        }
    }
}
