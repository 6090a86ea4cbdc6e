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

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct ProviderStats {
    builds: AtomicU64,
    publishes: AtomicU64,
    coalesced_events: AtomicU64,
    data_errors: AtomicU64,
    resync_retries: AtomicU64,
    last_build_micros: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProviderStatsSnapshot {
    pub builds: u64,
    pub publishes: u64,
    pub coalesced_events: u64,
    pub data_errors: u64,
    pub resync_retries: u64,
    #[serde(serialize_with = "spectator_common::duration::serialize")]
    pub last_build_latency: Duration,
}

impl ProviderStats {
    pub fn record_build(&self, elapsed: Duration) {
        self.builds.fetch_add(1, Ordering::Relaxed);
        self.last_build_micros
            .store(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_publish(&self) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self, events: u64) {
        self.coalesced_events.fetch_add(events, Ordering::Relaxed);
    }

    pub fn record_data_error(&self) {
        self.data_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.resync_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProviderStatsSnapshot {
        ProviderStatsSnapshot {
            builds: self.builds.load(Ordering::Relaxed),
            publishes: self.publishes.load(Ordering::Relaxed),
            coalesced_events: self.coalesced_events.load(Ordering::Relaxed),
            data_errors: self.data_errors.load(Ordering::Relaxed),
            resync_retries: self.resync_retries.load(Ordering::Relaxed),
            last_build_latency: Duration::from_micros(self.last_build_micros.load(Ordering::Relaxed)),
        }
    }
}
