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

//! Drives an in-memory coordination store the way a controller and its
//! participants would, so routing providers can be tested end to end.

mod cluster;
mod controller;
mod error;
mod eventually;
mod participant;

pub use cluster::{ClusterHarness, ClusterHarnessBuilder};
pub use controller::{MASTER, MockController, ResourceSpec, SLAVE};
pub use error::HarnessError;
pub use eventually::{DEFAULT_POLL_TICK, eventually};
pub use participant::MockParticipant;

use tracing_subscriber::EnvFilter;

/// Installs a test-friendly subscriber once per process. Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new("INFO")))
        .with_test_writer()
        .try_init();
}
