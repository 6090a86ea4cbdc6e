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
use strum::Display;

/// Provider lifecycle: `INIT -> SUBSCRIBING -> LIVE <-> STALE -> SHUTDOWN`.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderState {
    #[strum(to_string = "INIT")]
    Init,
    #[strum(to_string = "SUBSCRIBING")]
    Subscribing,
    #[strum(to_string = "LIVE")]
    Live,
    #[strum(to_string = "STALE")]
    Stale,
    #[strum(to_string = "SHUTDOWN")]
    Shutdown,
}

impl ProviderState {
    /// Whether a snapshot build has been attempted at least once.
    pub fn is_started(&self) -> bool {
        !matches!(self, ProviderState::Init | ProviderState::Subscribing)
    }
}
