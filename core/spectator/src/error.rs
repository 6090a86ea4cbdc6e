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

use spectator_common::StoreError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Unsupported source data type: {0}")]
    UnsupportedSourceType(String),
    #[error("Malformed cluster root: {0}")]
    MalformedClusterRoot(String),
    #[error("Target external view is not enabled for cluster {0}")]
    TargetExternalViewDisabled(String),
    #[error("Routing table provider is shut down")]
    Closed,
    #[error("Refresh did not complete within {0:?}")]
    RefreshTimeout(Duration),
    #[error("Coordination store is unavailable")]
    Unavailable,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RoutingError {
    /// Configuration errors are fatal to the provider instance being built.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            RoutingError::UnsupportedSourceType(_)
                | RoutingError::MalformedClusterRoot(_)
                | RoutingError::TargetExternalViewDisabled(_)
        )
    }
}
