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

use spectator::RoutingError;
use spectator_common::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Timed out: {context}")]
    Timeout { context: String },
    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),
    #[error("Resource already exists: {0}")]
    ResourceExists(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
}

impl HarnessError {
    pub fn is_retryable(&self) -> bool {
        match self {
            HarnessError::Store(error) => error.is_transient(),
            HarnessError::Routing(error) => {
                matches!(error, RoutingError::Unavailable | RoutingError::RefreshTimeout(_))
                    || matches!(error, RoutingError::Store(error) if error.is_transient())
            }
            _ => false,
        }
    }
}
