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

use thiserror::Error;

/// Errors reported by a coordination store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The client lost its connection; reads may succeed again after reconnecting.
    #[error("Connection to the coordination store was lost")]
    ConnectionLoss,
    /// The client session expired; ephemeral nodes owned by it are gone.
    #[error("Coordination store session expired")]
    SessionExpired,
    #[error("Node already exists: {0}")]
    NodeExists(String),
    #[error("Node does not exist: {0}")]
    NoNode(String),
    #[error("Node has children: {0}")]
    NotEmpty(String),
    #[error("Node {path} is malformed: {reason}")]
    Malformed { path: String, reason: String },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Transient errors are retried by callers; everything else is a data or usage problem.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::ConnectionLoss | StoreError::SessionExpired)
    }
}
