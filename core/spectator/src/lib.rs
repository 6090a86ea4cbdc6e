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

//! Client-side routing table of a cluster whose state lives in a
//! coordination store.
//!
//! A [`RoutingTableProvider`] follows one of three sources (external view,
//! target external view or the current states reported by live instances)
//! and answers "which instances hold role R of partition P of resource X"
//! from an immutable snapshot that is swapped atomically on every change.

pub mod adapters;
mod builder;
mod configs;
mod error;
mod provider;
mod registry;
mod snapshot;
mod source;
#[cfg(test)]
mod test_utils;
mod verifier;

pub use adapters::{Delta, PartitionMap, ResourceAssignment};
pub use builder::SnapshotBuilder;
pub use configs::{BackoffConfig, ProviderConfig};
pub use error::RoutingError;
pub use provider::{ProviderState, ProviderStats, ProviderStatsSnapshot, RoutingTableProvider};
pub use registry::{InstanceRegistry, RegistryChange};
pub use snapshot::{ResourceView, RoutingSnapshot};
pub use source::SourceType;
pub use verifier::BestPossibleExternalViewVerifier;
