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

mod error;
mod store;
mod types;
mod utils;

// Errors
pub use error::store_error::StoreError;
// Store
pub use store::in_memory::{InMemoryClient, InMemoryStore};
pub use store::{
    CoordinationClient, SessionState, Stat, StoreEvent, VersionedRecord, WatchId, WatchSink,
};
// Types
pub use types::cluster_config::ClusterConfig;
pub use types::instance_config::InstanceConfig;
pub use types::live_instance::{LiveInstance, SESSION_ID_FIELD};
pub use types::paths::PropertyKeys;
pub use types::property_type::PropertyType;
pub use types::record::Record;
// Utils
pub use utils::duration;
