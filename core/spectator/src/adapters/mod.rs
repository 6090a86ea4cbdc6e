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

//! Source adapters normalize one store representation into per-resource deltas.
//!
//! Adapters never patch a resource partially: every change to a resource
//! produces a full replacement of its assignment, or its removal. The
//! builder can then apply deltas in any multiplicity and still converge to
//! the same snapshot.

mod current_states;
mod view;

pub use current_states::CurrentStatesAdapter;
pub use view::ViewAdapter;

use crate::provider::ProviderStats;
use crate::registry::InstanceRegistry;
use crate::source::SourceType;
use spectator_common::{CoordinationClient, PropertyKeys, Record, StoreError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub const STATE_MODEL_DEF_REF_FIELD: &str = "STATE_MODEL_DEF_REF";
pub const STATE_MODEL_DEF_FIELD: &str = "STATE_MODEL_DEF";
pub const REPLICAS_FIELD: &str = "REPLICAS";
pub const RESOURCE_GROUP_NAME_FIELD: &str = "RESOURCE_GROUP_NAME";
pub const RESOURCE_TAG_FIELD: &str = "RESOURCE_TAG";
pub const CURRENT_STATE_FIELD: &str = "CURRENT_STATE";

/// `partition -> instance -> role`
pub type PartitionMap = BTreeMap<String, BTreeMap<String, String>>;

/// Complete assignment of one resource as seen by a source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceAssignment {
    pub resource: String,
    pub state_model: Option<String>,
    pub resource_group: Option<String>,
    pub resource_tag: Option<String>,
    pub partitions: PartitionMap,
}

impl ResourceAssignment {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..Default::default()
        }
    }

    /// Reads an external view shaped record: `mapFields[partition][instance] = role`.
    pub fn from_view_record(resource: &str, record: &Record) -> Self {
        let mut assignment = Self::new(resource);
        assignment.state_model = non_empty(record.simple_field(STATE_MODEL_DEF_REF_FIELD));
        assignment.resource_group = non_empty(record.simple_field(RESOURCE_GROUP_NAME_FIELD));
        assignment.resource_tag = non_empty(record.simple_field(RESOURCE_TAG_FIELD));
        for (partition, instances) in &record.map_fields {
            for (instance, role) in instances {
                assignment.assign(partition, instance, role);
            }
        }
        assignment
    }

    pub fn assign(&mut self, partition: &str, instance: &str, role: &str) {
        if role.is_empty() || instance.is_empty() {
            return;
        }
        self.partitions
            .entry(partition.to_owned())
            .or_default()
            .insert(instance.to_owned(), role.to_owned());
    }

    /// Writes the assignment back as an external view shaped record.
    pub fn to_view_record(&self) -> Record {
        let mut record = Record::new(&self.resource);
        if let Some(state_model) = &self.state_model {
            record.set_simple_field(STATE_MODEL_DEF_REF_FIELD, state_model);
        }
        if let Some(group) = &self.resource_group {
            record.set_simple_field(RESOURCE_GROUP_NAME_FIELD, group);
        }
        if let Some(tag) = &self.resource_tag {
            record.set_simple_field(RESOURCE_TAG_FIELD, tag);
        }
        for (partition, instances) in &self.partitions {
            record.set_map_field(partition, instances.clone());
        }
        record
    }

    /// Group the resource belongs to; a resource without one is its own group.
    pub fn group(&self) -> &str {
        self.resource_group.as_deref().unwrap_or(&self.resource)
    }

    pub fn instances(&self) -> BTreeSet<&str> {
        self.partitions
            .values()
            .flat_map(|instances| instances.keys().map(String::as_str))
            .collect()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|value| !value.is_empty()).map(str::to_owned)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    FullResync(ResourceAssignment),
    Removed(String),
}

impl Delta {
    pub fn resource(&self) -> &str {
        match self {
            Delta::FullResync(assignment) => &assignment.resource,
            Delta::Removed(resource) => resource,
        }
    }
}

/// The closed set of routing sources, dispatched on construction.
#[derive(Debug)]
pub enum SourceAdapter {
    View(ViewAdapter),
    CurrentStates(CurrentStatesAdapter),
}

impl SourceAdapter {
    pub fn new(source: SourceType, keys: &PropertyKeys, stats: Arc<ProviderStats>) -> Self {
        match source {
            SourceType::ExternalView | SourceType::TargetExternalView => {
                SourceAdapter::View(ViewAdapter::new(keys.clone(), source.into(), stats))
            }
            SourceType::CurrentStates => {
                SourceAdapter::CurrentStates(CurrentStatesAdapter::new(keys.clone(), stats))
            }
        }
    }

    /// Store prefixes whose changes feed this adapter.
    pub fn watch_prefixes(&self) -> Vec<String> {
        match self {
            SourceAdapter::View(adapter) => vec![adapter.root().to_owned()],
            SourceAdapter::CurrentStates(adapter) => vec![adapter.instances_root()],
        }
    }

    /// Re-reads the whole source. Resources that disappeared since the last
    /// resync are reported as removed.
    pub async fn resync(
        &mut self,
        client: &dyn CoordinationClient,
        registry: &InstanceRegistry,
    ) -> Result<Vec<Delta>, StoreError> {
        match self {
            SourceAdapter::View(adapter) => adapter.resync(client).await,
            SourceAdapter::CurrentStates(adapter) => adapter.resync(client, registry).await,
        }
    }

    /// Re-reads what a batch of changed paths touches. `live_changed` names
    /// the instances whose liveness entry changed in the same batch.
    pub async fn apply(
        &mut self,
        client: &dyn CoordinationClient,
        paths: &BTreeSet<String>,
        live_changed: &BTreeSet<String>,
        registry: &InstanceRegistry,
    ) -> Result<Vec<Delta>, StoreError> {
        match self {
            SourceAdapter::View(adapter) => adapter.apply(client, paths).await,
            SourceAdapter::CurrentStates(adapter) => {
                adapter.apply(client, paths, live_changed, registry).await
            }
        }
    }
}
