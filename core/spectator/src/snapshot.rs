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

use crate::adapters::ResourceAssignment;
use crate::source::SourceType;
use chrono::{DateTime, Utc};
use imbl::{HashMap as ImHashMap, OrdMap, OrdSet};
use spectator_common::InstanceConfig;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One resource's assignment plus the indexes queries run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceView {
    assignment: ResourceAssignment,
    // partition -> role -> instances, ascending
    by_partition: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    // instance -> (partition, role), ascending
    by_instance: BTreeMap<String, BTreeSet<(String, String)>>,
}

impl ResourceView {
    pub fn new(assignment: ResourceAssignment) -> Self {
        let mut by_partition: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();
        let mut by_instance: BTreeMap<String, BTreeSet<(String, String)>> = BTreeMap::new();
        for (partition, instances) in &assignment.partitions {
            let roles = by_partition.entry(partition.clone()).or_default();
            // Instances iterate in ascending order, so every role list stays sorted.
            for (instance, role) in instances {
                roles.entry(role.clone()).or_default().push(instance.clone());
                by_instance
                    .entry(instance.clone())
                    .or_default()
                    .insert((partition.clone(), role.clone()));
            }
        }
        Self {
            assignment,
            by_partition,
            by_instance,
        }
    }

    pub fn name(&self) -> &str {
        &self.assignment.resource
    }

    pub fn group(&self) -> &str {
        self.assignment.group()
    }

    pub fn tag(&self) -> Option<&str> {
        self.assignment.resource_tag.as_deref()
    }

    pub fn state_model(&self) -> Option<&str> {
        self.assignment.state_model.as_deref()
    }

    pub fn assignment(&self) -> &ResourceAssignment {
        &self.assignment
    }

    pub fn partitions(&self) -> impl Iterator<Item = &str> {
        self.by_partition.keys().map(String::as_str)
    }

    pub fn instances_for(&self, partition: &str, role: &str) -> &[String] {
        self.by_partition
            .get(partition)
            .and_then(|roles| roles.get(role))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn instances_in_state(&self, role: &str) -> BTreeSet<&str> {
        self.by_partition
            .values()
            .filter_map(|roles| roles.get(role))
            .flatten()
            .map(String::as_str)
            .collect()
    }

    pub fn partitions_for(&self, instance: &str) -> Option<&BTreeSet<(String, String)>> {
        self.by_instance.get(instance)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.by_instance.keys().map(String::as_str)
    }
}

/// Immutable routing state published by the updater.
///
/// Per-resource views are shared between consecutive snapshots; building the
/// next snapshot clones the maps in O(1) and only replaces changed entries.
#[derive(Debug, Clone)]
pub struct RoutingSnapshot {
    pub(crate) version: u64,
    pub(crate) built_at: DateTime<Utc>,
    pub(crate) source: SourceType,
    pub(crate) resources: ImHashMap<String, Arc<ResourceView>>,
    /// group -> resources
    pub(crate) groups: ImHashMap<String, BTreeSet<String>>,
    /// Every assigned instance joined with its config, or a disabled sentinel.
    pub(crate) instances: OrdMap<String, InstanceConfig>,
    /// Registry configs, assigned or not.
    pub(crate) configs: OrdMap<String, InstanceConfig>,
    pub(crate) live: OrdSet<String>,
}

impl RoutingSnapshot {
    pub fn empty(source: SourceType) -> Self {
        Self {
            version: 0,
            built_at: Utc::now(),
            source,
            resources: ImHashMap::new(),
            groups: ImHashMap::new(),
            instances: OrdMap::new(),
            configs: OrdMap::new(),
            live: OrdSet::new(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn source(&self) -> SourceType {
        self.source
    }

    pub fn resource(&self, resource: &str) -> Option<&ResourceView> {
        self.resources.get(resource).map(Arc::as_ref)
    }

    pub fn resources(&self) -> BTreeSet<String> {
        self.resources.keys().cloned().collect()
    }

    pub fn instances_for_resource(
        &self,
        resource: &str,
        partition: &str,
        role: &str,
    ) -> Vec<InstanceConfig> {
        self.resource(resource)
            .map(|view| self.join(view.instances_for(partition, role).iter().map(String::as_str)))
            .unwrap_or_default()
    }

    pub fn instances_for_resource_group(
        &self,
        group: &str,
        partition: &str,
        role: &str,
    ) -> Vec<InstanceConfig> {
        self.group_union(group, partition, role, |_| true)
    }

    /// Like [`Self::instances_for_resource_group`], restricted to resources
    /// tagged with one of `tags`.
    pub fn instances_for_resource_group_with_tags(
        &self,
        group: &str,
        partition: &str,
        role: &str,
        tags: &[&str],
    ) -> Vec<InstanceConfig> {
        self.group_union(group, partition, role, |view| {
            view.tag().is_some_and(|tag| tags.contains(&tag))
        })
    }

    pub fn instances_for_resource_in_state(&self, resource: &str, role: &str) -> Vec<InstanceConfig> {
        self.resource(resource)
            .map(|view| self.join(view.instances_in_state(role).into_iter()))
            .unwrap_or_default()
    }

    pub fn partitions_for_instance(&self, resource: &str, instance: &str) -> Vec<(String, String)> {
        self.resource(resource)
            .and_then(|view| view.partitions_for(instance))
            .map(|partitions| partitions.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Instances hosting at least one replica, sorted by name.
    pub fn instances(&self) -> Vec<InstanceConfig> {
        self.instances.values().cloned().collect()
    }

    pub fn instance_configs(&self) -> Vec<InstanceConfig> {
        self.configs.values().cloned().collect()
    }

    pub fn live_instances(&self) -> Vec<InstanceConfig> {
        self.join(self.live.iter().map(String::as_str))
    }

    pub fn is_live(&self, instance: &str) -> bool {
        self.live.contains(instance)
    }

    /// Compares everything queries can observe, ignoring version and build time.
    pub fn content_eq(&self, other: &RoutingSnapshot) -> bool {
        self.resources == other.resources
            && self.instances == other.instances
            && self.configs == other.configs
            && self.live == other.live
    }

    fn group_union<F>(&self, group: &str, partition: &str, role: &str, filter: F) -> Vec<InstanceConfig>
    where
        F: Fn(&ResourceView) -> bool,
    {
        let Some(resources) = self.groups.get(group) else {
            return Vec::new();
        };
        let names: BTreeSet<&str> = resources
            .iter()
            .filter_map(|resource| self.resource(resource))
            .filter(|view| filter(view))
            .flat_map(|view| view.instances_for(partition, role).iter().map(String::as_str))
            .collect();
        self.join(names.into_iter())
    }

    fn join<'a>(&self, names: impl Iterator<Item = &'a str>) -> Vec<InstanceConfig> {
        names
            .map(|name| {
                self.instances
                    .get(name)
                    .or_else(|| self.configs.get(name))
                    .cloned()
                    .unwrap_or_else(|| InstanceConfig::sentinel(name))
            })
            .collect()
    }
}
