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

use crate::adapters::Delta;
use crate::snapshot::{ResourceView, RoutingSnapshot};
use crate::source::SourceType;
use chrono::Utc;
use imbl::{HashMap as ImHashMap, OrdMap, OrdSet};
use spectator_common::InstanceConfig;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::trace;

/// Folds deltas into the next snapshot. Never touches a published snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotBuilder {
    source: SourceType,
}

impl SnapshotBuilder {
    pub fn new(source: SourceType) -> Self {
        Self { source }
    }

    /// Returns the next snapshot, or `None` when nothing observable changed.
    /// `force` publishes even without changes.
    pub fn build(
        &self,
        current: &RoutingSnapshot,
        deltas: Vec<Delta>,
        configs: &BTreeMap<String, InstanceConfig>,
        live: &BTreeSet<String>,
        force: bool,
    ) -> Option<RoutingSnapshot> {
        let mut changed = force;
        let mut resources = current.resources.clone();
        for delta in deltas {
            match delta {
                Delta::FullResync(assignment) => {
                    let unchanged = resources
                        .get(&assignment.resource)
                        .is_some_and(|view| *view.assignment() == assignment);
                    if unchanged {
                        trace!("Resource {} unchanged", assignment.resource);
                        continue;
                    }
                    resources.insert(
                        assignment.resource.clone(),
                        Arc::new(ResourceView::new(assignment)),
                    );
                    changed = true;
                }
                Delta::Removed(resource) => {
                    changed |= resources.remove(&resource).is_some();
                }
            }
        }

        let configs: OrdMap<String, InstanceConfig> = configs
            .iter()
            .map(|(name, config)| (name.clone(), config.clone()))
            .collect();
        let live: OrdSet<String> = live.iter().cloned().collect();
        changed |= configs != current.configs || live != current.live;
        if !changed {
            return None;
        }

        let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut instances = OrdMap::new();
        for view in resources.values() {
            groups
                .entry(view.group().to_owned())
                .or_default()
                .insert(view.name().to_owned());
            for instance in view.hosts() {
                if !instances.contains_key(instance) {
                    let config = configs
                        .get(instance)
                        .cloned()
                        .unwrap_or_else(|| InstanceConfig::sentinel(instance));
                    instances.insert(instance.to_owned(), config);
                }
            }
        }

        Some(RoutingSnapshot {
            version: current.version + 1,
            built_at: Utc::now(),
            source: self.source,
            resources,
            groups: groups.into_iter().collect::<ImHashMap<_, _>>(),
            instances,
            configs,
            live,
        })
    }
}
