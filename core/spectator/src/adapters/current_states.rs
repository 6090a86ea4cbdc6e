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

use super::{
    CURRENT_STATE_FIELD, Delta, RESOURCE_GROUP_NAME_FIELD, RESOURCE_TAG_FIELD,
    ResourceAssignment, STATE_MODEL_DEF_FIELD,
};
use crate::provider::ProviderStats;
use crate::registry::InstanceRegistry;
use futures::future::join_all;
use spectator_common::{
    CoordinationClient, LiveInstance, PropertyKeys, PropertyType, Record, SESSION_ID_FIELD,
    StoreError,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Reports of one instance under the session it is currently live with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SessionReport {
    session: String,
    resources: BTreeMap<String, ResourceAssignment>,
    // Resources whose report could not be decoded.
    malformed: BTreeSet<String>,
}

/// Aggregates `/INSTANCES/{instance}/CURRENTSTATES/{session}/{resource}`
/// across live instances.
///
/// Only the session an instance is currently live with counts. When the
/// liveness marker does not name a session, the most recently created
/// session directory is used. Reports of instances that are not live are
/// ignored altogether.
#[derive(Debug)]
pub struct CurrentStatesAdapter {
    keys: PropertyKeys,
    stats: Arc<ProviderStats>,
    reports: BTreeMap<String, SessionReport>,
    emitted: BTreeSet<String>,
}

impl CurrentStatesAdapter {
    pub fn new(keys: PropertyKeys, stats: Arc<ProviderStats>) -> Self {
        Self {
            keys,
            stats,
            reports: BTreeMap::new(),
            emitted: BTreeSet::new(),
        }
    }

    pub fn instances_root(&self) -> String {
        self.keys.instances()
    }

    pub async fn resync(
        &mut self,
        client: &dyn CoordinationClient,
        registry: &InstanceRegistry,
    ) -> Result<Vec<Delta>, StoreError> {
        let mut reports = BTreeMap::new();
        for (instance, live) in registry.live_instances() {
            if let Some(report) = self.load_instance(client, live).await? {
                reports.insert(instance.clone(), report);
            }
        }
        self.reports = reports;

        let mut resources = self.emitted.clone();
        for report in self.reports.values() {
            resources.extend(report.resources.keys().cloned());
            resources.extend(report.malformed.iter().cloned());
        }
        Ok(self.emit(resources))
    }

    pub async fn apply(
        &mut self,
        client: &dyn CoordinationClient,
        paths: &BTreeSet<String>,
        live_changed: &BTreeSet<String>,
        registry: &InstanceRegistry,
    ) -> Result<Vec<Delta>, StoreError> {
        let current_states = PropertyType::CurrentStates.to_string();
        let instances = PropertyType::Instances.to_string();
        let mut dirty = live_changed.clone();
        for path in paths {
            let Some(segments) = self.keys.segments(path) else {
                continue;
            };
            match segments.as_slice() {
                [root, instance] if *root == instances => {
                    dirty.insert((*instance).to_owned());
                }
                [root, instance, property, ..] if *root == instances && *property == current_states => {
                    dirty.insert((*instance).to_owned());
                }
                _ => {}
            }
        }

        let mut affected = BTreeSet::new();
        for instance in dirty {
            let previous = self.reports.remove(&instance);
            let current = match registry.live_instance(&instance) {
                Some(live) => self.load_instance(client, live).await?,
                None => None,
            };
            collect_changed(previous.as_ref(), current.as_ref(), &mut affected);
            if let Some(current) = current {
                self.reports.insert(instance, current);
            }
        }
        Ok(self.emit(affected))
    }

    async fn load_instance(
        &self,
        client: &dyn CoordinationClient,
        live: &LiveInstance,
    ) -> Result<Option<SessionReport>, StoreError> {
        let instance = live.name.as_str();
        let sessions = client.children(&self.keys.current_states(instance)).await?;
        let Some(session) = self.select_session(client, live, &sessions).await? else {
            return Ok(None);
        };

        let mut report = SessionReport {
            session: session.clone(),
            ..SessionReport::default()
        };
        if !sessions.contains(&session) {
            return Ok(Some(report));
        }

        let resources = client
            .children(&self.keys.session_current_states(instance, &session))
            .await?;
        let paths: Vec<String> = resources
            .iter()
            .map(|resource| self.keys.current_state(instance, &session, resource))
            .collect();
        let reads = join_all(paths.iter().map(|path| client.read(path))).await;

        for (resource, read) in resources.into_iter().zip(reads) {
            match read {
                Ok(Some(node)) => {
                    if let Some(assignment) = self.parse(instance, &session, &resource, &node.record)
                    {
                        report.resources.insert(resource, assignment);
                    }
                }
                Ok(None) => {}
                Err(StoreError::Malformed { path, reason }) => {
                    warn!("Ignoring {resource} while its current state {path} is malformed: {reason}");
                    self.stats.record_data_error();
                    report.malformed.insert(resource);
                }
                Err(error) => return Err(error),
            }
        }
        Ok(Some(report))
    }

    async fn select_session(
        &self,
        client: &dyn CoordinationClient,
        live: &LiveInstance,
        sessions: &[String],
    ) -> Result<Option<String>, StoreError> {
        if let Some(session) = &live.session_id {
            return Ok(Some(session.clone()));
        }

        let mut newest: Option<(u64, &String)> = None;
        for session in sessions {
            let path = self.keys.session_current_states(&live.name, session);
            let Some(stat) = client.exists(&path).await? else {
                continue;
            };
            if newest.is_none_or(|(seq, _)| stat.created_seq > seq) {
                newest = Some((stat.created_seq, session));
            }
        }
        if let Some((_, session)) = newest {
            debug!(
                "Instance {} names no session, using newest session {session}",
                live.name
            );
        }
        Ok(newest.map(|(_, session)| session.clone()))
    }

    fn parse(
        &self,
        instance: &str,
        session: &str,
        resource: &str,
        record: &Record,
    ) -> Option<ResourceAssignment> {
        let foreign_owner = record
            .simple_field(SESSION_ID_FIELD)
            .filter(|owner| !owner.is_empty() && *owner != session);
        if let Some(owner) = foreign_owner {
            debug!("Skipping current state of {resource} on {instance} written by session {owner}");
            return None;
        }

        let mut assignment = ResourceAssignment::new(resource);
        assignment.state_model = field(record, STATE_MODEL_DEF_FIELD);
        assignment.resource_group = field(record, RESOURCE_GROUP_NAME_FIELD);
        assignment.resource_tag = field(record, RESOURCE_TAG_FIELD);
        for (partition, fields) in &record.map_fields {
            if let Some(role) = fields.get(CURRENT_STATE_FIELD) {
                assignment.assign(partition, instance, role);
            }
        }
        Some(assignment)
    }

    /// Aggregates the given resources across all live reports. A resource
    /// any live instance reported malformed is left out until that report is fixed.
    fn emit(&mut self, resources: BTreeSet<String>) -> Vec<Delta> {
        let mut deltas = Vec::with_capacity(resources.len());
        for resource in resources {
            let mut aggregate: Option<ResourceAssignment> = None;
            let malformed = self
                .reports
                .values()
                .any(|report| report.malformed.contains(&resource));
            for report in self.reports.values().filter(|_| !malformed) {
                let Some(partial) = report.resources.get(&resource) else {
                    continue;
                };
                let merged = aggregate.get_or_insert_with(|| ResourceAssignment::new(&resource));
                merge(merged, partial);
            }
            match aggregate {
                Some(assignment) => {
                    self.emitted.insert(resource);
                    deltas.push(Delta::FullResync(assignment));
                }
                None => {
                    if self.emitted.remove(&resource) {
                        deltas.push(Delta::Removed(resource));
                    }
                }
            }
        }
        deltas
    }
}

fn field(record: &Record, key: &str) -> Option<String> {
    record
        .simple_field(key)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn merge(target: &mut ResourceAssignment, partial: &ResourceAssignment) {
    if target.state_model.is_none() {
        target.state_model = partial.state_model.clone();
    }
    if target.resource_group.is_none() {
        target.resource_group = partial.resource_group.clone();
    }
    if target.resource_tag.is_none() {
        target.resource_tag = partial.resource_tag.clone();
    }
    for (partition, instances) in &partial.partitions {
        target
            .partitions
            .entry(partition.clone())
            .or_default()
            .extend(instances.iter().map(|(instance, role)| (instance.clone(), role.clone())));
    }
}

fn collect_changed(
    previous: Option<&SessionReport>,
    current: Option<&SessionReport>,
    affected: &mut BTreeSet<String>,
) {
    let empty = SessionReport::default();
    let before = previous.unwrap_or(&empty);
    let after = current.unwrap_or(&empty);
    for resource in before.resources.keys().chain(after.resources.keys()) {
        if before.resources.get(resource) != after.resources.get(resource) {
            affected.insert(resource.clone());
        }
    }
    affected.extend(
        before
            .malformed
            .symmetric_difference(&after.malformed)
            .cloned(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InstanceRegistry;
    use spectator_common::{InMemoryStore, InstanceConfig};

    const CLUSTER: &str = "c";

    fn current_state(resource: &str, session: &str, partitions: &[(&str, &str)]) -> Record {
        let mut record = Record::new(resource);
        record.set_simple_field(SESSION_ID_FIELD, session);
        record.set_simple_field(STATE_MODEL_DEF_FIELD, "MasterSlave");
        for (partition, role) in partitions {
            record.set_map_entry(*partition, CURRENT_STATE_FIELD, *role);
        }
        record
    }

    fn join(store: &InMemoryStore, instance: &str, session: &str) {
        let keys = PropertyKeys::new(CLUSTER);
        store
            .set(
                &keys.participant_config(instance),
                &InstanceConfig::from_record(instance, &Record::new(instance)).to_record(),
            )
            .unwrap();
        store
            .set(
                &keys.live_instance(instance),
                &LiveInstance::new(instance, session).to_record(),
            )
            .unwrap();
    }

    fn report(store: &InMemoryStore, instance: &str, session: &str, partitions: &[(&str, &str)]) {
        let keys = PropertyKeys::new(CLUSTER);
        store
            .set(
                &keys.current_state(instance, session, "db"),
                &current_state("db", session, partitions),
            )
            .unwrap();
    }

    async fn setup(store: &InMemoryStore) -> (InstanceRegistry, CurrentStatesAdapter) {
        let client = store.connect();
        let keys = PropertyKeys::new(CLUSTER);
        let mut registry = InstanceRegistry::new(keys.clone());
        registry.resync(&client).await.unwrap();
        let adapter = CurrentStatesAdapter::new(keys, Arc::new(ProviderStats::default()));
        (registry, adapter)
    }

    fn single(deltas: Vec<Delta>) -> ResourceAssignment {
        assert_eq!(deltas.len(), 1, "unexpected deltas: {deltas:?}");
        match deltas.into_iter().next() {
            Some(Delta::FullResync(assignment)) => assignment,
            other => panic!("unexpected delta: {other:?}"),
        }
    }

    #[tokio::test]
    async fn should_aggregate_live_sessions_only() {
        let store = InMemoryStore::new();
        join(&store, "p_1", "s1");
        join(&store, "p_2", "s2");
        report(&store, "p_1", "s1", &[("db_0", "MASTER")]);
        report(&store, "p_2", "s2", &[("db_0", "SLAVE")]);
        // Leftover of an older session of p_1.
        report(&store, "p_1", "s0", &[("db_0", "SLAVE"), ("db_1", "MASTER")]);

        let (registry, mut adapter) = setup(&store).await;
        let client = store.connect();
        let assignment = single(adapter.resync(&client, &registry).await.unwrap());

        assert_eq!(assignment.partitions.len(), 1);
        assert_eq!(assignment.partitions["db_0"]["p_1"], "MASTER");
        assert_eq!(assignment.partitions["db_0"]["p_2"], "SLAVE");
        assert_eq!(assignment.state_model.as_deref(), Some("MasterSlave"));
    }

    #[tokio::test]
    async fn malformed_report_should_hide_the_resource_until_fixed() {
        let store = InMemoryStore::new();
        let keys = PropertyKeys::new(CLUSTER);
        join(&store, "p_1", "s1");
        join(&store, "p_2", "s2");
        report(&store, "p_1", "s1", &[("db_0", "MASTER")]);
        store.set_raw(&keys.current_state("p_2", "s2", "db"), b"{broken".to_vec());

        let client = store.connect();
        let mut registry = InstanceRegistry::new(keys.clone());
        registry.resync(&client).await.unwrap();
        let stats = Arc::new(ProviderStats::default());
        let mut adapter = CurrentStatesAdapter::new(keys.clone(), stats.clone());

        assert!(adapter.resync(&client, &registry).await.unwrap().is_empty());
        assert_eq!(stats.snapshot().data_errors, 1);

        report(&store, "p_2", "s2", &[("db_0", "SLAVE")]);
        let paths = BTreeSet::from([keys.current_state("p_2", "s2", "db")]);
        let assignment = single(
            adapter
                .apply(&client, &paths, &BTreeSet::new(), &registry)
                .await
                .unwrap(),
        );
        assert_eq!(assignment.instances(), BTreeSet::from(["p_1", "p_2"]));

        store.set_raw(&keys.current_state("p_2", "s2", "db"), b"{broken again".to_vec());
        let deltas = adapter
            .apply(&client, &paths, &BTreeSet::new(), &registry)
            .await
            .unwrap();
        assert_eq!(deltas, vec![Delta::Removed("db".to_owned())]);
        assert_eq!(stats.snapshot().data_errors, 2);
    }

    #[tokio::test]
    async fn should_ignore_instances_that_are_not_live() {
        let store = InMemoryStore::new();
        join(&store, "p_1", "s1");
        report(&store, "p_1", "s1", &[("db_0", "MASTER")]);
        report(&store, "p_9", "s9", &[("db_0", "MASTER")]);

        let (registry, mut adapter) = setup(&store).await;
        let client = store.connect();
        let assignment = single(adapter.resync(&client, &registry).await.unwrap());
        assert_eq!(assignment.instances(), BTreeSet::from(["p_1"]));
    }

    #[tokio::test]
    async fn should_fall_back_to_newest_session_when_live_marker_names_none() {
        let store = InMemoryStore::new();
        let keys = PropertyKeys::new(CLUSTER);
        store
            .set(&keys.live_instance("p_1"), &Record::new("p_1"))
            .unwrap();
        report(&store, "p_1", "old", &[("db_0", "SLAVE")]);
        report(&store, "p_1", "new", &[("db_0", "MASTER")]);

        let (registry, mut adapter) = setup(&store).await;
        let client = store.connect();
        let assignment = single(adapter.resync(&client, &registry).await.unwrap());
        assert_eq!(assignment.partitions["db_0"]["p_1"], "MASTER");
    }

    #[tokio::test]
    async fn dropping_liveness_should_remove_the_resource() {
        let store = InMemoryStore::new();
        join(&store, "p_1", "s1");
        report(&store, "p_1", "s1", &[("db_0", "MASTER")]);

        let (mut registry, mut adapter) = setup(&store).await;
        let client = store.connect();
        single(adapter.resync(&client, &registry).await.unwrap());

        let keys = PropertyKeys::new(CLUSTER);
        store.delete(&keys.live_instance("p_1")).unwrap();
        let paths = BTreeSet::from([keys.live_instance("p_1")]);
        let change = registry.apply(&client, &paths).await.unwrap();
        assert_eq!(change.live_changed, BTreeSet::from(["p_1".to_owned()]));

        let deltas = adapter
            .apply(&client, &paths, &change.live_changed, &registry)
            .await
            .unwrap();
        assert_eq!(deltas, vec![Delta::Removed("db".to_owned())]);
    }

    #[tokio::test]
    async fn session_change_should_switch_reports() {
        let store = InMemoryStore::new();
        join(&store, "p_1", "s1");
        report(&store, "p_1", "s1", &[("db_0", "MASTER")]);

        let (mut registry, mut adapter) = setup(&store).await;
        let client = store.connect();
        single(adapter.resync(&client, &registry).await.unwrap());

        // The instance reconnects under a new session and reports a different role.
        report(&store, "p_1", "s2", &[("db_0", "SLAVE")]);
        join(&store, "p_1", "s2");
        let keys = PropertyKeys::new(CLUSTER);
        let paths = BTreeSet::from([
            keys.live_instance("p_1"),
            keys.current_state("p_1", "s2", "db"),
        ]);
        let change = registry.apply(&client, &paths).await.unwrap();
        let assignment = single(
            adapter
                .apply(&client, &paths, &change.live_changed, &registry)
                .await
                .unwrap(),
        );
        assert_eq!(assignment.partitions["db_0"]["p_1"], "SLAVE");
    }

    #[tokio::test]
    async fn unchanged_reports_should_not_emit() {
        let store = InMemoryStore::new();
        join(&store, "p_1", "s1");
        report(&store, "p_1", "s1", &[("db_0", "MASTER")]);

        let (registry, mut adapter) = setup(&store).await;
        let client = store.connect();
        single(adapter.resync(&client, &registry).await.unwrap());

        let keys = PropertyKeys::new(CLUSTER);
        report(&store, "p_1", "s1", &[("db_0", "MASTER")]);
        let paths = BTreeSet::from([keys.current_state("p_1", "s1", "db")]);
        let deltas = adapter
            .apply(&client, &paths, &BTreeSet::new(), &registry)
            .await
            .unwrap();
        assert!(deltas.is_empty());
    }
}
