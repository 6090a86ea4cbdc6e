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

use crate::provider::ProviderStats;
use futures::future::join_all;
use spectator_common::{
    CoordinationClient, InstanceConfig, LiveInstance, PropertyKeys, PropertyType, Record,
    StoreError,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

const PARTICIPANT: &str = "PARTICIPANT";

/// What a registry update changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryChange {
    pub configs_changed: bool,
    /// Instances that became live, went away or switched sessions.
    pub live_changed: BTreeSet<String>,
}

impl RegistryChange {
    pub fn is_empty(&self) -> bool {
        !self.configs_changed && self.live_changed.is_empty()
    }
}

/// Participant configs and liveness markers, kept in step with the store.
#[derive(Debug)]
pub struct InstanceRegistry {
    keys: PropertyKeys,
    stats: Arc<ProviderStats>,
    configs: BTreeMap<String, InstanceConfig>,
    live: BTreeMap<String, LiveInstance>,
}

impl InstanceRegistry {
    pub fn new(keys: PropertyKeys) -> Self {
        Self {
            keys,
            stats: Arc::default(),
            configs: BTreeMap::new(),
            live: BTreeMap::new(),
        }
    }

    pub fn with_stats(mut self, stats: Arc<ProviderStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn watch_prefixes(&self) -> Vec<String> {
        vec![self.keys.participant_configs(), self.keys.live_instances()]
    }

    pub fn configs(&self) -> &BTreeMap<String, InstanceConfig> {
        &self.configs
    }

    pub fn config(&self, instance: &str) -> Option<&InstanceConfig> {
        self.configs.get(instance)
    }

    pub fn live_instances(&self) -> &BTreeMap<String, LiveInstance> {
        &self.live
    }

    pub fn live_instance(&self, instance: &str) -> Option<&LiveInstance> {
        self.live.get(instance)
    }

    /// Reloads both subtrees from scratch.
    pub async fn resync(
        &mut self,
        client: &dyn CoordinationClient,
    ) -> Result<RegistryChange, StoreError> {
        let mut change = RegistryChange::default();
        self.reload_configs(client, &mut change).await?;
        self.reload_live(client, &mut change).await?;
        Ok(change)
    }

    /// Reloads whatever the changed paths touch.
    pub async fn apply(
        &mut self,
        client: &dyn CoordinationClient,
        paths: &BTreeSet<String>,
    ) -> Result<RegistryChange, StoreError> {
        let configs = PropertyType::Configs.to_string();
        let live_instances = PropertyType::LiveInstances.to_string();

        let mut all_configs = false;
        let mut all_live = false;
        let mut config_names = BTreeSet::new();
        let mut live_names = BTreeSet::new();
        for path in paths {
            let Some(segments) = self.keys.segments(path) else {
                continue;
            };
            match segments.as_slice() {
                [root] if *root == configs => all_configs = true,
                [root, kind] if *root == configs && *kind == PARTICIPANT => all_configs = true,
                [root, kind, instance, ..] if *root == configs && *kind == PARTICIPANT => {
                    config_names.insert((*instance).to_owned());
                }
                [root] if *root == live_instances => all_live = true,
                [root, instance, ..] if *root == live_instances => {
                    live_names.insert((*instance).to_owned());
                }
                _ => {}
            }
        }

        let mut change = RegistryChange::default();
        if all_configs {
            self.reload_configs(client, &mut change).await?;
        } else if !config_names.is_empty() {
            let loaded = self
                .load_configs(client, config_names.into_iter().collect())
                .await?;
            for (instance, config) in loaded {
                change.configs_changed |= replace(&mut self.configs, instance, config);
            }
        }
        if all_live {
            self.reload_live(client, &mut change).await?;
        } else if !live_names.is_empty() {
            let loaded = self.load_live(client, live_names.into_iter().collect()).await?;
            for (instance, live) in loaded {
                if replace(&mut self.live, instance.clone(), live) {
                    change.live_changed.insert(instance);
                }
            }
        }
        if !change.is_empty() {
            debug!(
                "Instance registry changed, configs: {}, live: {:?}",
                change.configs_changed, change.live_changed
            );
        }
        Ok(change)
    }

    async fn reload_configs(
        &mut self,
        client: &dyn CoordinationClient,
        change: &mut RegistryChange,
    ) -> Result<(), StoreError> {
        let names = client.children(&self.keys.participant_configs()).await?;
        let configs: BTreeMap<String, InstanceConfig> = self
            .load_configs(client, names)
            .await?
            .into_iter()
            .filter_map(|(instance, config)| config.map(|config| (instance, config)))
            .collect();
        if configs != self.configs {
            change.configs_changed = true;
            self.configs = configs;
        }
        Ok(())
    }

    async fn reload_live(
        &mut self,
        client: &dyn CoordinationClient,
        change: &mut RegistryChange,
    ) -> Result<(), StoreError> {
        let names = client.children(&self.keys.live_instances()).await?;
        let live: BTreeMap<String, LiveInstance> = self
            .load_live(client, names)
            .await?
            .into_iter()
            .filter_map(|(instance, live)| live.map(|live| (instance, live)))
            .collect();
        for instance in self.live.keys().chain(live.keys()) {
            if self.live.get(instance) != live.get(instance) {
                change.live_changed.insert(instance.clone());
            }
        }
        self.live = live;
        Ok(())
    }

    async fn load_configs(
        &self,
        client: &dyn CoordinationClient,
        names: Vec<String>,
    ) -> Result<Vec<(String, Option<InstanceConfig>)>, StoreError> {
        let paths = names
            .iter()
            .map(|instance| self.keys.participant_config(instance))
            .collect();
        self.load(client, names, paths, InstanceConfig::from_record)
            .await
    }

    async fn load_live(
        &self,
        client: &dyn CoordinationClient,
        names: Vec<String>,
    ) -> Result<Vec<(String, Option<LiveInstance>)>, StoreError> {
        let paths = names
            .iter()
            .map(|instance| self.keys.live_instance(instance))
            .collect();
        self.load(client, names, paths, LiveInstance::from_record)
            .await
    }

    async fn load<T>(
        &self,
        client: &dyn CoordinationClient,
        names: Vec<String>,
        paths: Vec<String>,
        parse: fn(&str, &Record) -> T,
    ) -> Result<Vec<(String, Option<T>)>, StoreError> {
        let reads = join_all(paths.iter().map(|path| client.read(path))).await;
        let mut loaded = Vec::with_capacity(names.len());
        for (name, read) in names.into_iter().zip(reads) {
            let value = match read {
                Ok(node) => node.map(|node| parse(&name, &node.record)),
                Err(StoreError::Malformed { path, reason }) => {
                    warn!("Ignoring malformed instance node {path}: {reason}");
                    self.stats.record_data_error();
                    None
                }
                Err(error) => return Err(error),
            };
            loaded.push((name, value));
        }
        Ok(loaded)
    }
}

/// Inserts or removes `key`, returning whether the stored value changed.
fn replace<V: PartialEq>(map: &mut BTreeMap<String, V>, key: String, value: Option<V>) -> bool {
    match value {
        Some(value) => {
            if map.get(&key) == Some(&value) {
                return false;
            }
            map.insert(key, value);
            true
        }
        None => map.remove(&key).is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectator_common::InMemoryStore;

    fn keys() -> PropertyKeys {
        PropertyKeys::new("c")
    }

    fn add_instance(store: &InMemoryStore, instance: &str, session: Option<&str>) {
        let keys = keys();
        store
            .set(
                &keys.participant_config(instance),
                &InstanceConfig::new(instance, "localhost", Some(12000)).to_record(),
            )
            .unwrap();
        if let Some(session) = session {
            store
                .set(
                    &keys.live_instance(instance),
                    &LiveInstance::new(instance, session).to_record(),
                )
                .unwrap();
        }
    }

    #[tokio::test]
    async fn resync_should_load_configs_and_live_instances() {
        let store = InMemoryStore::new();
        add_instance(&store, "p_1", Some("s1"));
        add_instance(&store, "p_2", None);
        let client = store.connect();
        let mut registry = InstanceRegistry::new(keys());

        let change = registry.resync(&client).await.unwrap();
        assert!(change.configs_changed);
        assert_eq!(change.live_changed, BTreeSet::from(["p_1".to_owned()]));
        assert_eq!(registry.configs().len(), 2);
        assert_eq!(
            registry.live_instance("p_1").and_then(|live| live.session_id.as_deref()),
            Some("s1")
        );
        assert!(registry.live_instance("p_2").is_none());

        assert!(registry.resync(&client).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn apply_should_reload_single_instances() {
        let store = InMemoryStore::new();
        add_instance(&store, "p_1", Some("s1"));
        let client = store.connect();
        let mut registry = InstanceRegistry::new(keys());
        registry.resync(&client).await.unwrap();

        store
            .set(
                &keys().participant_config("p_1"),
                &InstanceConfig::new("p_1", "localhost", Some(12000))
                    .with_enabled(false)
                    .to_record(),
            )
            .unwrap();
        let paths = BTreeSet::from([keys().participant_config("p_1")]);
        let change = registry.apply(&client, &paths).await.unwrap();
        assert!(change.configs_changed);
        assert!(change.live_changed.is_empty());
        assert!(!registry.config("p_1").unwrap().enabled);
    }

    #[tokio::test]
    async fn listing_change_should_detect_removed_live_instances() {
        let store = InMemoryStore::new();
        add_instance(&store, "p_1", Some("s1"));
        add_instance(&store, "p_2", Some("s2"));
        let client = store.connect();
        let mut registry = InstanceRegistry::new(keys());
        registry.resync(&client).await.unwrap();

        store.delete(&keys().live_instance("p_2")).unwrap();
        let paths = BTreeSet::from([keys().live_instances()]);
        let change = registry.apply(&client, &paths).await.unwrap();
        assert_eq!(change.live_changed, BTreeSet::from(["p_2".to_owned()]));
        assert_eq!(
            registry.live_instances().keys().collect::<Vec<_>>(),
            vec!["p_1"]
        );
    }

    #[tokio::test]
    async fn malformed_config_should_be_skipped_and_counted() {
        let store = InMemoryStore::new();
        store.set_raw(&keys().participant_config("p_1"), b"{".to_vec());
        let client = store.connect();
        let stats = Arc::new(ProviderStats::default());
        let mut registry = InstanceRegistry::new(keys()).with_stats(stats.clone());

        registry.resync(&client).await.unwrap();
        assert!(registry.configs().is_empty());
        assert_eq!(stats.snapshot().data_errors, 1);
    }
}
