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

//! Routing table provider.
//!
//! The provider owns a single updater task which consumes store events,
//! rebuilds the routing snapshot and publishes it with an atomic swap.
//! Queries load the published snapshot and never wait on the updater or on
//! the store.
//!
//! ```ignore
//! let provider = RoutingTableProvider::new(client, ProviderConfig::new("CLUSTER_1", PropertyType::ExternalView)).await?;
//! let masters = provider.get_instances_for_resource("TestDB-1", "TestDB-1_0", "MASTER");
//! provider.shutdown().await;
//! ```

mod state;
mod stats;
mod updater;

pub use state::ProviderState;
pub use stats::{ProviderStats, ProviderStatsSnapshot};

use crate::adapters::SourceAdapter;
use crate::builder::SnapshotBuilder;
use crate::configs::ProviderConfig;
use crate::error::RoutingError;
use crate::registry::InstanceRegistry;
use crate::snapshot::RoutingSnapshot;
use crate::source::SourceType;
use arc_swap::ArcSwap;
use spectator_common::{ClusterConfig, CoordinationClient, InstanceConfig, PropertyKeys};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, warn};
use updater::{Command, Shared, Updater};

pub struct RoutingTableProvider {
    cluster: String,
    source: SourceType,
    refresh_timeout: Duration,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    closing: AtomicBool,
}

impl RoutingTableProvider {
    /// Validates the configuration, attaches watchers and starts the updater.
    ///
    /// Returns once the first snapshot is published, the provider turned
    /// stale, or `init_timeout` elapsed. Must be called within a tokio runtime.
    pub async fn new(
        client: Arc<dyn CoordinationClient>,
        config: ProviderConfig,
    ) -> Result<Self, RoutingError> {
        let source = SourceType::try_from(config.source)?;
        if !PropertyKeys::is_valid_cluster_name(&config.cluster) {
            return Err(RoutingError::MalformedClusterRoot(format!(
                "invalid cluster name '{}'",
                config.cluster
            )));
        }
        let keys = PropertyKeys::new(&config.cluster);
        if client.exists(keys.root()).await?.is_none() {
            return Err(RoutingError::MalformedClusterRoot(format!(
                "cluster root {} does not exist",
                keys.root()
            )));
        }
        if source == SourceType::TargetExternalView {
            let cluster_config = client
                .read(&keys.cluster_config())
                .await?
                .map(|node| ClusterConfig::from_record(&config.cluster, &node.record))
                .unwrap_or_else(|| ClusterConfig::new(&config.cluster));
            if !cluster_config.target_external_view_enabled {
                return Err(RoutingError::TargetExternalViewDisabled(config.cluster));
            }
        }

        let stats = Arc::new(ProviderStats::default());
        let (state, _) = watch::channel(ProviderState::Init);
        let (version, _) = watch::channel(0);
        let shared = Arc::new(Shared {
            snapshot: ArcSwap::from_pointee(RoutingSnapshot::empty(source)),
            state,
            version,
            stats: stats.clone(),
        });

        let registry = InstanceRegistry::new(keys.clone()).with_stats(stats.clone());
        let adapter = SourceAdapter::new(source, &keys, stats);
        shared.set_state(ProviderState::Subscribing);
        let (events_sender, events) = mpsc::unbounded_channel();
        let watches = registry
            .watch_prefixes()
            .into_iter()
            .chain(adapter.watch_prefixes())
            .map(|prefix| client.watch(&prefix, events_sender.clone()))
            .collect();

        let (commands_sender, commands) = mpsc::unbounded_channel();
        let updater = Updater {
            client,
            shared: shared.clone(),
            registry,
            adapter,
            builder: SnapshotBuilder::new(source),
            backoff: config.backoff.clone(),
            periodic_refresh: config.periodic_refresh,
            events,
            commands,
            watches,
            attempt: 0,
            retry_at: None,
            published: false,
        };
        tokio::spawn(updater.run());
        info!(
            "Started routing table provider for cluster {} from {source}",
            config.cluster
        );

        let provider = Self {
            cluster: config.cluster,
            source,
            refresh_timeout: config.refresh_timeout,
            shared,
            commands: commands_sender,
            closing: AtomicBool::new(false),
        };
        provider.await_started(config.init_timeout).await;
        Ok(provider)
    }

    async fn await_started(&self, timeout: Duration) {
        let mut state = self.shared.state.subscribe();
        let started = tokio::time::timeout(timeout, state.wait_for(ProviderState::is_started)).await;
        if started.is_err() {
            warn!(
                "No routing snapshot for cluster {} after {timeout:?}, continuing in the background",
                self.cluster
            );
        }
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn source(&self) -> SourceType {
        self.source
    }

    /// Current snapshot, for callers that need several answers from one consistent view.
    pub fn snapshot(&self) -> Arc<RoutingSnapshot> {
        self.shared.snapshot.load_full()
    }

    pub fn get_instances_for_resource(
        &self,
        resource: &str,
        partition: &str,
        role: &str,
    ) -> Vec<InstanceConfig> {
        self.shared
            .snapshot
            .load()
            .instances_for_resource(resource, partition, role)
    }

    pub fn get_instances_for_resource_group(
        &self,
        group: &str,
        partition: &str,
        role: &str,
    ) -> Vec<InstanceConfig> {
        self.shared
            .snapshot
            .load()
            .instances_for_resource_group(group, partition, role)
    }

    pub fn get_instances_for_resource_group_with_tags(
        &self,
        group: &str,
        partition: &str,
        role: &str,
        tags: &[&str],
    ) -> Vec<InstanceConfig> {
        self.shared
            .snapshot
            .load()
            .instances_for_resource_group_with_tags(group, partition, role, tags)
    }

    pub fn get_instances_for_resource_in_state(
        &self,
        resource: &str,
        role: &str,
    ) -> Vec<InstanceConfig> {
        self.shared
            .snapshot
            .load()
            .instances_for_resource_in_state(resource, role)
    }

    pub fn get_partitions_for_instance(
        &self,
        resource: &str,
        instance: &str,
    ) -> Vec<(String, String)> {
        self.shared
            .snapshot
            .load()
            .partitions_for_instance(resource, instance)
    }

    pub fn get_resources(&self) -> BTreeSet<String> {
        self.shared.snapshot.load().resources()
    }

    /// Instances hosting at least one replica.
    pub fn get_instances(&self) -> Vec<InstanceConfig> {
        self.shared.snapshot.load().instances()
    }

    pub fn get_live_instances(&self) -> Vec<InstanceConfig> {
        self.shared.snapshot.load().live_instances()
    }

    pub fn get_instance_configs(&self) -> Vec<InstanceConfig> {
        self.shared.snapshot.load().instance_configs()
    }

    /// Receives the version of every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.version.subscribe()
    }

    pub fn state(&self) -> ProviderState {
        *self.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ProviderState> {
        self.shared.state.subscribe()
    }

    pub fn is_stale(&self) -> bool {
        self.state() == ProviderState::Stale
    }

    pub fn stats(&self) -> ProviderStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Rebuilds from the current store state, bounded by the configured refresh timeout.
    pub async fn refresh(&self) -> Result<u64, RoutingError> {
        self.refresh_with_timeout(self.refresh_timeout).await
    }

    /// Rebuilds from the current store state and returns the version that
    /// reflects it, either newly published or confirmed up to date.
    pub async fn refresh_with_timeout(&self, timeout: Duration) -> Result<u64, RoutingError> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(RoutingError::Closed);
        }
        let (reply, result) = oneshot::channel();
        self.commands
            .send(Command::Refresh(reply))
            .map_err(|_| RoutingError::Closed)?;
        match tokio::time::timeout(timeout, result).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RoutingError::Closed),
            Err(_) => Err(RoutingError::RefreshTimeout(timeout)),
        }
    }

    /// Stops the updater, releases watchers and clears the routing table.
    /// Safe to call any number of times, from any task; every call returns
    /// once the provider is shut down.
    pub async fn shutdown(&self) {
        if !self.closing.swap(true, Ordering::SeqCst) {
            info!("Shutting down routing table provider for cluster {}", self.cluster);
            let _ = self.commands.send(Command::Shutdown);
        }
        let mut state = self.shared.state.subscribe();
        let _ = state.wait_for(|state| *state == ProviderState::Shutdown).await;
    }
}

impl Drop for RoutingTableProvider {
    fn drop(&mut self) {
        if !self.closing.swap(true, Ordering::SeqCst) {
            let _ = self.commands.send(Command::Shutdown);
        }
    }
}
