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

use super::{ProviderState, ProviderStats};
use crate::adapters::{Delta, SourceAdapter};
use crate::builder::SnapshotBuilder;
use crate::configs::BackoffConfig;
use crate::error::RoutingError;
use crate::registry::{InstanceRegistry, RegistryChange};
use crate::snapshot::RoutingSnapshot;
use arc_swap::ArcSwap;
use spectator_common::{CoordinationClient, SessionState, StoreError, StoreEvent, WatchId};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep_until};
use tracing::{debug, error, info, warn};

pub(crate) enum Command {
    Refresh(oneshot::Sender<Result<u64, RoutingError>>),
    Shutdown,
}

/// State shared between the provider handle and its updater.
pub(crate) struct Shared {
    pub snapshot: ArcSwap<RoutingSnapshot>,
    pub state: watch::Sender<ProviderState>,
    pub version: watch::Sender<u64>,
    pub stats: Arc<ProviderStats>,
}

impl Shared {
    pub fn set_state(&self, next: ProviderState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == next || *state == ProviderState::Shutdown {
                return false;
            }
            info!("Routing table provider state: {state} -> {next}");
            *state = next;
            true
        })
    }
}

/// Marks the provider as shut down however the updater exits.
struct ShutdownGuard(Arc<Shared>);

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.0.set_state(ProviderState::Shutdown);
    }
}

/// Single writer of the published snapshot. Every store event and command
/// is handled here, one at a time.
pub(crate) struct Updater {
    pub client: Arc<dyn CoordinationClient>,
    pub shared: Arc<Shared>,
    pub registry: InstanceRegistry,
    pub adapter: SourceAdapter,
    pub builder: SnapshotBuilder,
    pub backoff: BackoffConfig,
    pub periodic_refresh: Option<Duration>,
    pub events: mpsc::UnboundedReceiver<StoreEvent>,
    pub commands: mpsc::UnboundedReceiver<Command>,
    pub watches: Vec<WatchId>,
    pub attempt: u32,
    pub retry_at: Option<Instant>,
    pub published: bool,
}

impl Updater {
    pub async fn run(mut self) {
        let _guard = ShutdownGuard(self.shared.clone());
        let _ = self.full_resync("initial").await;

        let mut periodic = self.periodic_refresh.map(|period| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            let retry_at = self.retry_at;
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(Command::Refresh(reply)) => {
                        let result = self.refresh().await;
                        let _ = reply.send(result);
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some(event) = self.events.recv() => self.on_event(event).await,
                _ = wait_until(retry_at) => {
                    self.shared.stats.record_retry();
                    let _ = self.full_resync("retry").await;
                }
                _ = tick(periodic.as_mut()) => {
                    let _ = self.full_resync("periodic").await;
                }
            }
        }

        self.close();
    }

    async fn refresh(&mut self) -> Result<u64, RoutingError> {
        self.full_resync("refresh").await
    }

    async fn on_event(&mut self, first: StoreEvent) {
        let mut batch = vec![first];
        while let Ok(event) = self.events.try_recv() {
            batch.push(event);
        }
        if batch.len() > 1 {
            debug!("Coalesced {} store events into one build", batch.len());
            self.shared.stats.record_coalesced(batch.len() as u64 - 1);
        }

        let mut session = None;
        let mut paths = BTreeSet::new();
        for event in batch {
            match event {
                StoreEvent::Session(state) => session = Some(state),
                StoreEvent::NodeChanged { path } | StoreEvent::ChildrenChanged { path } => {
                    paths.insert(path);
                }
            }
        }

        match session {
            Some(SessionState::Disconnected) => {
                self.mark_stale("disconnected from the coordination store");
                self.schedule_retry();
                return;
            }
            Some(SessionState::Expired) => {
                self.mark_stale("coordination store session expired");
                self.schedule_retry();
                return;
            }
            Some(SessionState::Connected) => {
                let _ = self.full_resync("reconnected").await;
                return;
            }
            None => {}
        }

        // A pending full resync covers whatever these paths touched.
        if !self.published || self.retry_at.is_some() || paths.is_empty() {
            return;
        }

        match self.collect(&paths).await {
            Ok((_, deltas)) => {
                self.publish(deltas, false);
            }
            Err(error) => self.on_store_error("incremental update", &error),
        }
    }

    async fn collect(
        &mut self,
        paths: &BTreeSet<String>,
    ) -> Result<(RegistryChange, Vec<Delta>), StoreError> {
        let client = self.client.as_ref();
        let change = self.registry.apply(client, paths).await?;
        let deltas = self
            .adapter
            .apply(client, paths, &change.live_changed, &self.registry)
            .await?;
        Ok((change, deltas))
    }

    async fn full_resync(&mut self, reason: &str) -> Result<u64, RoutingError> {
        debug!("Full resync ({reason})");
        let client = self.client.as_ref();
        let result = match self.registry.resync(client).await {
            Ok(_) => self.adapter.resync(client, &self.registry).await,
            Err(error) => Err(error),
        };
        match result {
            Ok(deltas) => {
                let force = !self.published;
                let version = self
                    .publish(deltas, force)
                    .unwrap_or_else(|| self.shared.snapshot.load().version());
                self.published = true;
                self.attempt = 0;
                self.retry_at = None;
                self.shared.set_state(ProviderState::Live);
                Ok(version)
            }
            Err(error) => {
                self.on_store_error(reason, &error);
                Err(if error.is_transient() {
                    RoutingError::Unavailable
                } else {
                    RoutingError::Store(error)
                })
            }
        }
    }

    fn publish(&mut self, deltas: Vec<Delta>, force: bool) -> Option<u64> {
        let started = Instant::now();
        let current = self.shared.snapshot.load_full();
        let live: BTreeSet<String> = self.registry.live_instances().keys().cloned().collect();
        let next = self
            .builder
            .build(&current, deltas, self.registry.configs(), &live, force);
        self.shared.stats.record_build(started.elapsed());

        let snapshot = next?;
        let version = snapshot.version();
        debug!(
            "Publishing routing snapshot {version} with {} resources",
            snapshot.resources.len()
        );
        self.shared.snapshot.store(Arc::new(snapshot));
        self.shared.stats.record_publish();
        self.shared.version.send_replace(version);
        Some(version)
    }

    fn on_store_error(&mut self, context: &str, error: &StoreError) {
        if error.is_transient() {
            warn!("Coordination store unavailable during {context}: {error}");
        } else {
            error!("Unexpected coordination store error during {context}: {error}");
        }
        self.mark_stale(&error.to_string());
        self.schedule_retry();
    }

    fn mark_stale(&self, reason: &str) {
        let marked = self.shared.state.send_if_modified(|state| {
            if matches!(state, ProviderState::Live | ProviderState::Subscribing) {
                *state = ProviderState::Stale;
                true
            } else {
                false
            }
        });
        if marked {
            warn!("Routing table is stale: {reason}");
        }
    }

    fn schedule_retry(&mut self) {
        let delay = self.backoff.delay(self.attempt);
        if delay == self.backoff.max && self.backoff.delay(self.attempt.saturating_sub(1)) < delay {
            error!(
                "Resync retries exhausted the backoff, retrying every {:?} from now on",
                self.backoff.max
            );
        }
        self.attempt = self.attempt.saturating_add(1);
        self.retry_at = Some(Instant::now() + delay);
        debug!("Next resync attempt in {delay:?}");
    }

    fn close(&mut self) {
        for watch in self.watches.drain(..) {
            self.client.unwatch(watch);
        }
        let current = self.shared.snapshot.load();
        let mut empty = RoutingSnapshot::empty(current.source());
        empty.version = current.version() + 1;
        let version = empty.version;
        self.shared.snapshot.store(Arc::new(empty));
        self.shared.version.send_replace(version);
        self.shared.set_state(ProviderState::Shutdown);
        info!("Routing table provider shut down");
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
