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

use crate::error::AdminError;
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use serde::{Deserialize, Serialize};
use spectator::RoutingTableProvider;
use spectator_common::{CoordinationClient, InstanceConfig, PropertyKeys};
use std::sync::Arc;
use tracing::debug;

const NAME: &str = "Spectator Admin";
const PONG: &str = "pong";
const CLUSTER_SUMMARY_ID: &str = "cluster summary";

pub struct AppState {
    pub client: Arc<dyn CoordinationClient>,
    pub provider: Arc<RoutingTableProvider>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub id: String,
    pub instances: Vec<String>,
    pub hosted_entities: Vec<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { NAME }))
        .route("/ping", get(|| async { PONG }))
        .route("/clusters/{cluster}", get(get_cluster_summary))
        .route(
            "/clusters/{cluster}/routing/{resource}/{partition}/{state}",
            get(get_routing),
        )
        .with_state(state)
}

async fn get_cluster_summary(
    State(state): State<Arc<AppState>>,
    Path(cluster): Path<String>,
) -> Result<Json<ClusterSummary>, AdminError> {
    if !PropertyKeys::is_valid_cluster_name(&cluster) {
        return Err(AdminError::NotFound(format!("cluster {cluster}")));
    }
    let keys = PropertyKeys::new(&cluster);
    if state.client.exists(keys.root()).await?.is_none() {
        return Err(AdminError::NotFound(format!("cluster {cluster}")));
    }
    let instances = state.client.children(&keys.instances()).await?;
    let hosted_entities = state.client.children(&keys.ideal_states()).await?;
    debug!(
        "Cluster {cluster} has {} instances and {} hosted entities",
        instances.len(),
        hosted_entities.len()
    );
    Ok(Json(ClusterSummary {
        id: CLUSTER_SUMMARY_ID.to_owned(),
        instances,
        hosted_entities,
    }))
}

async fn get_routing(
    State(state): State<Arc<AppState>>,
    Path((cluster, resource, partition, role)): Path<(String, String, String, String)>,
) -> Result<Json<Vec<InstanceConfig>>, AdminError> {
    if cluster != state.provider.cluster() {
        return Err(AdminError::NotFound(format!(
            "routing table for cluster {cluster}"
        )));
    }
    Ok(Json(state.provider.get_instances_for_resource(
        &resource, &partition, &role,
    )))
}
