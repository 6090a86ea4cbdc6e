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

use clap::Parser;
use configs::AdminConfig;
use error::AdminError;
use http::AppState;
use spectator::RoutingTableProvider;
use spectator_common::{CoordinationClient, InMemoryStore, PropertyKeys};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

mod configs;
mod error;
mod http;
mod seed;

#[derive(Debug, Parser)]
#[command(author, version, about = "Cluster summary and routing lookups over a coordination store")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "core/admin/config.toml")]
    config_path: String,
}

#[tokio::main]
async fn main() -> Result<(), AdminError> {
    let args = Args::parse();
    Registry::default()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new("INFO")))
        .init();

    info!("Loading configuration from: {}", args.config_path);
    let config = AdminConfig::load(&args.config_path).inspect_err(|error| {
        error!("Failed to load configuration: {error}");
    })?;
    info!(
        "Starting Spectator Admin for cluster {} from {}...",
        config.cluster, config.source
    );

    let store = InMemoryStore::new();
    if let Some(seed_file) = &config.store.seed_file {
        seed::load(&store, seed_file)?;
    }
    store.ensure_path(PropertyKeys::new(&config.cluster).root());

    let client: Arc<dyn CoordinationClient> = Arc::new(store.connect());
    let provider = Arc::new(
        RoutingTableProvider::new(client.clone(), config.provider_config())
            .await
            .inspect_err(|error| {
                error!("Failed to start routing table provider: {error}");
            })?,
    );
    let state = Arc::new(AppState {
        client,
        provider: provider.clone(),
    });
    let router = http::router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.http.address)
        .await
        .inspect_err(|error| {
            error!("Failed to bind TCP listener: {error}");
        })?;
    info!("HTTP API listening on: {}", config.http.address);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    provider.shutdown().await;
    info!("Spectator Admin stopped successfully");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received ctrl-c. Shutting down Spectator Admin..."),
        Err(error) => error!("Failed to listen for ctrl-c: {error}"),
    }
}
