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

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use spectator::RoutingError;
use spectator_common::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Invalid configuration: {0}")]
    Config(Box<figment::Error>),
    #[error("Invalid seed file {path}: {reason}")]
    Seed { path: String, reason: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for AdminError {
    fn from(error: figment::Error) -> Self {
        AdminError::Config(Box::new(error))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub reason: String,
}

impl AdminError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            AdminError::NotFound(_) | AdminError::Store(StoreError::NoNode(_)) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            AdminError::Store(error) if error.is_transient() => {
                (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
            }
            AdminError::Routing(RoutingError::Unavailable | RoutingError::RefreshTimeout(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "routing_unavailable")
            }
            AdminError::Routing(RoutingError::Closed) => {
                (StatusCode::SERVICE_UNAVAILABLE, "routing_closed")
            }
            AdminError::Routing(error) if error.is_configuration_error() => {
                (StatusCode::BAD_REQUEST, "invalid_routing_config")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        let body = ErrorResponse {
            code,
            reason: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
