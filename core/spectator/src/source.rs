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

use crate::RoutingError;
use serde::{Deserialize, Serialize};
use spectator_common::PropertyType;
use strum::Display;

/// Store property a routing table is built from.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PropertyType", into = "PropertyType")]
pub enum SourceType {
    #[strum(to_string = "EXTERNALVIEW")]
    ExternalView,
    #[strum(to_string = "TARGETEXTERNALVIEW")]
    TargetExternalView,
    #[strum(to_string = "CURRENTSTATES")]
    CurrentStates,
}

impl TryFrom<PropertyType> for SourceType {
    type Error = RoutingError;

    fn try_from(property: PropertyType) -> Result<Self, Self::Error> {
        match property {
            PropertyType::ExternalView => Ok(SourceType::ExternalView),
            PropertyType::TargetExternalView => Ok(SourceType::TargetExternalView),
            PropertyType::CurrentStates => Ok(SourceType::CurrentStates),
            other => Err(RoutingError::UnsupportedSourceType(other.to_string())),
        }
    }
}

impl From<SourceType> for PropertyType {
    fn from(source: SourceType) -> Self {
        match source {
            SourceType::ExternalView => PropertyType::ExternalView,
            SourceType::TargetExternalView => PropertyType::TargetExternalView,
            SourceType::CurrentStates => PropertyType::CurrentStates,
        }
    }
}
