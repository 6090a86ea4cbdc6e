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

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Kinds of properties kept under a cluster root in the coordination store.
#[derive(
    Clone, Copy, Debug, Display, EnumString, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum PropertyType {
    #[strum(to_string = "EXTERNALVIEW")]
    #[serde(rename = "EXTERNALVIEW")]
    ExternalView,
    #[strum(to_string = "TARGETEXTERNALVIEW")]
    #[serde(rename = "TARGETEXTERNALVIEW")]
    TargetExternalView,
    #[strum(to_string = "CURRENTSTATES")]
    #[serde(rename = "CURRENTSTATES")]
    CurrentStates,
    #[strum(to_string = "IDEALSTATES")]
    #[serde(rename = "IDEALSTATES")]
    IdealStates,
    #[strum(to_string = "LIVEINSTANCES")]
    #[serde(rename = "LIVEINSTANCES")]
    LiveInstances,
    #[strum(to_string = "CONFIGS")]
    #[serde(rename = "CONFIGS")]
    Configs,
    #[strum(to_string = "INSTANCES")]
    #[serde(rename = "INSTANCES")]
    Instances,
}
