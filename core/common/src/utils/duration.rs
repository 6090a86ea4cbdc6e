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

//! Serde helpers for human-readable durations (`"50ms"`, `"5s"`, `"1m 30s"`).
//!
//! ```ignore
//! #[derive(Deserialize, Serialize)]
//! struct Config {
//!     #[serde(with = "spectator_common::duration")]
//!     timeout: Duration,
//!     #[serde(default, with = "spectator_common::duration::option")]
//!     refresh: Option<Duration>,
//! }
//! ```

use serde::{Deserialize, Deserializer, Serializer, de::Error};
use std::time::Duration;

pub fn parse(value: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(value.trim())
}

pub fn format(duration: &Duration) -> String {
    humantime::format_duration(*duration).to_string()
}

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(duration))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    parse(&value).map_err(|error| D::Error::custom(format!("invalid duration '{value}': {error}")))
}

/// Same as the parent module for optional fields. Empty strings and
/// `"none"` read as `None`.
pub mod option {
    use super::*;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(duration) => serializer.serialize_some(&format(duration)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(value) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if value.trim().is_empty() || value.trim().eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        parse(&value)
            .map(Some)
            .map_err(|error| D::Error::custom(format!("invalid duration '{value}': {error}")))
    }
}
