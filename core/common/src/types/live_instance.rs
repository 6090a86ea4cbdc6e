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

use crate::Record;

pub const SESSION_ID_FIELD: &str = "SESSION_ID";

/// Ephemeral liveness marker of a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveInstance {
    pub name: String,
    /// Session the participant is currently connected with. `None` when the
    /// marker exists but does not name one.
    pub session_id: Option<String>,
}

impl LiveInstance {
    pub fn new(name: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            session_id: Some(session_id.into()),
        }
    }

    pub fn from_record(name: &str, record: &Record) -> Self {
        Self {
            name: name.to_owned(),
            session_id: record
                .simple_field(SESSION_ID_FIELD)
                .filter(|session| !session.is_empty())
                .map(str::to_owned),
        }
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new(&self.name);
        if let Some(session_id) = &self.session_id {
            record.set_simple_field(SESSION_ID_FIELD, session_id);
        }
        record
    }
}
