// Copyright 2024 Felix Engl
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::{Deserialize, Serialize};
use time::Duration;

/// The default agent name used for robots.txt lookups.
pub const DEFAULT_USER_AGENT: &str = "erigone";

/// How robots.txt entries are matched and cached.
#[derive(Debug, Clone, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename(serialize = "Robots"))]
#[serde(default)]
pub struct RobotsConfig {
    /// The user agent the rules are evaluated for
    pub user_agent: String,
    /// The maximum age of a cached robots.txt. If None, it never gets too old.
    pub max_age: Option<Duration>,
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_age: None,
        }
    }
}
