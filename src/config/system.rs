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
use std::num::NonZeroUsize;

/// The default cache size for the robots cache
pub const DEFAULT_CACHE_SIZE_ROBOTS: NonZeroUsize = unsafe { NonZeroUsize::new_unchecked(32) };

/// Config of the system, basically caches and logging.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename(serialize = "System"))]
pub struct SystemConfig {
    /// The cache size of the robots cache
    #[serde(default = "_default_cache_size_robots")]
    pub robots_cache_size: NonZeroUsize,

    /// The log level of erigone
    #[serde(default = "_default_log_level")]
    pub log_level: log::LevelFilter,

    /// Log to a file?
    #[serde(default)]
    pub log_to_file: bool,
}

const fn _default_log_level() -> log::LevelFilter {
    log::LevelFilter::Info
}
const fn _default_cache_size_robots() -> NonZeroUsize {
    DEFAULT_CACHE_SIZE_ROBOTS
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            robots_cache_size: _default_cache_size_robots(),
            log_level: _default_log_level(),
            log_to_file: false,
        }
    }
}
