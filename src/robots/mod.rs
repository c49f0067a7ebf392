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

mod cache;
mod cached;
mod error;
mod parser;

pub use cache::RobotsCache;
pub use cached::CachedRobots;
pub use error::RobotsError;
pub use parser::{RobotsParser, RobotsTxt, TextingRobotsParser};

/// Returns the location of the robots.txt responsible for `url`.
pub fn robots_url(url: &str) -> Result<String, RobotsError> {
    Ok(texting_robots::get_robots_url(url)?)
}
