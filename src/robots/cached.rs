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

use crate::robots::{RobotsParser, RobotsTxt};
use time::{Duration, OffsetDateTime};

/// The cache entry for a robots.txt
#[derive(Debug)]
pub enum CachedRobots {
    HasRobots {
        robot: RobotsTxt,
        retrieved_at: OffsetDateTime,
    },
    NoRobots {
        status_code: u16,
        retrieved_at: OffsetDateTime,
    },
}

impl CachedRobots {
    /// Creates the entry for the response to a robots.txt request.
    ///
    /// Only a successful (2xx) response is parsed, every other status and
    /// every body the parser rejects means there are no restrictions.
    pub fn from_response<P: RobotsParser>(
        parser: &P,
        agent: &str,
        status_code: u16,
        body: &[u8],
        retrieved_at: OffsetDateTime,
    ) -> Self {
        if !(200..300).contains(&status_code) {
            log::debug!("No robots.txt for {agent} because of status {status_code}");
            return Self::NoRobots {
                status_code,
                retrieved_at,
            };
        }
        match parser.parse(agent, body) {
            Ok(robot) => Self::HasRobots {
                robot,
                retrieved_at,
            },
            Err(err) => {
                log::warn!("Failed to parse the robots.txt for {agent}, allow everything: {err}");
                Self::NoRobots {
                    status_code,
                    retrieved_at,
                }
            }
        }
    }

    pub fn map_or<R, F>(&self, default: R, on_has_robot: F) -> R
    where
        F: FnOnce(&RobotsTxt) -> R,
    {
        match self {
            CachedRobots::HasRobots { robot, .. } => on_has_robot(robot),
            CachedRobots::NoRobots { .. } => default,
        }
    }

    /// Checks if the url is allowed
    pub fn allowed(&self, url: &str) -> bool {
        self.map_or(true, |it| it.allowed(url))
    }

    /// Returns the sitemaps, if there are any.
    pub fn sitemaps(&self) -> Option<&[String]> {
        match self {
            CachedRobots::HasRobots { robot, .. } => Some(robot.sitemaps()),
            CachedRobots::NoRobots { .. } => None,
        }
    }

    /// Returns the delay, if there is one configured
    pub fn delay(&self) -> Option<Duration> {
        self.map_or(None, |it| it.delay())
    }

    /// Returns the timestamp when it was retrieved.
    pub fn retrieved_at(&self) -> OffsetDateTime {
        match self {
            CachedRobots::HasRobots { retrieved_at, .. } => *retrieved_at,
            CachedRobots::NoRobots { retrieved_at, .. } => *retrieved_at,
        }
    }

    /// Returns true if the entry was retrieved more than `max_age` before `now`.
    pub fn is_older_than_at(&self, max_age: &Duration, now: OffsetDateTime) -> bool {
        (now - self.retrieved_at()).gt(max_age)
    }

    pub fn is_older_than(&self, max_age: &Duration) -> bool {
        self.is_older_than_at(max_age, OffsetDateTime::now_utc())
    }
}
