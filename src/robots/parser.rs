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

use crate::robots::RobotsError;
use std::borrow::Cow;
use std::fmt::{Debug, Formatter};
use texting_robots::Robot;
use time::ext::NumericalDuration;
use time::Duration;

/// A robots.txt bound to a user agent.
pub struct RobotsTxt {
    agent: String,
    robot: Robot,
}

impl RobotsTxt {
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Checks if the url is allowed
    pub fn allowed(&self, url: &str) -> bool {
        self.robot.allowed(url)
    }

    /// Returns the delay, if there is one configured
    pub fn delay(&self) -> Option<Duration> {
        self.robot.delay.map(|seconds| (seconds as f64).seconds())
    }

    pub fn sitemaps(&self) -> &[String] {
        &self.robot.sitemaps
    }
}

impl Debug for RobotsTxt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobotsTxt")
            .field("agent", &self.agent)
            .field("delay", &self.robot.delay)
            .field("sitemaps", &self.robot.sitemaps)
            .finish()
    }
}

/// Turns the body of a robots.txt into a [RobotsTxt].
pub trait RobotsParser {
    fn parse(&self, agent: &str, body: &[u8]) -> Result<RobotsTxt, RobotsError>;
}

/// The default parser, backed by texting_robots.
#[derive(Debug, Copy, Clone, Default)]
pub struct TextingRobotsParser;

impl RobotsParser for TextingRobotsParser {
    fn parse(&self, agent: &str, body: &[u8]) -> Result<RobotsTxt, RobotsError> {
        let text = String::from_utf8_lossy(body);
        if let Cow::Owned(_) = text {
            log::warn!("The robots.txt for {agent} contains invalid UTF-8, the invalid bytes are replaced.");
        }
        let robot = Robot::new(agent, text.as_bytes()).map_err(RobotsError::InvalidRobotsTxt)?;
        Ok(RobotsTxt {
            agent: agent.to_string(),
            robot,
        })
    }
}
