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

use crate::app::args::{Command, Instruction};
use crate::config::Configs;
use crate::queue::Queue;
use crate::robots::{CachedRobots, RobotsCache, TextingRobotsParser};
use anyhow::Context;
use camino::Utf8Path;
use std::fs::File;
use std::io::{BufWriter, Write};
use time::OffsetDateTime;

/// Executes the instruction and writes the human readable result to `out`.
pub fn execute<W: Write>(instruction: &Instruction, out: &mut W) -> anyhow::Result<()> {
    let configs = &instruction.configs;
    match &instruction.command {
        Command::Push { priority, values } => {
            let mut queue = configs.queue.open::<String>()?;
            for value in values {
                queue.push_with_priority(value.clone(), *priority)?;
            }
            let active = queue.finish()?;
            log::info!("Enqueued {} values, active priorities: {active:?}", values.len());
            writeln!(out, "Enqueued {} values with priority {priority}.", values.len())?;
        }
        Command::Pop { count } => {
            let mut queue = configs.queue.open::<String>()?;
            for _ in 0..*count {
                match queue.pop()? {
                    Some(value) => writeln!(out, "{value}")?,
                    None => {
                        log::info!("The queue is empty.");
                        break;
                    }
                }
            }
            queue.finish()?;
        }
        Command::Peek => {
            let mut queue = configs.queue.open::<String>()?;
            if let Some(value) = queue.peek()? {
                writeln!(out, "{value}")?;
            }
            queue.finish()?;
        }
        Command::Len => {
            let mut queue = configs.queue.open::<String>()?;
            writeln!(out, "{}", queue.len())?;
            queue.finish()?;
        }
        Command::Robots { file, agent, urls } => {
            let agent = agent.as_deref().unwrap_or(&configs.robots.user_agent);
            check_robots(configs, file, agent, urls, out)?;
        }
        Command::Init => init(&instruction.data_root, out)?,
    }
    Ok(())
}

fn check_robots<W: Write>(
    configs: &Configs,
    file: &Utf8Path,
    agent: &str,
    urls: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    let body = std::fs::read(file).with_context(|| format!("Failed to read {file}"))?;
    let retrieved_at = OffsetDateTime::now_utc();
    let cache = RobotsCache::new(configs.system.robots_cache_size, configs.robots.max_age);
    let mut sitemaps: Option<Vec<String>> = None;
    for url in urls {
        let cached = match cache.get(agent, url, None) {
            Ok(Some(found)) => found,
            Ok(None) => {
                let parsed = CachedRobots::from_response(
                    &TextingRobotsParser,
                    agent,
                    200,
                    &body,
                    retrieved_at,
                );
                cache.insert(agent, url, parsed)?
            }
            Err(err) => {
                writeln!(out, "invalid\t{url}\t{err}")?;
                continue;
            }
        };
        if sitemaps.is_none() {
            sitemaps = cached.sitemaps().map(<[String]>::to_vec);
        }
        let verdict = if cached.allowed(url) { "allowed" } else { "denied" };
        match cached.delay() {
            Some(delay) => writeln!(out, "{verdict}\t{url}\tdelay={delay}")?,
            None => writeln!(out, "{verdict}\t{url}")?,
        }
    }
    for sitemap in sitemaps.unwrap_or_default() {
        writeln!(out, "sitemap\t{sitemap}")?;
    }
    Ok(())
}

fn init<W: Write>(data_root: &Utf8Path, out: &mut W) -> anyhow::Result<()> {
    let mut configs = Configs::default();
    configs.queue.root = data_root.join("queue");
    std::fs::create_dir_all(data_root)?;
    let path = data_root.join("config.json");
    if path.exists() {
        writeln!(
            out,
            "The default config already exists in {path}.\nDelete it before regenerating."
        )?;
        return Ok(());
    }
    let file = File::options()
        .create_new(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("Failed to create {path}"))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &configs)?;
    writer.flush()?;
    writeln!(out, "Created the default config at {path}.")?;
    Ok(())
}
