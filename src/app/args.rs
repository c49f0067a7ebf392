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

use crate::config::configs::DEFAULT_DATA_ROOT;
use crate::config::Configs;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
/// Persistent priority queues and robots.txt checks for crawlers.
pub struct ErigoneArgs {
    /// The folder containing the configs, the log file is also written to it.
    #[arg(short, long)]
    pub config: Option<Utf8PathBuf>,
    /// Overrides the queue directory from the config.
    #[arg(short, long)]
    pub queue_dir: Option<Utf8PathBuf>,
    /// Overrides the log level from the config.
    #[arg(long)]
    pub log_level: Option<log::LevelFilter>,
    /// Log to file
    #[arg(long)]
    pub log_to_file: bool,
    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Eq, PartialEq)]
pub enum Command {
    /// Enqueues the values, lower priorities are served first.
    Push {
        /// The priority of the values
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        priority: i64,
        /// The values to enqueue
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Dequeues values and prints one per line.
    Pop {
        /// How many values are dequeued at most
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Prints the next value without removing it.
    Peek,
    /// Prints the number of queued values.
    Len,
    /// Checks urls against a robots.txt file.
    Robots {
        /// The robots.txt to check against
        #[arg(short, long)]
        file: Utf8PathBuf,
        /// The agent, overrides the agent from the config.
        #[arg(short, long)]
        agent: Option<String>,
        /// The urls to check
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Initializes erigone by creating the default config file.
    Init,
}

/// Everything necessary to execute a command.
#[derive(Debug)]
pub struct Instruction {
    pub command: Command,
    pub configs: Configs,
    pub data_root: Utf8PathBuf,
}

/// Consumes the args, loads the configs and applies the overrides.
pub fn prepare_instruction(args: ErigoneArgs) -> Result<Instruction, config::ConfigError> {
    let (mut configs, data_root) = match args.config {
        None => (Configs::discover_or_default()?, Utf8PathBuf::from(DEFAULT_DATA_ROOT)),
        Some(folder) => (Configs::load_from(&folder)?, folder),
    };
    if let Some(queue_dir) = args.queue_dir {
        configs.queue.root = queue_dir;
    }
    if let Some(log_level) = args.log_level {
        configs.system.log_level = log_level;
    }
    if args.log_to_file {
        configs.system.log_to_file = true;
    }
    Ok(Instruction {
        command: args.command,
        configs,
        data_root,
    })
}
