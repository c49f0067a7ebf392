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

use crate::config::{QueueConfig, RobotsConfig, SystemConfig};
use camino::Utf8Path;
use config::Config;
use serde::{Deserialize, Serialize};

/// The default folder for the data and configs of erigone.
pub const DEFAULT_DATA_ROOT: &str = "erigone_data";

/// The prefix of all environment variables read by erigone, e.g. `ERIGONE.SYSTEM.LOG_LEVEL`
pub const ENV_PREFIX: &str = "ERIGONE";

/// A collection of all configs.
/// Can be shared across threads
#[derive(Debug, Default, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename(serialize = "Config"))]
pub struct Configs {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub robots: RobotsConfig,
}

impl Configs {
    /// Loads the `erigone` and `config` files in `folder`, overridden by the environment.
    pub fn load_from<P: AsRef<Utf8Path>>(folder: P) -> Result<Self, config::ConfigError> {
        Config::builder()
            .add_source(
                config::File::with_name(folder.as_ref().join("erigone").as_str()).required(false),
            )
            .add_source(
                config::File::with_name(folder.as_ref().join("config").as_str()).required(false),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("."))
            .build()?
            .try_deserialize()
    }

    /// Like [Configs::discover] but also looks into the working directory and
    /// falls back to the defaults if nothing can be loaded.
    pub fn discover_or_default() -> Result<Self, config::ConfigError> {
        let data_root = Utf8Path::new(DEFAULT_DATA_ROOT);
        match Config::builder()
            .add_source(config::File::with_name("./erigone").required(false))
            .add_source(config::File::with_name("./config").required(false))
            .add_source(
                config::File::with_name(data_root.join("erigone").as_str()).required(false),
            )
            .add_source(
                config::File::with_name(data_root.join("config").as_str()).required(false),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("."))
            .build()
        {
            Ok(value) => value.try_deserialize(),
            Err(err) => {
                log::debug!("No config found, use the defaults: {err}");
                Ok(Default::default())
            }
        }
    }

    /// Loads the config from the default data root, which has to exist.
    pub fn discover() -> Result<Self, config::ConfigError> {
        Config::builder()
            .add_source(config::File::with_name(
                Utf8Path::new(DEFAULT_DATA_ROOT).join("config").as_str(),
            ))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("."))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod test {
    use crate::config::Configs;
    use crate::queue::{CodecKind, QueueOrder};
    use camino_tempfile::Utf8TempDir;
    use std::fs::File;
    use std::io::{BufWriter, Write};
    use std::num::NonZeroUsize;
    use time::Duration;

    #[test]
    fn can_create_hierarchical_config() {
        let dir = Utf8TempDir::new().unwrap();
        let mut config = Configs::default();
        config.queue.order = QueueOrder::Lifo;
        config.queue.codec = CodecKind::Json;
        config.queue.chunk_size = NonZeroUsize::new(7).unwrap();
        config.robots.max_age = Some(Duration::hours(6));
        let mut writer = BufWriter::new(File::create(dir.path().join("config.json")).unwrap());
        write!(&mut writer, "{}", serde_json::to_string(&config).unwrap()).unwrap();
        drop(writer);

        std::env::set_var("ERIGONE.SYSTEM.LOG_TO_FILE", "true");
        scopeguard::defer! {
            std::env::remove_var("ERIGONE.SYSTEM.LOG_TO_FILE");
        }

        let loaded = Configs::load_from(dir.path()).unwrap();
        config.system.log_to_file = true;
        assert_eq!(config, loaded);
    }

    #[test]
    fn partial_files_use_the_defaults() {
        let dir = Utf8TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("erigone.json"),
            r#"{"robots": {"user_agent": "somebot"}, "queue": {"root": "elsewhere"}}"#,
        )
        .unwrap();
        let loaded = Configs::load_from(dir.path()).unwrap();
        assert_eq!("somebot", loaded.robots.user_agent);
        assert_eq!("elsewhere", loaded.queue.root.as_str());
        assert_eq!(QueueOrder::Fifo, loaded.queue.order);
        assert_eq!(Configs::default().system.robots_cache_size, loaded.system.robots_cache_size);
        assert_eq!(None, loaded.robots.max_age);
    }
}
