// Copyright 2025 Fernando Borretti
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

use std::fs::read_to_string;
use std::path::Path;

use serde::Deserialize;

use crate::error::Fallible;

/// The default number of cards in a session.
pub const DEFAULT_LIMIT: usize = 20;

/// The default port for the drill server.
pub const DEFAULT_PORT: u16 = 8000;

const CONFIG_FILE: &str = "leitbox.toml";

/// Optional per-collection configuration, read from `leitbox.toml` in the
/// collection directory. Command-line flags take precedence over these.
#[derive(Deserialize, Default, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Maximum number of cards per session.
    pub limit: Option<usize>,
    /// Study back-to-front by default.
    pub reverse: Option<bool>,
    /// Port for the drill server.
    pub port: Option<u16>,
}

impl Config {
    pub fn load(directory: &Path) -> Fallible<Config> {
        let path = directory.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::fs::write;

    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path().join(CONFIG_FILE),
            "limit = 10\nreverse = true\nport = 9090\n",
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.limit, Some(10));
        assert_eq!(config.reverse, Some(true));
        assert_eq!(config.port, Some(9090));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path().join(CONFIG_FILE), "derp = 1\n").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }
}
