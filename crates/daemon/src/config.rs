// SPDX-License-Identifier: MIT

//! Daemon config file schema (spec §6), grounded in the Go original's
//! `Config`/`ServiceConfig`/`ActorConfig` in `config.go` and
//! `config/config.go`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Top-level config file shape: named services, each binding actor
/// instances to a plugin type, plus one global config blob per plugin type
/// shared across every service that uses it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
    #[serde(default)]
    pub watchers: BTreeMap<String, JsonValue>,
    #[serde(default)]
    pub reactors: BTreeMap<String, JsonValue>,
}

/// One service's watcher and reactor instances, each keyed by an
/// instance name local to the service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub watchers: BTreeMap<String, ActorConfig>,
    #[serde(default)]
    pub reactors: BTreeMap<String, ActorConfig>,
}

/// One actor instance: which plugin type backs it, and the instance-level
/// config passed to that type's `Accept`.
#[derive(Debug, Clone, Deserialize)]
pub struct ActorConfig {
    #[serde(rename = "type")]
    pub actor_type: String,
    #[serde(default, rename = "cfg")]
    pub cfg: JsonValue,
}

/// Failures reading or parsing the config file, fatal to startup (spec §7).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path:?}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("could not parse config file {path:?}: {source}")]
    Parse { path: PathBuf, #[source] source: serde_json::Error },
}

pub fn load_from_file(path: &Path) -> Result<Config, ConfigError> {
    let data =
        std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_str(&data).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("receptor.conf.json");
        std::fs::write(
            &path,
            r#"{
                "services": {
                    "web": {
                        "watchers": {"w1": {"type": "dummy", "cfg": {"name": "n1"}}},
                        "reactors": {"r1": {"type": "filelog", "cfg": {"filename": "out.log"}}}
                    }
                },
                "watchers": {"dummy": {}},
                "reactors": {"filelog": {}}
            }"#,
        )
        .expect("write config");

        let cfg = load_from_file(&path).expect("load config");
        assert_eq!(cfg.services.len(), 1);
        let web = &cfg.services["web"];
        assert_eq!(web.watchers["w1"].actor_type, "dummy");
        assert_eq!(web.reactors["r1"].actor_type, "filelog");
        assert!(cfg.watchers.contains_key("dummy"));
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("receptor.conf.json");
        std::fs::write(&path, r#"{}"#).expect("write config");

        let cfg = load_from_file(&path).expect("load config");
        assert!(cfg.services.is_empty());
        assert!(cfg.watchers.is_empty());
        assert!(cfg.reactors.is_empty());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_from_file(Path::new("/nonexistent/receptor.conf.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("receptor.conf.json");
        std::fs::write(&path, "{ not json").expect("write config");

        let err = load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
