use std::{collections::BTreeMap, fmt, fs, path::Path};

use anyhow::{Context, Result, anyhow, ensure};
use serde::{Deserialize, Serialize};

/// Where a worker can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(alias = "ip")]
    pub host: String,
    #[serde(alias = "porta")]
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Worker id to endpoint map, loaded once when the controller starts.
///
/// The file is a JSON object keyed by worker id:
///
/// ```json
/// { "worker1": { "host": "127.0.0.1", "port": 50000 } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Registry {
    workers: BTreeMap<String, Endpoint>,
}

impl Registry {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("configuration file {} not found", path.display()))?;
        Self::parse(&raw).with_context(|| format!("failed to read {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let registry: Registry = serde_json::from_str(raw)?;
        for (id, endpoint) in &registry.workers {
            ensure!(
                !endpoint.host.trim().is_empty(),
                "worker '{id}' has an empty host"
            );
        }
        Ok(registry)
    }

    pub fn resolve(&self, worker_id: &str) -> Result<&Endpoint> {
        self.workers
            .get(worker_id)
            .ok_or_else(|| {
                let known = self.ids().collect::<Vec<_>>().join(", ");
                anyhow!("worker '{worker_id}' is not registered (known workers: {known})")
            })
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.workers.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_workers() {
        let registry = Registry::parse(
            r#"{
                "worker1": { "host": "127.0.0.1", "port": 50000 },
                "worker2": { "host": "10.0.0.2", "port": 50001 }
            }"#,
        )
        .unwrap();

        assert_eq!(
            registry.resolve("worker2").unwrap(),
            &Endpoint {
                host: "10.0.0.2".into(),
                port: 50001
            }
        );
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["worker1", "worker2"]);
        assert_eq!(registry.resolve("worker1").unwrap().to_string(), "127.0.0.1:50000");
    }

    #[test]
    fn accepts_legacy_field_names() {
        let registry = Registry::parse(r#"{ "slave1": { "ip": "localhost", "porta": 50000 } }"#)
            .unwrap();
        assert_eq!(registry.resolve("slave1").unwrap().host, "localhost");
        assert_eq!(registry.resolve("slave1").unwrap().port, 50000);
    }

    #[test]
    fn unknown_worker_is_an_error() {
        let registry = Registry::parse("{}").unwrap();
        let err = registry.resolve("ghost").unwrap_err();
        assert!(err.to_string().contains("ghost"));

        let registry = Registry::parse(
            r#"{ "b": { "host": "h", "port": 2 }, "a": { "host": "h", "port": 1 } }"#,
        )
        .unwrap();
        let err = registry.resolve("c").unwrap_err();
        assert!(err.to_string().contains("known workers: a, b"), "{err:#}");
    }

    #[test]
    fn malformed_entries_are_rejected() {
        assert!(Registry::parse(r#"{ "w": { "host": "h" } }"#).is_err());
        assert!(Registry::parse(r#"{ "w": { "host": "h", "port": 70000 } }"#).is_err());
        assert!(Registry::parse(r#"{ "w": { "host": " ", "port": 1 } }"#).is_err());
        assert!(Registry::parse("not json").is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Registry::load(dir.path().join("config.json")).is_err());
    }
}
