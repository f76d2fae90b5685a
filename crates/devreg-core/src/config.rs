//! Store configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub store: BackendConfig,
    pub document: Option<DocumentConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub backend: BackendKind,
}

/// Which storage backend holds the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Volatile in-process collections.
    #[default]
    Collection,
    /// redb document database.
    Document,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Database file. An in-memory database is used when absent.
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Path of the document database file, if one is configured.
    pub fn document_path(&self) -> Option<&Path> {
        self.document.as_ref().and_then(|doc| doc.path.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_defaults_to_collection() {
        let config = StoreConfig::from_toml("").unwrap();
        assert_eq!(config.store.backend, BackendKind::Collection);
        assert!(config.document_path().is_none());
    }

    #[test]
    fn parse_document_backend() {
        let toml = r#"
[store]
backend = "document"

[document]
path = "/var/lib/devreg/metadata.redb"
"#;
        let config = StoreConfig::from_toml(toml).unwrap();
        assert_eq!(config.store.backend, BackendKind::Document);
        assert_eq!(
            config.document_path(),
            Some(Path::new("/var/lib/devreg/metadata.redb"))
        );
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let toml = "[store]\nbackend = \"sql\"\n";
        assert!(StoreConfig::from_toml(toml).is_err());
    }

    #[test]
    fn roundtrip_toml() {
        let config = StoreConfig {
            store: BackendConfig {
                backend: BackendKind::Document,
            },
            document: Some(DocumentConfig { path: None }),
        };
        let text = config.to_toml_string().unwrap();
        let parsed = StoreConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.store.backend, BackendKind::Document);
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devreg.toml");
        std::fs::write(&path, "[store]\nbackend = \"document\"\n").unwrap();

        let config = StoreConfig::from_file(&path).unwrap();
        assert_eq!(config.store.backend, BackendKind::Document);
    }
}
