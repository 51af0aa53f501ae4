//! Adapter configuration collection lookup

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AdapterSettings, ConfigError};

/// One row of the adapter configuration collection
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct AdapterRow {
    pub adapter_name: String,
    #[serde(default)]
    pub topic_root: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
struct Collection {
    #[serde(default)]
    rows: Vec<AdapterRow>,
}

/// A queryable store of adapter configuration rows
#[async_trait]
pub trait AdapterConfigSource: Send + Sync {
    /// Returns the first row whose `adapter_name` equals `adapter_name`
    async fn fetch(&self, adapter_name: &str) -> Result<Option<AdapterRow>, ConfigError>;
}

/// Collection stored as a TOML file of `[[rows]]` tables
#[derive(Debug, Clone)]
pub struct CollectionFile {
    path: PathBuf,
}

impl CollectionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AdapterConfigSource for CollectionFile {
    async fn fetch(&self, adapter_name: &str) -> Result<Option<AdapterRow>, ConfigError> {
        debug!("Executing query against collection {}", self.path.display());

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ConfigError::Io {
                path: self.path.clone(),
                source,
            })?;
        let collection: Collection = toml::from_str(&content)?;

        Ok(collection
            .rows
            .into_iter()
            .find(|row| row.adapter_name == adapter_name))
    }
}

/// Used when no collection is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCollection;

#[async_trait]
impl AdapterConfigSource for NoCollection {
    async fn fetch(&self, _adapter_name: &str) -> Result<Option<AdapterRow>, ConfigError> {
        Ok(None)
    }
}

/// Picks the source described by the adapter settings
pub fn from_settings(settings: &AdapterSettings) -> Box<dyn AdapterConfigSource> {
    match &settings.collection {
        Some(path) => Box::new(CollectionFile::new(path.clone())),
        None => Box::new(NoCollection),
    }
}

/// Topic root from the collection, or `default` when unavailable
pub async fn resolve_topic_root(
    source: &dyn AdapterConfigSource,
    adapter_name: &str,
    default: &str,
) -> String {
    match source.fetch(adapter_name).await {
        Ok(Some(AdapterRow {
            topic_root: Some(root),
            ..
        })) if !root.is_empty() => {
            debug!("Setting topic root to {}", root);
            root
        }
        Ok(Some(_)) => {
            debug!("Topic root is not set. Using default value {}", default);
            default.to_string()
        }
        Ok(None) => {
            debug!("No rows returned. Using default topic root {}", default);
            default.to_string()
        }
        Err(e) => {
            debug!(
                "Adapter configuration could not be retrieved, using default topic root {}: {}",
                default, e
            );
            default.to_string()
        }
    }
}
