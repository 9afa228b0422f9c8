//! Backend configuration models.
//!
//! A backend is one configured OCR API (endpoint + credential + model).
//! The ordered set of backends defines one axis of the task grid, and
//! list position is the correlation key the service echoes back as
//! `api_index`, so order must be preserved from submission through
//! result aggregation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A configured OCR backend.
///
/// Immutable once created; removed by id. The wire form uses `apiKey`
/// (service contract), config files may use either casing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub id: String,
    pub name: String,
    pub endpoint: String,
    #[serde(rename = "apiKey", alias = "api_key")]
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_provider")]
    pub provider: String,
}

fn default_provider() -> String {
    "openai".to_string()
}

impl BackendConfig {
    /// Create a new backend config with a generated id.
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            provider: provider.into(),
        }
    }
}

/// Errors constructing a backend set.
#[derive(Debug, Error)]
pub enum BackendSetError {
    #[error("no backends configured; add one with 'ocrpick backend add' before processing")]
    Empty,
}

/// An ordered, non-empty list of backend configs for one submission.
///
/// The service identifies backends by position in this list, never by id,
/// so the set is append-only for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct BackendSet {
    configs: Vec<BackendConfig>,
}

impl BackendSet {
    /// Build a set from configured backends. Fails on an empty list.
    pub fn new(configs: Vec<BackendConfig>) -> Result<Self, BackendSetError> {
        if configs.is_empty() {
            return Err(BackendSetError::Empty);
        }
        Ok(Self { configs })
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BackendConfig> {
        self.configs.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BackendConfig> {
        self.configs.iter()
    }

    /// Resolve a backend reference (index, id, or name) to its position.
    pub fn position_of(&self, reference: &str) -> Option<usize> {
        if let Ok(index) = reference.parse::<usize>() {
            if index < self.configs.len() {
                return Some(index);
            }
        }
        self.configs
            .iter()
            .position(|c| c.id == reference || c.name == reference)
    }

    /// Serialize to the outbound wire form: a JSON list in submission order.
    pub fn to_wire_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.configs)
    }
}
