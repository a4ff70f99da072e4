//! The job descriptor a pipeline run carries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Name of the default topic selection strategy.
pub const DEFAULT_STRATEGY: &str = "unique";

/// A unit of work: produce and publish one article for one site.
///
/// Jobs are immutable once a run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// The job ID.
    pub id: Uuid,
    /// The target site.
    pub site_id: Uuid,
    /// Name of the topic selection strategy to use.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Free-form options for downstream commands.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub options: HashMap<String, serde_json::Value>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
}

fn default_strategy() -> String {
    DEFAULT_STRATEGY.to_string()
}

impl Job {
    /// Creates a job for a site with a generated ID.
    #[must_use]
    pub fn new(site_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            site_id,
            strategy: default_strategy(),
            options: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Sets the topic selection strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = strategy.into();
        self
    }
}

