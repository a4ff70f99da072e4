//! Lifecycle event records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// The kinds of lifecycle events a pipeline run emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// The run started.
    #[serde(rename = "pipeline.started")]
    PipelineStarted,
    /// The run reached `completed`.
    #[serde(rename = "pipeline.completed")]
    PipelineCompleted,
    /// The run ended in `failed`.
    #[serde(rename = "pipeline.failed")]
    PipelineFailed,
    /// The run ended in a paused state.
    #[serde(rename = "pipeline.paused")]
    PipelinePaused,
    /// A step started its first attempt.
    #[serde(rename = "step.started")]
    StepStarted,
    /// A step succeeded and the run transitioned.
    #[serde(rename = "step.completed")]
    StepCompleted,
    /// A step exhausted its attempts.
    #[serde(rename = "step.failed")]
    StepFailed,
    /// A step is about to be retried.
    #[serde(rename = "step.retrying")]
    StepRetrying,
}

impl EventKind {
    /// All event kinds.
    pub const ALL: [Self; 8] = [
        Self::PipelineStarted,
        Self::PipelineCompleted,
        Self::PipelineFailed,
        Self::PipelinePaused,
        Self::StepStarted,
        Self::StepCompleted,
        Self::StepFailed,
        Self::StepRetrying,
    ];

    /// Returns the dotted event name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PipelineStarted => "pipeline.started",
            Self::PipelineCompleted => "pipeline.completed",
            Self::PipelineFailed => "pipeline.failed",
            Self::PipelinePaused => "pipeline.paused",
            Self::StepStarted => "step.started",
            Self::StepCompleted => "step.completed",
            Self::StepFailed => "step.failed",
            Self::StepRetrying => "step.retrying",
        }
    }

    /// Returns true for the events that end a run: completed, failed or paused.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::PipelineCompleted | Self::PipelineFailed | Self::PipelinePaused
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// What happened.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Name of the emitting pipeline.
    pub pipeline: String,
    /// The job being processed.
    pub job_id: Uuid,
    /// The run.
    pub run_id: Uuid,
    /// The step, for step events and step failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Kind-specific fields.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl PipelineEvent {
    /// Creates an event with no step and no data.
    #[must_use]
    pub fn new(kind: EventKind, pipeline: impl Into<String>, job_id: Uuid, run_id: Uuid) -> Self {
        Self {
            kind,
            pipeline: pipeline.into(),
            job_id,
            run_id,
            step: None,
            timestamp: Utc::now(),
            data: HashMap::new(),
        }
    }

    /// Sets the step.
    #[must_use]
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    /// Adds a data field.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Gets a data field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Converts the event to a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
