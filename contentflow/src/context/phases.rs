//! Phase records populated as a run progresses.
//!
//! Each phase is produced by a group of related commands and read by the
//! ones after it. They are stored as `Option`s on the execution context and
//! must be filled in [`Phase`] order.

use crate::ports::TopicStrategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// The phases of an execution context, in population order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Site validated, strategy resolved.
    Validated,
    /// Topic pair and categories chosen.
    Selection,
    /// Execution record persisted.
    Execution,
    /// Content generated.
    Generation,
    /// Content published.
    Publication,
}

impl Phase {
    /// All phases in order.
    pub const ALL: [Self; 5] = [
        Self::Validated,
        Self::Selection,
        Self::Execution,
        Self::Generation,
        Self::Publication,
    ];

    /// Returns the phase that must be populated before this one.
    #[must_use]
    pub fn predecessor(self) -> Option<Self> {
        match self {
            Self::Validated => None,
            Self::Selection => Some(Self::Validated),
            Self::Execution => Some(Self::Selection),
            Self::Generation => Some(Self::Execution),
            Self::Publication => Some(Self::Generation),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validated => write!(f, "validated"),
            Self::Selection => write!(f, "selection"),
            Self::Execution => write!(f, "execution"),
            Self::Generation => write!(f, "generation"),
            Self::Publication => write!(f, "publication"),
        }
    }
}

/// A site content is produced for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Site ID.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Base URL.
    pub url: String,
    /// Content language, if fixed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Whether the site accepts new content.
    pub is_active: bool,
}

/// A topic an article is written about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Topic ID.
    pub id: Uuid,
    /// Title.
    pub title: String,
    /// Keywords to work into the article.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// The topic a strategy picked, plus the pool topic it was derived from.
///
/// For strategies that use pool topics directly both sides are the same.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicPair {
    /// The topic as stored in the site's pool.
    pub original: Topic,
    /// The topic the article is generated for.
    pub selected: Topic,
}

impl TopicPair {
    /// Creates a pair where the selected topic is the pool topic itself.
    #[must_use]
    pub fn same(topic: Topic) -> Self {
        Self {
            original: topic.clone(),
            selected: topic,
        }
    }
}

/// A site category an article is filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category ID.
    pub id: Uuid,
    /// Name.
    pub name: String,
    /// ID on the remote CMS, once synced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<i64>,
}

/// The persisted record of one generation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Record ID.
    pub id: Uuid,
    /// The job this record belongs to.
    pub job_id: Uuid,
    /// The topic being generated.
    pub topic_id: Uuid,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

/// A prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// Template ID.
    pub id: Uuid,
    /// Template name.
    pub name: String,
    /// System prompt template.
    pub system_template: String,
    /// User prompt template.
    pub user_template: String,
}

/// The AI provider and model used for generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    /// Provider name.
    pub name: String,
    /// Model identifier.
    pub model: String,
}

/// Token counters for one generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub prompt_tokens: u32,
    /// Completion tokens.
    pub completion_tokens: u32,
}

/// An article as published on the remote CMS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedArticle {
    /// ID on the remote CMS.
    pub remote_id: String,
    /// Public URL.
    pub url: String,
    /// Title as published.
    pub title: String,
    /// When it was published.
    pub published_at: DateTime<Utc>,
}

/// Output of the validation phase.
#[derive(Debug, Clone)]
pub struct ValidatedPhase {
    /// The validated site.
    pub site: Site,
    /// The topic selection strategy resolved for the job.
    pub strategy: Arc<dyn TopicStrategy>,
}

/// Output of the selection phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPhase {
    /// The chosen topics.
    pub topics: TopicPair,
    /// The chosen categories.
    pub categories: Vec<Category>,
}

/// Output of the execution-record phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPhase {
    /// The persisted execution record.
    pub record: ExecutionRecord,
    /// The prompt template to render.
    pub prompt: Prompt,
    /// The provider to call.
    pub provider: Provider,
}

/// Output of the generation phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationPhase {
    /// Rendered system prompt.
    pub system_prompt: String,
    /// Rendered user prompt.
    pub user_prompt: String,
    /// Generated text.
    pub content: String,
    /// Token counters.
    pub usage: TokenUsage,
    /// Cost in USD.
    pub cost: f64,
}

/// Output of the publication phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationPhase {
    /// The published article.
    pub article: PublishedArticle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        assert_eq!(Phase::Validated.predecessor(), None);
        assert_eq!(Phase::Publication.predecessor(), Some(Phase::Generation));

        for pair in Phase::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[1].predecessor(), Some(pair[0]));
        }
    }

    #[test]
    fn test_same_pair_shares_topic() {
        let topic = Topic {
            id: Uuid::new_v4(),
            title: "Rust".to_string(),
            keywords: vec![],
        };
        let pair = TopicPair::same(topic.clone());
        assert_eq!(pair.original, topic);
        assert_eq!(pair.selected, topic);
    }
}
