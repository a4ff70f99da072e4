//! Test fixtures for pipeline testing.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

use crate::context::{
    Category, ExecutionContext, ExecutionPhase, ExecutionRecord, GenerationPhase, Job, Prompt,
    Provider, PublicationPhase, PublishedArticle, SelectionPhase, Site, TokenUsage, Topic,
    TopicPair, ValidatedPhase,
};
use crate::errors::{codes, PipelineError};
use crate::ports::TopicStrategy;
use crate::state::{State, TransitionTable};

/// Returns an active site.
#[must_use]
pub fn sample_site() -> Site {
    Site {
        id: Uuid::new_v4(),
        name: "Example Blog".to_string(),
        url: "https://blog.example.com".to_string(),
        language: Some("en".to_string()),
        is_active: true,
    }
}

/// Returns a topic with the given title.
#[must_use]
pub fn sample_topic(title: &str) -> Topic {
    Topic {
        id: Uuid::new_v4(),
        title: title.to_string(),
        keywords: title.split_whitespace().map(str::to_lowercase).collect(),
    }
}

/// Returns a category with the given name.
#[must_use]
pub fn sample_category(name: &str) -> Category {
    Category {
        id: Uuid::new_v4(),
        name: name.to_string(),
        remote_id: Some(7),
    }
}

/// Returns a job for a fresh site ID.
#[must_use]
pub fn sample_job() -> Job {
    Job::new(Uuid::new_v4())
}

/// Returns a context over the built-in content workflow.
#[must_use]
pub fn sample_context() -> ExecutionContext {
    ExecutionContext::for_content_workflow(sample_job())
}

/// Returns a validated phase with an active site and a [`StaticTopicStrategy`].
#[must_use]
pub fn validated_phase() -> ValidatedPhase {
    ValidatedPhase {
        site: sample_site(),
        strategy: Arc::new(StaticTopicStrategy::new([sample_topic("Async Rust")])),
    }
}

/// Returns a selection phase with one topic and two categories.
#[must_use]
pub fn selection_phase() -> SelectionPhase {
    SelectionPhase {
        topics: TopicPair::same(sample_topic("Async Rust")),
        categories: vec![sample_category("Programming"), sample_category("Rust")],
    }
}

/// Returns an execution phase whose record belongs to `job_id`.
#[must_use]
pub fn execution_phase(job_id: Uuid) -> ExecutionPhase {
    ExecutionPhase {
        record: ExecutionRecord {
            id: Uuid::new_v4(),
            job_id,
            topic_id: Uuid::new_v4(),
            created_at: Utc::now(),
        },
        prompt: Prompt {
            id: Uuid::new_v4(),
            name: "article".to_string(),
            system_template: "You write technical articles.".to_string(),
            user_template: "Write about {topic}.".to_string(),
        },
        provider: Provider {
            name: "test".to_string(),
            model: "test-model".to_string(),
        },
    }
}

/// Returns a generation phase with fixed content.
#[must_use]
pub fn generation_phase() -> GenerationPhase {
    GenerationPhase {
        system_prompt: "You write technical articles.".to_string(),
        user_prompt: "Write about Async Rust.".to_string(),
        content: "<h1>Async Rust</h1><p>Futures are lazy.</p>".to_string(),
        usage: TokenUsage {
            prompt_tokens: 40,
            completion_tokens: 400,
        },
        cost: 0.0021,
    }
}

/// Returns a publication phase.
#[must_use]
pub fn publication_phase() -> PublicationPhase {
    PublicationPhase {
        article: PublishedArticle {
            remote_id: "1042".to_string(),
            url: "https://blog.example.com/async-rust".to_string(),
            title: "Async Rust".to_string(),
            published_at: Utc::now(),
        },
    }
}

/// A table chaining `states` in order, with the usual stop edges.
#[must_use]
pub fn linear_table(states: &[&'static str]) -> TransitionTable {
    let states: Vec<State> = states.iter().map(|s| State::from(*s)).collect();
    TransitionTable::linear(&states)
}

/// A topic strategy that hands out topics from a fixed queue.
///
/// Returns a recoverable `NO_TOPICS_AVAILABLE` fault once the queue is empty.
#[derive(Debug, Default)]
pub struct StaticTopicStrategy {
    topics: Mutex<VecDeque<Topic>>,
}

impl StaticTopicStrategy {
    /// Creates a strategy over `topics`.
    #[must_use]
    pub fn new(topics: impl IntoIterator<Item = Topic>) -> Self {
        Self {
            topics: Mutex::new(topics.into_iter().collect()),
        }
    }

    /// Returns the number of topics left.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.topics.lock().len()
    }
}

#[async_trait]
impl TopicStrategy for StaticTopicStrategy {
    fn name(&self) -> &str {
        "static"
    }

    async fn select(&self, site: &Site) -> anyhow::Result<TopicPair> {
        let topic = self.topics.lock().pop_front();
        topic.map(TopicPair::same).ok_or_else(|| {
            PipelineError::recoverable(
                codes::NO_TOPICS_AVAILABLE,
                format!("no topics left for site '{}'", site.name),
            )
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{as_fault, ErrorCategory};

    #[tokio::test]
    async fn test_static_strategy_drains() {
        let strategy = StaticTopicStrategy::new([sample_topic("One"), sample_topic("Two")]);
        let site = sample_site();

        assert_eq!(strategy.select(&site).await.unwrap().selected.title, "One");
        assert_eq!(strategy.select(&site).await.unwrap().selected.title, "Two");
        assert_eq!(strategy.remaining(), 0);

        let err = strategy.select(&site).await.unwrap_err();
        let fault = as_fault(&err).unwrap();
        assert_eq!(fault.code, codes::NO_TOPICS_AVAILABLE);
        assert_eq!(fault.category, ErrorCategory::Recoverable);
    }

    #[test]
    fn test_linear_table() {
        let table = linear_table(&["a", "b"]);
        assert!(table.is_legal(&State::new("a"), &State::new("b")));
        assert!(table.is_final(&State::new("b")));
    }

    #[test]
    fn test_sample_topic_keywords() {
        assert_eq!(sample_topic("Async Rust").keywords, vec!["async", "rust"]);
    }
}
