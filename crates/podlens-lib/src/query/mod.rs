//! Natural-language queries answered by grouped generation in the store

mod extract;

pub use extract::{descend, extract_grouped_result, generation_errors, Hop, GROUPED_RESULT_PATH};

use crate::error::Result;
use crate::health::{Component, HealthRegistry};
use crate::models::POD_CLASS;
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::store::WeaviateGateway;
use std::time::Instant;

const PROMPT_TEMPLATE: &str = "Answer the following query. If needed, you can count or perform any mathematical operations. If you don't know the answer, simply say that you don't know. Keep answers concise. The query is: ";

/// Wrap a user question in the generation instructions
pub fn prompt(question: &str) -> String {
    format!("{}{}", PROMPT_TEMPLATE, question)
}

/// GraphQL document running one grouped generation over every stored object
pub fn grouped_query(prompt: &str) -> String {
    // A JSON string is a valid GraphQL string literal
    let task = serde_json::Value::String(prompt.to_string()).to_string();
    format!(
        "{{ Get {{ {class} {{ namespace name container cpu mem _additional {{ generate(groupedResult: {{ task: {task} }}) {{ groupedResult error }} }} }} }} }}",
        class = POD_CLASS,
        task = task,
    )
}

pub struct QueryService {
    gateway: WeaviateGateway,
    logger: StructuredLogger,
    metrics: PipelineMetrics,
    health: HealthRegistry,
}

impl QueryService {
    pub fn new(
        gateway: WeaviateGateway,
        logger: StructuredLogger,
        metrics: PipelineMetrics,
        health: HealthRegistry,
    ) -> Self {
        Self {
            gateway,
            logger,
            metrics,
            health,
        }
    }

    /// Answer `question`, or `Ok(None)` when the store produced no answer
    pub async fn answer(&self, question: &str) -> Result<Option<String>> {
        let started = Instant::now();
        let document = grouped_query(&prompt(question));

        // An empty answer still counts as a healthy round trip
        let outcome = self.gateway.graphql(&document).await;
        self.health.record(Component::Query, &outcome).await;
        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                self.metrics.inc_query_errors();
                return Err(e);
            }
        };

        for message in generation_errors(&response) {
            self.logger.log_generation_error(&message);
        }

        let answer = extract_grouped_result(&response);
        let elapsed = started.elapsed().as_secs_f64();
        self.metrics.observe_query_latency(elapsed);
        self.logger.log_query(answer.is_some(), elapsed);

        Ok(answer)
    }
}
