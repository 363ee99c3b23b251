use crate::index::{DocumentIndex, IndexHandle, SearchHit};
use crate::services::TextGenerator;
use crate::utils::error::ApiError;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewAnswer {
    pub answer: String,
    pub sources: Vec<String>,
}

/// Retrieval-augmented answering over a session's indexed resume.
pub struct ReviewService {
    index: Arc<dyn DocumentIndex>,
    generator: Arc<dyn TextGenerator>,
    prompt_template: String,
    top_k: usize,
}

impl ReviewService {
    pub fn new(
        index: Arc<dyn DocumentIndex>,
        generator: Arc<dyn TextGenerator>,
        prompt_template: String,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            generator,
            prompt_template,
            top_k,
        }
    }

    /// `None` when retrieval finds nothing to ground an answer on.
    pub async fn answer(
        &self,
        handle: &IndexHandle,
        query: &str,
    ) -> Result<Option<ReviewAnswer>, ApiError> {
        let hits = self.index.search(handle, query, self.top_k).await?;
        if hits.is_empty() {
            info!("No matching chunks in {}", handle.collection);
            return Ok(None);
        }

        let prompt = self.build_prompt(&hits, query);
        debug!("Prompt built from {} chunks ({} chars)", hits.len(), prompt.len());

        let answer = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|e| ApiError::Upstream(format!("Generation failed: {:#}", e)))?;

        Ok(Some(ReviewAnswer {
            answer,
            sources: hits.into_iter().map(|h| h.source).collect(),
        }))
    }

    pub fn build_prompt(&self, hits: &[SearchHit], query: &str) -> String {
        let context = hits
            .iter()
            .map(|h| h.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        fill_template(&self.prompt_template, &context, query)
    }
}

/// Substitute `{context}` and `{question}` in one left-to-right pass, so
/// placeholder text inside either value is never expanded.
fn fill_template(template: &str, context: &str, question: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        if let Some(after) = tail.strip_prefix("{context}") {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{question}") {
            out.push_str(question);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}
