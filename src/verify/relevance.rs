use super::fetch::WebFetcher;
use crate::error::WorkflowError;
use crate::llm::ChatModel;
use crate::prompt::{Prompt, PromptSet};
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use serde::Deserialize;
use tera::Context;

/// A source that was fetched and judged on-topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSource {
    pub url: String,
    pub content: String,
    pub image_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RelevanceVerdict {
    #[serde(default)]
    reasoning: String,
    relevant: bool,
}

/// Fetches and classifies every link concurrently.
///
/// Results arrive in completion order. A link that cannot be fetched or
/// classified is logged and dropped; only prompt rendering fails the call.
pub async fn verify_sources(
    links: &[String],
    topic: &str,
    fetcher: &dyn WebFetcher,
    model: &ChatModel,
    prompts: &PromptSet,
) -> Result<Vec<VerifiedSource>, WorkflowError> {
    let mut ctx = Context::new();
    ctx.insert("topic", topic);
    let system_prompt = prompts
        .render(Prompt::Relevance, &ctx)
        .map_err(|e| WorkflowError::Prompt(e.to_string()))?;

    let mut pending: FuturesUnordered<_> = links
        .iter()
        .map(|link| verify_one(link, fetcher, model, &system_prompt))
        .collect();

    let mut verified = Vec::new();
    while let Some(outcome) = pending.next().await {
        if let Some(source) = outcome {
            verified.push(source);
        }
    }
    Ok(verified)
}

async fn verify_one(
    url: &str,
    fetcher: &dyn WebFetcher,
    model: &ChatModel,
    system_prompt: &str,
) -> Option<VerifiedSource> {
    let page = match fetcher.fetch_page(url).await {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "dropping source: fetch failed");
            return None;
        }
    };

    if page.text.trim().is_empty() {
        tracing::warn!(url = %url, "dropping source: page has no readable text");
        return None;
    }

    let verdict: RelevanceVerdict = match model.invoke_structured(system_prompt, &page.text).await
    {
        Ok(verdict) => verdict,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "dropping source: relevance check failed");
            return None;
        }
    };

    if !verdict.relevant {
        tracing::info!(url = %url, reasoning = %verdict.reasoning, "source judged off-topic");
        return None;
    }

    tracing::debug!(url = %url, "source verified");
    Some(VerifiedSource {
        url: url.to_string(),
        content: page.text,
        image_urls: page.image_urls,
    })
}
