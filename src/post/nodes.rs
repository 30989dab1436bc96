//! Workflow steps. Each takes the shared dependencies and mutates the
//! post state in place.

use super::images;
use super::schedule::{self, parse_date};
use super::state::{PageDocument, PostStyle, PostWorkflowState};
use super::text::{format_docs, post_length};
use crate::config::WorkflowConfig;
use crate::error::WorkflowError;
use crate::llm::WorkflowModels;
use crate::llm::structured::{extract_tagged, parse_structured};
use crate::prompt::{Prompt, PromptSet};
use crate::store::{CheckpointStore, NewScheduledPost, PostStore, RuleStore, ScheduledPost};
use crate::verify::{WebFetcher, verify_sources};
use chrono::Utc;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tera::Context;
use url::Url;

/// Image URL endings that LinkedIn will not accept.
pub const BLACKLISTED_IMAGE_ENDINGS: &[&str] = &[".svg", ".ico", ".bmp"];

/// Collaborators and settings shared by every step.
pub struct WorkflowDeps {
    pub models: WorkflowModels,
    pub fetcher: Arc<dyn WebFetcher>,
    pub posts: Arc<dyn PostStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub rules: Arc<dyn RuleStore>,
    pub prompts: Arc<PromptSet>,
    pub config: WorkflowConfig,
    pub timezone: Tz,
    /// Where attached images are downloaded at scheduling time.
    pub image_dir: Option<PathBuf>,
}

impl WorkflowDeps {
    pub(crate) fn render(&self, prompt: Prompt, ctx: &Context) -> Result<String, WorkflowError> {
        self.prompts
            .render(prompt, ctx)
            .map_err(|e| WorkflowError::Prompt(e.to_string()))
    }

    /// Reflection rules for the style; a failed lookup only costs the rules.
    async fn reflections(&self, style: PostStyle) -> Vec<String> {
        match self.rules.fetch_rules(style).await {
            Ok(rules) => rules,
            Err(e) => {
                tracing::warn!(style = %style, error = %e, "could not load reflection rules");
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ParsedRequest {
    #[serde(default)]
    topic: String,
    #[serde(default)]
    links: Vec<String>,
    #[serde(default)]
    style: Option<String>,
}

pub async fn parse_request(
    deps: &WorkflowDeps,
    message: &str,
) -> Result<PostWorkflowState, WorkflowError> {
    let system_prompt = deps.render(Prompt::ParseRequest, &Context::new())?;
    let reply = deps
        .models
        .parse_request
        .invoke(&system_prompt, message)
        .await?;
    let parsed: ParsedRequest =
        parse_structured(&reply).map_err(|e| WorkflowError::Parse(e.to_string()))?;

    let topic = parsed.topic.trim();
    if topic.is_empty() {
        return Err(WorkflowError::Parse("no topic found in request".into()));
    }

    let style = parsed
        .style
        .as_deref()
        .and_then(|s| s.trim().parse::<PostStyle>().ok())
        .unwrap_or_default();

    let mut state = PostWorkflowState::new(topic, style);
    state.extend_links(parsed.links.iter().filter_map(|raw| normalize_link(raw)));
    tracing::info!(topic = %state.topic(), links = state.links().len(), style = %style, "parsed request");
    Ok(state)
}

fn normalize_link(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(trimmed.to_string()),
        _ => {
            tracing::warn!(link = %trimmed, "ignoring invalid link");
            None
        }
    }
}

pub async fn verify_links(
    deps: &WorkflowDeps,
    state: &mut PostWorkflowState,
) -> Result<(), WorkflowError> {
    let links = state.links().to_vec();
    let verified = verify_sources(
        &links,
        state.topic(),
        deps.fetcher.as_ref(),
        &deps.models.relevance,
        &deps.prompts,
    )
    .await?;

    for source in verified {
        state.add_image_options(source.image_urls);
        state.add_relevant_source(PageDocument {
            url: source.url,
            content: source.content,
        });
    }
    tracing::info!(
        checked = links.len(),
        relevant = state.relevant_links().len(),
        "verified sources"
    );
    Ok(())
}

/// Payload of `<tag>`, or the whole reply when the model skipped the tags.
fn tagged_or_raw(reply: &str, tag: &str) -> String {
    extract_tagged(reply, tag).unwrap_or_else(|| {
        tracing::warn!(tag, "model reply has no <{tag}> tags; using raw output");
        reply.trim().to_string()
    })
}

pub async fn generate_report(
    deps: &WorkflowDeps,
    state: &mut PostWorkflowState,
) -> Result<(), WorkflowError> {
    let mut ctx = Context::new();
    ctx.insert("style", state.style.as_ref());
    let system_prompt = deps.render(Prompt::ReportSystem, &ctx)?;

    ctx.insert("topic", state.topic());
    ctx.insert("documents", &format_docs(state.page_contents()));
    let message = deps.render(Prompt::ReportContent, &ctx)?;

    let reply = deps.models.report.invoke(&system_prompt, &message).await?;
    state.report = tagged_or_raw(&reply, "report");
    Ok(())
}

fn require(condition: bool, message: &str) -> Result<(), WorkflowError> {
    if condition {
        Ok(())
    } else {
        Err(WorkflowError::Precondition(message.to_string()))
    }
}

pub async fn generate_post(
    deps: &WorkflowDeps,
    state: &mut PostWorkflowState,
) -> Result<(), WorkflowError> {
    require(!state.report.is_empty(), "no report found")?;
    require(!state.relevant_links().is_empty(), "no relevant links found")?;

    let mut ctx = Context::new();
    ctx.insert("style", state.style.as_ref());
    ctx.insert("reflections", &deps.reflections(state.style).await);
    let system_prompt = deps.render(Prompt::PostSystem, &ctx)?;

    ctx.insert("report", &state.report);
    ctx.insert("link", state.primary_link());
    let message = deps.render(Prompt::PostRequest, &ctx)?;

    let reply = deps.models.post.invoke(&system_prompt, &message).await?;
    let post = tagged_or_raw(&reply, "post");
    require(!post.is_empty(), "post model returned an empty post")?;
    state.post = post;

    if state.schedule_date.is_none() {
        let date = schedule::default_schedule_date(Utc::now(), deps.timezone, &mut rand::rng());
        state.schedule_date = Some(schedule::ScheduleDate::At(date));
    }
    tracing::info!(length = post_length(&state.post), "drafted post");
    Ok(())
}

pub async fn condense_post(
    deps: &WorkflowDeps,
    state: &mut PostWorkflowState,
) -> Result<(), WorkflowError> {
    require(!state.post.is_empty(), "no post found")?;
    require(!state.report.is_empty(), "no report found")?;
    require(!state.relevant_links().is_empty(), "no relevant links found")?;

    let original_length = post_length(&state.post);
    let mut ctx = Context::new();
    ctx.insert("style", state.style.as_ref());
    ctx.insert("report", &state.report);
    ctx.insert("link", state.primary_link());
    ctx.insert("reflections", &deps.reflections(state.style).await);
    ctx.insert("original_post_length", &original_length);
    ctx.insert("max_post_length", &deps.config.max_post_length);
    let system_prompt = deps.render(Prompt::CondenseSystem, &ctx)?;

    ctx.insert("post", &state.post);
    let message = deps.render(Prompt::CondenseRequest, &ctx)?;

    let reply = deps.models.post.invoke(&system_prompt, &message).await?;
    let post = tagged_or_raw(&reply, "post");
    require(!post.is_empty(), "condensation returned an empty post")?;
    state.record_condensation(post);
    tracing::info!(
        pass = state.condense_count(),
        from = original_length,
        to = post_length(&state.post),
        "condensed post"
    );
    Ok(())
}

pub fn is_blacklisted_image(url: &str) -> bool {
    let path = Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_else(|_| url.to_ascii_lowercase());
    BLACKLISTED_IMAGE_ENDINGS
        .iter()
        .any(|ending| path.ends_with(ending))
}

/// Narrows the images collected during verification to usable candidates:
/// blacklisted formats are dropped, the model keeps relevant images and
/// ranks them, and the list is capped at `max_image_options`.
pub async fn find_images(
    deps: &WorkflowDeps,
    state: &mut PostWorkflowState,
) -> Result<(), WorkflowError> {
    require(!state.post.is_empty(), "no post found")?;

    let found = state.image_options.len();
    let candidates: Vec<String> = state
        .image_options
        .iter()
        .filter(|url| !is_blacklisted_image(url))
        .cloned()
        .collect();
    if candidates.is_empty() {
        tracing::info!(found, "no usable image options");
        state.image_options = candidates;
        return Ok(());
    }

    let mut ctx = Context::new();
    ctx.insert("post", &state.post);
    ctx.insert("report", &state.report);
    let validate_prompt = deps.render(Prompt::ValidateImages, &ctx)?;
    let rerank_prompt = deps.render(Prompt::RerankImages, &ctx)?;

    let validated =
        images::validate_images(&candidates, &deps.models.images, &validate_prompt).await;
    let validated_count = validated.len();
    let mut ranked = images::rerank_images(validated, &deps.models.images, &rerank_prompt).await;
    ranked.truncate(deps.config.max_image_options);

    tracing::info!(
        found,
        validated = validated_count,
        kept = ranked.len(),
        "selected image options"
    );
    state.image_options = ranked;
    Ok(())
}

pub async fn rewrite_post(
    deps: &WorkflowDeps,
    state: &mut PostWorkflowState,
) -> Result<(), WorkflowError> {
    require(!state.post.is_empty(), "no post found")?;
    let Some(feedback) = state.user_response.take() else {
        return Err(WorkflowError::Precondition("no rewrite feedback found".into()));
    };

    let mut ctx = Context::new();
    ctx.insert("original_post", &state.post);
    ctx.insert("reflections", &deps.reflections(state.style).await);
    let system_prompt = deps.render(Prompt::RewriteSystem, &ctx)?;

    let reply = deps.models.rewrite.invoke(&system_prompt, &feedback).await?;
    let post = tagged_or_raw(&reply, "post");
    require(!post.is_empty(), "rewrite returned an empty post")?;
    state.post = post;
    tracing::info!(length = post_length(&state.post), "rewrote post from feedback");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct DateVerdict {
    #[serde(default)]
    date: Option<String>,
}

/// Applies a date from free-text feedback. Feedback without a usable date
/// is handed back to review as an unknown response.
pub async fn update_schedule_date(
    deps: &WorkflowDeps,
    state: &mut PostWorkflowState,
) -> Result<(), WorkflowError> {
    let Some(feedback) = state.user_response.take() else {
        return Err(WorkflowError::Precondition("no date feedback found".into()));
    };

    let date = match parse_date(&feedback) {
        Some(date) => Some(date),
        None => {
            let mut ctx = Context::new();
            ctx.insert("user_response", &feedback);
            ctx.insert("now", &schedule::format_date(Utc::now(), deps.timezone));
            ctx.insert("timezone", deps.timezone.name());
            let system_prompt = deps.render(Prompt::ExtractDate, &ctx)?;
            let reply = deps.models.route.invoke(&system_prompt, &feedback).await?;
            match parse_structured::<DateVerdict>(&reply) {
                Ok(verdict) => verdict.date.as_deref().and_then(parse_date),
                Err(e) => {
                    tracing::warn!(error = %e, "date extraction reply was not usable");
                    None
                }
            }
        }
    };

    match date {
        Some(date) => {
            tracing::info!(date = %date.display(deps.timezone), "updated schedule date");
            state.schedule_date = Some(date);
        }
        None => {
            tracing::warn!(feedback = %feedback, "no date found in feedback");
            state.unknown_response = Some(feedback);
        }
    }
    Ok(())
}

pub fn unknown_response(state: &mut PostWorkflowState) {
    if let Some(feedback) = state.user_response.take() {
        state.unknown_response = Some(feedback);
    }
}

pub async fn schedule_post(
    deps: &WorkflowDeps,
    state: &mut PostWorkflowState,
) -> Result<ScheduledPost, WorkflowError> {
    require(!state.post.is_empty(), "no post found")?;
    let Some(date) = state.schedule_date else {
        return Err(WorkflowError::Precondition("no schedule date found".into()));
    };
    let scheduled_date = date.resolve(Utc::now(), deps.timezone);

    let image_path = match (&state.image, &deps.image_dir) {
        (Some(image), Some(dir)) => Some(
            download_image(deps.fetcher.as_ref(), &image.url, dir)
                .await
                .map_err(|e| WorkflowError::Persistence(format!("{e:#}")))?,
        ),
        _ => None,
    };

    let record = NewScheduledPost {
        topic: state.topic().to_string(),
        post: state.post.clone(),
        scheduled_date,
        image: state.image.clone(),
        image_path,
    };
    let stored = deps
        .posts
        .insert(&record)
        .await
        .map_err(|e| WorkflowError::Persistence(format!("{e:#}")))?;

    state.object_id = Some(stored.id.clone());
    tracing::info!(
        post_id = %stored.id,
        scheduled_date = %schedule::format_date(stored.scheduled_date, deps.timezone),
        "scheduled post"
    );
    Ok(stored)
}

async fn download_image(
    fetcher: &dyn WebFetcher,
    url: &str,
    dir: &std::path::Path,
) -> anyhow::Result<String> {
    let bytes = fetcher.download(url).await?;
    let extension = infer::get(&bytes)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .map(|kind| kind.extension())
        .ok_or_else(|| anyhow::anyhow!("{url} did not return an image"))?;

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.{extension}", uuid::Uuid::new_v4()));
    tokio::fs::write(&path, &bytes).await?;
    Ok(path.display().to_string())
}
