//! The human review interrupt: what the reviewer is shown and how their
//! answer is turned into the next step.

use super::node::Node;
use super::nodes::{WorkflowDeps, is_blacklisted_image};
use super::schedule::parse_date;
use super::state::{PostImage, PostWorkflowState, ReviewDecision};
use crate::error::WorkflowError;
use crate::llm::structured::parse_structured;
use crate::prompt::Prompt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tera::Context;

pub const REVIEW_ACTION: &str = "Schedule LinkedIn post";

/// Image types LinkedIn accepts as post attachments.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/gif", "image/png", "image/webp"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewConfig {
    pub allow_ignore: bool,
    pub allow_respond: bool,
    pub allow_edit: bool,
    pub allow_accept: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            allow_ignore: true,
            allow_respond: true,
            allow_edit: true,
            allow_accept: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewArgs {
    pub post: String,
    pub default_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Snapshot shown to the reviewer at a suspension point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub interrupt_id: String,
    pub action: String,
    pub args: ReviewArgs,
    pub config: ReviewConfig,
    pub description: String,
}

/// A reviewer's answer as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReviewResponse {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub args: Value,
    /// When set, must match the interrupt the workflow is waiting on.
    #[serde(default, alias = "interrupt_id", skip_serializing_if = "Option::is_none")]
    pub interrupt_id: Option<String>,
}

impl RawReviewResponse {
    pub fn new(kind: &str, args: Value) -> Self {
        Self {
            kind: kind.to_string(),
            args,
            interrupt_id: None,
        }
    }

    pub fn accept() -> Self {
        Self::new("accept", Value::Null)
    }

    pub fn ignore() -> Self {
        Self::new("ignore", Value::Null)
    }

    pub fn respond(feedback: &str) -> Self {
        Self::new("response", Value::String(feedback.to_string()))
    }

    pub fn edit(post: &str, date: Option<&str>, image: Option<&str>) -> Self {
        let mut inner = serde_json::Map::new();
        inner.insert("post".into(), Value::String(post.to_string()));
        if let Some(date) = date {
            inner.insert("date".into(), Value::String(date.to_string()));
        }
        if let Some(image) = image {
            inner.insert("image".into(), Value::String(image.to_string()));
        }
        Self::new("edit", serde_json::json!({ "args": inner }))
    }

    pub fn for_interrupt(mut self, interrupt_id: impl Into<String>) -> Self {
        self.interrupt_id = Some(interrupt_id.into());
        self
    }

    /// Checks the shape of the response against its type.
    pub fn parse(&self) -> Result<ReviewResponse, WorkflowError> {
        match self.kind.as_str() {
            "accept" => {
                let overrides = if is_empty_args(&self.args) {
                    None
                } else {
                    Some(EditArgs::from_value(&self.args)?)
                };
                Ok(ReviewResponse::Accept(overrides))
            }
            "edit" => {
                let args = EditArgs::from_value(&self.args)?;
                if args.post.is_none() {
                    return Err(WorkflowError::Validation("edit requires a post".into()));
                }
                Ok(ReviewResponse::Edit(args))
            }
            "response" => match &self.args {
                Value::String(text) if !text.trim().is_empty() => {
                    Ok(ReviewResponse::Respond(text.trim().to_string()))
                }
                _ => Err(WorkflowError::Validation(
                    "response args must be non-empty text".into(),
                )),
            },
            "ignore" => Ok(ReviewResponse::Ignore),
            other => Err(WorkflowError::Validation(format!(
                "unknown response type '{other}'"
            ))),
        }
    }
}

fn is_empty_args(args: &Value) -> bool {
    match args {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// One response or a batch, of which only the first is honored.
///
/// JSON of any other shape lands in `Malformed` so the workflow can reject
/// it like any other invalid response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReviewPayload {
    Batch(Vec<RawReviewResponse>),
    Single(RawReviewResponse),
    Malformed(Value),
}

impl ReviewPayload {
    pub fn into_first(self) -> Result<RawReviewResponse, WorkflowError> {
        match self {
            Self::Single(response) => Ok(response),
            Self::Batch(responses) => responses
                .into_iter()
                .next()
                .ok_or_else(|| WorkflowError::Validation("empty response list".into())),
            Self::Malformed(raw) => Err(WorkflowError::Validation(format!(
                "expected a response object or list, got {raw}"
            ))),
        }
    }
}

impl From<RawReviewResponse> for ReviewPayload {
    fn from(response: RawReviewResponse) -> Self {
        Self::Single(response)
    }
}

/// Reviewer overrides. `image: Some("")` or `Some("remove")` drops the
/// image; `None` keeps it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditArgs {
    pub post: Option<String>,
    pub date: Option<String>,
    pub image: Option<String>,
}

impl EditArgs {
    /// Accepts `{args: {post, date?, image?}}` as well as the flat form.
    fn from_value(args: &Value) -> Result<Self, WorkflowError> {
        let Value::Object(outer) = args else {
            return Err(WorkflowError::Validation("args must be an object".into()));
        };
        let fields = match outer.get("args") {
            Some(Value::Object(inner)) => inner,
            Some(_) => {
                return Err(WorkflowError::Validation("args.args must be an object".into()));
            }
            None => outer,
        };

        let text = |key: &str| -> Result<Option<String>, WorkflowError> {
            match fields.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(WorkflowError::Validation(format!("{key} must be a string"))),
            }
        };

        Ok(Self {
            post: text("post")?,
            date: text("date")?,
            image: text("image")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewResponse {
    Accept(Option<EditArgs>),
    Edit(EditArgs),
    Respond(String),
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Carry on at `state.next_step`.
    Continue,
    /// The reviewer discarded the post.
    Abort,
}

/// Builds the request shown at a suspension point.
pub fn build_request(
    deps: &WorkflowDeps,
    state: &PostWorkflowState,
    interrupt_id: &str,
) -> Result<ReviewRequest, WorkflowError> {
    let default_date = state
        .schedule_date
        .map(|date| date.display(deps.timezone))
        .unwrap_or_default();
    let image = state.image.as_ref().map(|i| i.url.clone());

    let mut ctx = Context::new();
    ctx.insert("unknown_response", state.unknown_response.as_deref().unwrap_or(""));
    ctx.insert("topic", state.topic());
    ctx.insert("relevant_links", state.relevant_links());
    ctx.insert("post", &state.post);
    ctx.insert("schedule_date", &default_date);
    ctx.insert("text_only", &deps.config.text_only_mode);
    ctx.insert("image", image.as_deref().unwrap_or(""));
    ctx.insert("image_options", &state.image_options);
    ctx.insert("report", &state.report);
    let description = deps.render(Prompt::ReviewDescription, &ctx)?;

    Ok(ReviewRequest {
        interrupt_id: interrupt_id.to_string(),
        action: REVIEW_ACTION.to_string(),
        args: ReviewArgs {
            post: state.post.clone(),
            default_date,
            image,
        },
        config: ReviewConfig::default(),
        description,
    })
}

/// Applies a parsed response to the state, recording the decision and the
/// step that follows.
pub async fn resolve_response(
    deps: &WorkflowDeps,
    state: &mut PostWorkflowState,
    response: ReviewResponse,
) -> Result<Resolution, WorkflowError> {
    let (decision, next) = match response {
        ReviewResponse::Accept(overrides) => {
            if let Some(args) = overrides {
                apply_edit(deps, state, args).await?;
            }
            (ReviewDecision::Accept, Node::SchedulePost)
        }
        ReviewResponse::Edit(args) => {
            apply_edit(deps, state, args).await?;
            (ReviewDecision::Edit, Node::SchedulePost)
        }
        ReviewResponse::Respond(feedback) => {
            let route = classify_response(deps, state, &feedback).await?;
            state.user_response = Some(feedback.clone());
            match route {
                ResponseRoute::RewritePost => {
                    (ReviewDecision::Rewrite { feedback }, Node::RewritePost)
                }
                ResponseRoute::UpdateDate => {
                    (ReviewDecision::UpdateDate { feedback }, Node::UpdateScheduleDate)
                }
                ResponseRoute::UnknownResponse => {
                    (ReviewDecision::Unknown { feedback }, Node::UnknownResponse)
                }
            }
        }
        ReviewResponse::Ignore => {
            state.pending_review_decision = Some(ReviewDecision::Ignore);
            state.next_step = None;
            return Ok(Resolution::Abort);
        }
    };

    tracing::debug!(decision = ?decision, next = %next, "resolved review response");
    state.pending_review_decision = Some(decision);
    state.next_step = Some(next);
    Ok(Resolution::Continue)
}

async fn apply_edit(
    deps: &WorkflowDeps,
    state: &mut PostWorkflowState,
    args: EditArgs,
) -> Result<(), WorkflowError> {
    if let Some(post) = args.post {
        let post = post.trim();
        if post.is_empty() {
            return Err(WorkflowError::Validation("post must not be empty".into()));
        }
        state.post = post.to_string();
    }

    if let Some(raw) = args.date {
        let date = parse_date(&raw)
            .ok_or_else(|| WorkflowError::Validation(format!("invalid date '{raw}'")))?;
        state.schedule_date = Some(date);
    }

    if deps.config.text_only_mode {
        state.image = None;
        return Ok(());
    }
    match args.image.as_deref().map(str::trim) {
        None => {}
        Some(url) if url.is_empty() || url.eq_ignore_ascii_case("remove") => state.image = None,
        Some(url) => match inspect_image(deps, url).await {
            Some(image) => state.image = Some(image),
            None => tracing::warn!(url, "not a usable image; keeping the current one"),
        },
    }
    Ok(())
}

async fn inspect_image(deps: &WorkflowDeps, url: &str) -> Option<PostImage> {
    if is_blacklisted_image(url) {
        return None;
    }
    match deps.fetcher.content_type(url).await {
        Ok(Some(mime)) if ALLOWED_IMAGE_TYPES.contains(&mime.as_str()) => Some(PostImage {
            url: url.to_string(),
            mime_type: mime,
        }),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(url, error = %e, "image check failed");
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ResponseRoute {
    RewritePost,
    UpdateDate,
    UnknownResponse,
}

#[derive(Debug, Deserialize)]
struct RouteVerdict {
    route: ResponseRoute,
}

async fn classify_response(
    deps: &WorkflowDeps,
    state: &PostWorkflowState,
    feedback: &str,
) -> Result<ResponseRoute, WorkflowError> {
    let mut ctx = Context::new();
    ctx.insert("post", &state.post);
    ctx.insert(
        "date_or_priority",
        &state
            .schedule_date
            .map(|date| date.display(deps.timezone))
            .unwrap_or_default(),
    );
    ctx.insert("user_response", feedback);
    let system_prompt = deps.render(Prompt::RouteResponse, &ctx)?;

    let reply = deps.models.route.invoke(&system_prompt, feedback).await?;
    Ok(match parse_structured::<RouteVerdict>(&reply) {
        Ok(verdict) => verdict.route,
        Err(e) => {
            tracing::warn!(error = %e, "could not classify review response");
            ResponseRoute::UnknownResponse
        }
    })
}
