use crate::post::node::Node;
use crate::post::review::ReviewRequest;
use crate::post::state::{PostImage, PostWorkflowState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PostStatus {
    /// Waiting for its scheduled date.
    Pending,
    /// Claimed by a publisher; upload in progress.
    Queued,
    Uploaded,
}

/// A post waiting to be (or already) published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledPost {
    #[serde(rename = "_id")]
    pub id: String,
    pub topic: String,
    pub post: String,
    pub scheduled_date: DateTime<Utc>,
    pub status: PostStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PostImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    pub created_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScheduledPost {
    pub topic: String,
    pub post: String,
    pub scheduled_date: DateTime<Utc>,
    pub image: Option<PostImage>,
    pub image_path: Option<String>,
}

/// A suspended (or in-flight) workflow run, keyed by workflow id.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub workflow_id: String,
    pub node: Node,
    pub interrupt_id: Option<String>,
    pub state: PostWorkflowState,
    pub request: Option<ReviewRequest>,
    pub updated_at: DateTime<Utc>,
}
