//! Axum HTTP gateway: publish triggers for the browser automation and the
//! review API for suspended workflows.

mod handlers;
mod server;

pub use server::{build_app, run_gateway};

use crate::post::PostWorkflow;
use crate::publisher::Publisher;
use crate::store::PostStore;
use std::sync::Arc;

/// Maximum request body size (64KB)
pub const MAX_BODY_SIZE: usize = 65_536;
/// Workflow runs call the LLM several times; allow them to finish.
pub const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<PostWorkflow>,
    pub posts: Arc<dyn PostStore>,
    /// `None` when no uploader command is configured.
    pub publisher: Option<Arc<Publisher>>,
}

/// `POST /posts` body
#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct CreatePostBody {
    pub message: String,
}
