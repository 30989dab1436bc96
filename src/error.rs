use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `postwright`.
///
/// Library callers match on these to decide recovery strategy; collaborator
/// traits and ad-hoc plumbing keep using `anyhow::Result` for context chains.
#[derive(Debug, Error)]
pub enum PostwrightError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Post workflow ────────────────────────────────────────────────────
    #[error("workflow: {0}")]
    Workflow(#[from] WorkflowError),

    // ── Publisher ────────────────────────────────────────────────────────
    #[error("publish: {0}")]
    Publish(#[from] PublishError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Workflow errors ─────────────────────────────────────────────────────────

/// Failures that terminate a post workflow run.
///
/// None of these are retried; the run's checkpoint is dropped except for the
/// lookup errors (`NotFound`, `NotSuspended`, `StaleResponse`,
/// `AlreadyAnswered`) which never touch the suspended run.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("could not parse request: {0}")]
    Parse(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("invalid review response: {0}")]
    Validation(String),

    #[error("failed to persist scheduled post: {0}")]
    Persistence(String),

    #[error("workflow {0} not found")]
    NotFound(String),

    #[error("workflow {id} is not awaiting review (at {node})")]
    NotSuspended { id: String, node: String },

    #[error("response targets interrupt {received} but workflow {id} is waiting on {expected}")]
    StaleResponse {
        id: String,
        expected: String,
        received: String,
    },

    #[error("interrupt {interrupt_id} of workflow {id} was already answered")]
    AlreadyAnswered { id: String, interrupt_id: String },

    #[error("prompt: {0}")]
    Prompt(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorkflowError {
    /// Lookup failures leave the suspended run as it was.
    pub fn leaves_checkpoint(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::NotSuspended { .. }
                | Self::StaleResponse { .. }
                | Self::AlreadyAnswered { .. }
        )
    }
}

// ─── Publisher errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("store: {0}")]
    Store(String),

    #[error("upload of {post_id} failed: {message}")]
    Upload { post_id: String, message: String },
}

/// Convenience alias used by library callers.
pub type Result<T> = std::result::Result<T, PostwrightError>;
