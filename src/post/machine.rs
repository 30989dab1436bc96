use super::node::{Edge, Node};
use super::nodes::{self, WorkflowDeps};
use super::review::{self, Resolution, ReviewPayload, ReviewRequest};
use super::router::{decide_after_condense, route_after_review};
use super::state::PostWorkflowState;
use crate::error::WorkflowError;
use crate::store::{Checkpoint, ScheduledPost};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// How a call into the workflow ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Suspended at human review; resume with the workflow id.
    AwaitingReview {
        workflow_id: String,
        request: ReviewRequest,
    },
    Scheduled {
        workflow_id: String,
        post: ScheduledPost,
    },
    /// The reviewer ignored the post.
    Aborted { workflow_id: String },
}

impl RunOutcome {
    pub fn workflow_id(&self) -> &str {
        match self {
            Self::AwaitingReview { workflow_id, .. }
            | Self::Scheduled { workflow_id, .. }
            | Self::Aborted { workflow_id } => workflow_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingReview {
    pub workflow_id: String,
    pub topic: String,
    pub request: ReviewRequest,
    pub updated_at: DateTime<Utc>,
}

/// Drives post workflows from request to scheduled record, suspending at
/// human review.
pub struct PostWorkflow {
    deps: WorkflowDeps,
}

impl PostWorkflow {
    pub fn new(deps: WorkflowDeps) -> Self {
        Self { deps }
    }

    /// Runs a new workflow from a free-text request until it suspends or
    /// fails.
    pub async fn start(&self, message: &str) -> Result<RunOutcome, WorkflowError> {
        let workflow_id = Uuid::new_v4().to_string();
        tracing::info!(workflow_id = %workflow_id, "starting post workflow");

        let state = nodes::parse_request(&self.deps, message)
            .await
            .inspect_err(|e| tracing::warn!(workflow_id = %workflow_id, error = %e, "request rejected"))?;

        let Edge::To(first) = Node::ParseRequest.edge() else {
            return Err(WorkflowError::Other(anyhow::anyhow!(
                "parse_request has no successor"
            )));
        };
        self.drive(&workflow_id, state, first).await
    }

    /// Continues a suspended workflow with the reviewer's answer.
    ///
    /// Unknown ids, runs that are not at review and responses aimed at an
    /// older interrupt are rejected without touching the checkpoint. Each
    /// interrupt is claimed before the response is applied, so concurrent
    /// answers to the same request resolve once.
    pub async fn resume(
        &self,
        workflow_id: &str,
        payload: ReviewPayload,
    ) -> Result<RunOutcome, WorkflowError> {
        let checkpoint = self
            .deps
            .checkpoints
            .load(workflow_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(workflow_id.to_string()))?;

        let expected = match (&checkpoint.interrupt_id, checkpoint.node) {
            (Some(interrupt_id), Node::HumanReview) => interrupt_id.clone(),
            (_, node) => {
                return Err(WorkflowError::NotSuspended {
                    id: workflow_id.to_string(),
                    node: node.to_string(),
                });
            }
        };

        let raw = match payload.into_first() {
            Ok(raw) => raw,
            Err(e) => return Err(self.fail(workflow_id, e).await),
        };
        if let Some(received) = &raw.interrupt_id
            && *received != expected
        {
            return Err(WorkflowError::StaleResponse {
                id: workflow_id.to_string(),
                expected,
                received: received.clone(),
            });
        }
        if !self.deps.checkpoints.claim_interrupt(workflow_id, &expected).await? {
            tracing::info!(workflow_id, interrupt_id = %expected, "interrupt already answered");
            return Err(WorkflowError::AlreadyAnswered {
                id: workflow_id.to_string(),
                interrupt_id: expected,
            });
        }

        let mut state = checkpoint.state;
        let resolution = match raw.parse() {
            Ok(response) => review::resolve_response(&self.deps, &mut state, response).await,
            Err(e) => Err(e),
        };

        match resolution {
            Ok(Resolution::Continue) => {
                let next = route_after_review(&mut state);
                tracing::info!(workflow_id, next = %next, "resuming after review");
                self.drive(workflow_id, state, next).await
            }
            Ok(Resolution::Abort) => {
                self.discard_checkpoint(workflow_id).await;
                tracing::info!(workflow_id, "post ignored by reviewer");
                Ok(RunOutcome::Aborted {
                    workflow_id: workflow_id.to_string(),
                })
            }
            Err(e) => Err(self.fail(workflow_id, e).await),
        }
    }

    /// Suspended workflows, oldest first.
    pub async fn pending_reviews(&self) -> Result<Vec<PendingReview>, WorkflowError> {
        let checkpoints = self.deps.checkpoints.list().await?;
        Ok(checkpoints
            .into_iter()
            .filter_map(|c| {
                c.interrupt_id.as_ref()?;
                let request = c.request?;
                Some(PendingReview {
                    topic: c.state.topic().to_string(),
                    workflow_id: c.workflow_id,
                    request,
                    updated_at: c.updated_at,
                })
            })
            .collect())
    }

    /// The request a suspended workflow is waiting on.
    pub async fn review(&self, workflow_id: &str) -> Result<ReviewRequest, WorkflowError> {
        let checkpoint = self
            .deps
            .checkpoints
            .load(workflow_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(workflow_id.to_string()))?;
        match checkpoint {
            Checkpoint {
                interrupt_id: Some(_),
                request: Some(request),
                ..
            } => Ok(request),
            Checkpoint { node, .. } => Err(WorkflowError::NotSuspended {
                id: workflow_id.to_string(),
                node: node.to_string(),
            }),
        }
    }

    async fn drive(
        &self,
        workflow_id: &str,
        mut state: PostWorkflowState,
        mut node: Node,
    ) -> Result<RunOutcome, WorkflowError> {
        loop {
            tracing::debug!(workflow_id, node = %node, "running step");
            let scheduled = match self.run_step(node, &mut state).await {
                Ok(scheduled) => scheduled,
                Err(e) => return Err(self.fail(workflow_id, e).await),
            };

            node = match node.edge() {
                Edge::To(next) => next,
                Edge::RouteByLength => decide_after_condense(&state, &self.deps.config),
                Edge::Suspend => {
                    return match self.suspend(workflow_id, state).await {
                        Ok(outcome) => Ok(outcome),
                        Err(e) => Err(self.fail(workflow_id, e).await),
                    };
                }
                Edge::Finish => {
                    let Some(post) = scheduled else {
                        let err = WorkflowError::Precondition("no post was scheduled".into());
                        return Err(self.fail(workflow_id, err).await);
                    };
                    self.discard_checkpoint(workflow_id).await;
                    return Ok(RunOutcome::Scheduled {
                        workflow_id: workflow_id.to_string(),
                        post,
                    });
                }
            };
        }
    }

    async fn run_step(
        &self,
        node: Node,
        state: &mut PostWorkflowState,
    ) -> Result<Option<ScheduledPost>, WorkflowError> {
        let deps = &self.deps;
        match node {
            Node::ParseRequest => {
                return Err(WorkflowError::Precondition(
                    "request parsing only runs at start".into(),
                ));
            }
            Node::VerifyLinks => nodes::verify_links(deps, state).await?,
            Node::GenerateReport => nodes::generate_report(deps, state).await?,
            Node::GeneratePost => nodes::generate_post(deps, state).await?,
            Node::CondensePost => nodes::condense_post(deps, state).await?,
            Node::FindImages => nodes::find_images(deps, state).await?,
            Node::HumanReview => {}
            Node::RewritePost => nodes::rewrite_post(deps, state).await?,
            Node::UpdateScheduleDate => nodes::update_schedule_date(deps, state).await?,
            Node::UnknownResponse => nodes::unknown_response(state),
            Node::SchedulePost => return nodes::schedule_post(deps, state).await.map(Some),
        }
        Ok(None)
    }

    async fn suspend(
        &self,
        workflow_id: &str,
        mut state: PostWorkflowState,
    ) -> Result<RunOutcome, WorkflowError> {
        let interrupt_id = Uuid::new_v4().to_string();
        let request = review::build_request(&self.deps, &state, &interrupt_id)?;
        // The banner is shown once.
        state.unknown_response = None;

        let checkpoint = Checkpoint {
            workflow_id: workflow_id.to_string(),
            node: Node::HumanReview,
            interrupt_id: Some(interrupt_id.clone()),
            state,
            request: Some(request.clone()),
            updated_at: Utc::now(),
        };
        self.deps.checkpoints.save(&checkpoint).await?;

        tracing::info!(workflow_id, interrupt_id = %interrupt_id, "awaiting human review");
        Ok(RunOutcome::AwaitingReview {
            workflow_id: workflow_id.to_string(),
            request,
        })
    }

    async fn fail(&self, workflow_id: &str, err: WorkflowError) -> WorkflowError {
        if !err.leaves_checkpoint() {
            self.discard_checkpoint(workflow_id).await;
        }
        tracing::warn!(workflow_id, error = %err, "workflow run failed");
        err
    }

    async fn discard_checkpoint(&self, workflow_id: &str) {
        if let Err(e) = self.deps.checkpoints.delete(workflow_id).await {
            tracing::warn!(workflow_id, error = %e, "failed to remove checkpoint");
        }
    }
}
