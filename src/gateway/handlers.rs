use super::{AppState, CreatePostBody};
use crate::error::{PublishError, WorkflowError};
use crate::post::{ReviewPayload, RunOutcome};
use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde_json::{Value, json};

type JsonResponse = (StatusCode, Json<Value>);

fn error_body(status: StatusCode, message: impl Into<String>) -> JsonResponse {
    (status, Json(json!({ "error": message.into() })))
}

pub(super) fn workflow_status(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::Parse(_) | WorkflowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::Precondition(_)
        | WorkflowError::StaleResponse { .. }
        | WorkflowError::AlreadyAnswered { .. }
        | WorkflowError::NotSuspended { .. } => StatusCode::CONFLICT,
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::Persistence(_) | WorkflowError::Prompt(_) | WorkflowError::Other(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn workflow_error(err: &WorkflowError) -> JsonResponse {
    error_body(workflow_status(err), err.to_string())
}

fn publish_error(err: &PublishError) -> JsonResponse {
    tracing::warn!(error = %err, "publish request failed");
    error_body(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

fn outcome(result: Result<RunOutcome, WorkflowError>) -> JsonResponse {
    match result {
        Ok(outcome) => match serde_json::to_value(&outcome) {
            Ok(body) => (StatusCode::OK, Json(body)),
            Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        Err(e) => workflow_error(&e),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> JsonResponse {
    match serde_json::to_value(value) {
        Ok(body) => (StatusCode::OK, Json(body)),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// GET /health
pub(super) async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "publisher": state.publisher.is_some(),
    }))
}

/// GET /next: the next post due for publishing
pub(super) async fn handle_next(State(state): State<AppState>) -> impl IntoResponse {
    match state.posts.next_pending(Utc::now()).await {
        Ok(Some(post)) => to_json(&post),
        Ok(None) => (StatusCode::OK, Json(json!({ "message": "No posts found." }))),
        Err(e) => publish_error(&PublishError::Store(format!("{e:#}"))),
    }
}

/// GET /now: run one publish cycle immediately
pub(super) async fn handle_now(State(state): State<AppState>) -> impl IntoResponse {
    let Some(publisher) = state.publisher.as_ref() else {
        return error_body(
            StatusCode::SERVICE_UNAVAILABLE,
            "No uploader command configured",
        );
    };
    match publisher.publish_next(Utc::now()).await {
        Ok(outcome) => to_json(&outcome),
        Err(e) => publish_error(&e),
    }
}

/// POST /posts: start a workflow from a free-text request
pub(super) async fn handle_create_post(
    State(state): State<AppState>,
    body: Result<Json<CreatePostBody>, JsonRejection>,
) -> impl IntoResponse {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "rejected post request body");
            return error_body(
                StatusCode::BAD_REQUEST,
                "Invalid JSON body. Expected: {\"message\": \"...\"}",
            );
        }
    };
    if body.message.trim().is_empty() {
        return error_body(StatusCode::UNPROCESSABLE_ENTITY, "message must not be empty");
    }
    outcome(state.workflow.start(&body.message).await)
}

/// GET /reviews
pub(super) async fn handle_list_reviews(State(state): State<AppState>) -> impl IntoResponse {
    match state.workflow.pending_reviews().await {
        Ok(reviews) => to_json(&reviews),
        Err(e) => workflow_error(&e),
    }
}

/// GET /reviews/{id}
pub(super) async fn handle_get_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.workflow.review(&id).await {
        Ok(request) => to_json(&request),
        Err(e) => workflow_error(&e),
    }
}

/// POST /reviews/{id}: resume with a review response (object or list)
pub(super) async fn handle_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ReviewPayload>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match body {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(workflow_id = %id, error = %e, "rejected review body");
            return error_body(StatusCode::BAD_REQUEST, "Invalid JSON body");
        }
    };
    outcome(state.workflow.resume(&id, payload).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_errors_map_to_statuses() {
        let cases = [
            (WorkflowError::Parse("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (WorkflowError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (WorkflowError::Precondition("x".into()), StatusCode::CONFLICT),
            (
                WorkflowError::StaleResponse {
                    id: "w".into(),
                    expected: "a".into(),
                    received: "b".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                WorkflowError::AlreadyAnswered {
                    id: "w".into(),
                    interrupt_id: "a".into(),
                },
                StatusCode::CONFLICT,
            ),
            (WorkflowError::NotFound("w".into()), StatusCode::NOT_FOUND),
            (WorkflowError::Persistence("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                WorkflowError::Other(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(workflow_status(&err), status, "{err}");
        }
    }
}
